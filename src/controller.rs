//! Canvas controller: one open diagram, its viewport and interaction state.

use std::rc::Rc;

use crate::config::CanvasConfig;
use crate::geom::{Point, Rect, Size};
use crate::interaction::capture::{ListenerHost, PointerCapture, RecordingHost};
use crate::interaction::{
    Effect, EdgeEnd, InputEvent, InteractionConfig, InteractionState, Mode, PendingConnection,
    Selection, StepContext, Tool, cancel_edge, confirm_edge, step,
};
use crate::layout::path::{self, AutoStyle};
use crate::layout::{EdgeLayout, LayoutContext, Route};
use crate::measure::{FieldMetrics, Measurer, NoMeasurer};
use crate::model::{
    Cardinality, Diagram, Edge, Endpoint, Group, ModelError, Node, NodeKind, NodeRemoval,
    RoutingMode,
};
use crate::viewport::{ViewState, Viewport};

pub struct CanvasController {
    diagram: Diagram,
    viewport: Viewport,
    layout: EdgeLayout,
    config: InteractionConfig,
    measurer: Box<dyn Measurer>,
    state: InteractionState,
    tool: Tool,
    selection: Option<Selection>,
    space_held: bool,
    host: Rc<dyn ListenerHost>,
    capture: Option<PointerCapture>,
}

impl CanvasController {
    pub fn new(config: &CanvasConfig, host: Rc<dyn ListenerHost>) -> Self {
        Self {
            diagram: Diagram::new(),
            viewport: Viewport::new(config.viewport.clone()),
            layout: EdgeLayout::from_config(config),
            config: config.interaction.clone(),
            measurer: Box::new(NoMeasurer),
            state: InteractionState::Idle,
            tool: Tool::Select,
            selection: None,
            space_held: false,
            host,
            capture: None,
        }
    }

    /// Controller whose listener subscriptions are only recorded in memory.
    pub fn headless(config: &CanvasConfig) -> Self {
        Self::new(config, Rc::new(RecordingHost::default()))
    }

    pub fn with_diagram(mut self, diagram: Diagram) -> Self {
        self.load(diagram);
        self
    }

    /// Replace the open diagram, ending any interaction.
    pub fn load(&mut self, diagram: Diagram) {
        self.diagram = diagram;
        self.selection = None;
        self.set_state(InteractionState::Idle);
        self.layout.prune(&self.diagram);
    }

    pub fn set_measurer(&mut self, measurer: Box<dyn Measurer>) {
        self.measurer = measurer;
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn view_state(&self) -> ViewState {
        self.viewport.state()
    }

    pub fn set_view_state(&mut self, state: ViewState) {
        self.viewport.set_state(state);
    }

    pub fn set_canvas_rect(&mut self, rect: Option<Rect>) {
        self.viewport.set_canvas_rect(rect);
    }

    pub fn client_to_world(&self, client: Point) -> Point {
        self.viewport.client_to_world(client)
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn reset_zoom(&mut self) {
        self.viewport.reset();
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode(self.tool, self.config.routing_mode)
    }

    pub fn pending(&self) -> Option<&PendingConnection> {
        self.state.pending()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools; an unfinished edge or group rectangle is abandoned.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool != self.tool {
            tracing::debug!(?tool, "tool changed");
            self.tool = tool;
            self.set_state(InteractionState::Idle);
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn has_capture(&self) -> bool {
        self.capture.is_some()
    }

    pub fn interaction_config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn field_metrics(&self) -> &FieldMetrics {
        self.layout.field_metrics()
    }

    fn set_state(&mut self, next: InteractionState) {
        let before = self.mode();
        self.enter(before, next);
    }

    fn enter(&mut self, before: Mode, next: InteractionState) {
        self.state = next;
        let after = self.state.mode(self.tool, self.config.routing_mode);
        if before != after {
            tracing::debug!(from = before.as_str(), to = after.as_str(), "interaction");
        }
        match (self.state.captures_pointer(), self.capture.is_some()) {
            (true, false) => self.capture = Some(PointerCapture::acquire(self.host.clone())),
            (false, true) => self.capture = None,
            _ => {}
        }
    }

    /// Feed one input event through the state machine and apply its effects.
    ///
    /// Every effect is attempted; the first model error is returned.
    pub fn handle(&mut self, event: &InputEvent) -> Result<(), ModelError> {
        let before = self.mode();
        let state = std::mem::take(&mut self.state);
        let transition = {
            let ctx = StepContext {
                diagram: &self.diagram,
                viewport: &self.viewport,
                tool: self.tool,
                space_held: self.space_held,
                config: &self.config,
                snap_grid: self.layout.path_config().snap_grid,
            };
            step(state, event, &ctx)
        };
        self.enter(before, transition.next);
        self.apply_all(transition.effects)
    }

    fn apply_all(&mut self, effects: Vec<Effect>) -> Result<(), ModelError> {
        let mut result = Ok(());
        for effect in effects {
            if let Err(err) = self.apply(effect) {
                tracing::warn!(%err, "effect rejected");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    fn apply(&mut self, effect: Effect) -> Result<(), ModelError> {
        match effect {
            Effect::CreateNode { kind, center } => {
                let id = self.create_node(kind, center)?;
                self.selection = Some(Selection::Node(id));
            }
            Effect::MoveNode { node, position } => self.diagram.move_node(&node, position)?,
            Effect::SetNodeBounds { node, bounds } => self.diagram.set_node_bounds(&node, bounds)?,
            Effect::SetPanOffset(offset) => self.viewport.set_offset(offset),
            Effect::WheelZoom { client, delta_y } => self.viewport.wheel(delta_y, client),
            Effect::CreateEdge {
                source,
                target,
                waypoints,
                cardinality,
            } => {
                self.create_edge(source, target, waypoints, cardinality)?;
            }
            Effect::MoveWaypoint { edge, index, to } => self.drag_waypoint(&edge, index, to)?,
            Effect::SetEndpointAnchor { edge, endpoint, anchor } => {
                let e = self
                    .diagram
                    .edge_mut(&edge)
                    .ok_or_else(|| ModelError::UnknownEdge(edge.clone()))?;
                e.set_anchor(endpoint, Some(anchor));
            }
            Effect::CreateGroup { bounds } => {
                self.create_group_from_bounds(bounds)?;
            }
            Effect::Select(selection) => self.selection = Some(selection),
            Effect::ClearSelection => self.selection = None,
            Effect::DeleteSelection => self.delete_selection()?,
            Effect::SetTool(tool) => self.tool = tool,
            Effect::SpaceHeld(held) => self.space_held = held,
        }
        Ok(())
    }

    /// Complete an edge waiting for confirmation.
    pub fn confirm_edge(&mut self, cardinality: Cardinality) -> Result<(), ModelError> {
        let before = self.mode();
        let state = std::mem::take(&mut self.state);
        let transition = confirm_edge(state, cardinality);
        self.enter(before, transition.next);
        self.apply_all(transition.effects)
    }

    pub fn cancel_edge(&mut self) {
        let before = self.mode();
        let state = std::mem::take(&mut self.state);
        let transition = cancel_edge(state);
        self.enter(before, transition.next);
    }

    // Node CRUD

    /// Place a node of `kind` centered on `center` and return its id.
    pub fn create_node(&mut self, kind: NodeKind, center: Point) -> Result<String, ModelError> {
        let size = kind.default_size(0);
        let id = self.diagram.fresh_id("node");
        let position = Point::new(center.x - size.width / 2.0, center.y - size.height / 2.0);
        self.diagram.add_node(Node::new(id.clone(), kind, position))?;
        tracing::debug!(node = %id, ?kind, "node created");
        Ok(id)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), ModelError> {
        self.diagram.add_node(node)
    }

    pub fn update_node(&mut self, node: Node) -> Result<(), ModelError> {
        self.diagram.update_node(node)
    }

    /// Delete a node and every edge referencing it.
    pub fn delete_node(&mut self, id: &str) -> Result<NodeRemoval, ModelError> {
        let removal = self.diagram.delete_node(id)?;
        let selection_gone = match &self.selection {
            Some(Selection::Node(n)) => n == id,
            Some(Selection::Edge(e)) => removal.edges.iter().any(|r| &r.id == e),
            None => false,
        };
        if selection_gone {
            self.selection = None;
        }
        self.layout.prune(&self.diagram);
        tracing::debug!(node = %id, edges = removal.edges.len(), "node deleted");
        Ok(removal)
    }

    /// Fit a field-bearing node to its label and rows.
    pub fn autosize(&mut self, id: &str) -> Result<Size, ModelError> {
        let metrics = self.layout.field_metrics().clone();
        let node = self
            .diagram
            .node_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.to_string()))?;
        if node.kind.has_fields() {
            node.size = metrics.table_size(&node.label, &node.fields);
        }
        Ok(node.size)
    }

    // Edge CRUD

    pub fn create_edge(
        &mut self,
        source: EdgeEnd,
        target: EdgeEnd,
        waypoints: Vec<Point>,
        cardinality: Cardinality,
    ) -> Result<String, ModelError> {
        let id = self.diagram.fresh_id("edge");
        let mut edge = Edge::new(id.clone(), source.node, target.node)
            .with_fields(source.field.as_deref(), target.field.as_deref())
            .with_anchors(source.anchor, target.anchor);
        edge.cardinality = cardinality;
        edge.routing = self.config.routing_mode;
        edge.waypoints = waypoints;
        self.add_edge(edge)?;
        tracing::debug!(edge = %id, "edge created");
        Ok(id)
    }

    /// Insert an edge; obstacle-avoiding routes are computed right away.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), ModelError> {
        let id = edge.id.clone();
        let routes = edge.routing == RoutingMode::Auto
            && self.layout.path_config().auto_style == AutoStyle::Avoiding;
        self.diagram.add_edge(edge)?;
        if routes {
            self.auto_route(&id);
        }
        Ok(())
    }

    pub fn update_edge(&mut self, edge: Edge) -> Result<(), ModelError> {
        self.diagram.update_edge(edge)
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<Edge, ModelError> {
        let edge = self.diagram.delete_edge(id)?;
        if self.selection == Some(Selection::Edge(id.to_string())) {
            self.selection = None;
        }
        self.layout.invalidate(id);
        Ok(edge)
    }

    fn delete_selection(&mut self) -> Result<(), ModelError> {
        match self.selection.take() {
            Some(Selection::Node(id)) => self.delete_node(&id).map(|_| ()),
            Some(Selection::Edge(id)) => self.delete_edge(&id).map(|_| ()),
            None => Ok(()),
        }
    }

    // Groups

    pub fn add_group(&mut self, group: Group) -> Result<(), ModelError> {
        self.diagram.add_group(group)
    }

    pub fn update_group(&mut self, group: Group) -> Result<(), ModelError> {
        self.diagram.update_group(group)
    }

    pub fn delete_group(&mut self, id: &str) -> Result<Group, ModelError> {
        self.diagram.delete_group(id)
    }

    fn new_group(&mut self, members: Vec<String>, bounds: Rect) -> Result<String, ModelError> {
        let id = self.diagram.fresh_id("group");
        let name = format!("Group {}", self.diagram.groups.len() + 1);
        self.diagram.add_group(Group {
            id: id.clone(),
            name,
            color: self.config.default_group_color.clone(),
            members,
            bounds,
        })?;
        tracing::debug!(group = %id, "group created");
        Ok(id)
    }

    /// Group `members` inside their padded bounding box.
    ///
    /// `None` when `members` is empty.
    pub fn create_group_from_selection(
        &mut self,
        members: &[String],
    ) -> Result<Option<String>, ModelError> {
        if let Some(missing) = members.iter().find(|m| self.diagram.node(m).is_none()) {
            return Err(ModelError::UnknownNode(missing.clone()));
        }
        let Some(bounds) = self.diagram.bounds_of(members) else {
            return Ok(None);
        };
        let padded = self.config.group_padding.apply(&bounds);
        self.new_group(members.to_vec(), padded).map(Some)
    }

    /// Group every node lying fully inside `bounds`.
    pub fn create_group_from_bounds(&mut self, bounds: Rect) -> Result<String, ModelError> {
        let members = self.diagram.nodes_inside(&bounds);
        self.new_group(members, bounds)
    }

    // Waypoints

    /// Append a waypoint at the edge's midpoint; the edge becomes manually routed.
    pub fn add_waypoint(&mut self, edge_id: &str) -> Result<usize, ModelError> {
        let source = self.anchor_for(edge_id, Endpoint::Source);
        let target = self.anchor_for(edge_id, Endpoint::Target);
        let edge = self
            .diagram
            .edge_mut(edge_id)
            .ok_or_else(|| ModelError::UnknownEdge(edge_id.to_string()))?;
        let (Some(source), Some(target)) = (source, target) else {
            return Err(ModelError::UnknownNode(edge.source.clone()));
        };
        edge.routing = RoutingMode::Manual;
        Ok(path::add_waypoint(&mut edge.waypoints, source, target))
    }

    pub fn remove_waypoint(
        &mut self,
        edge_id: &str,
        index: usize,
    ) -> Result<Option<Point>, ModelError> {
        let edge = self
            .diagram
            .edge_mut(edge_id)
            .ok_or_else(|| ModelError::UnknownEdge(edge_id.to_string()))?;
        Ok(path::remove_waypoint(&mut edge.waypoints, index))
    }

    pub fn drag_waypoint(
        &mut self,
        edge_id: &str,
        index: usize,
        to: Point,
    ) -> Result<(), ModelError> {
        let snap = self.layout.path_config().snap_grid;
        let edge = self
            .diagram
            .edge_mut(edge_id)
            .ok_or_else(|| ModelError::UnknownEdge(edge_id.to_string()))?;
        if !path::drag_waypoint(&mut edge.waypoints, index, to, snap) {
            tracing::trace!(edge = %edge_id, index, "waypoint drag ignored");
        }
        Ok(())
    }

    // Geometry queries

    fn layout_parts(&mut self) -> (&mut EdgeLayout, LayoutContext<'_>) {
        let ctx = LayoutContext {
            diagram: &self.diagram,
            viewport: &self.viewport,
            measurer: self.measurer.as_ref(),
            interacting: self.state.is_continuous(),
        };
        (&mut self.layout, ctx)
    }

    pub fn anchor_for(&mut self, edge_id: &str, endpoint: Endpoint) -> Option<Point> {
        let (layout, ctx) = self.layout_parts();
        layout.anchor_for(&ctx, edge_id, endpoint)
    }

    pub fn path_for(&mut self, edge_id: &str) -> Option<Vec<Point>> {
        let (layout, ctx) = self.layout_parts();
        layout.path_for(&ctx, edge_id)
    }

    pub fn all_paths(&mut self) -> Vec<(String, Vec<Point>)> {
        let (layout, ctx) = self.layout_parts();
        layout.all_paths(&ctx)
    }

    pub fn auto_route(&mut self, edge_id: &str) -> Option<Route> {
        let (layout, ctx) = self.layout_parts();
        layout.auto_route(&ctx, edge_id)
    }

    pub fn is_route_fresh(&mut self, edge_id: &str) -> bool {
        let (layout, ctx) = self.layout_parts();
        layout.is_route_fresh(&ctx, edge_id)
    }
}
