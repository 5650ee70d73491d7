//! Canvas interaction state machine.

pub mod capture;

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect, Side};
use crate::layout::anchor_from_point;
use crate::model::{Anchor, Cardinality, Diagram, Endpoint, NodeKind, RoutingMode};
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupPadding {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Default for GroupPadding {
    fn default() -> Self {
        Self {
            left: 20.0,
            top: 40.0, // Room for the group title
            right: 20.0,
            bottom: 20.0,
        }
    }
}

impl GroupPadding {
    pub fn apply(&self, r: &Rect) -> Rect {
        Rect::new(
            r.x - self.left,
            r.y - self.top,
            r.width + self.left + self.right,
            r.height + self.top + self.bottom,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    pub min_node_width: f64,
    pub min_node_height: f64,
    pub drag_threshold: f64, // Client pixels before a press counts as a drag
    pub confirm_edges: bool, // Ask for a cardinality before creating an edge
    pub routing_mode: RoutingMode,
    pub group_padding: GroupPadding,
    pub default_group_color: String,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_node_width: 60.0,
            min_node_height: 40.0,
            drag_threshold: 3.0,
            confirm_edges: false,
            routing_mode: RoutingMode::Auto,
            group_padding: GroupPadding::default(),
            default_group_color: "#3B82F6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tool {
    #[default]
    Select,
    AddNode(NodeKind),
    AddEdge,
    Group,
}

/// Corner handles of a selected node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    Nw,
    Ne,
    Sw,
    Se,
}

impl ResizeHandle {
    fn moves_west(&self) -> bool {
        matches!(self, ResizeHandle::Nw | ResizeHandle::Sw)
    }

    fn moves_north(&self) -> bool {
        matches!(self, ResizeHandle::Nw | ResizeHandle::Ne)
    }

    /// Corner that stays put while this handle is dragged.
    pub fn fixed_corner(&self, bounds: &Rect) -> Point {
        let x = if self.moves_west() { bounds.right() } else { bounds.x };
        let y = if self.moves_north() { bounds.bottom() } else { bounds.y };
        Point::new(x, y)
    }

    /// Bounds spanned by the fixed corner and the pointer, at least `min` in size.
    ///
    /// With `square`, both sides take the mean of the two extents.
    pub fn resize(&self, fixed: Point, pointer: Point, min: (f64, f64), square: bool) -> Rect {
        let raw_w = if self.moves_west() { fixed.x - pointer.x } else { pointer.x - fixed.x };
        let raw_h = if self.moves_north() { fixed.y - pointer.y } else { pointer.y - fixed.y };
        let mut w = raw_w.max(min.0);
        let mut h = raw_h.max(min.1);
        if square {
            let dim = ((w + h) / 2.0).max(min.0.max(min.1));
            w = dim;
            h = dim;
        }
        let x = if self.moves_west() { fixed.x - w } else { fixed.x };
        let y = if self.moves_north() { fixed.y - h } else { fixed.y };
        Rect::new(x, y, w, h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

/// What the pointer was over when it was pressed, as reported by the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HitTarget {
    Canvas,
    NodeBody { node: String },
    /// Input, button or other control nested in a node; never starts a drag.
    NodeControl { node: String },
    Port { node: String, side: Side },
    Field { node: String, field: String },
    ResizeHandle { node: String, handle: ResizeHandle },
    Waypoint { edge: String, index: usize },
    EdgeEndpoint { edge: String, endpoint: EndpointTag },
    Edge { edge: String },
}

/// Serializable mirror of [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointTag {
    Source,
    Target,
}

impl From<EndpointTag> for Endpoint {
    fn from(tag: EndpointTag) -> Self {
        match tag {
            EndpointTag::Source => Endpoint::Source,
            EndpointTag::Target => Endpoint::Target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Space,
    Escape,
    Delete,
    Backspace,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InputEvent {
    PointerDown {
        client: Point,
        button: PointerButton,
        target: HitTarget,
    },
    PointerMove {
        client: Point,
    },
    PointerUp {
        client: Point,
    },
    Wheel {
        client: Point,
        delta_y: f64,
    },
    KeyDown {
        key: Key,
    },
    KeyUp {
        key: Key,
    },
    /// Window lost focus; no pointer up will follow.
    Blur,
}

/// One end of an edge being formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEnd {
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

impl EdgeEnd {
    pub fn node(node: &str) -> Self {
        Self {
            node: node.to_string(),
            field: None,
            anchor: None,
        }
    }

    pub fn field(node: &str, field: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            ..Self::node(node)
        }
    }

    pub fn port(node: &str, side: Side) -> Self {
        Self {
            anchor: Some(Anchor::port(side)),
            ..Self::node(node)
        }
    }
}

/// Source chosen, target not yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConnection {
    pub source: EdgeEnd,
    pub waypoints: Vec<Point>,
    /// Last pointer position in world units, for the rubber-band preview.
    pub cursor: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Selection {
    Node(String),
    Edge(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingNode {
        node: String,
        grab: Point,  // Pointer minus node origin, world units
        press: Point, // Client point of the press
        moved: bool,  // Drag threshold exceeded
    },
    ResizingNode {
        node: String,
        handle: ResizeHandle,
        fixed: Point,
    },
    Panning {
        start_client: Point,
        start_offset: Point,
    },
    FormingEdge(PendingConnection),
    ConfirmingEdge {
        pending: PendingConnection,
        target: EdgeEnd,
    },
    DrawingGroupRect {
        first: Point,
        first_client: Point,
        current: Point,
        pressed: bool,
    },
    DraggingWaypoint {
        edge: String,
        index: usize,
    },
    DraggingEndpoint {
        edge: String,
        endpoint: Endpoint,
    },
}

/// User-facing name of what the canvas is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Idle,
    PlacingNode,
    DraggingNode,
    ResizingNode,
    Panning,
    FormingEdge,
    PlacingWaypoint,
    ConfirmingEdge,
    DrawingGroupRect,
    DraggingWaypoint,
    DraggingEndpoint,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::PlacingNode => "placing-node",
            Mode::DraggingNode => "dragging-node",
            Mode::ResizingNode => "resizing-node",
            Mode::Panning => "panning",
            Mode::FormingEdge => "forming-edge",
            Mode::PlacingWaypoint => "placing-waypoint",
            Mode::ConfirmingEdge => "confirming-edge",
            Mode::DrawingGroupRect => "drawing-group-rect",
            Mode::DraggingWaypoint => "dragging-waypoint",
            Mode::DraggingEndpoint => "dragging-endpoint",
        }
    }
}

impl InteractionState {
    pub fn mode(&self, tool: Tool, routing: RoutingMode) -> Mode {
        match self {
            InteractionState::Idle => match tool {
                Tool::AddNode(_) => Mode::PlacingNode,
                _ => Mode::Idle,
            },
            InteractionState::DraggingNode { .. } => Mode::DraggingNode,
            InteractionState::ResizingNode { .. } => Mode::ResizingNode,
            InteractionState::Panning { .. } => Mode::Panning,
            InteractionState::FormingEdge(_) => match routing {
                RoutingMode::Manual => Mode::PlacingWaypoint,
                RoutingMode::Auto => Mode::FormingEdge,
            },
            InteractionState::ConfirmingEdge { .. } => Mode::ConfirmingEdge,
            InteractionState::DrawingGroupRect { .. } => Mode::DrawingGroupRect,
            InteractionState::DraggingWaypoint { .. } => Mode::DraggingWaypoint,
            InteractionState::DraggingEndpoint { .. } => Mode::DraggingEndpoint,
        }
    }

    /// States that need document-level move / up / blur listeners.
    pub fn captures_pointer(&self) -> bool {
        matches!(
            self,
            InteractionState::DraggingNode { .. }
                | InteractionState::ResizingNode { .. }
                | InteractionState::Panning { .. }
                | InteractionState::DrawingGroupRect { .. }
                | InteractionState::DraggingWaypoint { .. }
                | InteractionState::DraggingEndpoint { .. }
        )
    }

    /// Drag, resize or pan in progress: geometry changes every frame.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            InteractionState::DraggingNode { .. }
                | InteractionState::ResizingNode { .. }
                | InteractionState::Panning { .. }
                | InteractionState::DraggingWaypoint { .. }
                | InteractionState::DraggingEndpoint { .. }
        )
    }

    pub fn pending(&self) -> Option<&PendingConnection> {
        match self {
            InteractionState::FormingEdge(pending) => Some(pending),
            InteractionState::ConfirmingEdge { pending, .. } => Some(pending),
            _ => None,
        }
    }
}

/// Model or view change requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreateNode {
        kind: NodeKind,
        center: Point,
    },
    MoveNode {
        node: String,
        position: Point,
    },
    SetNodeBounds {
        node: String,
        bounds: Rect,
    },
    SetPanOffset(Point),
    WheelZoom {
        client: Point,
        delta_y: f64,
    },
    CreateEdge {
        source: EdgeEnd,
        target: EdgeEnd,
        waypoints: Vec<Point>,
        cardinality: Cardinality,
    },
    MoveWaypoint {
        edge: String,
        index: usize,
        to: Point,
    },
    SetEndpointAnchor {
        edge: String,
        endpoint: Endpoint,
        anchor: Anchor,
    },
    CreateGroup {
        bounds: Rect,
    },
    Select(Selection),
    ClearSelection,
    DeleteSelection,
    SetTool(Tool),
    SpaceHeld(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: InteractionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: InteractionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to(next: InteractionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn idle(effects: Vec<Effect>) -> Self {
        Self::to(InteractionState::Idle, effects)
    }
}

/// Inputs a transition reads besides the state and the event.
pub struct StepContext<'a> {
    pub diagram: &'a Diagram,
    pub viewport: &'a Viewport,
    pub tool: Tool,
    pub space_held: bool,
    pub config: &'a InteractionConfig,
    pub snap_grid: Option<f64>,
}

impl StepContext<'_> {
    fn world(&self, client: Point) -> Point {
        self.viewport.client_to_world(client)
    }

    fn snap(&self, p: Point) -> Point {
        match self.snap_grid {
            Some(grid) => p.snapped(grid),
            None => p,
        }
    }
}

/// Advance the state machine by one event.
pub fn step(state: InteractionState, event: &InputEvent, ctx: &StepContext<'_>) -> Transition {
    // Handled the same way in every state.
    match event {
        InputEvent::Wheel { client, delta_y } => {
            return Transition::to(
                state,
                vec![Effect::WheelZoom {
                    client: *client,
                    delta_y: *delta_y,
                }],
            );
        }
        InputEvent::KeyDown { key: Key::Space } => {
            return Transition::to(state, vec![Effect::SpaceHeld(true)]);
        }
        InputEvent::KeyUp { key: Key::Space } => {
            return Transition::to(state, vec![Effect::SpaceHeld(false)]);
        }
        InputEvent::KeyDown { key: Key::Escape } => {
            return Transition::idle(vec![Effect::SetTool(Tool::Select)]);
        }
        InputEvent::Blur => {
            let effects = vec![Effect::SpaceHeld(false)];
            return if state.captures_pointer() {
                Transition::idle(effects)
            } else {
                Transition::to(state, effects)
            };
        }
        _ => {}
    }

    match state {
        InteractionState::Idle => step_idle(event, ctx),
        InteractionState::DraggingNode {
            node,
            grab,
            press,
            moved,
        } => match event {
            InputEvent::PointerMove { client }
                if !moved && client.distance(press) <= ctx.config.drag_threshold =>
            {
                Transition::stay(InteractionState::DraggingNode {
                    node,
                    grab,
                    press,
                    moved,
                })
            }
            InputEvent::PointerMove { client } => {
                let world = ctx.world(*client);
                let position = Point::new(world.x - grab.x, world.y - grab.y);
                tracing::trace!(node = %node, ?position, "drag");
                let effects = vec![Effect::MoveNode {
                    node: node.clone(),
                    position,
                }];
                Transition::to(
                    InteractionState::DraggingNode {
                        node,
                        grab,
                        press,
                        moved: true,
                    },
                    effects,
                )
            }
            InputEvent::PointerUp { .. } => Transition::idle(Vec::new()),
            _ => Transition::stay(InteractionState::DraggingNode {
                node,
                grab,
                press,
                moved,
            }),
        },
        InteractionState::ResizingNode { node, handle, fixed } => match event {
            InputEvent::PointerMove { client } => {
                let square = ctx.diagram.node(&node).is_some_and(|n| n.kind.fixed_aspect());
                let bounds = handle.resize(
                    fixed,
                    ctx.world(*client),
                    (ctx.config.min_node_width, ctx.config.min_node_height),
                    square,
                );
                let effects = vec![Effect::SetNodeBounds {
                    node: node.clone(),
                    bounds,
                }];
                Transition::to(InteractionState::ResizingNode { node, handle, fixed }, effects)
            }
            InputEvent::PointerUp { .. } => Transition::idle(Vec::new()),
            _ => Transition::stay(InteractionState::ResizingNode { node, handle, fixed }),
        },
        InteractionState::Panning {
            start_client,
            start_offset,
        } => match event {
            InputEvent::PointerMove { client } => {
                let offset =
                    start_offset.offset(client.x - start_client.x, client.y - start_client.y);
                Transition::to(
                    InteractionState::Panning {
                        start_client,
                        start_offset,
                    },
                    vec![Effect::SetPanOffset(offset)],
                )
            }
            InputEvent::PointerUp { .. } => Transition::idle(Vec::new()),
            _ => Transition::stay(InteractionState::Panning {
                start_client,
                start_offset,
            }),
        },
        InteractionState::FormingEdge(pending) => step_forming(pending, event, ctx),
        // Resolved through `confirm_edge` / `cancel_edge`.
        state @ InteractionState::ConfirmingEdge { .. } => Transition::stay(state),
        InteractionState::DrawingGroupRect {
            first,
            first_client,
            current,
            pressed,
        } => step_group_rect(first, first_client, current, pressed, event, ctx),
        InteractionState::DraggingWaypoint { edge, index } => match event {
            InputEvent::PointerMove { client } => {
                let effects = vec![Effect::MoveWaypoint {
                    edge: edge.clone(),
                    index,
                    to: ctx.world(*client),
                }];
                Transition::to(InteractionState::DraggingWaypoint { edge, index }, effects)
            }
            InputEvent::PointerUp { .. } => Transition::idle(Vec::new()),
            _ => Transition::stay(InteractionState::DraggingWaypoint { edge, index }),
        },
        InteractionState::DraggingEndpoint { edge, endpoint } => match event {
            InputEvent::PointerMove { client } | InputEvent::PointerUp { client } => {
                let node = ctx
                    .diagram
                    .edge(&edge)
                    .and_then(|e| ctx.diagram.node(e.node_id(endpoint)));
                let effects = node
                    .map(|n| Effect::SetEndpointAnchor {
                        edge: edge.clone(),
                        endpoint,
                        anchor: anchor_from_point(n, ctx.world(*client)),
                    })
                    .into_iter()
                    .collect();
                if matches!(event, InputEvent::PointerUp { .. }) {
                    Transition::idle(effects)
                } else {
                    Transition::to(InteractionState::DraggingEndpoint { edge, endpoint }, effects)
                }
            }
            _ => Transition::stay(InteractionState::DraggingEndpoint { edge, endpoint }),
        },
    }
}

fn start_pending(source: EdgeEnd) -> Transition {
    tracing::debug!(node = %source.node, field = ?source.field, "edge started");
    Transition::to(
        InteractionState::FormingEdge(PendingConnection {
            source,
            waypoints: Vec::new(),
            cursor: None,
        }),
        Vec::new(),
    )
}

fn start_group_rect(client: Point, ctx: &StepContext<'_>) -> Transition {
    let world = ctx.world(client);
    Transition::to(
        InteractionState::DrawingGroupRect {
            first: world,
            first_client: client,
            current: world,
            pressed: true,
        },
        Vec::new(),
    )
}

fn step_idle(event: &InputEvent, ctx: &StepContext<'_>) -> Transition {
    match event {
        InputEvent::PointerDown { client, button, target } => {
            let pan_trigger = match button {
                PointerButton::Middle | PointerButton::Secondary => true,
                PointerButton::Primary => ctx.space_held,
            };
            if pan_trigger {
                return if *target == HitTarget::Canvas {
                    Transition::to(
                        InteractionState::Panning {
                            start_client: *client,
                            start_offset: ctx.viewport.offset(),
                        },
                        Vec::new(),
                    )
                } else {
                    Transition::idle(Vec::new())
                };
            }
            press_idle(*client, target, ctx)
        }
        InputEvent::KeyDown {
            key: Key::Delete | Key::Backspace,
        } => Transition::idle(vec![Effect::DeleteSelection]),
        _ => Transition::idle(Vec::new()),
    }
}

fn press_idle(client: Point, target: &HitTarget, ctx: &StepContext<'_>) -> Transition {
    match (ctx.tool, target) {
        (_, HitTarget::NodeControl { .. }) => Transition::idle(Vec::new()),
        (Tool::AddNode(kind), HitTarget::Canvas | HitTarget::NodeBody { .. }) => {
            Transition::idle(vec![
                Effect::CreateNode {
                    kind,
                    center: ctx.world(client),
                },
                Effect::SetTool(Tool::Select),
            ])
        }
        (Tool::Group, HitTarget::Canvas | HitTarget::NodeBody { .. }) => {
            start_group_rect(client, ctx)
        }
        (Tool::AddEdge, HitTarget::NodeBody { node }) => start_pending(EdgeEnd::node(node)),
        (Tool::AddEdge, HitTarget::Field { node, field }) => {
            start_pending(EdgeEnd::field(node, field))
        }
        (Tool::AddEdge | Tool::Select, HitTarget::Port { node, side }) => {
            start_pending(EdgeEnd::port(node, *side))
        }
        (_, HitTarget::Canvas) => Transition::idle(vec![Effect::ClearSelection]),
        (_, HitTarget::NodeBody { node } | HitTarget::Field { node, .. }) => {
            let Some(n) = ctx.diagram.node(node) else {
                return Transition::idle(Vec::new());
            };
            let world = ctx.world(client);
            Transition::to(
                InteractionState::DraggingNode {
                    node: node.clone(),
                    grab: Point::new(world.x - n.position.x, world.y - n.position.y),
                    press: client,
                    moved: false,
                },
                vec![Effect::Select(Selection::Node(node.clone()))],
            )
        }
        (_, HitTarget::ResizeHandle { node, handle }) => {
            let Some(n) = ctx.diagram.node(node) else {
                return Transition::idle(Vec::new());
            };
            Transition::to(
                InteractionState::ResizingNode {
                    node: node.clone(),
                    handle: *handle,
                    fixed: handle.fixed_corner(&n.bounds()),
                },
                vec![Effect::Select(Selection::Node(node.clone()))],
            )
        }
        (_, HitTarget::Waypoint { edge, index }) => {
            let valid = ctx.diagram.edge(edge).is_some_and(|e| *index < e.waypoints.len());
            if !valid {
                return Transition::idle(Vec::new());
            }
            Transition::to(
                InteractionState::DraggingWaypoint {
                    edge: edge.clone(),
                    index: *index,
                },
                vec![Effect::Select(Selection::Edge(edge.clone()))],
            )
        }
        (_, HitTarget::EdgeEndpoint { edge, endpoint }) => {
            if ctx.diagram.edge(edge).is_none() {
                return Transition::idle(Vec::new());
            }
            Transition::to(
                InteractionState::DraggingEndpoint {
                    edge: edge.clone(),
                    endpoint: (*endpoint).into(),
                },
                vec![Effect::Select(Selection::Edge(edge.clone()))],
            )
        }
        (_, HitTarget::Edge { edge }) => {
            Transition::idle(vec![Effect::Select(Selection::Edge(edge.clone()))])
        }
        (_, HitTarget::Port { .. }) => Transition::idle(Vec::new()),
    }
}

fn step_forming(
    mut pending: PendingConnection,
    event: &InputEvent,
    ctx: &StepContext<'_>,
) -> Transition {
    match event {
        InputEvent::PointerMove { client } => {
            pending.cursor = Some(ctx.world(*client));
            Transition::stay(InteractionState::FormingEdge(pending))
        }
        InputEvent::PointerDown {
            client,
            button: PointerButton::Primary,
            target,
        } => {
            let target_end = match target {
                HitTarget::Port { node, side } => EdgeEnd::port(node, *side),
                HitTarget::Field { node, field } => EdgeEnd::field(node, field),
                HitTarget::NodeBody { node } => EdgeEnd::node(node),
                HitTarget::Canvas => {
                    return match ctx.config.routing_mode {
                        RoutingMode::Manual => {
                            let waypoint = ctx.snap(ctx.world(*client));
                            tracing::debug!(?waypoint, "waypoint placed");
                            pending.waypoints.push(waypoint);
                            Transition::stay(InteractionState::FormingEdge(pending))
                        }
                        RoutingMode::Auto => {
                            tracing::debug!("pending edge cancelled");
                            Transition::idle(Vec::new())
                        }
                    };
                }
                _ => return Transition::stay(InteractionState::FormingEdge(pending)),
            };

            if target_end == pending.source {
                tracing::debug!("pending edge cancelled on its own endpoint");
                return Transition::idle(Vec::new());
            }
            if ctx.config.confirm_edges {
                return Transition::to(
                    InteractionState::ConfirmingEdge {
                        pending,
                        target: target_end,
                    },
                    Vec::new(),
                );
            }
            Transition::idle(vec![Effect::CreateEdge {
                source: pending.source,
                target: target_end,
                waypoints: pending.waypoints,
                cardinality: Cardinality::default(),
            }])
        }
        _ => Transition::stay(InteractionState::FormingEdge(pending)),
    }
}

fn step_group_rect(
    first: Point,
    first_client: Point,
    current: Point,
    pressed: bool,
    event: &InputEvent,
    ctx: &StepContext<'_>,
) -> Transition {
    let finish = |corner: Point| {
        Transition::idle(vec![
            Effect::CreateGroup {
                bounds: Rect::from_corners(first, corner),
            },
            Effect::SetTool(Tool::Select),
        ])
    };
    match event {
        InputEvent::PointerMove { client } => Transition::stay(InteractionState::DrawingGroupRect {
            first,
            first_client,
            current: ctx.world(*client),
            pressed,
        }),
        InputEvent::PointerUp { client } if pressed => {
            let moved = client.distance(first_client) > ctx.config.drag_threshold;
            if moved {
                finish(ctx.world(*client))
            } else {
                // Click without drag: the next press sets the opposite corner.
                Transition::stay(InteractionState::DrawingGroupRect {
                    first,
                    first_client,
                    current,
                    pressed: false,
                })
            }
        }
        InputEvent::PointerDown {
            client,
            button: PointerButton::Primary,
            ..
        } if !pressed => finish(ctx.world(*client)),
        _ => Transition::stay(InteractionState::DrawingGroupRect {
            first,
            first_client,
            current,
            pressed,
        }),
    }
}

/// Complete a confirmable edge with the chosen cardinality.
pub fn confirm_edge(state: InteractionState, cardinality: Cardinality) -> Transition {
    match state {
        InteractionState::ConfirmingEdge { pending, target } => {
            Transition::idle(vec![Effect::CreateEdge {
                source: pending.source,
                target,
                waypoints: pending.waypoints,
                cardinality,
            }])
        }
        other => Transition::stay(other),
    }
}

/// Abandon a pending or confirmable edge.
pub fn cancel_edge(state: InteractionState) -> Transition {
    match state {
        InteractionState::ConfirmingEdge { .. } | InteractionState::FormingEdge(_) => {
            Transition::idle(Vec::new())
        }
        other => Transition::stay(other),
    }
}
