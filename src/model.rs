use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect, Side, Size};
use crate::layout::shapes::NodeShape;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ModelError {
    #[error("Duplicate id: {0}")]
    DuplicateId(String),
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Unknown edge: {0}")]
    UnknownEdge(String),
    #[error("Unknown group: {0}")]
    UnknownGroup(String),
    #[error("Unknown field {field} on node {node}")]
    UnknownField { node: String, field: String },
    #[error("Invalid geometry for {0}: position and size must be finite, size non-negative")]
    InvalidGeometry(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Table,
    Entity,
    Start,
    End,
    Process,
    Decision,
    Input,
    Output,
    Connector,
    Document,
    Database,
    Subroutine,
    Delay,
    Manual,
    Cloud,
}

impl NodeKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "table" => Some(Self::Table),
            "entity" => Some(Self::Entity),
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            "process" => Some(Self::Process),
            "decision" => Some(Self::Decision),
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            "connector" => Some(Self::Connector),
            "document" => Some(Self::Document),
            "database" => Some(Self::Database),
            "subroutine" => Some(Self::Subroutine),
            "delay" => Some(Self::Delay),
            "manual" => Some(Self::Manual),
            "cloud" => Some(Self::Cloud),
            _ => None,
        }
    }

    pub fn shape(&self) -> NodeShape {
        match self {
            Self::Start | Self::End | Self::Connector => NodeShape::Ellipse,
            Self::Decision => NodeShape::Diamond,
            _ => NodeShape::Rectangle,
        }
    }

    /// Schema tables and ER entities carry field rows; flowchart shapes do not.
    pub fn has_fields(&self) -> bool {
        matches!(self, Self::Table | Self::Entity)
    }

    /// Width always equals height while resizing.
    pub fn fixed_aspect(&self) -> bool {
        matches!(self, Self::Decision | Self::Connector)
    }

    pub fn default_size(&self, field_count: usize) -> Size {
        match self {
            Self::Table => Size::new(420.0, (60.0 + 40.0 * field_count as f64).max(120.0)),
            Self::Entity => Size::new(250.0, 100.0),
            Self::Decision | Self::Connector => Size::new(80.0, 80.0),
            _ => Size::new(120.0, 60.0),
        }
    }

    pub fn default_label(&self) -> &'static str {
        match self {
            Self::Table => "new_table",
            Self::Entity => "Entity",
            Self::Start => "Start",
            Self::End => "End",
            Self::Process => "Process",
            Self::Decision => "Decision",
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Connector => "Connector",
            Self::Document => "Document",
            Self::Database => "Database",
            Self::Subroutine => "Subroutine",
            Self::Delay => "Delay",
            Self::Manual => "Manual",
            Self::Cloud => "Cloud",
        }
    }

    pub fn default_color(&self) -> &'static str {
        match self {
            Self::Table | Self::Entity | Self::Process => "#3B82F6",
            Self::Start => "#10B981",
            Self::End | Self::Output => "#EF4444",
            Self::Decision => "#F59E0B",
            Self::Input => "#8B5CF6",
            Self::Document => "#06B6D4",
            Self::Database => "#84CC16",
            Self::Cloud => "#F97316",
            Self::Subroutine => "#EC4899",
            Self::Delay => "#6366F1",
            Self::Manual => "#14B8A6",
            Self::Connector => "#6B7280",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Field {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_tag: type_tag.into(),
            primary_key: false,
            unique: false,
            nullable: true,
            foreign_key: false,
            default_value: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub position: Point,
    pub size: Size,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Node {
    /// Node of `kind` with its default label, color and size.
    pub fn new(id: impl Into<String>, kind: NodeKind, position: Point) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            size: kind.default_size(0),
            label: kind.default_label().to_string(),
            color: Some(kind.default_color().to_string()),
            fields: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    pub fn shape(&self) -> NodeShape {
        self.kind.shape()
    }

    pub fn field_index(&self, field_id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id == field_id)
    }

    pub fn has_valid_geometry(&self) -> bool {
        self.position.is_finite() && self.size.is_valid()
    }
}

/// Explicit attachment override: fractional `offset` (0..1) along `side`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub side: Side,
    #[serde(default = "default_anchor_offset")]
    pub offset: f64,
}

fn default_anchor_offset() -> f64 {
    0.5
}

impl Anchor {
    pub fn new(side: Side, offset: f64) -> Self {
        Self { side, offset }
    }

    /// Port anchor at the middle of a side.
    pub fn port(side: Side) -> Self {
        Self::new(side, 0.5)
    }

    /// Offset clamped to 0..1; non-finite offsets fall back to the middle.
    pub fn clamped_offset(&self) -> f64 {
        if self.offset.is_finite() {
            self.offset.clamp(0.0, 1.0)
        } else {
            0.5
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[default]
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "N:1")]
    ManyToOne,
    #[serde(rename = "N:M")]
    ManyToMany,
}

impl Cardinality {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1:1" => Some(Self::OneToOne),
            "1:N" => Some(Self::OneToMany),
            "N:1" => Some(Self::ManyToOne),
            "N:M" => Some(Self::ManyToMany),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_anchor: Option<Anchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_anchor: Option<Anchor>,
    #[serde(default)]
    pub waypoints: Vec<Point>,
    #[serde(default)]
    pub routing: RoutingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_field: None,
            target: target.into(),
            target_field: None,
            cardinality: Cardinality::default(),
            source_anchor: None,
            target_anchor: None,
            waypoints: Vec::new(),
            routing: RoutingMode::Auto,
            label: None,
        }
    }

    pub fn with_fields(mut self, source_field: Option<&str>, target_field: Option<&str>) -> Self {
        self.source_field = source_field.map(str::to_string);
        self.target_field = target_field.map(str::to_string);
        self
    }

    pub fn with_anchors(mut self, source: Option<Anchor>, target: Option<Anchor>) -> Self {
        self.source_anchor = source;
        self.target_anchor = target;
        self
    }

    pub fn references(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn node_id(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Source => &self.source,
            Endpoint::Target => &self.target,
        }
    }

    pub fn field_id(&self, endpoint: Endpoint) -> Option<&str> {
        match endpoint {
            Endpoint::Source => self.source_field.as_deref(),
            Endpoint::Target => self.target_field.as_deref(),
        }
    }

    pub fn anchor(&self, endpoint: Endpoint) -> Option<Anchor> {
        match endpoint {
            Endpoint::Source => self.source_anchor,
            Endpoint::Target => self.target_anchor,
        }
    }

    pub fn set_anchor(&mut self, endpoint: Endpoint, anchor: Option<Anchor>) {
        match endpoint {
            Endpoint::Source => self.source_anchor = anchor,
            Endpoint::Target => self.target_anchor = anchor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub bounds: Rect,
}

/// Edges removed together with a node.
#[derive(Debug, Clone)]
pub struct NodeRemoval {
    pub node: Node,
    pub edges: Vec<Edge>,
}

/// Nodes, edges and groups of one open diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(skip)]
    id_counter: u64,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Unused id of the form `{prefix}-{n}`.
    pub fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.id_counter += 1;
            let candidate = format!("{}-{}", prefix, self.id_counter);
            let taken = self.node(&candidate).is_some()
                || self.edge(&candidate).is_some()
                || self.group(&candidate).is_some();
            if !taken {
                return candidate;
            }
        }
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), ModelError> {
        if self.node(&node.id).is_some() {
            return Err(ModelError::DuplicateId(node.id));
        }
        if !node.has_valid_geometry() {
            return Err(ModelError::InvalidGeometry(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Full replace of the node with the same id.
    pub fn update_node(&mut self, node: Node) -> Result<(), ModelError> {
        if !node.has_valid_geometry() {
            return Err(ModelError::InvalidGeometry(node.id));
        }
        let slot = self
            .node_mut(&node.id)
            .ok_or_else(|| ModelError::UnknownNode(node.id.clone()))?;
        *slot = node;
        Ok(())
    }

    /// Remove a node, every edge referencing it and its group memberships.
    pub fn delete_node(&mut self, id: &str) -> Result<NodeRemoval, ModelError> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| ModelError::UnknownNode(id.to_string()))?;
        let node = self.nodes.remove(idx);

        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| e.references(id));
        self.edges = kept;

        for group in &mut self.groups {
            group.members.retain(|m| m != id);
        }

        Ok(NodeRemoval {
            node,
            edges: removed,
        })
    }

    /// Move a node; non-finite positions are rejected.
    pub fn move_node(&mut self, id: &str, position: Point) -> Result<(), ModelError> {
        if !position.is_finite() {
            return Err(ModelError::InvalidGeometry(id.to_string()));
        }
        let node = self
            .node_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.to_string()))?;
        node.position = position;
        Ok(())
    }

    pub fn set_node_bounds(&mut self, id: &str, bounds: Rect) -> Result<(), ModelError> {
        if !bounds.is_finite() || !bounds.size().is_valid() {
            return Err(ModelError::InvalidGeometry(id.to_string()));
        }
        let node = self
            .node_mut(id)
            .ok_or_else(|| ModelError::UnknownNode(id.to_string()))?;
        node.position = bounds.origin();
        node.size = bounds.size();
        Ok(())
    }

    fn check_endpoint(&self, node_id: &str, field_id: Option<&str>) -> Result<(), ModelError> {
        let node = self
            .node(node_id)
            .ok_or_else(|| ModelError::UnknownNode(node_id.to_string()))?;
        if let Some(field) = field_id
            && node.field_index(field).is_none()
        {
            return Err(ModelError::UnknownField {
                node: node_id.to_string(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), ModelError> {
        if self.edge(&edge.id).is_some() {
            return Err(ModelError::DuplicateId(edge.id));
        }
        self.check_endpoint(&edge.source, edge.source_field.as_deref())?;
        self.check_endpoint(&edge.target, edge.target_field.as_deref())?;
        self.edges.push(edge);
        Ok(())
    }

    pub fn update_edge(&mut self, edge: Edge) -> Result<(), ModelError> {
        self.check_endpoint(&edge.source, edge.source_field.as_deref())?;
        self.check_endpoint(&edge.target, edge.target_field.as_deref())?;
        let slot = self
            .edge_mut(&edge.id)
            .ok_or_else(|| ModelError::UnknownEdge(edge.id.clone()))?;
        *slot = edge;
        Ok(())
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<Edge, ModelError> {
        let idx = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ModelError::UnknownEdge(id.to_string()))?;
        Ok(self.edges.remove(idx))
    }

    pub fn add_group(&mut self, group: Group) -> Result<(), ModelError> {
        if self.group(&group.id).is_some() {
            return Err(ModelError::DuplicateId(group.id));
        }
        if !group.bounds.is_finite() {
            return Err(ModelError::InvalidGeometry(group.id));
        }
        if let Some(missing) = group.members.iter().find(|m| self.node(m).is_none()) {
            return Err(ModelError::UnknownNode(missing.clone()));
        }
        self.groups.push(group);
        Ok(())
    }

    pub fn update_group(&mut self, group: Group) -> Result<(), ModelError> {
        let slot = self
            .groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| ModelError::UnknownGroup(group.id.clone()))?;
        *slot = group;
        Ok(())
    }

    /// Remove a group; its member nodes stay.
    pub fn delete_group(&mut self, id: &str) -> Result<Group, ModelError> {
        let idx = self
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| ModelError::UnknownGroup(id.to_string()))?;
        Ok(self.groups.remove(idx))
    }

    pub fn edges_touching<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.references(node_id))
    }

    /// Ids of nodes lying fully inside `rect`.
    pub fn nodes_inside(&self, rect: &Rect) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| rect.contains_rect(&n.bounds()))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Union of the bounds of the given nodes, ignoring unknown ids.
    pub fn bounds_of(&self, ids: &[String]) -> Option<Rect> {
        ids.iter()
            .filter_map(|id| self.node(id))
            .map(|n| n.bounds())
            .reduce(|acc, r| acc.union(&r))
    }

    /// Edges whose source or target node is missing.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|e| self.node(&e.source).is_none() || self.node(&e.target).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str, x: f64) -> Node {
        Node::new(id, NodeKind::Table, Point::new(x, 0.0))
            .with_fields(vec![Field::new(format!("{}-id", id), "id", "int")])
    }

    fn sample() -> Diagram {
        let mut d = Diagram::new();
        d.add_node(table("a", 0.0)).unwrap();
        d.add_node(table("b", 600.0)).unwrap();
        d.add_node(table("c", 1200.0)).unwrap();
        d.add_edge(Edge::new("e1", "a", "b")).unwrap();
        d.add_edge(Edge::new("e2", "b", "c")).unwrap();
        d.add_edge(Edge::new("e3", "c", "a")).unwrap();
        d.add_edge(Edge::new("e4", "b", "b")).unwrap();
        d
    }

    #[test]
    fn test_delete_node_cascades_to_edges() {
        let mut d = sample();
        let removal = d.delete_node("a").unwrap();
        let removed: Vec<&str> = removal.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(removed, vec!["e1", "e3"]);
        let kept: Vec<&str> = d.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(kept, vec!["e2", "e4"]);
    }

    #[test]
    fn test_delete_node_leaves_group_bounds() {
        let mut d = sample();
        let bounds = Rect::new(-20.0, -40.0, 500.0, 200.0);
        d.add_group(Group {
            id: "g".into(),
            name: "G".into(),
            color: "#3B82F6".into(),
            members: vec!["a".into(), "b".into()],
            bounds,
        })
        .unwrap();
        d.delete_node("a").unwrap();
        let g = d.group("g").unwrap();
        assert_eq!(g.members, vec!["b".to_string()]);
        assert_eq!(g.bounds, bounds);
    }

    #[test]
    fn test_add_edge_rejects_unknown_references() {
        let mut d = sample();
        assert_eq!(
            d.add_edge(Edge::new("x", "a", "zzz")),
            Err(ModelError::UnknownNode("zzz".into()))
        );
        assert!(matches!(
            d.add_edge(Edge::new("y", "a", "b").with_fields(Some("nope"), None)),
            Err(ModelError::UnknownField { .. })
        ));
        assert_eq!(
            d.add_edge(Edge::new("e1", "a", "b")),
            Err(ModelError::DuplicateId("e1".into()))
        );
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut d = Diagram::new();
        let node = Node::new("n", NodeKind::Process, Point::new(f64::NAN, 0.0));
        assert!(matches!(d.add_node(node), Err(ModelError::InvalidGeometry(_))));
        let node = Node::new("m", NodeKind::Process, Point::new(0.0, 0.0))
            .with_size(Size::new(-1.0, 10.0));
        assert!(matches!(d.add_node(node), Err(ModelError::InvalidGeometry(_))));
    }

    #[test]
    fn test_fresh_id_skips_taken() {
        let mut d = Diagram::new();
        d.add_node(Node::new("node-1", NodeKind::Process, Point::default())).unwrap();
        assert_eq!(d.fresh_id("node"), "node-2");
        assert_eq!(d.fresh_id("edge"), "edge-3");
    }

    #[test]
    fn test_default_sizes() {
        assert_eq!(NodeKind::Table.default_size(0), Size::new(420.0, 120.0));
        assert_eq!(NodeKind::Table.default_size(4), Size::new(420.0, 220.0));
        assert_eq!(NodeKind::Decision.default_size(0), Size::new(80.0, 80.0));
        assert_eq!(NodeKind::Process.default_size(0), Size::new(120.0, 60.0));
    }

    #[test]
    fn test_nodes_inside() {
        let d = sample();
        let inside = d.nodes_inside(&Rect::new(-10.0, -10.0, 1100.0, 200.0));
        assert_eq!(inside, vec!["a".to_string(), "b".to_string()]);
    }
}
