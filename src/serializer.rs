//! JSON document format for diagrams.

use serde::{Deserialize, Serialize};

use crate::model::{Diagram, ModelError};
use crate::viewport::ViewState;

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Invalid document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid diagram: {0}")]
    Model(#[from] ModelError),
    #[error("Unsupported document version {0} (expected at most {max})", max = DOCUMENT_VERSION)]
    UnsupportedVersion(u32),
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(flatten)]
    pub diagram: Diagram,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewState>,
}

impl Document {
    pub fn new(diagram: Diagram, viewport: Option<ViewState>) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            diagram,
            viewport,
        }
    }
}

pub fn to_json(diagram: &Diagram, viewport: Option<ViewState>) -> Result<String, DocumentError> {
    let doc = Document::new(diagram.clone(), viewport);
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parse and validate a document.
///
/// Nodes must have unique ids and valid geometry. Edges pointing at
/// missing nodes are kept (they are simply not rendered); group members
/// that no longer exist are dropped.
pub fn from_json(json: &str) -> Result<Document, DocumentError> {
    let raw: Document = serde_json::from_str(json)?;
    if raw.version > DOCUMENT_VERSION {
        return Err(DocumentError::UnsupportedVersion(raw.version));
    }

    let mut diagram = Diagram::new();
    for node in raw.diagram.nodes {
        diagram.add_node(node)?;
    }
    for edge in raw.diagram.edges {
        if diagram.edge(&edge.id).is_some() {
            return Err(ModelError::DuplicateId(edge.id).into());
        }
        diagram.edges.push(edge);
    }
    for dangling in diagram.dangling_edges() {
        tracing::warn!(
            edge = %dangling.id,
            source = %dangling.source,
            target = %dangling.target,
            "edge references a missing node"
        );
    }
    for mut group in raw.diagram.groups {
        let before = group.members.len();
        group.members.retain(|m| diagram.node(m).is_some());
        if group.members.len() != before {
            tracing::warn!(
                group = %group.id,
                dropped = before - group.members.len(),
                "unknown group members dropped"
            );
        }
        diagram.add_group(group)?;
    }

    Ok(Document {
        version: raw.version,
        diagram,
        viewport: raw.viewport,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point, Rect, Side, Size};
    use crate::model::{Anchor, Cardinality, Edge, Field, Group, Node, NodeKind, RoutingMode};

    fn sample() -> Diagram {
        let mut d = Diagram::new();
        let mut id = Field::new("f1", "id", "uuid");
        id.primary_key = true;
        id.nullable = false;
        let mut owner = Field::new("f2", "owner_id", "uuid");
        owner.foreign_key = true;
        owner.default_value = Some("gen_random_uuid()".into());
        owner.comment = Some("Owning user".into());
        d.add_node(
            Node::new("users", NodeKind::Table, Point::new(10.5, -20.0))
                .with_label("users")
                .with_fields(vec![id, owner]),
        )
        .unwrap();
        d.add_node(
            Node::new("check", NodeKind::Decision, Point::new(400.0, 300.0))
                .with_size(Size::new(90.0, 90.0)),
        )
            .unwrap();
        let mut edge = Edge::new("e1", "users", "check")
            .with_fields(Some("f2"), None)
            .with_anchors(None, Some(Anchor::new(Side::Left, 0.25)));
        edge.cardinality = Cardinality::ManyToMany;
        edge.waypoints = vec![Point::new(200.0, 40.0), Point::new(200.0, 345.0)];
        edge.routing = RoutingMode::Manual;
        edge.label = Some("owns".into());
        d.add_edge(edge).unwrap();
        d.add_group(Group {
            id: "g1".into(),
            name: "Core".into(),
            color: "#3B82F6".into(),
            members: vec!["users".into()],
            bounds: Rect::new(-10.0, -60.0, 460.0, 200.0),
        })
        .unwrap();
        d
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let d = sample();
        let view = ViewState {
            offset: Point::new(12.0, -7.5),
            scale: 1.25,
        };
        let json = to_json(&d, Some(view)).unwrap();
        let doc = from_json(&json).unwrap();
        assert_eq!(doc.version, DOCUMENT_VERSION);
        assert_eq!(doc.diagram.nodes, d.nodes);
        assert_eq!(doc.diagram.edges, d.edges);
        assert_eq!(doc.diagram.groups, d.groups);
        assert_eq!(doc.viewport, Some(view));
    }

    #[test]
    fn test_wire_names() {
        let json = to_json(&sample(), None).unwrap();
        assert!(json.contains(r#""type": "uuid""#));
        assert!(json.contains(r#""primaryKey": true"#));
        assert!(json.contains(r#""sourceField": "f2""#));
        assert!(json.contains(r#""cardinality": "N:M""#));
        assert!(json.contains(r#""routing": "manual""#));
        assert!(json.contains(r#""side": "left""#));
        assert!(!json.contains("viewport"));
        assert!(!json.contains("idCounter"));
    }

    #[test]
    fn test_minimal_document_defaults() {
        let doc = from_json(
            r#"{
                "nodes": [{ "id": "a", "kind": "process", "position": { "x": 0, "y": 0 },
                            "size": { "width": 120, "height": 60 }, "label": "Step" }],
                "edges": [{ "id": "e", "source": "a", "target": "a" }]
            }"#,
        )
        .unwrap();
        assert_eq!(doc.version, 1);
        let edge = &doc.diagram.edges[0];
        assert_eq!(edge.cardinality, Cardinality::OneToMany);
        assert_eq!(edge.routing, RoutingMode::Auto);
        assert!(edge.waypoints.is_empty());
        assert!(doc.diagram.groups.is_empty());
    }

    #[test]
    fn test_dangling_edges_are_kept() {
        let doc = from_json(
            r#"{ "nodes": [], "edges": [{ "id": "e", "source": "gone", "target": "also-gone" }] }"#,
        )
        .unwrap();
        assert_eq!(doc.diagram.edges.len(), 1);
        assert_eq!(doc.diagram.dangling_edges().count(), 1);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(
            from_json(r#"{ "version": 9, "nodes": [] }"#),
            Err(DocumentError::UnsupportedVersion(9))
        ));
        let dup = r#"{ "nodes": [
            { "id": "a", "kind": "end", "position": { "x": 0, "y": 0 }, "size": { "width": 1, "height": 1 }, "label": "" },
            { "id": "a", "kind": "end", "position": { "x": 5, "y": 0 }, "size": { "width": 1, "height": 1 }, "label": "" }
        ] }"#;
        assert!(matches!(
            from_json(dup),
            Err(DocumentError::Model(ModelError::DuplicateId(id))) if id == "a"
        ));
        let negative = r#"{ "nodes": [
            { "id": "a", "kind": "end", "position": { "x": 0, "y": 0 }, "size": { "width": -1, "height": 1 }, "label": "" }
        ] }"#;
        assert!(matches!(
            from_json(negative),
            Err(DocumentError::Model(ModelError::InvalidGeometry(_)))
        ));
        assert!(matches!(from_json("{"), Err(DocumentError::Json(_))));
    }

    #[test]
    fn test_unknown_group_members_dropped() {
        let doc = from_json(
            r##"{ "nodes": [{ "id": "a", "kind": "start", "position": { "x": 0, "y": 0 },
                              "size": { "width": 120, "height": 60 }, "label": "Start" }],
                  "groups": [{ "id": "g", "name": "G", "color": "#fff", "members": ["a", "b"],
                               "bounds": { "x": 0, "y": 0, "width": 10, "height": 10 } }] }"##,
        )
        .unwrap();
        assert_eq!(doc.diagram.groups[0].members, vec!["a".to_string()]);
    }
}
