//! Edge anchor resolution on nodes and field rows.

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Side};
use crate::measure::{FieldMetrics, Measurer};
use crate::model::{Anchor, Node};
use crate::viewport::Viewport;

use super::shapes::nearest_side;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnchorConfig {
    pub fan_out_spacing: f64, // Distance between parallel edges sharing one field
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            fan_out_spacing: 10.0,
        }
    }
}

/// Offset of edge `index` among `total` edges sharing an anchor, centered on zero.
pub fn fan_out_offset(index: usize, total: usize, spacing: f64) -> f64 {
    if total <= 1 {
        0.0
    } else {
        (index as f64 - (total - 1) as f64 / 2.0) * spacing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSource {
    Measured,
    FieldRow,
    Explicit,
    Nearest,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedAnchor {
    pub point: Point,
    /// Box side the edge leaves through; `None` at the center fallback.
    pub side: Option<Side>,
    pub source: AnchorSource,
}

impl ResolvedAnchor {
    /// Shift perpendicular to the direction the edge leaves in.
    pub fn fanned(mut self, offset: f64) -> Self {
        if offset == 0.0 || !offset.is_finite() {
            return self;
        }
        match self.side {
            Some(Side::Top) | Some(Side::Bottom) => self.point.x += offset,
            _ => self.point.y += offset,
        }
        self
    }
}

pub struct AnchorResolver<'a> {
    metrics: &'a FieldMetrics,
    viewport: &'a Viewport,
    measurer: &'a dyn Measurer,
}

impl<'a> AnchorResolver<'a> {
    pub fn new(
        metrics: &'a FieldMetrics,
        viewport: &'a Viewport,
        measurer: &'a dyn Measurer,
    ) -> Self {
        Self {
            metrics,
            viewport,
            measurer,
        }
    }

    /// Attachment point of an edge end on `node`, facing `opposing`.
    ///
    /// Priority: measured field element, analytic field row, explicit
    /// anchor, nearest outline intersection, node center. `None` when
    /// `field_id` names a field the node does not have.
    pub fn resolve(
        &self,
        node: &Node,
        opposing: &Node,
        explicit: Option<Anchor>,
        field_id: Option<&str>,
    ) -> Option<ResolvedAnchor> {
        let own_center = node.center();
        let opposing_center = opposing.center();

        if let Some(field_id) = field_id {
            let index = node.field_index(field_id)?;
            let connect_from_right = opposing_center.x > own_center.x;
            let side = if connect_from_right { Side::Right } else { Side::Left };

            if let Some(rect) = self.measurer.measure(&node.id, field_id)
                && rect.is_finite()
            {
                let point = self.viewport.client_to_world(rect.center());
                if point.is_finite() {
                    return Some(ResolvedAnchor {
                        point,
                        side: Some(side),
                        source: AnchorSource::Measured,
                    });
                }
            }

            let x = if connect_from_right {
                node.position.x + node.size.width
            } else {
                node.position.x
            };
            return Some(ResolvedAnchor {
                point: Point::new(x, self.metrics.row_center_y(node, index)),
                side: Some(side),
                source: AnchorSource::FieldRow,
            });
        }

        if let Some(anchor) = explicit {
            let point = node
                .shape()
                .side_point(&node.bounds(), anchor.side, anchor.clamped_offset());
            return Some(ResolvedAnchor {
                point,
                side: Some(anchor.side),
                source: AnchorSource::Explicit,
            });
        }

        if let Some((point, side)) = node.shape().boundary_toward(&node.bounds(), opposing_center) {
            return Some(ResolvedAnchor {
                point,
                side: Some(side),
                source: AnchorSource::Nearest,
            });
        }

        Some(ResolvedAnchor {
            point: own_center,
            side: None,
            source: AnchorSource::Center,
        })
    }
}

/// Explicit anchor for a point dropped near `node`: nearest side, clamped offset.
pub fn anchor_from_point(node: &Node, point: Point) -> Anchor {
    let (side, offset) = nearest_side(&node.bounds(), point);
    Anchor::new(side, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Rect, Size};
    use crate::measure::NoMeasurer;
    use crate::model::{Field, NodeKind};
    use crate::viewport::ViewState;
    use proptest::prelude::*;

    fn table(id: &str, x: f64, y: f64) -> Node {
        Node::new(id, NodeKind::Table, Point::new(x, y))
            .with_size(Size::new(420.0, 120.0))
            .with_fields(vec![
                Field::new("id", "id", "int"),
                Field::new("name", "name", "text"),
            ])
    }

    #[test]
    fn test_nearest_edge_between_side_by_side_tables() {
        let metrics = FieldMetrics::default();
        let vp = Viewport::default();
        let r = AnchorResolver::new(&metrics, &vp, &NoMeasurer);
        let a = table("a", 0.0, 0.0);
        let b = table("b", 600.0, 0.0);
        let from = r.resolve(&a, &b, None, None).unwrap();
        let to = r.resolve(&b, &a, None, None).unwrap();
        assert_eq!(from.point, Point::new(420.0, 60.0));
        assert_eq!(from.side, Some(Side::Right));
        assert_eq!(to.point, Point::new(600.0, 60.0));
        assert_eq!(to.side, Some(Side::Left));
        assert_eq!(to.source, AnchorSource::Nearest);
    }

    #[test]
    fn test_field_row_faces_opposing_node() {
        let metrics = FieldMetrics::default();
        let vp = Viewport::default();
        let r = AnchorResolver::new(&metrics, &vp, &NoMeasurer);
        let a = table("a", 0.0, 0.0);
        let right = table("b", 600.0, 0.0);
        let left = table("c", -800.0, 0.0);

        let p = r.resolve(&a, &right, None, Some("name")).unwrap();
        assert_eq!(p.point, Point::new(420.0, 48.0 + 8.0 + 40.0 + 20.0));
        assert_eq!(p.source, AnchorSource::FieldRow);

        let p = r.resolve(&a, &left, None, Some("name")).unwrap();
        assert_eq!(p.point.x, 0.0);
        assert_eq!(p.side, Some(Side::Left));
    }

    #[test]
    fn test_field_takes_priority_over_explicit_anchor() {
        let metrics = FieldMetrics::default();
        let vp = Viewport::default();
        let r = AnchorResolver::new(&metrics, &vp, &NoMeasurer);
        let a = table("a", 0.0, 0.0);
        let b = table("b", 600.0, 0.0);
        let p = r
            .resolve(&a, &b, Some(Anchor::new(Side::Top, 0.1)), Some("id"))
            .unwrap();
        assert_eq!(p.source, AnchorSource::FieldRow);
    }

    #[test]
    fn test_unknown_field_has_no_anchor() {
        let metrics = FieldMetrics::default();
        let vp = Viewport::default();
        let r = AnchorResolver::new(&metrics, &vp, &NoMeasurer);
        let a = table("a", 0.0, 0.0);
        let b = table("b", 600.0, 0.0);
        assert!(r.resolve(&a, &b, None, Some("missing")).is_none());
    }

    #[test]
    fn test_measured_field_uses_inverse_transform() {
        let metrics = FieldMetrics::default();
        let mut vp = Viewport::default();
        vp.set_canvas_rect(Some(Rect::new(100.0, 50.0, 800.0, 600.0)));
        vp.set_state(ViewState {
            offset: Point::new(20.0, 10.0),
            scale: 2.0,
        });
        let measurer =
            |_: &str, field: &str| (field == "id").then(|| Rect::new(315.0, 155.0, 10.0, 10.0));
        let r = AnchorResolver::new(&metrics, &vp, &measurer);
        let a = table("a", 0.0, 0.0);
        let b = table("b", 600.0, 0.0);
        let p = r.resolve(&a, &b, None, Some("id")).unwrap();
        assert_eq!(p.source, AnchorSource::Measured);
        // center (320, 160) - origin (100, 50) - offset (20, 10) = (200, 100) / 2
        assert_eq!(p.point, Point::new(100.0, 50.0));

        let p = r.resolve(&a, &b, None, Some("name")).unwrap();
        assert_eq!(p.source, AnchorSource::FieldRow);
    }

    #[test]
    fn test_non_finite_measurement_falls_back_to_row() {
        let metrics = FieldMetrics::default();
        let vp = Viewport::default();
        let measurer = |_: &str, _: &str| Some(Rect::new(f64::NAN, 0.0, 10.0, 10.0));
        let r = AnchorResolver::new(&metrics, &vp, &measurer);
        let a = table("a", 0.0, 0.0);
        let b = table("b", 600.0, 0.0);
        assert_eq!(
            r.resolve(&a, &b, None, Some("id")).unwrap().source,
            AnchorSource::FieldRow
        );
    }

    #[test]
    fn test_explicit_anchor_clamps_offset() {
        let metrics = FieldMetrics::default();
        let vp = Viewport::default();
        let r = AnchorResolver::new(&metrics, &vp, &NoMeasurer);
        let a = table("a", 0.0, 0.0);
        let b = table("b", 600.0, 0.0);
        let p = r
            .resolve(&a, &b, Some(Anchor::new(Side::Bottom, 1.7)), None)
            .unwrap();
        assert_eq!(p.point, Point::new(420.0, 120.0));
        let p = r
            .resolve(&a, &b, Some(Anchor::new(Side::Left, 0.25)), None)
            .unwrap();
        assert_eq!(p.point, Point::new(0.0, 30.0));
    }

    #[test]
    fn test_coincident_nodes_fall_back_to_center() {
        let metrics = FieldMetrics::default();
        let vp = Viewport::default();
        let r = AnchorResolver::new(&metrics, &vp, &NoMeasurer);
        let a = table("a", 0.0, 0.0);
        let p = r.resolve(&a, &a, None, None).unwrap();
        assert_eq!(p.point, Point::new(210.0, 60.0));
        assert_eq!(p.source, AnchorSource::Center);
    }

    #[test]
    fn test_anchor_from_point() {
        let a = table("a", 0.0, 0.0);
        let anchor = anchor_from_point(&a, Point::new(105.0, 130.0));
        assert_eq!(anchor.side, Side::Bottom);
        assert_eq!(anchor.offset, 0.25);
    }

    #[test]
    fn test_fanned_moves_perpendicular() {
        let base = ResolvedAnchor {
            point: Point::new(420.0, 60.0),
            side: Some(Side::Right),
            source: AnchorSource::FieldRow,
        };
        assert_eq!(base.fanned(-10.0).point, Point::new(420.0, 50.0));
        let top = ResolvedAnchor {
            side: Some(Side::Top),
            ..base
        };
        assert_eq!(top.fanned(10.0).point, Point::new(430.0, 60.0));
    }

    proptest! {
        #[test]
        fn prop_fan_out_symmetric_and_ordered(total in 1usize..40, spacing in 0.5..50.0f64) {
            let offsets: Vec<f64> = (0..total).map(|i| fan_out_offset(i, total, spacing)).collect();
            let sum: f64 = offsets.iter().sum();
            prop_assert!(sum.abs() < 1e-6);
            for i in 0..total {
                prop_assert!((offsets[i] + offsets[total - 1 - i]).abs() < 1e-9);
            }
            for pair in offsets.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
