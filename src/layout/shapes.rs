//! Node outline geometry.

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect, Side};

/// Outline inscribed in a node's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Rectangle,
    Diamond,
    Ellipse,
}

impl NodeShape {
    /// Port at the middle of `side`: box edge midpoint, diamond tip or ellipse extremum.
    pub fn port_position(&self, bounds: &Rect, side: Side) -> Point {
        self.side_point(bounds, side, 0.5)
    }

    /// Point on the outline at fraction `t` along `side`.
    ///
    /// `top`/`bottom` vary x from left to right, `left`/`right` vary y from
    /// top to bottom. The perpendicular coordinate follows the outline.
    pub fn side_point(&self, bounds: &Rect, side: Side, t: f64) -> Point {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
        let c = bounds.center();
        let hw = bounds.width / 2.0;
        let hh = bounds.height / 2.0;
        let along_x = bounds.x + bounds.width * t;
        let along_y = bounds.y + bounds.height * t;
        // Fraction of the half-extent reached by the outline at this position.
        let reach = match self {
            NodeShape::Rectangle => 1.0,
            NodeShape::Diamond => 1.0 - (2.0 * t - 1.0).abs(),
            NodeShape::Ellipse => {
                let u = 2.0 * t - 1.0;
                (1.0 - u * u).max(0.0).sqrt()
            }
        };
        match side {
            Side::Top => Point::new(along_x, c.y - hh * reach),
            Side::Bottom => Point::new(along_x, c.y + hh * reach),
            Side::Left => Point::new(c.x - hw * reach, along_y),
            Side::Right => Point::new(c.x + hw * reach, along_y),
        }
    }

    /// Where the line from the center toward `toward` leaves the outline,
    /// and the box side it leaves through.
    ///
    /// The side is left/right when `|dx|/width >= |dy|/height`, top/bottom
    /// otherwise. `None` for empty boxes or when `toward` is the center.
    pub fn boundary_toward(&self, bounds: &Rect, toward: Point) -> Option<(Point, Side)> {
        if !(bounds.width > 0.0 && bounds.height > 0.0) || !toward.is_finite() {
            return None;
        }
        let c = bounds.center();
        let dx = toward.x - c.x;
        let dy = toward.y - c.y;
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        let hw = bounds.width / 2.0;
        let hh = bounds.height / 2.0;
        let rx = dx.abs() / hw;
        let ry = dy.abs() / hh;

        let side = if dx.abs() / bounds.width >= dy.abs() / bounds.height {
            if dx >= 0.0 { Side::Right } else { Side::Left }
        } else if dy >= 0.0 {
            Side::Bottom
        } else {
            Side::Top
        };

        let scale = match self {
            NodeShape::Rectangle => 1.0 / rx.max(ry),
            NodeShape::Diamond => 1.0 / (rx + ry),
            NodeShape::Ellipse => 1.0 / (rx * rx + ry * ry).sqrt(),
        };
        Some((Point::new(c.x + dx * scale, c.y + dy * scale), side))
    }
}

/// Side of `bounds` closest to `p`, and the clamped fraction of `p` along it.
pub fn nearest_side(bounds: &Rect, p: Point) -> (Side, f64) {
    let distances = [
        (Side::Top, (p.y - bounds.y).abs()),
        (Side::Right, (p.x - bounds.right()).abs()),
        (Side::Bottom, (p.y - bounds.bottom()).abs()),
        (Side::Left, (p.x - bounds.x).abs()),
    ];
    let mut best = distances[0];
    for candidate in distances.into_iter().skip(1) {
        if candidate.1 < best.1 {
            best = candidate;
        }
    }
    let side = best.0;
    let fraction = if side.is_vertical() {
        if bounds.height > 0.0 { (p.y - bounds.y) / bounds.height } else { 0.5 }
    } else if bounds.width > 0.0 {
        (p.x - bounds.x) / bounds.width
    } else {
        0.5
    };
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.5 };
    (side, fraction)
}
