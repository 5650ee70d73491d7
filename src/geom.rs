//! Geometry primitives shared by the viewport, anchor and routing code.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn midpoint(&self, other: Point) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn manhattan(&self, other: Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Round both coordinates to the nearest multiple of `grid`.
    pub fn snapped(&self, grid: f64) -> Self {
        if grid <= 0.0 || !grid.is_finite() {
            return *self;
        }
        Self::new((self.x / grid).round() * grid, (self.y / grid).round() * grid)
    }

    pub fn approx_eq(&self, other: Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width >= 0.0 && self.height >= 0.0
    }
}

/// Axis-aligned rectangle in world (or client) units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Normalized rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (b.x - a.x).abs(),
            (b.y - a.y).abs(),
        )
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    pub fn expand(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }

    /// Inclusive containment (boundary counts as inside).
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Strict containment (boundary excluded).
    pub fn contains_strict(&self, p: Point) -> bool {
        p.x > self.x && p.x < self.right() && p.y > self.y && p.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Whether the segment `a`-`b` passes through the open interior.
    ///
    /// Liang-Barsky clipping against the rectangle; a segment that only
    /// touches the boundary does not count.
    pub fn segment_crosses_interior(&self, a: Point, b: Point) -> bool {
        if self.width <= EPS || self.height <= EPS {
            return false;
        }
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let mut t0: f64 = 0.0;
        let mut t1: f64 = 1.0;
        let checks = [
            (-dx, a.x - self.x),
            (dx, self.right() - a.x),
            (-dy, a.y - self.y),
            (dy, self.bottom() - a.y),
        ];
        for (p, q) in checks {
            if p.abs() < EPS {
                if q <= EPS {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return false;
            }
        }
        if t1 - t0 <= EPS {
            return false;
        }
        let mid_t = (t0 + t1) / 2.0;
        let mid = Point::new(a.x + dx * mid_t, a.y + dy * mid_t);
        self.contains_strict(mid)
    }
}

/// Side of a node bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    /// Left and right sides are vertical edges of the box.
    pub fn is_vertical(&self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    /// Outward unit normal.
    pub fn normal(&self) -> (f64, f64) {
        match self {
            Side::Top => (0.0, -1.0),
            Side::Right => (1.0, 0.0),
            Side::Bottom => (0.0, 1.0),
            Side::Left => (-1.0, 0.0),
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "top" => Some(Self::Top),
            "right" => Some(Self::Right),
            "bottom" => Some(Self::Bottom),
            "left" => Some(Self::Left),
            _ => None,
        }
    }
}

/// Drop consecutive duplicates and middle points that do not change direction.
pub fn collapse_collinear(points: &[Point]) -> Vec<Point> {
    let mut deduped: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if deduped.last().is_some_and(|last| last.approx_eq(p, EPS)) {
            continue;
        }
        deduped.push(p);
    }
    if deduped.len() <= 2 {
        return deduped;
    }

    let mut out: Vec<Point> = Vec::with_capacity(deduped.len());
    out.push(deduped[0]);
    for i in 1..deduped.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = deduped[i];
        let next = deduped[i + 1];
        let cross = (curr.x - prev.x) * (next.y - curr.y) - (curr.y - prev.y) * (next.x - curr.x);
        let dot = (curr.x - prev.x) * (next.x - curr.x) + (curr.y - prev.y) * (next.y - curr.y);
        // Keep reversals: they are real turns on the rendered path.
        if cross.abs() <= EPS && dot > 0.0 {
            continue;
        }
        out.push(curr);
    }
    out.push(deduped[deduped.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_from_corners_normalizes() {
        let r = Rect::from_corners(Point::new(100.0, 40.0), Point::new(20.0, 90.0));
        assert_eq!(r, Rect::new(20.0, 40.0, 80.0, 50.0));
    }

    #[test]
    fn test_segment_crossing_interior() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(r.segment_crosses_interior(Point::new(-10.0, 50.0), Point::new(110.0, 50.0)));
        assert!(r.segment_crosses_interior(Point::new(50.0, 50.0), Point::new(50.0, 200.0)));
        // Along the boundary only.
        assert!(!r.segment_crosses_interior(Point::new(-10.0, 0.0), Point::new(110.0, 0.0)));
        // Fully outside.
        assert!(!r.segment_crosses_interior(Point::new(-10.0, -5.0), Point::new(110.0, -5.0)));
        // Touching a corner.
        assert!(!r.segment_crosses_interior(Point::new(-10.0, 10.0), Point::new(10.0, -10.0)));
    }

    #[test]
    fn test_collapse_collinear() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 30.0),
            Point::new(20.0, 40.0),
        ];
        assert_eq!(
            collapse_collinear(&pts),
            vec![Point::new(0.0, 0.0), Point::new(20.0, 0.0), Point::new(20.0, 40.0)]
        );
    }

    #[test]
    fn test_snapped() {
        assert_eq!(Point::new(29.0, 31.0).snapped(20.0), Point::new(20.0, 40.0));
        assert_eq!(Point::new(29.0, 31.0).snapped(0.0), Point::new(29.0, 31.0));
    }
}
