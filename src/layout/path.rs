//! Edge polylines: manual waypoints, straight and orthogonal paths.

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Side, collapse_collinear};

/// How an `auto` edge is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoStyle {
    Straight,
    #[default]
    Orthogonal,
    /// Orthogonal, detouring around other nodes.
    Avoiding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathConfig {
    pub stub: f64,              // Length of the segment leaving a node side
    pub snap_grid: Option<f64>, // Grid for dragged / placed waypoints
    pub auto_style: AutoStyle,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            stub: 30.0,
            snap_grid: Some(20.0),
            auto_style: AutoStyle::Orthogonal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Manual,
    Straight,
    Orthogonal,
}

/// One end of a path: the anchor point and the side it leaves through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathEnd {
    pub point: Point,
    pub side: Option<Side>,
}

impl PathEnd {
    pub fn new(point: Point, side: Option<Side>) -> Self {
        Self { point, side }
    }
}

/// Ordered points of the polyline from `source` to `target`.
pub fn build_path(
    source: PathEnd,
    target: PathEnd,
    waypoints: &[Point],
    mode: PathMode,
    stub: f64,
) -> Vec<Point> {
    match mode {
        PathMode::Manual => {
            let mut points = Vec::with_capacity(waypoints.len() + 2);
            points.push(source.point);
            points.extend(waypoints.iter().copied().filter(Point::is_finite));
            points.push(target.point);
            points
        }
        PathMode::Straight => vec![source.point, target.point],
        PathMode::Orthogonal => orthogonal_path(source, target, stub),
    }
}

/// Side an end leaves through when none was resolved: toward the other end horizontally.
pub fn side_or_facing(end: PathEnd, other: Point) -> Side {
    end.side.unwrap_or(if other.x >= end.point.x { Side::Right } else { Side::Left })
}

/// Two-stub elbow path.
///
/// Each end gets a stub of length `stub` along its side normal; the stub
/// tips are joined with horizontal and vertical segments only.
pub fn orthogonal_path(source: PathEnd, target: PathEnd, stub: f64) -> Vec<Point> {
    let s = source.point;
    let t = target.point;
    let s_side = side_or_facing(source, t);
    let t_side = side_or_facing(target, s);
    let (snx, sny) = s_side.normal();
    let (tnx, tny) = t_side.normal();
    let p1 = s.offset(snx * stub, sny * stub);
    let p2 = t.offset(tnx * stub, tny * stub);

    let mut points = vec![s, p1];
    match (s_side.is_vertical(), t_side.is_vertical()) {
        // Horizontal stubs on both ends meet in a vertical jog at mid x.
        (true, true) => {
            let mid_x = (p1.x + p2.x) / 2.0;
            points.push(Point::new(mid_x, p1.y));
            points.push(Point::new(mid_x, p2.y));
        }
        (false, false) => {
            let mid_y = (p1.y + p2.y) / 2.0;
            points.push(Point::new(p1.x, mid_y));
            points.push(Point::new(p2.x, mid_y));
        }
        (true, false) => points.push(Point::new(p2.x, p1.y)),
        (false, true) => points.push(Point::new(p1.x, p2.y)),
    }
    points.push(p2);
    points.push(t);
    collapse_collinear(&points)
}

/// Midpoint used when inserting a waypoint: the middle waypoint, or the
/// source-target midpoint when there are none.
pub fn waypoint_midpoint(waypoints: &[Point], source: Point, target: Point) -> Point {
    if waypoints.is_empty() {
        source.midpoint(target)
    } else {
        waypoints[waypoints.len() / 2]
    }
}

/// Append a waypoint at the current midpoint and return its index.
pub fn add_waypoint(waypoints: &mut Vec<Point>, source: Point, target: Point) -> usize {
    let mid = waypoint_midpoint(waypoints, source, target);
    waypoints.push(mid);
    waypoints.len() - 1
}

pub fn remove_waypoint(waypoints: &mut Vec<Point>, index: usize) -> Option<Point> {
    (index < waypoints.len()).then(|| waypoints.remove(index))
}

/// Move waypoint `index` in place, snapping to `snap` when given.
///
/// Returns false for an out-of-range index or a non-finite target.
pub fn drag_waypoint(waypoints: &mut [Point], index: usize, to: Point, snap: Option<f64>) -> bool {
    if !to.is_finite() {
        return false;
    }
    let Some(slot) = waypoints.get_mut(index) else {
        return false;
    };
    *slot = match snap {
        Some(grid) => to.snapped(grid),
        None => to,
    };
    true
}
