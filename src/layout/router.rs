//! Obstacle-aware orthogonal routing.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geom::{Point, Rect, Side, collapse_collinear};

use super::grid::{Cell, Grid};
use super::path::{PathEnd, orthogonal_path, side_or_facing};

/// Rings searched for an entry point beyond the effective clearance.
const ENTRY_SLACK_RINGS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    pub cell_size: f64,
    pub clearance: f64,       // Minimum gap kept around obstacles
    pub margin: f64,          // Free space searched around the routed region
    pub max_expansions: usize,
    pub node_padding: f64,    // Added to every obstacle before routing
}

impl RouterConfig {
    /// Gap actually kept around obstacles: never less than half a cell.
    pub fn effective_clearance(&self) -> f64 {
        self.clearance.max(self.cell_size / 2.0)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cell_size: 20.0,
            clearance: 10.0,
            margin: 100.0,
            max_expansions: 20_000,
            node_padding: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Grid could not be built (degenerate or oversized region).
    NoGrid,
    /// Start or end has no reachable free lattice point.
    NoEntry,
    /// Search budget exhausted.
    Budget,
    /// Every reachable lattice point was explored.
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Routed,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub points: Vec<Point>,
    pub outcome: RouteOutcome,
}

impl Route {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, RouteOutcome::Fallback(_))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SearchEntry {
    est: u32,
    cost: u32,
    seq: u64,
    index: usize,
}

impl Ord for SearchEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on estimate; earlier pushes win ties.
        other
            .est
            .cmp(&self.est)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SearchEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn manhattan(a: Cell, b: Cell) -> u32 {
    (a.row.abs_diff(b.row) + a.col.abs_diff(b.col)) as u32
}

fn segment_clear(a: Point, b: Point, obstacles: &[Rect]) -> bool {
    obstacles.iter().all(|r| !r.segment_crosses_interior(a, b))
}

/// Elbow joining an off-lattice point to a lattice point, horizontal leg first.
fn connector(from: Point, to: Point, obstacles: &[Rect]) -> Option<Point> {
    [Point::new(to.x, from.y), Point::new(from.x, to.y)]
        .into_iter()
        .find(|&elbow| segment_clear(from, elbow, obstacles) && segment_clear(elbow, to, obstacles))
}

pub struct Router {
    config: RouterConfig,
    stub: f64,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default(), 30.0)
    }
}

impl Router {
    pub fn new(config: RouterConfig, stub: f64) -> Self {
        Self { config, stub }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    fn padded(&self, obstacles: &[Rect]) -> Vec<Rect> {
        obstacles
            .iter()
            .filter(|r| r.is_finite())
            .map(|r| r.expand(self.config.node_padding.max(0.0)))
            .collect()
    }

    /// Route from `start` to `end` around `obstacles`.
    pub fn route(&self, start: Point, end: Point, obstacles: &[Rect]) -> Route {
        match self.search(start, end, &self.padded(obstacles)) {
            Ok(points) => Route {
                points,
                outcome: RouteOutcome::Routed,
            },
            Err(reason) => {
                tracing::warn!(?reason, ?start, ?end, "obstacle routing failed, falling back");
                Route {
                    points: self.fallback(start, end),
                    outcome: RouteOutcome::Fallback(reason),
                }
            }
        }
    }

    /// Route between two edge ends, each leaving through its side.
    ///
    /// The search runs between the stub tips, so `obstacles` may include the
    /// ends' own nodes. The fallback is the two-stub orthogonal path.
    pub fn route_ends(&self, source: PathEnd, target: PathEnd, obstacles: &[Rect]) -> Route {
        let padded = self.padded(obstacles);
        let from = self.stub_tip(source, target.point, &padded);
        let to = self.stub_tip(target, source.point, &padded);
        match self.search(from, to, &padded) {
            Ok(inner) => {
                let mut points = Vec::with_capacity(inner.len() + 2);
                points.push(source.point);
                points.extend(inner);
                points.push(target.point);
                Route {
                    points: collapse_collinear(&points),
                    outcome: RouteOutcome::Routed,
                }
            }
            Err(reason) => {
                tracing::warn!(?reason, ?from, ?to, "obstacle routing failed, falling back");
                Route {
                    points: orthogonal_path(source, target, self.stub),
                    outcome: RouteOutcome::Fallback(reason),
                }
            }
        }
    }

    /// Point one stub out from `end` along its side normal.
    ///
    /// The stub starts at the far edge of any obstacle holding the anchor and
    /// is lengthened to the next lattice line, so the route leaves straight.
    fn stub_tip(&self, end: PathEnd, other: Point, obstacles: &[Rect]) -> Point {
        let side = side_or_facing(end, other);
        let p = end.point;
        let holding = obstacles.iter().filter(|r| r.contains(p));
        let base = match side {
            Side::Left => holding.fold(p.x, |x, r| x.min(r.x)),
            Side::Right => holding.fold(p.x, |x, r| x.max(r.right())),
            Side::Top => holding.fold(p.y, |y, r| y.min(r.y)),
            Side::Bottom => holding.fold(p.y, |y, r| y.max(r.bottom())),
        };
        let cell = self.config.cell_size;
        let on_lattice = |v: f64, up: bool| {
            if !(cell > 0.0) || !cell.is_finite() {
                v
            } else if up {
                (v / cell).ceil() * cell
            } else {
                (v / cell).floor() * cell
            }
        };
        match side {
            Side::Left => Point::new(on_lattice(base - self.stub, false), p.y),
            Side::Right => Point::new(on_lattice(base + self.stub, true), p.y),
            Side::Top => Point::new(p.x, on_lattice(base - self.stub, false)),
            Side::Bottom => Point::new(p.x, on_lattice(base + self.stub, true)),
        }
    }

    /// Two-stub orthogonal path between the points.
    pub fn fallback(&self, start: Point, end: Point) -> Vec<Point> {
        orthogonal_path(PathEnd::new(start, None), PathEnd::new(end, None), self.stub)
    }

    fn search(
        &self,
        start: Point,
        end: Point,
        obstacles: &[Rect],
    ) -> Result<Vec<Point>, FallbackReason> {
        let grid = Grid::build(
            start,
            end,
            obstacles,
            self.config.cell_size,
            self.config.clearance,
            self.config.margin,
        )
        .ok_or(FallbackReason::NoGrid)?;

        let (start_cell, start_elbow) =
            self.entry(&grid, start, obstacles).ok_or(FallbackReason::NoEntry)?;
        let (end_cell, end_elbow) =
            self.entry(&grid, end, obstacles).ok_or(FallbackReason::NoEntry)?;

        let cells = self.astar(&grid, start_cell, end_cell)?;

        let mut points = Vec::with_capacity(cells.len() + 4);
        points.push(start);
        points.push(start_elbow);
        points.extend(cells.iter().map(|&c| grid.point(c)));
        points.push(end_elbow);
        points.push(end);
        Ok(collapse_collinear(&points))
    }

    /// Nearest free lattice point reachable from `p` by a clear elbow.
    ///
    /// Rings of growing Chebyshev radius are scanned, up to a few cells past
    /// the effective clearance; within a ring the closest candidate wins,
    /// ties going to row-major order. A point inside an obstacle has none.
    fn entry(&self, grid: &Grid, p: Point, obstacles: &[Rect]) -> Option<(Cell, Point)> {
        if obstacles.iter().any(|r| r.contains_strict(p)) {
            return None;
        }
        let center = grid.nearest_cell(p);
        let max_radius = self.entry_radius().min(grid.rows.max(grid.cols));
        for radius in 0..=max_radius {
            let mut best: Option<(f64, Cell, Point)> = None;
            for cell in grid.ring(center, radius) {
                if grid.is_blocked(cell) {
                    continue;
                }
                let q = grid.point(cell);
                let Some(elbow) = connector(p, q, obstacles) else {
                    continue;
                };
                let d = p.distance(q);
                if best.is_none_or(|(bd, _, _)| d < bd) {
                    best = Some((d, cell, elbow));
                }
            }
            if let Some((_, cell, elbow)) = best {
                return Some((cell, elbow));
            }
        }
        None
    }

    fn entry_radius(&self) -> usize {
        let rings = (self.config.effective_clearance() / self.config.cell_size).ceil();
        if rings.is_finite() && rings >= 0.0 {
            rings as usize + ENTRY_SLACK_RINGS
        } else {
            ENTRY_SLACK_RINGS
        }
    }

    fn astar(&self, grid: &Grid, start: Cell, goal: Cell) -> Result<Vec<Cell>, FallbackReason> {
        let mut best_cost = vec![u32::MAX; grid.len()];
        let mut came_from: Vec<Option<usize>> = vec![None; grid.len()];
        let mut closed = vec![false; grid.len()];
        let mut open = BinaryHeap::new();
        let mut seq: u64 = 0;

        let start_idx = grid.index(start);
        let goal_idx = grid.index(goal);
        best_cost[start_idx] = 0;
        open.push(SearchEntry {
            est: manhattan(start, goal),
            cost: 0,
            seq,
            index: start_idx,
        });

        let mut expansions = 0usize;
        while let Some(entry) = open.pop() {
            if closed[entry.index] || entry.cost > best_cost[entry.index] {
                continue;
            }
            if entry.index == goal_idx {
                let mut cells = vec![grid.cell_of(goal_idx)];
                let mut cur = goal_idx;
                while let Some(prev) = came_from[cur] {
                    cells.push(grid.cell_of(prev));
                    cur = prev;
                }
                cells.reverse();
                tracing::trace!(expansions, len = cells.len(), "route found");
                return Ok(cells);
            }
            closed[entry.index] = true;
            expansions += 1;
            if expansions > self.config.max_expansions {
                return Err(FallbackReason::Budget);
            }

            let cell = grid.cell_of(entry.index);
            for next in grid.neighbors(cell) {
                let idx = grid.index(next);
                if closed[idx] {
                    continue;
                }
                let cost = entry.cost + 1;
                if cost < best_cost[idx] {
                    best_cost[idx] = cost;
                    came_from[idx] = Some(entry.index);
                    seq += 1;
                    open.push(SearchEntry {
                        est: cost + manhattan(next, goal),
                        cost,
                        seq,
                        index: idx,
                    });
                }
            }
        }
        Err(FallbackReason::Unreachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn crosses_any(points: &[Point], obstacles: &[Rect]) -> bool {
        points.windows(2).any(|seg| {
            (0..=200).any(|i| {
                let t = i as f64 / 200.0;
                let p = Point::new(
                    seg[0].x + (seg[1].x - seg[0].x) * t,
                    seg[0].y + (seg[1].y - seg[0].y) * t,
                );
                obstacles.iter().any(|r| r.contains_strict(p))
            })
        })
    }

    fn is_orthogonal(points: &[Point]) -> bool {
        points
            .windows(2)
            .all(|s| (s[0].x - s[1].x).abs() < 1e-9 || (s[0].y - s[1].y).abs() < 1e-9)
    }

    #[test]
    fn test_open_field_is_direct() {
        let route = Router::default().route(Point::new(420.0, 60.0), Point::new(600.0, 60.0), &[]);
        assert_eq!(route.outcome, RouteOutcome::Routed);
        assert_eq!(route.points, vec![Point::new(420.0, 60.0), Point::new(600.0, 60.0)]);
    }

    #[test]
    fn test_detours_around_wall() {
        let wall = Rect::new(200.0, -200.0, 40.0, 400.0);
        let start = Point::new(0.0, 0.0);
        let end = Point::new(400.0, 0.0);
        let route = Router::default().route(start, end, &[wall]);
        assert_eq!(route.outcome, RouteOutcome::Routed);
        assert_eq!(route.points.first(), Some(&start));
        assert_eq!(route.points.last(), Some(&end));
        assert!(is_orthogonal(&route.points));
        assert!(!crosses_any(&route.points, &[wall]));
        assert!(route.points.len() > 2);
    }

    #[test]
    fn test_enclosed_start_falls_back() {
        let walls = [
            Rect::new(-100.0, -100.0, 200.0, 20.0),
            Rect::new(-100.0, 80.0, 200.0, 20.0),
            Rect::new(-100.0, -100.0, 20.0, 200.0),
            Rect::new(80.0, -100.0, 20.0, 200.0),
        ];
        let router = Router::default();
        let start = Point::new(0.0, 0.0);
        let end = Point::new(500.0, 0.0);
        let route = router.route(start, end, &walls);
        assert_eq!(route.outcome, RouteOutcome::Fallback(FallbackReason::Unreachable));
        assert_eq!(route.points, router.fallback(start, end));
    }

    #[test]
    fn test_budget_exhaustion_falls_back() {
        let obstacles = [
            Rect::new(100.0, -150.0, 60.0, 300.0),
            Rect::new(220.0, -150.0, 60.0, 300.0),
            Rect::new(340.0, -150.0, 60.0, 300.0),
        ];
        let router = Router::new(
            RouterConfig {
                max_expansions: 25,
                ..RouterConfig::default()
            },
            30.0,
        );
        let start = Point::new(0.0, 0.0);
        let end = Point::new(500.0, 0.0);
        let route = router.route(start, end, &obstacles);
        assert_eq!(route.outcome, RouteOutcome::Fallback(FallbackReason::Budget));
        assert_eq!(
            route.points,
            vec![start, end],
        );
    }

    #[test]
    fn test_three_obstacles_routed_with_full_budget() {
        let obstacles = [
            Rect::new(100.0, -150.0, 60.0, 300.0),
            Rect::new(220.0, -150.0, 60.0, 300.0),
            Rect::new(340.0, -150.0, 60.0, 300.0),
        ];
        let route =
            Router::default().route(Point::new(0.0, 0.0), Point::new(500.0, 0.0), &obstacles);
        assert_eq!(route.outcome, RouteOutcome::Routed);
        assert!(!crosses_any(&route.points, &obstacles));
    }

    #[test]
    fn test_end_inside_obstacle_has_no_entry() {
        let obstacles = [
            Rect::new(400.0, -100.0, 300.0, 300.0),
            Rect::new(2000.0, 2000.0, 100.0, 100.0),
        ];
        let router = Router::default();
        let start = Point::new(0.0, 50.0);
        let end = Point::new(550.0, 50.0);
        let route = router.route(start, end, &obstacles);
        assert_eq!(route.outcome, RouteOutcome::Fallback(FallbackReason::NoEntry));
        assert_eq!(route.points, router.fallback(start, end));
    }

    #[test]
    fn test_entry_search_stays_near_the_point() {
        // A 4-unit slot between two tall blocks: every lattice point within
        // reach is blocked; free points exist only far above and below.
        let obstacles = [
            Rect::new(-300.0, -300.0, 298.0, 600.0),
            Rect::new(2.0, -300.0, 298.0, 600.0),
        ];
        let router = Router::default();
        let grid = Grid::build(
            Point::new(0.0, 0.0),
            Point::new(0.0, 600.0),
            &obstacles,
            20.0,
            10.0,
            100.0,
        )
        .unwrap();
        assert_eq!(router.entry_radius(), 5);
        assert_eq!(router.entry(&grid, Point::new(0.0, 0.0), &obstacles), None);
        assert!(router.entry(&grid, Point::new(0.0, 340.0), &obstacles).is_some());
    }

    #[test]
    fn test_route_ends_leave_through_their_sides() {
        // Both ports face left, away from each other's node.
        let a = Rect::new(0.0, 0.0, 200.0, 100.0);
        let b = Rect::new(600.0, 0.0, 200.0, 100.0);
        let source = PathEnd::new(Point::new(0.0, 50.0), Some(Side::Left));
        let target = PathEnd::new(Point::new(600.0, 50.0), Some(Side::Left));
        let route = Router::default().route_ends(source, target, &[a, b]);
        assert_eq!(route.outcome, RouteOutcome::Routed);
        assert_eq!(route.points[0], source.point);
        assert_eq!(route.points[1], Point::new(-40.0, 50.0));
        assert_eq!(route.points.last(), Some(&target.point));
        assert_eq!(route.points[route.points.len() - 2], Point::new(560.0, 50.0));
        assert!(is_orthogonal(&route.points));
        assert!(!crosses_any(&route.points, &[a, b]));
    }

    #[test]
    fn test_route_ends_start_outside_holding_node() {
        // A measured anchor in the middle of its node still leaves past the edge.
        let node = Rect::new(0.0, 0.0, 200.0, 100.0);
        let router = Router::default();
        let end = PathEnd::new(Point::new(150.0, 50.0), Some(Side::Right));
        assert_eq!(
            router.stub_tip(end, Point::new(500.0, 50.0), &[node]),
            Point::new(240.0, 50.0)
        );
        let bottom = PathEnd::new(Point::new(100.0, 100.0), Some(Side::Bottom));
        assert_eq!(
            router.stub_tip(bottom, Point::new(100.0, 400.0), &[node]),
            Point::new(100.0, 140.0)
        );
    }

    #[test]
    fn test_deterministic() {
        let obstacles = [Rect::new(150.0, -60.0, 100.0, 120.0), Rect::new(300.0, 40.0, 80.0, 80.0)];
        let router = Router::default();
        let a = router.route(Point::new(0.0, 10.0), Point::new(500.0, 30.0), &obstacles);
        let b = router.route(Point::new(0.0, 10.0), Point::new(500.0, 30.0), &obstacles);
        assert_eq!(format!("{:?}", a), format!("{:?}", b));
    }

    fn obstacle_strategy() -> impl Strategy<Value = Rect> {
        (-300.0..300.0f64, -300.0..300.0f64, 20.0..160.0f64, 20.0..160.0f64)
            .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_routes_avoid_obstacle_interiors(
            sx in -400.0..400.0f64,
            sy in -400.0..400.0f64,
            ex in -400.0..400.0f64,
            ey in -400.0..400.0f64,
            obstacles in proptest::collection::vec(obstacle_strategy(), 0..5),
        ) {
            let start = Point::new(sx, sy);
            let end = Point::new(ex, ey);
            let obstacles: Vec<Rect> = obstacles
                .into_iter()
                .filter(|r| !r.contains(start) && !r.contains(end))
                .collect();
            let route = Router::default().route(start, end, &obstacles);
            prop_assert_eq!(route.points.first(), Some(&start));
            prop_assert_eq!(route.points.last(), Some(&end));
            prop_assert!(is_orthogonal(&route.points));
            if route.outcome == RouteOutcome::Routed {
                prop_assert!(!crosses_any(&route.points, &obstacles));
            }
        }

        #[test]
        fn prop_routing_is_deterministic(
            sx in -200.0..200.0f64,
            sy in -200.0..200.0f64,
            obstacles in proptest::collection::vec(obstacle_strategy(), 0..4),
        ) {
            let router = Router::default();
            let start = Point::new(sx, sy);
            let end = Point::new(450.0, 320.0);
            let a = router.route(start, end, &obstacles);
            let b = router.route(start, end, &obstacles);
            prop_assert_eq!(format!("{:?}", a), format!("{:?}", b));
        }
    }
}
