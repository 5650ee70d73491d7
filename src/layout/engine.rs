//! Per-edge geometry queries: anchors, paths and cached obstacle routes.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::config::CanvasConfig;
use crate::geom::{Point, Rect};
use crate::measure::{FieldMetrics, Measurer};
use crate::model::{Diagram, Edge, Endpoint, RoutingMode};
use crate::viewport::Viewport;

use super::anchors::{AnchorConfig, AnchorResolver, ResolvedAnchor, fan_out_offset};
use super::path::{AutoStyle, PathConfig, PathEnd, PathMode, build_path, orthogonal_path};
use super::router::{Route, Router, RouterConfig};

/// Read-only view of everything edge geometry depends on.
pub struct LayoutContext<'a> {
    pub diagram: &'a Diagram,
    pub viewport: &'a Viewport,
    pub measurer: &'a dyn Measurer,
    /// A drag, resize or pan is in progress; no grid searches are run.
    pub interacting: bool,
}

#[derive(Debug, Clone)]
struct CachedRoute {
    fingerprint: u64,
    points: Vec<Point>,
}

fn fingerprint(source: PathEnd, target: PathEnd, obstacles: &[Rect]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for end in [source, target] {
        end.point.x.to_bits().hash(&mut hasher);
        end.point.y.to_bits().hash(&mut hasher);
        end.side.hash(&mut hasher);
    }
    obstacles.len().hash(&mut hasher);
    for r in obstacles {
        for v in [r.x, r.y, r.width, r.height] {
            v.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Edge ends pinned to each `(node, field)`, in diagram order.
struct FieldUse<'a> {
    slots: HashMap<(&'a str, &'a str), Vec<(&'a str, Endpoint)>>,
}

impl<'a> FieldUse<'a> {
    fn build(diagram: &'a Diagram) -> Self {
        let mut slots: HashMap<(&'a str, &'a str), Vec<(&'a str, Endpoint)>> = HashMap::new();
        for edge in &diagram.edges {
            for end in [Endpoint::Source, Endpoint::Target] {
                if let Some(field) = edge.field_id(end) {
                    slots
                        .entry((edge.node_id(end), field))
                        .or_default()
                        .push((edge.id.as_str(), end));
                }
            }
        }
        Self { slots }
    }

    /// Fan-out offset of `(edge, endpoint)` among the ends sharing its field.
    fn offset(&self, edge: &Edge, endpoint: Endpoint, spacing: f64) -> f64 {
        let Some(field) = edge.field_id(endpoint) else {
            return 0.0;
        };
        let Some(slots) = self.slots.get(&(edge.node_id(endpoint), field)) else {
            return 0.0;
        };
        let index = slots
            .iter()
            .position(|&(id, end)| id == edge.id && end == endpoint)
            .unwrap_or(0);
        fan_out_offset(index, slots.len(), spacing)
    }
}

pub struct EdgeLayout {
    fields: FieldMetrics,
    anchors: AnchorConfig,
    path: PathConfig,
    router: Router,
    routes: HashMap<String, CachedRoute>,
}

impl Default for EdgeLayout {
    fn default() -> Self {
        Self::new(
            FieldMetrics::default(),
            AnchorConfig::default(),
            PathConfig::default(),
            RouterConfig::default(),
        )
    }
}

impl EdgeLayout {
    pub fn new(
        fields: FieldMetrics,
        anchors: AnchorConfig,
        path: PathConfig,
        router: RouterConfig,
    ) -> Self {
        let stub = path.stub;
        Self {
            fields,
            anchors,
            path,
            router: Router::new(router, stub),
            routes: HashMap::new(),
        }
    }

    pub fn from_config(config: &CanvasConfig) -> Self {
        Self::new(
            config.fields.clone(),
            config.anchors.clone(),
            config.path.clone(),
            config.router.clone(),
        )
    }

    pub fn path_config(&self) -> &PathConfig {
        &self.path
    }

    pub fn field_metrics(&self) -> &FieldMetrics {
        &self.fields
    }

    /// Both resolved ends of `edge`; `None` when a node or field is missing.
    pub fn endpoints(
        &self,
        ctx: &LayoutContext<'_>,
        edge: &Edge,
    ) -> Option<(ResolvedAnchor, ResolvedAnchor)> {
        self.endpoints_with(ctx, edge, &FieldUse::build(ctx.diagram))
    }

    fn endpoints_with(
        &self,
        ctx: &LayoutContext<'_>,
        edge: &Edge,
        uses: &FieldUse<'_>,
    ) -> Option<(ResolvedAnchor, ResolvedAnchor)> {
        let spacing = self.anchors.fan_out_spacing;
        let source = ctx.diagram.node(&edge.source)?;
        let target = ctx.diagram.node(&edge.target)?;
        let resolver = AnchorResolver::new(&self.fields, ctx.viewport, ctx.measurer);

        let from = resolver
            .resolve(source, target, edge.source_anchor, edge.source_field.as_deref())?
            .fanned(uses.offset(edge, Endpoint::Source, spacing));
        let to = resolver
            .resolve(target, source, edge.target_anchor, edge.target_field.as_deref())?
            .fanned(uses.offset(edge, Endpoint::Target, spacing));
        Some((from, to))
    }

    pub fn anchor_for(
        &self,
        ctx: &LayoutContext<'_>,
        edge_id: &str,
        endpoint: Endpoint,
    ) -> Option<Point> {
        let edge = ctx.diagram.edge(edge_id)?;
        let (from, to) = self.endpoints(ctx, edge)?;
        Some(match endpoint {
            Endpoint::Source => from.point,
            Endpoint::Target => to.point,
        })
    }

    /// Every node is an obstacle, the edge's own ends included: routes run
    /// between stub tips outside them.
    fn obstacles(diagram: &Diagram) -> Vec<Rect> {
        diagram.nodes.iter().map(|n| n.bounds()).collect()
    }

    fn path_ends(
        &self,
        ctx: &LayoutContext<'_>,
        edge: &Edge,
        uses: &FieldUse<'_>,
    ) -> Option<(PathEnd, PathEnd)> {
        let (from, to) = self.endpoints_with(ctx, edge, uses)?;
        Some((PathEnd::new(from.point, from.side), PathEnd::new(to.point, to.side)))
    }

    /// Polyline for `edge_id`, or `None` when the edge is unrenderable.
    pub fn path_for(&mut self, ctx: &LayoutContext<'_>, edge_id: &str) -> Option<Vec<Point>> {
        let edge = ctx.diagram.edge(edge_id)?;
        let uses = FieldUse::build(ctx.diagram);
        self.path_with(ctx, edge, &uses, &Self::obstacles(ctx.diagram))
    }

    fn path_with(
        &mut self,
        ctx: &LayoutContext<'_>,
        edge: &Edge,
        uses: &FieldUse<'_>,
        obstacles: &[Rect],
    ) -> Option<Vec<Point>> {
        let (source, target) = self.path_ends(ctx, edge, uses)?;

        let mode = match (edge.routing, self.path.auto_style) {
            (RoutingMode::Manual, _) => PathMode::Manual,
            (RoutingMode::Auto, AutoStyle::Straight) => PathMode::Straight,
            (RoutingMode::Auto, AutoStyle::Orthogonal) => PathMode::Orthogonal,
            (RoutingMode::Auto, AutoStyle::Avoiding) => {
                return Some(self.avoiding_path(ctx, edge, source, target, obstacles));
            }
        };
        Some(build_path(source, target, &edge.waypoints, mode, self.path.stub))
    }

    fn avoiding_path(
        &mut self,
        ctx: &LayoutContext<'_>,
        edge: &Edge,
        source: PathEnd,
        target: PathEnd,
        obstacles: &[Rect],
    ) -> Vec<Point> {
        let key = fingerprint(source, target, obstacles);
        if let Some(cached) = self.routes.get(&edge.id)
            && cached.fingerprint == key
        {
            return cached.points.clone();
        }
        if ctx.interacting {
            // Stale until the interaction ends.
            return orthogonal_path(source, target, self.path.stub);
        }
        tracing::debug!(edge = %edge.id, "recomputing route");
        let route = self.router.route_ends(source, target, obstacles);
        self.store(&edge.id, key, &route);
        route.points
    }

    fn store(&mut self, edge_id: &str, fingerprint: u64, route: &Route) {
        self.routes.insert(
            edge_id.to_string(),
            CachedRoute {
                fingerprint,
                points: route.points.clone(),
            },
        );
    }

    /// Run the obstacle router for `edge_id` now, regardless of cache state.
    pub fn auto_route(&mut self, ctx: &LayoutContext<'_>, edge_id: &str) -> Option<Route> {
        let edge = ctx.diagram.edge(edge_id)?;
        let (source, target) = self.path_ends(ctx, edge, &FieldUse::build(ctx.diagram))?;
        let obstacles = Self::obstacles(ctx.diagram);
        let key = fingerprint(source, target, &obstacles);
        let route = self.router.route_ends(source, target, &obstacles);
        self.store(&edge.id, key, &route);
        Some(route)
    }

    /// Whether `edge_id` has a cached route matching the current geometry.
    pub fn is_route_fresh(&self, ctx: &LayoutContext<'_>, edge_id: &str) -> bool {
        let Some(edge) = ctx.diagram.edge(edge_id) else {
            return false;
        };
        let Some((source, target)) = self.path_ends(ctx, edge, &FieldUse::build(ctx.diagram)) else {
            return false;
        };
        let key = fingerprint(source, target, &Self::obstacles(ctx.diagram));
        self.routes.get(edge_id).is_some_and(|c| c.fingerprint == key)
    }

    /// Drop cached routes of edges that no longer exist.
    pub fn prune(&mut self, diagram: &Diagram) {
        self.routes.retain(|id, _| diagram.edge(id).is_some());
    }

    pub fn invalidate(&mut self, edge_id: &str) {
        self.routes.remove(edge_id);
    }

    /// Paths of every renderable edge, in diagram order.
    pub fn all_paths(&mut self, ctx: &LayoutContext<'_>) -> Vec<(String, Vec<Point>)> {
        let uses = FieldUse::build(ctx.diagram);
        let obstacles = Self::obstacles(ctx.diagram);
        ctx.diagram
            .edges
            .iter()
            .filter_map(|e| self.path_with(ctx, e, &uses, &obstacles).map(|p| (e.id.clone(), p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Size;
    use crate::measure::NoMeasurer;
    use crate::geom::Side;
    use crate::model::{Anchor, Field, Node, NodeKind};

    fn table(id: &str, x: f64, y: f64) -> Node {
        Node::new(id, NodeKind::Table, Point::new(x, y))
            .with_size(Size::new(420.0, 120.0))
            .with_fields(vec![Field::new("id", "id", "int"), Field::new("ref", "ref", "int")])
    }

    fn two_tables() -> Diagram {
        let mut d = Diagram::new();
        d.add_node(table("a", 0.0, 0.0)).unwrap();
        d.add_node(table("b", 600.0, 0.0)).unwrap();
        d.add_edge(Edge::new("e", "a", "b")).unwrap();
        d
    }

    fn ctx<'a>(d: &'a Diagram, vp: &'a Viewport, interacting: bool) -> LayoutContext<'a> {
        LayoutContext {
            diagram: d,
            viewport: vp,
            measurer: &NoMeasurer,
            interacting,
        }
    }

    fn avoiding() -> EdgeLayout {
        EdgeLayout::new(
            FieldMetrics::default(),
            AnchorConfig::default(),
            PathConfig {
                auto_style: AutoStyle::Avoiding,
                ..PathConfig::default()
            },
            RouterConfig::default(),
        )
    }

    #[test]
    fn test_side_by_side_path() {
        let d = two_tables();
        let vp = Viewport::default();
        let mut layout = EdgeLayout::default();
        let c = ctx(&d, &vp, false);
        assert_eq!(
            layout.path_for(&c, "e"),
            Some(vec![Point::new(420.0, 60.0), Point::new(600.0, 60.0)])
        );
        assert_eq!(layout.anchor_for(&c, "e", Endpoint::Target), Some(Point::new(600.0, 60.0)));
    }

    #[test]
    fn test_dangling_edge_is_unrenderable() {
        let mut d = two_tables();
        d.edges.push(Edge::new("ghost", "a", "missing"));
        let vp = Viewport::default();
        let mut layout = EdgeLayout::default();
        let c = ctx(&d, &vp, false);
        assert_eq!(layout.path_for(&c, "ghost"), None);
        assert_eq!(layout.anchor_for(&c, "ghost", Endpoint::Source), None);
        assert_eq!(layout.path_for(&c, "nope"), None);
        assert_eq!(layout.all_paths(&c).len(), 1);
    }

    #[test]
    fn test_manual_edge_uses_waypoints() {
        let mut d = two_tables();
        let e = d.edge_mut("e").unwrap();
        e.routing = RoutingMode::Manual;
        e.waypoints = vec![Point::new(500.0, -40.0), Point::new(f64::NAN, 0.0)];
        let vp = Viewport::default();
        let mut layout = EdgeLayout::default();
        assert_eq!(
            layout.path_for(&ctx(&d, &vp, false), "e"),
            Some(vec![
                Point::new(420.0, 60.0),
                Point::new(500.0, -40.0),
                Point::new(600.0, 60.0)
            ])
        );
    }

    #[test]
    fn test_fan_out_on_shared_field() {
        let mut d = two_tables();
        d.add_node(table("c", 600.0, 300.0)).unwrap();
        d.add_edge(Edge::new("f1", "a", "b").with_fields(Some("ref"), Some("id"))).unwrap();
        d.add_edge(Edge::new("f2", "a", "c").with_fields(Some("ref"), Some("id"))).unwrap();
        d.add_edge(Edge::new("f3", "a", "b").with_fields(Some("ref"), None)).unwrap();
        let vp = Viewport::default();
        let layout = EdgeLayout::default();
        let c = ctx(&d, &vp, false);
        let row_y = 48.0 + 8.0 + 40.0 + 20.0;
        let ys: Vec<f64> = ["f1", "f2", "f3"]
            .iter()
            .map(|id| layout.anchor_for(&c, id, Endpoint::Source).unwrap().y)
            .collect();
        assert_eq!(ys, vec![row_y - 10.0, row_y, row_y + 10.0]);
        // A field used once is not shifted.
        assert_eq!(
            layout.anchor_for(&c, "f2", Endpoint::Target),
            Some(Point::new(600.0, 300.0 + 48.0 + 8.0 + 20.0))
        );
    }

    #[test]
    fn test_avoiding_route_is_cached_and_lazy() {
        let mut d = Diagram::new();
        d.add_node(table("a", 0.0, 0.0)).unwrap();
        d.add_node(table("b", 1000.0, 0.0)).unwrap();
        d.add_node(
            Node::new("wall", NodeKind::Process, Point::new(560.0, -200.0))
                .with_size(Size::new(60.0, 520.0)),
        )
            .unwrap();
        d.add_edge(Edge::new("e", "a", "b")).unwrap();
        let vp = Viewport::default();
        let mut layout = avoiding();

        // During a drag nothing is searched.
        let quick = layout.path_for(&ctx(&d, &vp, true), "e").unwrap();
        assert_eq!(quick, vec![Point::new(420.0, 60.0), Point::new(1000.0, 60.0)]);
        assert!(!layout.is_route_fresh(&ctx(&d, &vp, false), "e"));

        let routed = layout.path_for(&ctx(&d, &vp, false), "e").unwrap();
        assert!(routed.len() > 2);
        assert!(layout.is_route_fresh(&ctx(&d, &vp, false), "e"));

        // Fresh entries are served even while interacting.
        assert_eq!(layout.path_for(&ctx(&d, &vp, true), "e").unwrap(), routed);

        // Moving an obstacle makes the entry stale.
        d.move_node("wall", Point::new(560.0, 400.0)).unwrap();
        assert!(!layout.is_route_fresh(&ctx(&d, &vp, false), "e"));
        let route = layout.auto_route(&ctx(&d, &vp, false), "e").unwrap();
        assert!(!route.is_fallback());
        assert!(layout.is_route_fresh(&ctx(&d, &vp, false), "e"));
    }

    #[test]
    fn test_avoiding_route_leaves_through_port_side() {
        let mut d = Diagram::new();
        for (id, x) in [("a", 0.0), ("b", 600.0)] {
            d.add_node(
                Node::new(id, NodeKind::Process, Point::new(x, 0.0))
                    .with_size(Size::new(200.0, 100.0)),
            )
                .unwrap();
        }
        let left = Anchor::new(Side::Left, 0.5);
        d.add_edge(Edge::new("e", "a", "b").with_anchors(Some(left), Some(left)))
            .unwrap();
        let vp = Viewport::default();
        let mut layout = avoiding();
        let path = layout.path_for(&ctx(&d, &vp, false), "e").unwrap();
        assert_eq!(path[0], Point::new(0.0, 50.0));
        assert_eq!(path[1], Point::new(-40.0, 50.0));
        assert_eq!(path.last(), Some(&Point::new(600.0, 50.0)));
        let own = [d.node("a").unwrap().bounds(), d.node("b").unwrap().bounds()];
        for seg in path.windows(2) {
            assert!(own.iter().all(|r| !r.segment_crosses_interior(seg[0], seg[1])));
        }
        assert!(layout.is_route_fresh(&ctx(&d, &vp, false), "e"));
    }

    #[test]
    fn test_all_paths_matches_single_queries() {
        let mut d = two_tables();
        d.add_node(table("c", 600.0, 300.0)).unwrap();
        d.add_edge(Edge::new("f1", "a", "b").with_fields(Some("ref"), Some("id"))).unwrap();
        d.add_edge(Edge::new("f2", "a", "c").with_fields(Some("ref"), Some("id"))).unwrap();
        d.add_edge(Edge::new("f3", "c", "a").with_fields(None, Some("ref"))).unwrap();
        let vp = Viewport::default();
        let mut layout = EdgeLayout::default();
        let c = ctx(&d, &vp, false);
        let all = layout.all_paths(&c);
        assert_eq!(all.len(), 4);
        for (id, points) in &all {
            assert_eq!(layout.path_for(&c, id).as_ref(), Some(points));
        }
        let uses = FieldUse::build(&d);
        assert_eq!(uses.slots[&("a", "ref")].len(), 3);
        assert_eq!(uses.slots[&("a", "ref")][2], ("f3", Endpoint::Target));
    }

    #[test]
    fn test_prune_drops_deleted_edges() {
        let mut d = two_tables();
        let vp = Viewport::default();
        let mut layout = avoiding();
        layout.path_for(&ctx(&d, &vp, false), "e");
        assert!(layout.is_route_fresh(&ctx(&d, &vp, false), "e"));
        d.delete_edge("e").unwrap();
        layout.prune(&d);
        assert!(layout.routes.is_empty());
    }
}
