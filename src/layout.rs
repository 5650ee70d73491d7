//! Edge geometry: node outlines, anchors, paths and obstacle routing.

pub mod anchors;
pub mod engine;
pub mod grid;
pub mod path;
pub mod router;
pub mod shapes;

pub use anchors::{AnchorResolver, ResolvedAnchor, anchor_from_point, fan_out_offset};
pub use engine::{EdgeLayout, LayoutContext};
pub use path::{AutoStyle, PathEnd, PathMode, build_path};
pub use router::{Route, RouteOutcome, Router};
pub use shapes::NodeShape;
