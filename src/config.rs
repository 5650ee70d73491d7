use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::interaction::InteractionConfig;
use crate::layout::anchors::AnchorConfig;
use crate::layout::path::PathConfig;
use crate::layout::router::RouterConfig;
use crate::measure::FieldMetrics;
use crate::viewport::ViewportConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid viewport config: {0}")]
    Viewport(String),
}

/// Every tunable of a canvas session. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    pub viewport: ViewportConfig,
    pub fields: FieldMetrics,
    pub anchors: AnchorConfig,
    pub path: PathConfig,
    pub router: RouterConfig,
    pub interaction: InteractionConfig,
}

impl CanvasConfig {
    /// Schema-designer flavour: tighter zoom range and clamped pan.
    pub fn schema() -> Self {
        Self {
            viewport: ViewportConfig::schema(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.viewport.validate().map_err(ConfigError::Viewport)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::path::AutoStyle;
    use crate::model::RoutingMode;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = CanvasConfig::from_json(
            r#"{ "viewport": { "maxScale": 2.0 }, "router": { "cellSize": 10 }, "path": { "autoStyle": "avoiding" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.viewport.max_scale, 2.0);
        assert_eq!(cfg.viewport.min_scale, 0.1);
        assert_eq!(cfg.router.cell_size, 10.0);
        assert_eq!(cfg.router.max_expansions, 20_000);
        assert_eq!(cfg.path.auto_style, AutoStyle::Avoiding);
        assert_eq!(cfg.interaction.routing_mode, RoutingMode::Auto);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(CanvasConfig::from_json("{}").unwrap(), CanvasConfig::default());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            CanvasConfig::from_json("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_scale_bounds() {
        let err = CanvasConfig::from_json(r#"{ "viewport": { "minScale": 3.0, "maxScale": 0.1 } }"#)
            .unwrap_err();
        assert!(matches!(&err, ConfigError::Viewport(msg) if msg.contains("exceeds")));
        assert!(matches!(
            CanvasConfig::from_json(r#"{ "viewport": { "minScale": -1.0 } }"#),
            Err(ConfigError::Viewport(_))
        ));
        assert!(matches!(
            CanvasConfig::from_json(r#"{ "viewport": { "zoomStep": 0 } }"#),
            Err(ConfigError::Viewport(_))
        ));
    }

    #[test]
    fn test_schema_preset() {
        let cfg = CanvasConfig::schema();
        assert_eq!(cfg.viewport.min_scale, 0.25);
        assert_eq!(cfg.viewport.max_scale, 2.0);
        assert!(cfg.viewport.clamp_pan);
    }
}
