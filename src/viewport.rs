//! Client <-> world coordinate transform under pan and zoom.

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    pub clamp_pan: bool,      // Keep offset <= 0 on both axes
    pub zoom_step: f64,       // Factor for zoom in / out buttons
    pub wheel_intensity: f64, // Scale change per wheel deltaY unit
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 3.0,
            clamp_pan: false,
            zoom_step: 1.1,
            wheel_intensity: 0.001,
        }
    }
}

impl ViewportConfig {
    pub fn schema() -> Self {
        Self {
            min_scale: 0.25,
            max_scale: 2.0,
            clamp_pan: true,
            ..Self::default()
        }
    }

    /// Scale bounds must be positive, finite and ordered; zoom factors finite.
    pub fn validate(&self) -> Result<(), String> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.min_scale) || !positive(self.max_scale) {
            return Err(format!(
                "scale bounds must be positive (minScale {}, maxScale {})",
                self.min_scale, self.max_scale
            ));
        }
        if self.min_scale > self.max_scale {
            return Err(format!(
                "minScale {} exceeds maxScale {}",
                self.min_scale, self.max_scale
            ));
        }
        if !positive(self.zoom_step) {
            return Err(format!("zoomStep must be positive (got {})", self.zoom_step));
        }
        if !self.wheel_intensity.is_finite() {
            return Err(format!("wheelIntensity must be finite (got {})", self.wheel_intensity));
        }
        Ok(())
    }
}

/// Pan offset and scale, the part of a viewport the UI reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub offset: Point,
    pub scale: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            offset: Point::default(),
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    state: ViewState,
    canvas: Option<Rect>,
    config: ViewportConfig,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl Viewport {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            state: ViewState::default(),
            canvas: None,
            config,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn offset(&self) -> Point {
        self.state.offset
    }

    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// Set offset and scale; the scale is clamped and non-finite values are ignored.
    pub fn set_state(&mut self, state: ViewState) {
        if state.offset.is_finite() {
            self.state.offset = state.offset;
        }
        if state.scale.is_finite() && state.scale > 0.0 {
            self.state.scale = self.clamp_scale(state.scale);
        }
        self.apply_pan_clamp();
    }

    /// Current client-space bounding rectangle of the canvas element.
    pub fn set_canvas_rect(&mut self, rect: Option<Rect>) {
        self.canvas = rect;
    }

    pub fn canvas_rect(&self) -> Option<Rect> {
        self.canvas
    }

    /// Canvas origin when the canvas is mounted and non-empty.
    fn canvas_origin(&self) -> Option<Point> {
        self.canvas
            .filter(|r| r.is_finite() && r.width > 0.0 && r.height > 0.0)
            .map(|r| r.origin())
            .filter(|_| self.state.scale > 0.0 && self.state.scale.is_finite())
    }

    /// `world = (client - canvasOrigin - offset) / scale`; identity without a canvas.
    pub fn client_to_world(&self, client: Point) -> Point {
        match self.canvas_origin() {
            Some(origin) => Point::new(
                (client.x - origin.x - self.state.offset.x) / self.state.scale,
                (client.y - origin.y - self.state.offset.y) / self.state.scale,
            ),
            None => client,
        }
    }

    pub fn world_to_client(&self, world: Point) -> Point {
        match self.canvas_origin() {
            Some(origin) => Point::new(
                world.x * self.state.scale + self.state.offset.x + origin.x,
                world.y * self.state.scale + self.state.offset.y + origin.y,
            ),
            None => world,
        }
    }

    /// Client rectangle converted to world units.
    pub fn client_rect_to_world(&self, rect: Rect) -> Rect {
        let a = self.client_to_world(rect.origin());
        let b = self.client_to_world(Point::new(rect.right(), rect.bottom()));
        Rect::from_corners(a, b)
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        // Tolerates min > max, unlike `f64::clamp`.
        scale.max(self.config.min_scale).min(self.config.max_scale)
    }

    /// Zoom to `new_scale`, keeping the world point under `focal` fixed.
    pub fn zoom(&mut self, new_scale: f64, focal: Point) {
        if new_scale.is_nan() || !focal.is_finite() {
            return;
        }
        let old = self.state.scale;
        let new = self.clamp_scale(new_scale);
        let origin = self.canvas_origin().unwrap_or_default();
        let f = Point::new(focal.x - origin.x, focal.y - origin.y);
        let ratio = new / old;
        self.state.offset = Point::new(
            f.x - (f.x - self.state.offset.x) * ratio,
            f.y - (f.y - self.state.offset.y) * ratio,
        );
        self.state.scale = new;
        self.apply_pan_clamp();
        tracing::trace!(scale = new, "zoom");
    }

    /// Wheel zoom at the cursor: `scale * (1 - deltaY * intensity)`.
    pub fn wheel(&mut self, delta_y: f64, focal: Point) {
        if !delta_y.is_finite() {
            return;
        }
        let factor = 1.0 - delta_y * self.config.wheel_intensity;
        self.zoom(self.state.scale * factor, focal);
    }

    pub fn zoom_in(&mut self) {
        let focal = self.canvas_center();
        self.zoom(self.state.scale * self.config.zoom_step, focal);
    }

    pub fn zoom_out(&mut self) {
        let focal = self.canvas_center();
        self.zoom(self.state.scale / self.config.zoom_step, focal);
    }

    pub fn reset(&mut self) {
        self.state = ViewState::default();
    }

    fn canvas_center(&self) -> Point {
        match self.canvas_origin() {
            Some(_) => self.canvas.map(|r| r.center()).unwrap_or_default(),
            None => Point::default(),
        }
    }

    /// `offset += delta`, clamped when configured.
    pub fn pan(&mut self, delta: Point) {
        if !delta.is_finite() {
            return;
        }
        self.state.offset = self.state.offset.offset(delta.x, delta.y);
        self.apply_pan_clamp();
    }

    /// Absolute offset, used while a pan gesture tracks the pointer.
    pub fn set_offset(&mut self, offset: Point) {
        if offset.is_finite() {
            self.state.offset = offset;
            self.apply_pan_clamp();
        }
    }

    fn apply_pan_clamp(&mut self) {
        if self.config.clamp_pan {
            let offset = self.state.offset;
            self.state.offset = Point::new(offset.x.min(0.0), offset.y.min(0.0));
        }
    }
}
