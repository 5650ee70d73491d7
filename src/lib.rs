pub mod config;
pub mod controller;
pub mod geom;
pub mod interaction;
pub mod layout;
pub mod measure;
pub mod model;
pub mod serializer;
pub mod svg;
pub mod viewport;

use std::rc::Rc;

use js_sys::{Function, Reflect};
use wasm_bindgen::prelude::*;

use config::CanvasConfig;
use controller::CanvasController;
use geom::{Point, Rect};
use interaction::capture::{ListenerHost, ListenerId, ListenerKind, RecordingHost};
use interaction::{InputEvent, Tool};
use measure::Measurer;
use model::{Cardinality, Edge, Endpoint, Node};
use serializer::Document;
use svg::SvgRenderer;
use viewport::ViewState;

/// Route every edge of `document` and render it.
pub fn render_document(document: &Document, config: &CanvasConfig) -> String {
    let mut controller = CanvasController::headless(config).with_diagram(document.diagram.clone());
    let paths = controller.all_paths();
    SvgRenderer::new(config.fields.clone()).render(controller.diagram(), &paths)
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Render a diagram document to SVG
#[wasm_bindgen(js_name = "diagramToSvg")]
pub fn diagram_to_svg(document: &str, config: Option<String>) -> Result<String, String> {
    let config = parse_config(config.as_deref())?;
    let document = serializer::from_json(document).map_err(|e| e.to_string())?;
    Ok(render_document(&document, &config))
}

fn parse_config(json: Option<&str>) -> Result<CanvasConfig, String> {
    match json {
        Some(json) => CanvasConfig::from_json(json).map_err(|e| e.to_string()),
        None => Ok(CanvasConfig::default()),
    }
}

fn from_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn parse_endpoint(s: &str) -> Result<Endpoint, String> {
    match s {
        "source" => Ok(Endpoint::Source),
        "target" => Ok(Endpoint::Target),
        other => Err(format!("Unknown endpoint: {}", other)),
    }
}

/// Document listeners registered through JS callbacks.
///
/// `subscribe(kind)` returns a numeric handle that `unsubscribe(handle)` releases.
struct JsListenerHost {
    subscribe: Function,
    unsubscribe: Function,
}

impl ListenerHost for JsListenerHost {
    fn subscribe(&self, kind: ListenerKind) -> ListenerId {
        match self.subscribe.call1(&JsValue::NULL, &JsValue::from_str(kind.as_str())) {
            Ok(handle) => ListenerId(handle.as_f64().unwrap_or_default() as u32),
            Err(_) => {
                tracing::warn!(kind = kind.as_str(), "listener subscription failed");
                ListenerId(0)
            }
        }
    }

    fn unsubscribe(&self, id: ListenerId) {
        if self.unsubscribe.call1(&JsValue::NULL, &JsValue::from(id.0)).is_err() {
            tracing::warn!(id = id.0, "listener release failed");
        }
    }
}

/// Field measurement through a JS `(nodeId, fieldId) => DOMRect | null` callback.
struct JsMeasurer {
    measure: Function,
}

fn number(value: &JsValue, key: &str) -> Option<f64> {
    Reflect::get(value, &JsValue::from_str(key)).ok()?.as_f64()
}

impl Measurer for JsMeasurer {
    fn measure(&self, node_id: &str, field_id: &str) -> Option<Rect> {
        let value = self
            .measure
            .call2(&JsValue::NULL, &JsValue::from_str(node_id), &JsValue::from_str(field_id))
            .ok()?;
        if value.is_null() || value.is_undefined() {
            return None;
        }
        Some(Rect::new(
            number(&value, "x")?,
            number(&value, "y")?,
            number(&value, "width")?,
            number(&value, "height")?,
        ))
    }
}

/// One open canvas in the browser.
#[wasm_bindgen]
pub struct CanvasSession {
    controller: CanvasController,
}

#[wasm_bindgen]
impl CanvasSession {
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: Option<String>,
        subscribe: Option<Function>,
        unsubscribe: Option<Function>,
    ) -> Result<CanvasSession, String> {
        let config = parse_config(config.as_deref())?;
        let host: Rc<dyn ListenerHost> = match (subscribe, unsubscribe) {
            (Some(subscribe), Some(unsubscribe)) => Rc::new(JsListenerHost {
                subscribe,
                unsubscribe,
            }),
            _ => Rc::new(RecordingHost::default()),
        };
        Ok(Self {
            controller: CanvasController::new(&config, host),
        })
    }

    #[wasm_bindgen(js_name = "loadDocument")]
    pub fn load_document(&mut self, json: &str) -> Result<(), String> {
        let document = serializer::from_json(json).map_err(|e| e.to_string())?;
        self.controller.load(document.diagram);
        if let Some(view) = document.viewport {
            self.controller.set_view_state(view);
        }
        Ok(())
    }

    #[wasm_bindgen(js_name = "saveDocument")]
    pub fn save_document(&self) -> Result<String, String> {
        serializer::to_json(self.controller.diagram(), Some(self.controller.view_state()))
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "setMeasurer")]
    pub fn set_measurer(&mut self, measure: Function) {
        self.controller.set_measurer(Box::new(JsMeasurer { measure }));
    }

    #[wasm_bindgen(js_name = "setCanvasRect")]
    pub fn set_canvas_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.controller.set_canvas_rect(Some(Rect::new(x, y, width, height)));
    }

    /// Feed a JSON-encoded input event.
    #[wasm_bindgen(js_name = "handleEvent")]
    pub fn handle_event(&mut self, event: &str) -> Result<(), String> {
        let event: InputEvent = from_json(event)?;
        self.controller.handle(&event).map_err(|e| e.to_string())
    }

    pub fn mode(&self) -> String {
        self.controller.mode().as_str().to_string()
    }

    pub fn tool(&self) -> Result<String, String> {
        to_json(&self.controller.tool())
    }

    #[wasm_bindgen(js_name = "setTool")]
    pub fn set_tool(&mut self, tool: &str) -> Result<(), String> {
        let tool: Tool = from_json(tool)?;
        self.controller.set_tool(tool);
        Ok(())
    }

    pub fn selection(&self) -> Result<String, String> {
        to_json(&self.controller.selection())
    }

    pub fn pending(&self) -> Result<String, String> {
        to_json(&self.controller.pending())
    }

    #[wasm_bindgen(js_name = "viewState")]
    pub fn view_state(&self) -> Result<String, String> {
        to_json(&self.controller.view_state())
    }

    #[wasm_bindgen(js_name = "setViewState")]
    pub fn set_view_state(&mut self, json: &str) -> Result<(), String> {
        let state: ViewState = from_json(json)?;
        self.controller.set_view_state(state);
        Ok(())
    }

    #[wasm_bindgen(js_name = "clientToWorld")]
    pub fn client_to_world(&self, x: f64, y: f64) -> Vec<f64> {
        let p = self.controller.client_to_world(Point::new(x, y));
        vec![p.x, p.y]
    }

    #[wasm_bindgen(js_name = "zoomIn")]
    pub fn zoom_in(&mut self) {
        self.controller.zoom_in();
    }

    #[wasm_bindgen(js_name = "zoomOut")]
    pub fn zoom_out(&mut self) {
        self.controller.zoom_out();
    }

    #[wasm_bindgen(js_name = "resetZoom")]
    pub fn reset_zoom(&mut self) {
        self.controller.reset_zoom();
    }

    #[wasm_bindgen(js_name = "addNode")]
    pub fn add_node(&mut self, json: &str) -> Result<(), String> {
        let node: Node = from_json(json)?;
        self.controller.add_node(node).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "updateNode")]
    pub fn update_node(&mut self, json: &str) -> Result<(), String> {
        let node: Node = from_json(json)?;
        self.controller.update_node(node).map_err(|e| e.to_string())
    }

    /// Delete a node; returns the ids of the edges removed with it.
    #[wasm_bindgen(js_name = "deleteNode")]
    pub fn delete_node(&mut self, id: &str) -> Result<Vec<String>, String> {
        let removal = self.controller.delete_node(id).map_err(|e| e.to_string())?;
        Ok(removal.edges.into_iter().map(|e| e.id).collect())
    }

    #[wasm_bindgen(js_name = "autosizeNode")]
    pub fn autosize_node(&mut self, id: &str) -> Result<Vec<f64>, String> {
        let size = self.controller.autosize(id).map_err(|e| e.to_string())?;
        Ok(vec![size.width, size.height])
    }

    #[wasm_bindgen(js_name = "addEdge")]
    pub fn add_edge(&mut self, json: &str) -> Result<(), String> {
        let edge: Edge = from_json(json)?;
        self.controller.add_edge(edge).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "updateEdge")]
    pub fn update_edge(&mut self, json: &str) -> Result<(), String> {
        let edge: Edge = from_json(json)?;
        self.controller.update_edge(edge).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "deleteEdge")]
    pub fn delete_edge(&mut self, id: &str) -> Result<(), String> {
        self.controller.delete_edge(id).map(|_| ()).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "confirmEdge")]
    pub fn confirm_edge(&mut self, cardinality: &str) -> Result<(), String> {
        let cardinality = Cardinality::from_str(cardinality)
            .ok_or_else(|| format!("Unknown cardinality: {}", cardinality))?;
        self.controller.confirm_edge(cardinality).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "cancelEdge")]
    pub fn cancel_edge(&mut self) {
        self.controller.cancel_edge();
    }

    #[wasm_bindgen(js_name = "createGroupFromSelection")]
    pub fn create_group_from_selection(
        &mut self,
        members: Vec<String>,
    ) -> Result<Option<String>, String> {
        self.controller
            .create_group_from_selection(&members)
            .map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "deleteGroup")]
    pub fn delete_group(&mut self, id: &str) -> Result<(), String> {
        self.controller.delete_group(id).map(|_| ()).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "addWaypoint")]
    pub fn add_waypoint(&mut self, edge: &str) -> Result<usize, String> {
        self.controller.add_waypoint(edge).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = "removeWaypoint")]
    pub fn remove_waypoint(&mut self, edge: &str, index: usize) -> Result<(), String> {
        self.controller
            .remove_waypoint(edge, index)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// World point of one edge end, `[x, y]`, or nothing when unresolvable.
    #[wasm_bindgen(js_name = "anchorFor")]
    pub fn anchor_for(&mut self, edge: &str, endpoint: &str) -> Result<Option<Vec<f64>>, String> {
        let endpoint = parse_endpoint(endpoint)?;
        Ok(self.controller.anchor_for(edge, endpoint).map(|p| vec![p.x, p.y]))
    }

    /// Polyline of an edge as JSON `[{x, y}, …]`.
    #[wasm_bindgen(js_name = "pathFor")]
    pub fn path_for(&mut self, edge: &str) -> Result<Option<String>, String> {
        self.controller.path_for(edge).map(|p| to_json(&p)).transpose()
    }

    /// SVG path data of an edge.
    #[wasm_bindgen(js_name = "pathData")]
    pub fn path_data(&mut self, edge: &str) -> Option<String> {
        self.controller.path_for(edge).map(|p| svg::path_data(&p))
    }

    #[wasm_bindgen(js_name = "autoRoute")]
    pub fn auto_route(&mut self, edge: &str) -> Result<Option<String>, String> {
        self.controller.auto_route(edge).map(|r| to_json(&r.points)).transpose()
    }

    #[wasm_bindgen(js_name = "toSvg")]
    pub fn to_svg(&mut self) -> String {
        let paths = self.controller.all_paths();
        SvgRenderer::new(self.controller.field_metrics().clone())
            .render(self.controller.diagram(), &paths)
    }
}
