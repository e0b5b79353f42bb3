use journey_map_renderer::canvas::{CanvasEvent, GoalMap, PointerEvent, StageMap};
use journey_map_renderer::layout_dump::{LayoutDump, SceneDump};
use journey_map_renderer::render::render_scene_svg;
use journey_map_renderer::theme::Theme;
use journey_map_renderer::{
    Config, RenderOptions, View, parse_dataset, render_journey_svg as render_svg,
};
use serde::Deserialize;
use serde_json::json;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JourneyRenderOptions {
    #[serde(flatten)]
    render: RenderOptions,
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    fast_text: Option<bool>,
}

fn parse_options(options_json: Option<String>) -> Result<JourneyRenderOptions, String> {
    match options_json {
        Some(raw) => serde_json::from_str(&raw).map_err(|error| error.to_string()),
        None => Ok(JourneyRenderOptions::default()),
    }
}

fn build_config(options: &JourneyRenderOptions) -> Config {
    let mut config = Config::default();
    if options.theme.as_deref() == Some("classic") {
        config.theme = Theme::classic();
    }
    if let Some(font_family) = &options.font_family {
        config.theme.font_family = font_family.clone();
    }
    if let Some(font_size) = options.font_size {
        config.theme.font_size = font_size;
    }
    // No system fonts to measure with in the browser.
    config.layout.fast_text_metrics = options.fast_text.unwrap_or(true);
    config
}

#[wasm_bindgen]
pub fn render_journey_svg(data: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = parse_options(options_json).map_err(|error| JsValue::from_str(&error))?;
    let config = build_config(&options);
    render_svg(data, &options.render, &config)
        .map_err(|error| JsValue::from_str(&error.to_string()))
}

enum MapCanvas {
    Goals(GoalMap),
    Stages(StageMap),
}

macro_rules! with_canvas {
    ($map:expr, $canvas:ident => $body:expr) => {
        match $map {
            MapCanvas::Goals($canvas) => $body,
            MapCanvas::Stages($canvas) => $body,
        }
    };
}

/// Browser handle on one interactive journey map.
#[wasm_bindgen]
pub struct JourneyMap {
    canvas: MapCanvas,
    config: Config,
}

impl JourneyMap {
    fn build(data: &str, options_json: Option<String>) -> Result<JourneyMap, String> {
        let options = parse_options(options_json)?;
        let config = build_config(&options);
        let dataset = parse_dataset(data).map_err(|error| error.to_string())?;
        let mut canvas = match options.render.view {
            View::Map => {
                let (nodes, edges) = dataset.canvas_graph();
                MapCanvas::Goals(GoalMap::from_canvas_graph(
                    nodes,
                    edges,
                    config.layout.clone(),
                    config.canvas.clone(),
                ))
            }
            View::Stages => MapCanvas::Stages(StageMap::new(
                dataset.stages,
                dataset.paths,
                config.layout.clone(),
                config.canvas.clone(),
            )),
            other => return Err(format!("{other:?} view is not interactive")),
        };
        with_canvas!(&mut canvas, c => {
            if options.render.expand_all {
                c.expand_all();
            }
            if let Some(zoom) = options.render.zoom {
                c.set_zoom(zoom);
            }
        });
        Ok(JourneyMap { canvas, config })
    }
}

fn event_json(event: Option<CanvasEvent>) -> Option<String> {
    let value = match event? {
        CanvasEvent::NodeSelected { id, expanded } => {
            json!({ "type": "nodeSelected", "id": id, "expanded": expanded })
        }
        CanvasEvent::EdgeSelected(id) => json!({ "type": "edgeSelected", "id": id }),
        CanvasEvent::SelectionCleared => json!({ "type": "selectionCleared" }),
        CanvasEvent::DragEnded { id, position } => {
            json!({ "type": "dragEnded", "id": id, "x": position.x, "y": position.y })
        }
    };
    Some(value.to_string())
}

#[wasm_bindgen]
impl JourneyMap {
    #[wasm_bindgen(constructor)]
    pub fn new(data: &str, options_json: Option<String>) -> Result<JourneyMap, JsValue> {
        JourneyMap::build(data, options_json).map_err(|error| JsValue::from_str(&error))
    }

    /// Client coordinates of the canvas element's top-left corner.
    pub fn set_origin(&mut self, x: f32, y: f32) {
        with_canvas!(&mut self.canvas, c => c.set_origin(x, y))
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        with_canvas!(&mut self.canvas, c => c.set_viewport(width, height))
    }

    pub fn pointer_down(&mut self, button: u16, client_x: f32, client_y: f32) -> bool {
        let event = PointerEvent {
            button,
            client_x,
            client_y,
        };
        with_canvas!(&mut self.canvas, c => c.pointer_down(event))
    }

    pub fn pointer_move(&mut self, client_x: f32, client_y: f32) -> bool {
        let event = PointerEvent::primary(client_x, client_y);
        with_canvas!(&mut self.canvas, c => c.pointer_move(event))
    }

    /// Returns the resulting event as JSON, if any.
    pub fn pointer_up(&mut self, client_x: f32, client_y: f32) -> Option<String> {
        let event = PointerEvent::primary(client_x, client_y);
        event_json(with_canvas!(&mut self.canvas, c => c.pointer_up(event)))
    }

    pub fn pointer_leave(&mut self) {
        with_canvas!(&mut self.canvas, c => c.pointer_leave())
    }

    pub fn zoom_in(&mut self) {
        with_canvas!(&mut self.canvas, c => c.zoom_in())
    }

    pub fn zoom_out(&mut self) {
        with_canvas!(&mut self.canvas, c => c.zoom_out())
    }

    pub fn reset_zoom(&mut self) {
        with_canvas!(&mut self.canvas, c => c.reset_zoom())
    }

    pub fn zoom(&self) -> f32 {
        with_canvas!(&self.canvas, c => c.zoom())
    }

    pub fn hover_node(&mut self, id: Option<String>) {
        with_canvas!(&mut self.canvas, c => c.hover_node(id.as_deref()))
    }

    pub fn hover_edge(&mut self, id: Option<String>) {
        with_canvas!(&mut self.canvas, c => c.hover_edge(id.as_deref()))
    }

    pub fn click_node(&mut self, id: &str) -> Option<String> {
        event_json(with_canvas!(&mut self.canvas, c => c.click_node(id)))
    }

    pub fn select_edge(&mut self, id: &str) -> Option<String> {
        event_json(with_canvas!(&mut self.canvas, c => c.select_edge(id)))
    }

    pub fn expand_all(&mut self) {
        with_canvas!(&mut self.canvas, c => c.expand_all())
    }

    pub fn collapse_all(&mut self) {
        with_canvas!(&mut self.canvas, c => c.collapse_all())
    }

    pub fn svg(&self) -> String {
        let scene = with_canvas!(&self.canvas, c => c.scene());
        render_scene_svg(&scene, &self.config.theme, &self.config.layout, &self.config.canvas)
    }

    pub fn layout_json(&self) -> String {
        let scene = with_canvas!(&self.canvas, c => c.scene());
        let dump = match &self.canvas {
            MapCanvas::Goals(_) => LayoutDump::Map(SceneDump::from_scene(&scene)),
            MapCanvas::Stages(_) => LayoutDump::Stages(SceneDump::from_scene(&scene)),
        };
        serde_json::to_string(&dump).unwrap_or_else(|_| "null".to_string())
    }
}
