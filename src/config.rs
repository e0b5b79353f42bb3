use crate::funnel::{BucketDef, TimeRange};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub spine_start_x: f32,
    pub spine_y: f32,
    pub spine_pitch: f32,
    pub category_stack_pitch: f32,
    pub campaign_lane_y: f32,
    pub segment_lane_y: f32,
    pub broadcast_lane_y: f32,
    pub lane_pitch: f32,
    pub fallback_start_x: f32,
    pub min_node_size: f32,
    pub max_node_size: f32,
    pub min_stroke_width: f32,
    pub max_stroke_width: f32,
    pub curve_max_factor: f32,
    pub curve_distance: f32,
    pub padding: f32,
    pub label_line_height: f32,
    pub fast_text_metrics: bool,
    pub sankey: SankeyConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spine_start_x: 100.0,
            spine_y: 300.0,
            spine_pitch: 350.0,
            category_stack_pitch: 160.0,
            campaign_lane_y: 500.0,
            segment_lane_y: 100.0,
            broadcast_lane_y: 700.0,
            lane_pitch: 220.0,
            fallback_start_x: 100.0,
            min_node_size: 60.0,
            max_node_size: 180.0,
            min_stroke_width: 1.5,
            max_stroke_width: 9.0,
            curve_max_factor: 0.2,
            curve_distance: 50.0,
            padding: 40.0,
            label_line_height: 1.3,
            fast_text_metrics: false,
            sankey: SankeyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SankeyConfig {
    pub width: f32,
    pub height: f32,
    pub node_width: f32,
    pub node_gap: f32,
    pub control_fraction: f32,
}

impl Default for SankeyConfig {
    fn default() -> Self {
        Self {
            width: 880.0,
            height: 420.0,
            node_width: 14.0,
            node_gap: 18.0,
            control_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
    pub dim_opacity: f32,
    pub edge_hit_tolerance: f32,
    pub details_width: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 2.0,
            zoom_step: 0.1,
            dim_opacity: 0.6,
            edge_hit_tolerance: 6.0,
            details_width: 240.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeMultipliers {
    pub seven_days: f64,
    pub thirty_days: f64,
    pub ninety_days: f64,
    pub quarter: f64,
    pub year: f64,
    pub all: f64,
}

impl Default for TimeMultipliers {
    fn default() -> Self {
        Self {
            seven_days: 0.1,
            thirty_days: 0.3,
            ninety_days: 1.0,
            quarter: 1.2,
            year: 3.0,
            all: 5.0,
        }
    }
}

impl TimeMultipliers {
    pub fn get(&self, range: TimeRange) -> f64 {
        match range {
            TimeRange::SevenDays => self.seven_days,
            TimeRange::ThirtyDays => self.thirty_days,
            TimeRange::NinetyDays => self.ninety_days,
            TimeRange::Quarter => self.quarter,
            TimeRange::Year => self.year,
            TimeRange::All => self.all,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelConfig {
    pub buckets: Vec<BucketDef>,
    pub multipliers: TimeMultipliers,
    pub bar_height: f32,
    pub bar_gap: f32,
    pub max_bar_width: f32,
    pub label_width: f32,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            buckets: BucketDef::lifecycle_defaults(),
            multipliers: TimeMultipliers::default(),
            bar_height: 44.0,
            bar_gap: 28.0,
            max_bar_width: 560.0,
            label_width: 140.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub canvas: CanvasConfig,
    pub funnel: FunnelConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::modern();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            canvas: CanvasConfig::default(),
            funnel: FunnelConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    text_color: Option<String>,
    line_color: Option<String>,
    highlight_color: Option<String>,
    background: Option<String>,
    stage_color: Option<String>,
    conversion_color: Option<String>,
    campaign_color: Option<String>,
    segment_color: Option<String>,
    broadcast_color: Option<String>,
    funnel_colors: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    spine_y: Option<f32>,
    spine_pitch: Option<f32>,
    category_stack_pitch: Option<f32>,
    campaign_lane_y: Option<f32>,
    segment_lane_y: Option<f32>,
    broadcast_lane_y: Option<f32>,
    lane_pitch: Option<f32>,
    min_node_size: Option<f32>,
    max_node_size: Option<f32>,
    min_stroke_width: Option<f32>,
    max_stroke_width: Option<f32>,
    padding: Option<f32>,
    fast_text_metrics: Option<bool>,
    sankey_width: Option<f32>,
    sankey_height: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CanvasConfigFile {
    min_zoom: Option<f32>,
    max_zoom: Option<f32>,
    zoom_step: Option<f32>,
    dim_opacity: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TimeMultipliersFile {
    #[serde(rename = "7days")]
    seven_days: Option<f64>,
    #[serde(rename = "30days")]
    thirty_days: Option<f64>,
    #[serde(rename = "90days")]
    ninety_days: Option<f64>,
    quarter: Option<f64>,
    year: Option<f64>,
    all: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FunnelConfigFile {
    buckets: Option<Vec<BucketDef>>,
    time_multipliers: Option<TimeMultipliersFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    canvas: Option<CanvasConfigFile>,
    funnel: Option<FunnelConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Overlays a JSON5 config document onto the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "classic" | "default" => config.theme = Theme::classic(),
            "modern" => config.theme = Theme::modern(),
            other => tracing::warn!(theme = other, "unknown theme name, keeping default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.highlight_color {
            config.theme.highlight_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.stage_color {
            config.theme.stage_color = v;
        }
        if let Some(v) = vars.conversion_color {
            config.theme.conversion_color = v;
        }
        if let Some(v) = vars.campaign_color {
            config.theme.campaign_color = v;
        }
        if let Some(v) = vars.segment_color {
            config.theme.segment_color = v;
        }
        if let Some(v) = vars.broadcast_color {
            config.theme.broadcast_color = v;
        }
        if let Some(v) = vars.funnel_colors {
            config.theme.funnel_colors = v;
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.spine_y {
            config.layout.spine_y = v;
        }
        if let Some(v) = layout.spine_pitch {
            config.layout.spine_pitch = v;
        }
        if let Some(v) = layout.category_stack_pitch {
            config.layout.category_stack_pitch = v;
        }
        if let Some(v) = layout.campaign_lane_y {
            config.layout.campaign_lane_y = v;
        }
        if let Some(v) = layout.segment_lane_y {
            config.layout.segment_lane_y = v;
        }
        if let Some(v) = layout.broadcast_lane_y {
            config.layout.broadcast_lane_y = v;
        }
        if let Some(v) = layout.lane_pitch {
            config.layout.lane_pitch = v;
        }
        if let Some(v) = finite(layout.min_node_size) {
            config.layout.min_node_size = v;
        }
        if let Some(v) = finite(layout.max_node_size) {
            config.layout.max_node_size = v;
        }
        if let Some(v) = finite(layout.min_stroke_width) {
            config.layout.min_stroke_width = v;
        }
        if let Some(v) = finite(layout.max_stroke_width) {
            config.layout.max_stroke_width = v;
        }
        if let Some(v) = layout.padding {
            config.layout.padding = v;
        }
        if let Some(v) = layout.fast_text_metrics {
            config.layout.fast_text_metrics = v;
        }
        if let Some(v) = layout.sankey_width {
            config.layout.sankey.width = v;
        }
        if let Some(v) = layout.sankey_height {
            config.layout.sankey.height = v;
        }
    }
    // A swapped pair would make sizing non-monotonic.
    if config.layout.max_node_size < config.layout.min_node_size {
        std::mem::swap(&mut config.layout.min_node_size, &mut config.layout.max_node_size);
    }
    if config.layout.max_stroke_width < config.layout.min_stroke_width {
        std::mem::swap(
            &mut config.layout.min_stroke_width,
            &mut config.layout.max_stroke_width,
        );
    }

    if let Some(canvas) = parsed.canvas {
        if let Some(v) = finite(canvas.min_zoom) {
            config.canvas.min_zoom = v;
        }
        if let Some(v) = finite(canvas.max_zoom) {
            config.canvas.max_zoom = v;
        }
        if let Some(v) = finite(canvas.zoom_step) {
            config.canvas.zoom_step = v;
        }
        if let Some(v) = finite(canvas.dim_opacity) {
            config.canvas.dim_opacity = v.clamp(0.0, 1.0);
        }
    }
    if config.canvas.max_zoom < config.canvas.min_zoom {
        std::mem::swap(&mut config.canvas.min_zoom, &mut config.canvas.max_zoom);
    }

    if let Some(funnel) = parsed.funnel {
        if let Some(v) = funnel.buckets {
            config.funnel.buckets = v;
        }
        if let Some(m) = funnel.time_multipliers {
            if let Some(v) = m.seven_days {
                config.funnel.multipliers.seven_days = v;
            }
            if let Some(v) = m.thirty_days {
                config.funnel.multipliers.thirty_days = v;
            }
            if let Some(v) = m.ninety_days {
                config.funnel.multipliers.ninety_days = v;
            }
            if let Some(v) = m.quarter {
                config.funnel.multipliers.quarter = v;
            }
            if let Some(v) = m.year {
                config.funnel.multipliers.year = v;
            }
            if let Some(v) = m.all {
                config.funnel.multipliers.all = v;
            }
        }
    }

    config.render.background = config.theme.background.clone();

    Ok(config)
}

/// Bounds that feed `clamp` must stay numbers; NaN and infinities keep the default.
fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.layout.spine_y, 300.0);
        assert_eq!(config.layout.spine_pitch, 350.0);
        assert_eq!(config.layout.campaign_lane_y, 500.0);
        assert_eq!(config.layout.segment_lane_y, 100.0);
        assert_eq!(config.layout.broadcast_lane_y, 700.0);
        assert_eq!(config.canvas.min_zoom, 0.5);
        assert_eq!(config.canvas.max_zoom, 2.0);
        assert_eq!(config.funnel.multipliers.get(TimeRange::Year), 3.0);
    }

    #[test]
    fn overlays_json5_fields() {
        let config = parse_config(
            r##"{
                // comments are allowed
                theme: "classic",
                themeVariables: { lineColor: "#112233" },
                layout: { spinePitch: 400, minNodeSize: 200, maxNodeSize: 50 },
                funnel: {
                    timeMultipliers: { "7days": 0.5 },
                    buckets: [{ label: "Top", types: ["visit", "signup"] }],
                },
            }"##,
        )
        .unwrap();
        assert_eq!(config.theme.line_color, "#112233");
        assert_eq!(config.layout.spine_pitch, 400.0);
        assert_eq!(config.layout.min_node_size, 50.0);
        assert_eq!(config.layout.max_node_size, 200.0);
        assert_eq!(config.funnel.multipliers.seven_days, 0.5);
        assert_eq!(config.funnel.multipliers.all, 5.0);
        assert_eq!(config.funnel.buckets.len(), 1);
        assert_eq!(config.render.background, config.theme.background);
    }

    #[test]
    fn non_finite_bounds_keep_defaults() {
        let config = parse_config(
            "{ canvas: { minZoom: NaN, maxZoom: Infinity, zoomStep: NaN }, \
             layout: { minNodeSize: NaN, maxStrokeWidth: -Infinity } }",
        )
        .unwrap();
        let defaults = Config::default();
        assert_eq!(config.canvas.min_zoom, defaults.canvas.min_zoom);
        assert_eq!(config.canvas.max_zoom, defaults.canvas.max_zoom);
        assert_eq!(config.canvas.zoom_step, defaults.canvas.zoom_step);
        assert_eq!(config.layout.min_node_size, defaults.layout.min_node_size);
        assert_eq!(config.layout.max_stroke_width, defaults.layout.max_stroke_width);

        let mut canvas = crate::canvas::StageMap::new(
            Vec::new(),
            Vec::new(),
            config.layout.clone(),
            config.canvas.clone(),
        );
        canvas.zoom_in();
        assert_eq!(canvas.zoom(), 1.1);
    }
}
