use serde::{Deserialize, Serialize};

use crate::canvas::{GoalMap, JourneyCanvas, Scene, StageMap};
use crate::config::Config;
use crate::dataset::{
    JourneyDataset, broadcast_node_id, campaign_node_id, goal_node_id, segment_node_id,
};
use crate::funnel::{Bucket, TimeRange, aggregate_with_paths};
use crate::layout::{SankeyLayout, compute_sankey_layout};
use crate::layout_dump::{LayoutDump, SceneDump};
use crate::model::{MapEdge, MapNode};
use crate::render::{render_funnel_svg, render_sankey_svg, render_scene_svg};

/// Which picture of the dataset to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Goal spine with campaign, segment and broadcast lanes.
    #[default]
    Map,
    /// Stage nodes at their stored positions.
    Stages,
    Sankey,
    Funnel,
}

/// Interaction state to apply before drawing a static picture.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    pub view: View,
    pub time_range: TimeRange,
    pub expand: Vec<String>,
    pub expand_all: bool,
    pub zoom: Option<f32>,
    pub select: Option<String>,
}

/// Laid-out result of one view, ready to be drawn or dumped.
#[derive(Debug, Clone)]
pub enum ViewLayout {
    Map(Scene),
    Stages(Scene),
    Sankey(SankeyLayout),
    Funnel {
        range: TimeRange,
        buckets: Vec<Bucket>,
    },
}

impl ViewLayout {
    pub fn to_svg(&self, config: &Config) -> String {
        match self {
            ViewLayout::Map(scene) | ViewLayout::Stages(scene) => {
                render_scene_svg(scene, &config.theme, &config.layout, &config.canvas)
            }
            ViewLayout::Sankey(sankey) => render_sankey_svg(sankey, &config.theme, &config.layout),
            ViewLayout::Funnel { range, buckets } => {
                render_funnel_svg(buckets, *range, &config.theme, &config.funnel, &config.layout)
            }
        }
    }

    pub fn dump(&self) -> LayoutDump<'_> {
        match self {
            ViewLayout::Map(scene) => LayoutDump::Map(SceneDump::from_scene(scene)),
            ViewLayout::Stages(scene) => LayoutDump::Stages(SceneDump::from_scene(scene)),
            ViewLayout::Sankey(sankey) => LayoutDump::Sankey(sankey),
            ViewLayout::Funnel { range, buckets } => LayoutDump::funnel(*range, buckets),
        }
    }
}

pub fn layout_view(
    dataset: &JourneyDataset,
    options: &RenderOptions,
    config: &Config,
) -> ViewLayout {
    match options.view {
        View::Map => {
            let (nodes, edges) = dataset.canvas_graph();
            let mut canvas = GoalMap::from_canvas_graph(
                nodes,
                edges,
                config.layout.clone(),
                config.canvas.clone(),
            );
            apply_options(&mut canvas, options);
            ViewLayout::Map(canvas.scene())
        }
        View::Stages => {
            let mut canvas = StageMap::new(
                dataset.stages.clone(),
                dataset.paths.clone(),
                config.layout.clone(),
                config.canvas.clone(),
            );
            apply_options(&mut canvas, options);
            ViewLayout::Stages(canvas.scene())
        }
        View::Sankey => ViewLayout::Sankey(compute_sankey_layout(
            &dataset.stages,
            &dataset.paths,
            &config.layout,
        )),
        View::Funnel => {
            let multiplier = config.funnel.multipliers.get(options.time_range);
            ViewLayout::Funnel {
                range: options.time_range,
                buckets: aggregate_with_paths(
                    &dataset.stages,
                    &dataset.paths,
                    &config.funnel.buckets,
                    multiplier,
                ),
            }
        }
    }
}

/// Lays out and draws one view.
pub fn render_view(dataset: &JourneyDataset, options: &RenderOptions, config: &Config) -> String {
    layout_view(dataset, options, config).to_svg(config)
}

fn apply_options<N: MapNode, E: MapEdge>(
    canvas: &mut JourneyCanvas<N, E>,
    options: &RenderOptions,
) {
    if options.expand_all {
        canvas.expand_all();
    }
    for raw in &options.expand {
        let expanded = resolve_node_id(canvas, raw)
            .map(|id| canvas.set_expanded(&id, true))
            .unwrap_or(false);
        if !expanded {
            tracing::warn!(id = raw.as_str(), "nothing to expand for this id");
        }
    }
    if let Some(zoom) = options.zoom {
        canvas.set_zoom(zoom);
    }
    if let Some(raw) = &options.select {
        let selected = match resolve_node_id(canvas, raw) {
            Some(id) => canvas.select_node(&id),
            None => canvas.select_edge(raw).is_some(),
        };
        if !selected {
            tracing::warn!(id = raw.as_str(), "selection target is not visible");
        }
    }
}

/// Accepts either a canvas node id or the bare id of the record behind it.
fn resolve_node_id<N: MapNode, E: MapEdge>(
    canvas: &JourneyCanvas<N, E>,
    raw: &str,
) -> Option<String> {
    [
        raw.to_string(),
        goal_node_id(raw),
        campaign_node_id(raw),
        segment_node_id(raw),
        broadcast_node_id(raw),
    ]
    .into_iter()
    .find(|candidate| canvas.node(candidate).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_dataset;

    const DATA: &str = r#"{
        stages: [
            { id: "visit", name: "Visit", type: "visit", count: 1000, value: 0, position: { x: 0, y: 0 } },
            { id: "signup", name: "Signup", type: "signup", count: 250, value: 500, position: { x: 300, y: 0 } },
        ],
        paths: [{ id: "p1", source: "visit", target: "signup", count: 250, conversionRate: 25 }],
        goals: [
            { id: "g1", name: "Signups", category: "acquisition", value: 10, conversions: 250, target: 100 },
        ],
        campaigns: [
            { id: "c1", name: "Welcome", status: "active", channel: "email", goalIds: ["g1"],
              metrics: { sent: 100, opened: 50, clicked: 10 } },
        ],
    }"#;

    fn config() -> Config {
        let mut config = Config::default();
        config.layout.fast_text_metrics = true;
        config
    }

    #[test]
    fn map_view_accepts_bare_goal_ids() {
        let dataset = parse_dataset(DATA).unwrap();
        let options = RenderOptions {
            expand: vec!["g1".to_string()],
            select: Some("c1".to_string()),
            ..Default::default()
        };
        let ViewLayout::Map(scene) = layout_view(&dataset, &options, &config()) else {
            panic!("expected map layout");
        };
        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.details.as_ref().unwrap().title, "Welcome");
    }

    #[test]
    fn stages_view_selects_edges() {
        let dataset = parse_dataset(DATA).unwrap();
        let options = RenderOptions {
            view: View::Stages,
            select: Some("p1".to_string()),
            zoom: Some(9.0),
            ..Default::default()
        };
        let ViewLayout::Stages(scene) = layout_view(&dataset, &options, &config()) else {
            panic!("expected stage layout");
        };
        assert_eq!(scene.zoom, 2.0);
        assert!(scene.edges[0].selected);
    }

    #[test]
    fn funnel_view_scales_by_range() {
        let dataset = parse_dataset(DATA).unwrap();
        let options = RenderOptions {
            view: View::Funnel,
            time_range: TimeRange::SevenDays,
            ..Default::default()
        };
        let ViewLayout::Funnel { buckets, .. } = layout_view(&dataset, &options, &config()) else {
            panic!("expected funnel layout");
        };
        assert_eq!(buckets[0].count, 100);
        assert_eq!(buckets[1].count, 25);
        assert_eq!(buckets[0].flow_to_next, 25);
    }

    #[test]
    fn options_deserialize_from_camel_case() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"view":"sankey","timeRange":"year","expandAll":true}"#).unwrap();
        assert_eq!(options.view, View::Sankey);
        assert_eq!(options.time_range, TimeRange::Year);
        assert!(options.expand_all);
        let svg = render_view(&parse_dataset(DATA).unwrap(), &options, &config());
        assert!(svg.contains("linearGradient"));
    }
}
