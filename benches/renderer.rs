use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use journey_map_renderer::canvas::{GoalMap, PointerEvent, StageMap};
use journey_map_renderer::config::Config;
use journey_map_renderer::dataset::{JourneyDataset, parse_dataset};
use journey_map_renderer::funnel::aggregate_with_paths;
use journey_map_renderer::layout::compute_sankey_layout;
use journey_map_renderer::render::render_scene_svg;
use journey_map_renderer::view::{RenderOptions, View, render_view};
use std::hint::black_box;

const STAGE_TYPES: [&str; 8] = [
    "visit", "signup", "trial", "feature", "conversion", "upgrade", "retention", "churn",
];
const CATEGORIES: [&str; 6] = [
    "acquisition",
    "activation",
    "engagement",
    "retention",
    "monetization",
    "expansion",
];

/// Layered stage graph plus goals with campaigns hanging off them.
fn generated_dataset(stages_per_type: usize, goals: usize) -> String {
    let mut stages = Vec::new();
    let mut paths = Vec::new();
    for (layer, stage_type) in STAGE_TYPES.iter().enumerate() {
        for i in 0..stages_per_type {
            let count = 100_000 / (layer as u64 + 1) / (i as u64 + 1);
            stages.push(format!(
                r#"{{"id":"s{layer}-{i}","name":"{stage_type} {i}","type":"{stage_type}","count":{count},"value":{count},"position":{{"x":{},"y":{}}}}}"#,
                layer * 260,
                i * 200
            ));
            if layer > 0 {
                for j in 0..stages_per_type.min(3) {
                    paths.push(format!(
                        r#"{{"id":"p{layer}-{j}-{i}","source":"s{}-{j}","target":"s{layer}-{i}","count":{},"conversionRate":{}}}"#,
                        layer - 1,
                        count / 2,
                        (50 / (j + 1)).min(100)
                    ));
                }
            }
        }
    }

    let mut goal_rows = Vec::new();
    let mut campaigns = Vec::new();
    for g in 0..goals {
        goal_rows.push(format!(
            r#"{{"id":"g{g}","name":"Goal {g}","category":"{}","value":{},"conversions":{},"target":1000}}"#,
            CATEGORIES[g % CATEGORIES.len()],
            g * 10,
            500 + g * 7
        ));
        for c in 0..3 {
            campaigns.push(format!(
                r#"{{"id":"c{g}-{c}","name":"Campaign {g}.{c}","status":"active","channel":"email","goalIds":["g{g}"],"metrics":{{"sent":{},"opened":10,"clicked":2}}}}"#,
                100 * (c + 1)
            ));
        }
    }

    format!(
        r#"{{"stages":[{}],"paths":[{}],"goals":[{}],"campaigns":[{}]}}"#,
        stages.join(","),
        paths.join(","),
        goal_rows.join(","),
        campaigns.join(",")
    )
}

fn bench_config() -> Config {
    let mut config = Config::default();
    config.layout.fast_text_metrics = true;
    config
}

fn sizes() -> [(&'static str, JourneyDataset); 3] {
    let load = |stages, goals| {
        parse_dataset(&generated_dataset(stages, goals)).expect("generated dataset should parse")
    };
    [
        ("small", load(2, 6)),
        ("medium", load(8, 24)),
        ("large", load(32, 96)),
    ]
}

fn bench_layout(c: &mut Criterion) {
    let config = bench_config();
    let mut group = c.benchmark_group("layout");
    for (name, dataset) in sizes() {
        group.bench_with_input(BenchmarkId::new("canvas", name), &dataset, |b, data| {
            b.iter(|| {
                let (nodes, edges) = data.canvas_graph();
                let mut map = GoalMap::from_canvas_graph(
                    nodes,
                    edges,
                    config.layout.clone(),
                    config.canvas.clone(),
                );
                map.expand_all();
                black_box(map.scene());
            })
        });
        group.bench_with_input(BenchmarkId::new("sankey", name), &dataset, |b, data| {
            b.iter(|| black_box(compute_sankey_layout(&data.stages, &data.paths, &config.layout)))
        });
        group.bench_with_input(BenchmarkId::new("funnel", name), &dataset, |b, data| {
            b.iter(|| {
                black_box(aggregate_with_paths(
                    &data.stages,
                    &data.paths,
                    &config.funnel.buckets,
                    1.0,
                ))
            })
        });
    }
    group.finish();
}

fn bench_drag(c: &mut Criterion) {
    let config = bench_config();
    let mut group = c.benchmark_group("drag");
    for (name, dataset) in sizes() {
        let mut map = StageMap::new(
            dataset.stages.clone(),
            dataset.paths.clone(),
            config.layout.clone(),
            config.canvas.clone(),
        );
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                map.pointer_down(PointerEvent::primary(90.0, 90.0));
                for step in 0..20 {
                    map.pointer_move(PointerEvent::primary(90.0 + step as f32, 90.0));
                }
                black_box(map.pointer_up(PointerEvent::primary(110.0, 90.0)));
                map.reposition("s0-0", Default::default());
            })
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let config = bench_config();
    let mut group = c.benchmark_group("render_svg");
    for (name, dataset) in sizes() {
        let (nodes, edges) = dataset.canvas_graph();
        let mut map =
            GoalMap::from_canvas_graph(nodes, edges, config.layout.clone(), config.canvas.clone());
        map.expand_all();
        let scene = map.scene();
        group.bench_with_input(BenchmarkId::from_parameter(name), &scene, |b, data| {
            b.iter(|| {
                black_box(render_scene_svg(
                    data,
                    &config.theme,
                    &config.layout,
                    &config.canvas,
                ))
            })
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let config = bench_config();
    let mut group = c.benchmark_group("end_to_end");
    for (name, dataset) in sizes() {
        for view in [View::Map, View::Stages, View::Sankey, View::Funnel] {
            let options = RenderOptions {
                view,
                expand_all: true,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{view:?}").to_lowercase(), name),
                &dataset,
                |b, data| b.iter(|| black_box(render_view(data, &options, &config))),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_layout, bench_drag, bench_render, bench_end_to_end);
criterion_main!(benches);
