#[cfg(feature = "cli")]
pub mod cli;
pub mod canvas;
pub mod config;
pub mod dataset;
pub mod funnel;
pub mod layout;
pub mod layout_dump;
pub mod model;
pub mod render;
pub mod store;
pub mod text_metrics;
pub mod theme;
pub mod view;

#[cfg(feature = "cli")]
pub use cli::run;
pub use canvas::{CanvasEvent, GoalMap, JourneyCanvas, PointerEvent, Scene, Selection, StageMap};
pub use config::{Config, load_config, parse_config};
pub use dataset::{DataError, JourneyDataset, parse_dataset};
pub use funnel::{Bucket, BucketDef, TimeRange, aggregate, conversion_rate};
pub use view::{RenderOptions, View, ViewLayout, layout_view, render_view};

/// Parses a dataset and draws one view of it.
pub fn render_journey_svg(
    input: &str,
    options: &RenderOptions,
    config: &Config,
) -> Result<String, DataError> {
    let dataset = parse_dataset(input)?;
    Ok(render_view(&dataset, options, config))
}
