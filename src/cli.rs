use crate::config::load_config;
use crate::dataset::parse_dataset;
use crate::funnel::TimeRange;
use crate::layout_dump::write_layout_dump;
use crate::render::write_output_svg;
use crate::view::{RenderOptions, View, layout_view};
use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "jmr", version, about = "Customer journey map renderer")]
pub struct Args {
    /// Input dataset (.json / .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Which view to draw
    #[arg(short = 'v', long = "view", value_enum, default_value = "map")]
    pub view: View,

    /// Time range for the funnel view
    #[arg(
        short = 't',
        long = "timeRange",
        value_parser = parse_time_range,
        default_value = "90days"
    )]
    pub time_range: TimeRange,

    /// Config JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Expand a goal node (goal id or node id); repeatable
    #[arg(long = "expand")]
    pub expand: Vec<String>,

    /// Expand every goal node
    #[arg(long = "expandAll")]
    pub expand_all: bool,

    /// Zoom factor, clamped to the configured range
    #[arg(long = "zoom")]
    pub zoom: Option<f32>,

    /// Select a node or edge and show its details panel
    #[arg(long = "select")]
    pub select: Option<String>,

    /// Write the computed layout as JSON
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// More log output on stderr (repeat for trace)
    #[arg(long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

impl Args {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            view: self.view,
            time_range: self.time_range,
            expand: self.expand.clone(),
            expand_all: self.expand_all,
            zoom: self.zoom,
            select: self.select.clone(),
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    execute(&args)
}

pub fn execute(args: &Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;

    let input = read_input(args.input.as_deref())?;
    let dataset = parse_dataset(&input)?;
    let layout = layout_view(&dataset, &args.render_options(), &config);

    if let Some(path) = &args.dump_layout {
        write_layout_dump(path, &layout.dump())?;
        tracing::debug!(path = %path.display(), "layout dump written");
    }

    let svg = layout.to_svg(&config);
    match args.output_format {
        OutputFormat::Svg => {
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&svg, &output, &config)?;
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &crate::config::Config) -> Result<()> {
    crate::render::write_output_png(svg, output, &config.render, &config.theme)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &crate::config::Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

/// Logs go to stderr so SVG written to stdout stays clean. `RUST_LOG` wins
/// over `--verbose`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("journey_map_renderer={default_level}").into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn parse_time_range(raw: &str) -> Result<TimeRange, String> {
    TimeRange::from_token(raw).ok_or_else(|| {
        let known: Vec<&str> = TimeRange::ALL_RANGES.iter().map(|range| range.as_str()).collect();
        format!("unknown time range `{raw}` (expected one of {})", known.join(", "))
    })
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!(
        "Output path required for {} output",
        ext
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_flag_set() {
        let args = Args::try_parse_from([
            "jmr",
            "-i",
            "data.json",
            "-v",
            "funnel",
            "-t",
            "7days",
            "--expand",
            "g1",
            "--expand",
            "g2",
            "--expandAll",
            "--zoom",
            "1.5",
            "--select",
            "c1",
            "--dumpLayout",
            "layout.json",
            "--verbose",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(args.view, View::Funnel);
        assert_eq!(args.time_range, TimeRange::SevenDays);
        assert_eq!(args.expand, vec!["g1", "g2"]);
        assert_eq!(args.verbose, 2);
        let options = args.render_options();
        assert!(options.expand_all);
        assert_eq!(options.zoom, Some(1.5));
        assert_eq!(options.select.as_deref(), Some("c1"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::try_parse_from(["jmr"]).unwrap();
        assert_eq!(args.view, View::Map);
        assert_eq!(args.time_range, TimeRange::NinetyDays);
        assert_eq!(args.output_format, OutputFormat::Svg);
        assert_eq!(args.width, 1200.0);
    }

    #[test]
    fn rejects_unknown_time_range() {
        let err = parse_time_range("fortnight").unwrap_err();
        assert!(err.contains("7days"));
        assert!(Args::try_parse_from(["jmr", "-t", "fortnight"]).is_err());
    }

    #[test]
    fn png_needs_output_path() {
        assert!(ensure_output(&None, "png").is_err());
    }

    #[test]
    fn executes_into_files() {
        let dir = std::env::temp_dir().join(format!("jmr-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("data.json");
        std::fs::write(
            &input,
            r#"{"stages":[{"id":"a","name":"A","type":"visit","count":10,"position":{"x":0,"y":0}}],"paths":[]}"#,
        )
        .unwrap();
        let output = dir.join("out.svg");
        let dump = dir.join("layout.json");
        let input_arg = input.to_string_lossy().into_owned();
        let output_arg = output.to_string_lossy().into_owned();
        let dump_arg = dump.to_string_lossy().into_owned();
        let args = Args::try_parse_from([
            "jmr",
            "-i",
            input_arg.as_str(),
            "-o",
            output_arg.as_str(),
            "-v",
            "stages",
            "--dumpLayout",
            dump_arg.as_str(),
        ])
        .unwrap();
        execute(&args).unwrap();
        let svg = std::fs::read_to_string(&output).unwrap();
        assert!(svg.contains("<circle"));
        let dumped: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&dump).unwrap()).unwrap();
        assert_eq!(dumped["view"], "stages");
        std::fs::remove_dir_all(&dir).ok();
    }
}
