use crate::canvas::{DetailsPanel, Scene};
use crate::funnel::{Bucket, TimeRange};
use crate::layout::{Bounds, SankeyLayout};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Positioned output of one view, as JSON for debugging and golden comparisons.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum LayoutDump<'a> {
    Map(SceneDump<'a>),
    Stages(SceneDump<'a>),
    Sankey(&'a SankeyLayout),
    Funnel(FunnelDump<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDump<'a> {
    pub zoom: f32,
    pub bounds: Option<Bounds>,
    pub nodes: Vec<NodeDump<'a>>,
    pub edges: Vec<EdgeDump<'a>>,
    pub details: Option<&'a DetailsPanel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump<'a> {
    pub id: &'a str,
    pub kind: &'static str,
    pub label: &'a str,
    pub count: u64,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub expanded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump<'a> {
    pub id: &'a str,
    pub source: &'a str,
    pub target: &'a str,
    pub count: u64,
    pub path: String,
    pub stroke_width: f32,
    pub opacity: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelDump<'a> {
    pub range: TimeRange,
    pub buckets: &'a [Bucket],
}

impl<'a> SceneDump<'a> {
    pub fn from_scene(scene: &'a Scene) -> Self {
        let nodes = scene
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: &node.id,
                kind: node.kind.as_str(),
                label: &node.label,
                count: node.count,
                x: node.x,
                y: node.y,
                size: node.size,
                expanded: node.expanded,
            })
            .collect();
        let edges = scene
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: &edge.id,
                source: &edge.source,
                target: &edge.target,
                count: edge.count,
                path: edge.geometry.path_data(),
                stroke_width: edge.geometry.stroke_width,
                opacity: edge.opacity,
            })
            .collect();
        SceneDump {
            zoom: scene.zoom,
            bounds: scene.bounds,
            nodes,
            edges,
            details: scene.details.as_ref(),
        }
    }
}

impl<'a> LayoutDump<'a> {
    pub fn funnel(range: TimeRange, buckets: &'a [Bucket]) -> Self {
        LayoutDump::Funnel(FunnelDump { range, buckets })
    }
}

pub fn write_layout_dump(path: &Path, dump: &LayoutDump<'_>) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
