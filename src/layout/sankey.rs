use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::model::{Path, Stage};

use super::geometry::{FlowCurve, max_count, stroke_width};

#[derive(Debug, Clone, Serialize)]
pub struct SankeyNodeLayout {
    pub id: String,
    pub label: String,
    pub count: u64,
    pub rank: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SankeyLinkLayout {
    pub id: String,
    pub source: String,
    pub target: String,
    pub count: u64,
    pub conversion_rate: f32,
    pub stroke_width: f32,
    pub curve: FlowCurve,
}

#[derive(Debug, Clone, Serialize)]
pub struct SankeyLayout {
    pub width: f32,
    pub height: f32,
    pub node_width: f32,
    pub columns: usize,
    pub nodes: Vec<SankeyNodeLayout>,
    pub links: Vec<SankeyLinkLayout>,
}

/// Left-to-right flow layout of the stage graph.
///
/// Columns are longest-path ranks over the paths. When the paths contain a
/// cycle (churned users flowing back to a visit, say) the ranks come from the
/// stage type's lifecycle order instead. Node heights are proportional to the
/// stage count. Self-loops and paths with a missing endpoint are not drawn.
pub fn compute_sankey_layout(
    stages: &[Stage],
    paths: &[Path],
    config: &LayoutConfig,
) -> SankeyLayout {
    let sankey = &config.sankey;
    let node_count = stages.len();
    let mut id_to_idx: HashMap<&str, usize> = HashMap::new();
    for (idx, stage) in stages.iter().enumerate() {
        id_to_idx.entry(stage.id.as_str()).or_insert(idx);
    }

    struct FlowEdge<'a> {
        path: &'a Path,
        from_idx: usize,
        to_idx: usize,
    }

    let mut edges: Vec<FlowEdge<'_>> = Vec::new();
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    let mut indegree: Vec<usize> = vec![0; node_count];
    for path in paths {
        let (Some(&from_idx), Some(&to_idx)) = (
            id_to_idx.get(path.source.as_str()),
            id_to_idx.get(path.target.as_str()),
        ) else {
            tracing::debug!(path = path.id.as_str(), "dropping path with missing stage");
            continue;
        };
        if from_idx == to_idx {
            continue;
        }
        let edge_idx = edges.len();
        edges.push(FlowEdge {
            path,
            from_idx,
            to_idx,
        });
        outgoing[from_idx].push(edge_idx);
        indegree[to_idx] += 1;
    }

    let mut ranks = vec![0usize; node_count];
    let mut queue: VecDeque<usize> = indegree
        .iter()
        .enumerate()
        .filter_map(|(idx, deg)| (*deg == 0).then_some(idx))
        .collect();
    let mut topo = Vec::with_capacity(node_count);
    while let Some(node_idx) = queue.pop_front() {
        topo.push(node_idx);
        for &edge_idx in &outgoing[node_idx] {
            let to_idx = edges[edge_idx].to_idx;
            indegree[to_idx] -= 1;
            if indegree[to_idx] == 0 {
                queue.push_back(to_idx);
            }
        }
    }
    if topo.len() == node_count {
        for &node_idx in &topo {
            for &edge_idx in &outgoing[node_idx] {
                let to_idx = edges[edge_idx].to_idx;
                ranks[to_idx] = ranks[to_idx].max(ranks[node_idx] + 1);
            }
        }
    } else {
        let mut lifecycle: Vec<usize> = stages
            .iter()
            .map(|stage| stage.stage_type.lifecycle_rank())
            .collect();
        lifecycle.sort_unstable();
        lifecycle.dedup();
        for (idx, stage) in stages.iter().enumerate() {
            let rank = stage.stage_type.lifecycle_rank();
            ranks[idx] = lifecycle.binary_search(&rank).unwrap_or(0);
        }
    }

    let num_ranks = ranks.iter().copied().max().map(|max| max + 1).unwrap_or(0);
    let gap_x = if num_ranks > 1 {
        ((sankey.width - sankey.node_width * num_ranks as f32) / (num_ranks - 1) as f32).max(0.0)
    } else {
        0.0
    };

    let mut rank_nodes: Vec<Vec<usize>> = vec![Vec::new(); num_ranks];
    for idx in 0..node_count {
        rank_nodes[ranks[idx]].push(idx);
    }

    // Scale so the fullest column fits the height once its gaps are taken out.
    let mut scale = f32::INFINITY;
    for column in &rank_nodes {
        if column.is_empty() {
            continue;
        }
        let total: u64 = column.iter().map(|idx| stages[*idx].count.max(1)).sum();
        let usable = (sankey.height - sankey.node_gap * (column.len() - 1) as f32).max(1.0);
        scale = scale.min(usable / total as f32);
    }
    if !scale.is_finite() {
        scale = 0.0;
    }

    let mut node_x = vec![0.0f32; node_count];
    let mut node_y = vec![0.0f32; node_count];
    let mut node_h = vec![0.0f32; node_count];
    for (rank, column) in rank_nodes.iter().enumerate() {
        let heights: Vec<f32> = column
            .iter()
            .map(|idx| (stages[*idx].count.max(1) as f32 * scale).max(1.0))
            .collect();
        let used: f32 = heights.iter().sum::<f32>()
            + sankey.node_gap * column.len().saturating_sub(1) as f32;
        let mut y = ((sankey.height - used) / 2.0).max(0.0);
        for (slot, &idx) in column.iter().enumerate() {
            node_x[idx] = rank as f32 * (sankey.node_width + gap_x);
            node_y[idx] = y;
            node_h[idx] = heights[slot];
            y += heights[slot] + sankey.node_gap;
        }
    }

    let max_edge = max_count(edges.iter().map(|edge| edge.path.count));

    // Stack link ends along each node side in target/source order so that
    // thick links do not all attach at the same point.
    let mut out_offset = vec![0.0f32; node_count];
    let mut in_offset = vec![0.0f32; node_count];
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by(|a, b| {
        let ea = &edges[*a];
        let eb = &edges[*b];
        node_y[ea.to_idx]
            .total_cmp(&node_y[eb.to_idx])
            .then_with(|| node_y[ea.from_idx].total_cmp(&node_y[eb.from_idx]))
    });

    let mut links = vec![None; edges.len()];
    for edge_idx in order {
        let edge = &edges[edge_idx];
        let width = stroke_width(edge.path.count, max_edge, config);
        let from_h = node_h[edge.from_idx];
        let to_h = node_h[edge.to_idx];
        let start_y = node_y[edge.from_idx]
            + (out_offset[edge.from_idx] + width / 2.0).min(from_h);
        let end_y = node_y[edge.to_idx] + (in_offset[edge.to_idx] + width / 2.0).min(to_h);
        out_offset[edge.from_idx] += width;
        in_offset[edge.to_idx] += width;

        let (start_x, end_x) = if node_x[edge.from_idx] <= node_x[edge.to_idx] {
            (node_x[edge.from_idx] + sankey.node_width, node_x[edge.to_idx])
        } else {
            (node_x[edge.from_idx], node_x[edge.to_idx] + sankey.node_width)
        };

        links[edge_idx] = Some(SankeyLinkLayout {
            id: edge.path.id.clone(),
            source: edge.path.source.clone(),
            target: edge.path.target.clone(),
            count: edge.path.count,
            conversion_rate: edge.path.conversion_rate,
            stroke_width: width,
            curve: FlowCurve::new(
                (start_x, start_y),
                (end_x, end_y),
                sankey.control_fraction,
            ),
        });
    }

    let nodes = stages
        .iter()
        .enumerate()
        .map(|(idx, stage)| SankeyNodeLayout {
            id: stage.id.clone(),
            label: stage.name.clone(),
            count: stage.count,
            rank: ranks[idx],
            x: node_x[idx],
            y: node_y[idx],
            width: sankey.node_width,
            height: node_h[idx],
        })
        .collect();

    SankeyLayout {
        width: sankey.width,
        height: sankey.height,
        node_width: sankey.node_width,
        columns: num_ranks,
        nodes,
        links: links.into_iter().flatten().collect(),
    }
}
