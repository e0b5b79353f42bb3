pub mod geometry;
mod sankey;

pub use geometry::*;
pub use sankey::*;

use std::collections::HashMap;

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::model::{CanvasNode, MapNode, NodeData, NodeKind, Position};

/// Assigns every canvas node its starting position.
///
/// Conversion nodes sit on the central spine, one column per goal category in
/// lifecycle order, stacked downwards within a category. Campaign, segment and
/// broadcast nodes each get their own horizontal lane and line up under (or
/// over) the first conversion node they relate to. Nodes with no resolvable
/// relation are placed at an incrementing offset from the left edge of their
/// lane. The result only depends on the input order and node data.
pub fn layout_canvas_nodes(nodes: &mut [CanvasNode], config: &LayoutConfig) {
    let mut category_fill: HashMap<usize, usize> = HashMap::new();
    let mut conversion_positions: HashMap<String, Position> = HashMap::new();

    for node in nodes.iter_mut() {
        let NodeData::Conversion(data) = &node.data else {
            continue;
        };
        let column = data.category.spine_index();
        let row = category_fill.entry(column).or_insert(0);
        node.position = Position::new(
            config.spine_start_x + column as f32 * config.spine_pitch,
            config.spine_y + *row as f32 * config.category_stack_pitch,
        );
        *row += 1;
        conversion_positions.insert(node.id.clone(), node.position);
    }

    let mut lane_fill: HashMap<(NodeKind, String), usize> = HashMap::new();
    let mut fallback_fill: HashMap<NodeKind, usize> = HashMap::new();

    for node in nodes.iter_mut() {
        let kind = node.data.kind();
        let lane_y = match kind {
            NodeKind::Campaign => config.campaign_lane_y,
            NodeKind::Segment => config.segment_lane_y,
            NodeKind::Broadcast => config.broadcast_lane_y,
            NodeKind::Conversion | NodeKind::Stage => continue,
        };
        let anchor = node.parents.iter().find_map(|parent| {
            conversion_positions
                .get(parent)
                .map(|position| (parent.clone(), *position))
        });
        node.position = match anchor {
            Some((parent, position)) => {
                let slot = lane_fill.entry((kind, parent)).or_insert(0);
                let x = position.x + *slot as f32 * config.lane_pitch;
                *slot += 1;
                Position::new(x, lane_y)
            }
            None => {
                let slot = fallback_fill.entry(kind).or_insert(0);
                let x = config.fallback_start_x + *slot as f32 * config.lane_pitch;
                *slot += 1;
                tracing::debug!(
                    node = node.id.as_str(),
                    kind = kind.as_str(),
                    "no related goal on canvas, using fallback lane slot"
                );
                Position::new(x, lane_y)
            }
        };
    }
}

/// Overwrites a node's position. Unknown ids are ignored; returns whether a
/// node was updated.
pub fn reposition<N: MapNode>(nodes: &mut [N], node_id: &str, position: Position) -> bool {
    match nodes.iter_mut().find(|node| node.id() == node_id) {
        Some(node) => {
            node.set_position(position);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.max_y - self.min_y).max(0.0)
    }
}

/// Bounding box of the given nodes, each sized by `sizer`. `None` when there
/// are no nodes.
pub fn node_bounds<'a, N, I>(nodes: I, sizer: &NodeSizer) -> Option<Bounds>
where
    N: MapNode + 'a,
    I: IntoIterator<Item = &'a N>,
{
    let mut bounds: Option<Bounds> = None;
    for node in nodes {
        let position = node.position();
        let size = sizer.size(node.count());
        let next = Bounds {
            min_x: position.x,
            min_y: position.y,
            max_x: position.x + size,
            max_y: position.y + size,
        };
        bounds = Some(match bounds {
            Some(current) => Bounds {
                min_x: current.min_x.min(next.min_x),
                min_y: current.min_y.min(next.min_y),
                max_x: current.max_x.max(next.max_x),
                max_y: current.max_y.max(next.max_y),
            },
            None => next,
        });
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BroadcastNodeData, CampaignMetrics, CampaignNodeData, CampaignStatus, Channel,
        ConversionNodeData, GoalCategory, SegmentNodeData, Stage, StageType,
    };

    fn conversion(id: &str, category: GoalCategory) -> CanvasNode {
        CanvasNode {
            id: id.to_string(),
            position: Position::default(),
            parents: Vec::new(),
            data: NodeData::Conversion(ConversionNodeData {
                goal_id: id.to_string(),
                name: id.to_string(),
                category,
                conversions: 100,
                value: 0.0,
                progress: 0.0,
                trend: 0.0,
            }),
        }
    }

    fn campaign(id: &str, parents: &[&str]) -> CanvasNode {
        CanvasNode {
            id: id.to_string(),
            position: Position::default(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            data: NodeData::Campaign(CampaignNodeData {
                campaign_id: id.to_string(),
                name: id.to_string(),
                channel: Channel::Email,
                status: CampaignStatus::Active,
                metrics: CampaignMetrics::default(),
            }),
        }
    }

    fn position_of(nodes: &[CanvasNode], id: &str) -> Position {
        nodes.iter().find(|n| n.id == id).unwrap().position
    }

    #[test]
    fn conversion_nodes_follow_category_spine() {
        let config = LayoutConfig::default();
        let mut nodes = vec![
            conversion("expand", GoalCategory::Expansion),
            conversion("acq-1", GoalCategory::Acquisition),
            conversion("act", GoalCategory::Activation),
            conversion("acq-2", GoalCategory::Acquisition),
        ];
        layout_canvas_nodes(&mut nodes, &config);

        let acq_1 = position_of(&nodes, "acq-1");
        let acq_2 = position_of(&nodes, "acq-2");
        let act = position_of(&nodes, "act");
        let expand = position_of(&nodes, "expand");
        assert_eq!(acq_1, Position::new(100.0, 300.0));
        assert_eq!(acq_2.x, acq_1.x);
        assert!(acq_2.y > acq_1.y);
        assert_eq!(act.x - acq_1.x, 350.0);
        assert!(expand.x > act.x);
        assert_eq!(expand.y, 300.0);
    }

    #[test]
    fn lifecycle_categories_take_consecutive_columns() {
        let config = LayoutConfig::default();
        let mut nodes = vec![
            conversion("acq", GoalCategory::Acquisition),
            conversion("act", GoalCategory::Activation),
            conversion("ret", GoalCategory::Retention),
            conversion("exp", GoalCategory::Expansion),
            conversion("eng", GoalCategory::Engagement),
            conversion("mon", GoalCategory::Monetization),
        ];
        layout_canvas_nodes(&mut nodes, &config);

        let xs: Vec<f32> = ["acq", "act", "ret", "exp"]
            .iter()
            .map(|id| position_of(&nodes, id).x)
            .collect();
        assert_eq!(xs, vec![100.0, 450.0, 800.0, 1150.0]);
        assert_eq!(position_of(&nodes, "eng").x, 1500.0);
        assert_eq!(position_of(&nodes, "mon").x, 1850.0);
        assert!(nodes.iter().all(|node| node.position.y == 300.0));
    }

    #[test]
    fn lanes_and_fallback_offsets() {
        let config = LayoutConfig::default();
        let mut nodes = vec![
            conversion("goal", GoalCategory::Activation),
            campaign("c1", &["goal"]),
            campaign("c2", &["missing", "goal"]),
            campaign("orphan-1", &[]),
            campaign("orphan-2", &["missing"]),
            CanvasNode {
                id: "b1".to_string(),
                position: Position::default(),
                parents: vec!["goal".to_string()],
                data: NodeData::Broadcast(BroadcastNodeData {
                    broadcast_id: "b1".to_string(),
                    name: "Launch".to_string(),
                    channel: Channel::Push,
                    sent: 10,
                }),
            },
            CanvasNode {
                id: "s1".to_string(),
                position: Position::default(),
                parents: vec!["goal".to_string()],
                data: NodeData::Segment(SegmentNodeData {
                    segment_id: "s1".to_string(),
                    name: "Power users".to_string(),
                    size: 40,
                }),
            },
        ];
        layout_canvas_nodes(&mut nodes, &config);

        let goal = position_of(&nodes, "goal");
        assert_eq!(position_of(&nodes, "c1"), Position::new(goal.x, 500.0));
        assert_eq!(
            position_of(&nodes, "c2"),
            Position::new(goal.x + config.lane_pitch, 500.0)
        );
        assert_eq!(position_of(&nodes, "orphan-1"), Position::new(100.0, 500.0));
        assert_eq!(
            position_of(&nodes, "orphan-2"),
            Position::new(100.0 + config.lane_pitch, 500.0)
        );
        assert_eq!(position_of(&nodes, "b1"), Position::new(goal.x, 700.0));
        assert_eq!(position_of(&nodes, "s1"), Position::new(goal.x, 100.0));
    }

    #[test]
    fn layout_is_deterministic() {
        let config = LayoutConfig::default();
        let build = || {
            vec![
                conversion("a", GoalCategory::Retention),
                campaign("c", &["a"]),
                conversion("b", GoalCategory::Retention),
            ]
        };
        let mut first = build();
        let mut second = build();
        layout_canvas_nodes(&mut first, &config);
        layout_canvas_nodes(&mut second, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn reposition_is_idempotent_and_ignores_unknown_ids() {
        let mut stages = vec![Stage {
            id: "visit".to_string(),
            name: "Visit".to_string(),
            stage_type: StageType::Visit,
            description: String::new(),
            count: 10,
            value: None,
            position: Position::new(1.0, 2.0),
        }];
        assert!(reposition(&mut stages, "visit", Position::new(40.0, 50.0)));
        let once = stages.clone();
        assert!(reposition(&mut stages, "visit", Position::new(40.0, 50.0)));
        assert_eq!(stages, once);
        assert!(!reposition(&mut stages, "nope", Position::new(0.0, 0.0)));
        assert_eq!(stages, once);
    }

    #[test]
    fn bounds_cover_sized_nodes() {
        let config = LayoutConfig::default();
        let mut nodes = vec![
            conversion("a", GoalCategory::Acquisition),
            conversion("b", GoalCategory::Expansion),
        ];
        layout_canvas_nodes(&mut nodes, &config);
        let sizer = NodeSizer::new(nodes.iter().map(|n| n.count()), &config);
        let bounds = node_bounds(&nodes, &sizer).unwrap();
        assert_eq!(bounds.min_x, 100.0);
        assert_eq!(bounds.max_x, position_of(&nodes, "b").x + config.max_node_size);
        assert!(node_bounds::<CanvasNode, _>(&[], &sizer).is_none());
    }
}
