use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    Broadcast, BroadcastNodeData, Campaign, CampaignNodeData, CanvasEdge, CanvasNode,
    ConversionGoal, ConversionNodeData, GoalCategory, NodeData, Path, Position, Segment,
    SegmentNodeData, Stage,
};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid dataset: {0}")]
    Parse(#[from] json5::Error),
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("path `{id}` has conversion rate {rate}, expected 0-100")]
    ConversionRateOutOfRange { id: String, rate: f32 },
}

/// Everything the journey views consume, in the shape the sample data uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyDataset {
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub paths: Vec<Path>,
    #[serde(default)]
    pub goals: Vec<ConversionGoal>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub broadcasts: Vec<Broadcast>,
}

/// Parses a JSON or JSON5 dataset and checks id uniqueness and conversion rate
/// ranges. Dangling path references are left in place; the views skip them.
pub fn parse_dataset(input: &str) -> Result<JourneyDataset, DataError> {
    let dataset: JourneyDataset = json5::from_str(input)?;
    validate(&dataset)?;
    tracing::debug!(
        stages = dataset.stages.len(),
        paths = dataset.paths.len(),
        goals = dataset.goals.len(),
        campaigns = dataset.campaigns.len(),
        "loaded journey dataset"
    );
    Ok(dataset)
}

fn validate(dataset: &JourneyDataset) -> Result<(), DataError> {
    ensure_unique("stage", dataset.stages.iter().map(|s| s.id.as_str()))?;
    ensure_unique("path", dataset.paths.iter().map(|p| p.id.as_str()))?;
    ensure_unique("goal", dataset.goals.iter().map(|g| g.id.as_str()))?;
    ensure_unique("campaign", dataset.campaigns.iter().map(|c| c.id.as_str()))?;
    ensure_unique("segment", dataset.segments.iter().map(|s| s.id.as_str()))?;
    ensure_unique("broadcast", dataset.broadcasts.iter().map(|b| b.id.as_str()))?;
    for path in &dataset.paths {
        if !(0.0..=100.0).contains(&path.conversion_rate) {
            return Err(DataError::ConversionRateOutOfRange {
                id: path.id.clone(),
                rate: path.conversion_rate,
            });
        }
    }
    Ok(())
}

fn ensure_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), DataError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DataError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

pub fn goal_node_id(goal_id: &str) -> String {
    format!("goal-{goal_id}")
}

pub fn campaign_node_id(campaign_id: &str) -> String {
    format!("campaign-{campaign_id}")
}

pub fn segment_node_id(segment_id: &str) -> String {
    format!("segment-{segment_id}")
}

pub fn broadcast_node_id(broadcast_id: &str) -> String {
    format!("broadcast-{broadcast_id}")
}

/// Derives the goal/campaign canvas graph.
///
/// One conversion node per goal, chained category to category along the
/// lifecycle (every goal of one populated category links to every goal of the
/// next, weighted by the target goal's conversions). Campaigns, segments and
/// broadcasts link into each goal they reference; links to unknown goals are
/// still emitted and dropped at render time. Positions are left at the origin
/// for the layout engine.
pub fn build_canvas_graph(
    goals: &[ConversionGoal],
    campaigns: &[Campaign],
    segments: &[Segment],
    broadcasts: &[Broadcast],
) -> (Vec<CanvasNode>, Vec<CanvasEdge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    let mut by_category: BTreeMap<usize, Vec<&ConversionGoal>> = BTreeMap::new();
    for goal in goals {
        nodes.push(CanvasNode {
            id: goal_node_id(&goal.id),
            position: Position::default(),
            parents: Vec::new(),
            data: NodeData::Conversion(ConversionNodeData {
                goal_id: goal.id.clone(),
                name: goal.name.clone(),
                category: goal.category,
                conversions: goal.conversions,
                value: goal.value,
                progress: goal.progress(),
                trend: goal.trend,
            }),
        });
        by_category
            .entry(goal.category.spine_index())
            .or_default()
            .push(goal);
    }

    let columns: Vec<&Vec<&ConversionGoal>> = by_category.values().collect();
    for pair in columns.windows(2) {
        for from in pair[0] {
            for to in pair[1] {
                edges.push(CanvasEdge {
                    id: format!("flow-{}-{}", from.id, to.id),
                    source: goal_node_id(&from.id),
                    target: goal_node_id(&to.id),
                    count: to.conversions,
                });
            }
        }
    }

    for campaign in campaigns {
        let node_id = campaign_node_id(&campaign.id);
        let parents: Vec<String> = campaign.goal_ids.iter().map(|id| goal_node_id(id)).collect();
        for parent in &parents {
            edges.push(CanvasEdge {
                id: format!("{node_id}->{parent}"),
                source: node_id.clone(),
                target: parent.clone(),
                count: campaign.metrics.clicked,
            });
        }
        nodes.push(CanvasNode {
            id: node_id,
            position: Position::default(),
            parents,
            data: NodeData::Campaign(CampaignNodeData {
                campaign_id: campaign.id.clone(),
                name: campaign.name.clone(),
                channel: campaign.channel,
                status: campaign.status,
                metrics: campaign.metrics,
            }),
        });
    }

    for segment in segments {
        let node_id = segment_node_id(&segment.id);
        let parents: Vec<String> = segment.goal_ids.iter().map(|id| goal_node_id(id)).collect();
        for parent in &parents {
            edges.push(CanvasEdge {
                id: format!("{node_id}->{parent}"),
                source: node_id.clone(),
                target: parent.clone(),
                count: segment.size,
            });
        }
        nodes.push(CanvasNode {
            id: node_id,
            position: Position::default(),
            parents,
            data: NodeData::Segment(SegmentNodeData {
                segment_id: segment.id.clone(),
                name: segment.name.clone(),
                size: segment.size,
            }),
        });
    }

    for broadcast in broadcasts {
        let node_id = broadcast_node_id(&broadcast.id);
        let parents: Vec<String> = broadcast.goal_ids.iter().map(|id| goal_node_id(id)).collect();
        for parent in &parents {
            edges.push(CanvasEdge {
                id: format!("{node_id}->{parent}"),
                source: node_id.clone(),
                target: parent.clone(),
                count: broadcast.sent,
            });
        }
        nodes.push(CanvasNode {
            id: node_id,
            position: Position::default(),
            parents,
            data: NodeData::Broadcast(BroadcastNodeData {
                broadcast_id: broadcast.id.clone(),
                name: broadcast.name.clone(),
                channel: broadcast.channel,
                sent: broadcast.sent,
            }),
        });
    }

    (nodes, edges)
}

impl JourneyDataset {
    pub fn canvas_graph(&self) -> (Vec<CanvasNode>, Vec<CanvasEdge>) {
        build_canvas_graph(&self.goals, &self.campaigns, &self.segments, &self.broadcasts)
    }

    pub fn goals_in(&self, category: GoalCategory) -> impl Iterator<Item = &ConversionGoal> {
        self.goals.iter().filter(move |goal| goal.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CampaignMetrics, CampaignStatus, Channel, StageType};

    const SAMPLE: &str = r#"{
        // JSON5 comments and trailing commas are accepted
        stages: [
            { id: "visit", name: "Visit", type: "visit", description: "", count: 100000, position: { x: 100, y: 200 } },
            { id: "signup", name: "Sign up", type: "signup", description: "", count: 25000, value: 0, position: { x: 400, y: 200 } },
        ],
        paths: [
            { id: "p1", source: "visit", target: "signup", count: 25000, conversionRate: 25 },
            { id: "p2", source: "signup", target: "ghost", count: 10, conversionRate: 1 },
        ],
        goals: [
            { id: "g1", name: "Signups", category: "acquisition", value: 500, conversions: 120, target: 1000, trend: 4.2 },
        ],
        campaigns: [
            { id: "c1", name: "Welcome", status: "active", channel: "in-app", goalIds: ["g1"],
              metrics: { sent: 1000, opened: 400, clicked: 90 } },
        ],
    }"#;

    #[test]
    fn parses_sample_shape() {
        let dataset = parse_dataset(SAMPLE).unwrap();
        assert_eq!(dataset.stages.len(), 2);
        assert_eq!(dataset.stages[1].stage_type, StageType::Signup);
        assert_eq!(dataset.paths[0].conversion_rate, 25.0);
        assert_eq!(dataset.campaigns[0].channel, Channel::InApp);
        assert_eq!(dataset.goals_in(GoalCategory::Acquisition).count(), 1);
        assert!(dataset.segments.is_empty());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let input = r#"{ stages: [
            { id: "a", name: "A", type: "visit", count: 1 },
            { id: "a", name: "B", type: "signup", count: 1 },
        ] }"#;
        let err = parse_dataset(input).unwrap_err();
        assert!(matches!(err, DataError::DuplicateId { kind: "stage", .. }));
        assert_eq!(err.to_string(), "duplicate stage id `a`");
    }

    #[test]
    fn rejects_out_of_range_conversion_rate() {
        let input = r#"{ paths: [{ id: "p", source: "a", target: "b", count: 1, conversionRate: 140 }] }"#;
        assert!(matches!(
            parse_dataset(input),
            Err(DataError::ConversionRateOutOfRange { .. })
        ));
    }

    #[test]
    fn reports_parse_errors() {
        assert!(matches!(parse_dataset("{ stages: [ }"), Err(DataError::Parse(_))));
    }

    fn goal(id: &str, category: GoalCategory, conversions: u64) -> ConversionGoal {
        ConversionGoal {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category,
            value: 0.0,
            conversions,
            target: 100.0,
            trend: 0.0,
            trend_data: None,
            created_at: None,
        }
    }

    #[test]
    fn canvas_graph_chains_categories_and_links_children() {
        let goals = vec![
            goal("a1", GoalCategory::Acquisition, 500),
            goal("r1", GoalCategory::Retention, 40),
            goal("a2", GoalCategory::Acquisition, 300),
        ];
        let campaigns = vec![Campaign {
            id: "c1".to_string(),
            name: "Nurture".to_string(),
            status: CampaignStatus::Active,
            channel: Channel::Email,
            goal_ids: vec!["r1".to_string(), "gone".to_string()],
            metrics: CampaignMetrics {
                sent: 100,
                opened: 50,
                clicked: 7,
            },
            created_at: None,
        }];
        let (nodes, edges) = build_canvas_graph(&goals, &campaigns, &[], &[]);
        assert_eq!(nodes.len(), 4);

        let flows: Vec<&CanvasEdge> = edges.iter().filter(|e| e.id.starts_with("flow-")).collect();
        assert_eq!(flows.len(), 2);
        assert!(flows.iter().all(|e| e.target == "goal-r1" && e.count == 40));

        let campaign_node = nodes.iter().find(|n| n.id == "campaign-c1").unwrap();
        assert_eq!(campaign_node.parents, vec!["goal-r1", "goal-gone"]);
        let campaign_edges: Vec<&CanvasEdge> =
            edges.iter().filter(|e| e.source == "campaign-c1").collect();
        assert_eq!(campaign_edges.len(), 2);
        assert!(campaign_edges.iter().all(|e| e.count == 7));
    }
}
