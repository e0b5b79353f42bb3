use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Behavioural milestone a stage represents. Unknown tokens are preserved as
/// `Other` so datasets can extend the taxonomy without a code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageType {
    Visit,
    Signup,
    Trial,
    Conversion,
    Feature,
    Upgrade,
    Churn,
    Retention,
    Other(String),
}

impl StageType {
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "visit" => Self::Visit,
            "signup" => Self::Signup,
            "trial" => Self::Trial,
            "conversion" => Self::Conversion,
            "feature" => Self::Feature,
            "upgrade" => Self::Upgrade,
            "churn" => Self::Churn,
            "retention" => Self::Retention,
            _ => Self::Other(token.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Visit => "visit",
            Self::Signup => "signup",
            Self::Trial => "trial",
            Self::Conversion => "conversion",
            Self::Feature => "feature",
            Self::Upgrade => "upgrade",
            Self::Churn => "churn",
            Self::Retention => "retention",
            Self::Other(token) => token.as_str(),
        }
    }

    /// Position in the customer lifecycle, used to order Sankey columns when the
    /// path graph has no usable topological order. Extension types sort last.
    pub fn lifecycle_rank(&self) -> usize {
        match self {
            Self::Visit => 0,
            Self::Signup => 1,
            Self::Trial => 2,
            Self::Feature => 3,
            Self::Conversion => 4,
            Self::Upgrade => 5,
            Self::Retention => 6,
            Self::Churn => 7,
            Self::Other(_) => 8,
        }
    }
}

impl From<String> for StageType {
    fn from(value: String) -> Self {
        Self::from_token(&value)
    }
}

impl From<StageType> for String {
    fn from(value: StageType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    #[serde(default)]
    pub description: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default)]
    pub position: Position,
}

/// Directed transition between two stages. `conversion_rate` is taken as given
/// and never recomputed from the counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub id: String,
    pub source: String,
    pub target: String,
    pub count: u64,
    pub conversion_rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Acquisition,
    Activation,
    Retention,
    Expansion,
    Engagement,
    Monetization,
}

impl GoalCategory {
    /// Spine order of the conversion lane, left to right. The lifecycle
    /// categories keep columns 0-3; the later additions follow expansion.
    pub const ORDER: [GoalCategory; 6] = [
        GoalCategory::Acquisition,
        GoalCategory::Activation,
        GoalCategory::Retention,
        GoalCategory::Expansion,
        GoalCategory::Engagement,
        GoalCategory::Monetization,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acquisition => "acquisition",
            Self::Activation => "activation",
            Self::Engagement => "engagement",
            Self::Retention => "retention",
            Self::Monetization => "monetization",
            Self::Expansion => "expansion",
        }
    }

    pub fn spine_index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|category| *category == self)
            .unwrap_or(Self::ORDER.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionGoal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: GoalCategory,
    pub value: f64,
    pub conversions: u64,
    pub target: f64,
    #[serde(default)]
    pub trend: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_data: Option<Vec<TrendPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversionGoal {
    pub fn progress(&self) -> f64 {
        if self.target == 0.0 {
            return 0.0;
        }
        self.value / self.target * 100.0
    }

    pub fn trend_direction(&self) -> TrendDirection {
        if self.trend > 0.0 {
            TrendDirection::Up
        } else if self.trend < 0.0 {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Draft,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    InApp,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Push => "push",
            Self::InApp => "in-app",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CampaignMetrics {
    pub sent: u64,
    pub opened: u64,
    pub clicked: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub channel: Channel,
    #[serde(default)]
    pub goal_ids: Vec<String>,
    #[serde(default)]
    pub metrics: CampaignMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn open_rate(&self) -> f64 {
        percentage(self.metrics.opened, self.metrics.sent)
    }

    pub fn click_rate(&self) -> f64 {
        percentage(self.metrics.clicked, self.metrics.sent)
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub goal_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    pub id: String,
    pub name: String,
    pub channel: Channel,
    pub sent: u64,
    #[serde(default)]
    pub goal_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionNodeData {
    pub goal_id: String,
    pub name: String,
    pub category: GoalCategory,
    pub conversions: u64,
    pub value: f64,
    pub progress: f64,
    pub trend: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignNodeData {
    pub campaign_id: String,
    pub name: String,
    pub channel: Channel,
    pub status: CampaignStatus,
    pub metrics: CampaignMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentNodeData {
    pub segment_id: String,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastNodeData {
    pub broadcast_id: String,
    pub name: String,
    pub channel: Channel,
    pub sent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Stage,
    Conversion,
    Campaign,
    Segment,
    Broadcast,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Conversion => "conversion",
            Self::Campaign => "campaign",
            Self::Segment => "segment",
            Self::Broadcast => "broadcast",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Conversion(ConversionNodeData),
    Campaign(CampaignNodeData),
    Segment(SegmentNodeData),
    Broadcast(BroadcastNodeData),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Conversion(_) => NodeKind::Conversion,
            Self::Campaign(_) => NodeKind::Campaign,
            Self::Segment(_) => NodeKind::Segment,
            Self::Broadcast(_) => NodeKind::Broadcast,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Conversion(data) => &data.name,
            Self::Campaign(data) => &data.name,
            Self::Segment(data) => &data.name,
            Self::Broadcast(data) => &data.name,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Self::Conversion(data) => data.conversions,
            Self::Campaign(data) => data.metrics.sent,
            Self::Segment(data) => data.size,
            Self::Broadcast(data) => data.sent,
        }
    }
}

/// Node of the goal/campaign journey canvas. `parents` holds the ids of the
/// conversion nodes whose expansion reveals this node.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasNode {
    pub id: String,
    pub position: Position,
    pub parents: Vec<String>,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub count: u64,
}

/// What the layout, geometry and canvas code needs from a journey node,
/// whichever schema it comes from.
pub trait MapNode {
    fn id(&self) -> &str;
    fn label(&self) -> &str;
    fn kind(&self) -> NodeKind;
    fn count(&self) -> u64;
    fn position(&self) -> Position;
    fn set_position(&mut self, position: Position);

    /// Top-level nodes are visible without any expansion.
    fn is_top_level(&self) -> bool {
        true
    }

    fn parent_ids(&self) -> &[String] {
        &[]
    }

    fn details(&self) -> Vec<(String, String)>;
}

pub trait MapEdge {
    fn id(&self) -> &str;
    fn source(&self) -> &str;
    fn target(&self) -> &str;
    fn count(&self) -> u64;

    fn label(&self) -> Option<String> {
        None
    }

    fn details(&self) -> Vec<(String, String)> {
        vec![("Count".to_string(), format_count(self.count()))]
    }
}

impl MapNode for Stage {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Stage
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn details(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("Type".to_string(), self.stage_type.to_string()),
            ("Users".to_string(), format_count(self.count)),
        ];
        if let Some(value) = self.value {
            rows.push(("Value".to_string(), format_money(value)));
        }
        if !self.description.is_empty() {
            rows.push(("Description".to_string(), self.description.clone()));
        }
        rows
    }
}

impl MapEdge for Path {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn label(&self) -> Option<String> {
        Some(format!("{}%", format_rate(self.conversion_rate)))
    }

    fn details(&self) -> Vec<(String, String)> {
        vec![
            ("Users".to_string(), format_count(self.count)),
            (
                "Conversion".to_string(),
                format!("{}%", format_rate(self.conversion_rate)),
            ),
        ]
    }
}

impl MapNode for CanvasNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        self.data.name()
    }

    fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    fn count(&self) -> u64 {
        self.data.count()
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn is_top_level(&self) -> bool {
        matches!(self.data, NodeData::Conversion(_))
    }

    fn parent_ids(&self) -> &[String] {
        &self.parents
    }

    fn details(&self) -> Vec<(String, String)> {
        match &self.data {
            NodeData::Conversion(data) => vec![
                ("Category".to_string(), data.category.as_str().to_string()),
                ("Conversions".to_string(), format_count(data.conversions)),
                ("Value".to_string(), format_money(data.value)),
                ("Progress".to_string(), format!("{:.0}%", data.progress)),
                ("Trend".to_string(), format!("{:+.1}%", data.trend)),
            ],
            NodeData::Campaign(data) => vec![
                ("Channel".to_string(), data.channel.as_str().to_string()),
                ("Status".to_string(), format!("{:?}", data.status).to_lowercase()),
                ("Sent".to_string(), format_count(data.metrics.sent)),
                ("Opened".to_string(), format_count(data.metrics.opened)),
                ("Clicked".to_string(), format_count(data.metrics.clicked)),
            ],
            NodeData::Segment(data) => vec![("Size".to_string(), format_count(data.size))],
            NodeData::Broadcast(data) => vec![
                ("Channel".to_string(), data.channel.as_str().to_string()),
                ("Sent".to_string(), format_count(data.sent)),
            ],
        }
    }
}

impl MapEdge for CanvasEdge {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn count(&self) -> u64 {
        self.count
    }
}

/// Thousands-grouped integer, e.g. `25,000`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${}", format_count(value.abs().round() as u64))
}

fn format_rate(rate: f32) -> String {
    if rate.fract() == 0.0 {
        format!("{rate:.0}")
    } else {
        format!("{rate:.1}")
    }
}
