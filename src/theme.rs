use crate::model::NodeKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: String,
    pub muted_text_color: String,
    pub line_color: String,
    pub highlight_color: String,
    pub background: String,
    pub panel_background: String,
    pub panel_border: String,
    pub stage_color: String,
    pub conversion_color: String,
    pub campaign_color: String,
    pub segment_color: String,
    pub broadcast_color: String,
    pub funnel_colors: Vec<String>,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            text_color: "#333333".to_string(),
            muted_text_color: "#666666".to_string(),
            line_color: "#8C8C8C".to_string(),
            highlight_color: "#9370DB".to_string(),
            background: "#FFFFFF".to_string(),
            panel_background: "#FFFFDE".to_string(),
            panel_border: "#AAAA33".to_string(),
            stage_color: "#ECECFF".to_string(),
            conversion_color: "#ECECFF".to_string(),
            campaign_color: "#FFF2CC".to_string(),
            segment_color: "#DAE8FC".to_string(),
            broadcast_color: "#F8CECC".to_string(),
            funnel_colors: vec![
                "#4e79a7".to_string(),
                "#f28e2c".to_string(),
                "#e15759".to_string(),
                "#76b7b2".to_string(),
                "#59a14f".to_string(),
                "#edc949".to_string(),
            ],
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            text_color: "#1C2430".to_string(),
            muted_text_color: "#5B6B82".to_string(),
            line_color: "#7A8AA6".to_string(),
            highlight_color: "#3B82F6".to_string(),
            background: "#FFFFFF".to_string(),
            panel_background: "#F7FAFF".to_string(),
            panel_border: "#D7E0F0".to_string(),
            stage_color: "#EEF2F8".to_string(),
            conversion_color: "#E0ECFF".to_string(),
            campaign_color: "#FDF1DC".to_string(),
            segment_color: "#E3F6EC".to_string(),
            broadcast_color: "#F9E3EA".to_string(),
            funnel_colors: vec![
                "#6366F1".to_string(),
                "#3B82F6".to_string(),
                "#06B6D4".to_string(),
                "#10B981".to_string(),
                "#F59E0B".to_string(),
                "#EF4444".to_string(),
            ],
        }
    }

    pub fn node_fill(&self, kind: NodeKind) -> &str {
        match kind {
            NodeKind::Stage => &self.stage_color,
            NodeKind::Conversion => &self.conversion_color,
            NodeKind::Campaign => &self.campaign_color,
            NodeKind::Segment => &self.segment_color,
            NodeKind::Broadcast => &self.broadcast_color,
        }
    }

    pub fn funnel_color(&self, idx: usize) -> &str {
        if self.funnel_colors.is_empty() {
            return &self.highlight_color;
        }
        &self.funnel_colors[idx % self.funnel_colors.len()]
    }
}
