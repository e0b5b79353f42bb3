use chrono::Utc;
use thiserror::Error;

use crate::dataset::JourneyDataset;
use crate::model::{
    Campaign, CampaignMetrics, CampaignStatus, Channel, ConversionGoal, GoalCategory, TrendPoint,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown goal `{0}`")]
    UnknownGoal(String),
    #[error("unknown campaign `{0}`")]
    UnknownCampaign(String),
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub name: String,
    pub description: String,
    pub category: GoalCategory,
    pub value: f64,
    pub conversions: u64,
    pub target: f64,
}

#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<GoalCategory>,
    pub value: Option<f64>,
    pub conversions: Option<u64>,
    pub target: Option<f64>,
    pub trend: Option<f64>,
    pub trend_data: Option<Vec<TrendPoint>>,
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub status: CampaignStatus,
    pub channel: Channel,
    pub goal_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub status: Option<CampaignStatus>,
    pub channel: Option<Channel>,
    pub goal_ids: Option<Vec<String>>,
    pub metrics: Option<CampaignMetrics>,
}

/// In-memory home of goals and campaigns. Records are only created through
/// `add_*` and changed through partial `update_*` merges; nothing is deleted.
#[derive(Debug, Clone, Default)]
pub struct GoalStore {
    goals: Vec<ConversionGoal>,
    campaigns: Vec<Campaign>,
    next_id: u64,
}

impl GoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from a dataset's goals and campaigns.
    pub fn from_dataset(dataset: &JourneyDataset) -> Self {
        Self {
            goals: dataset.goals.clone(),
            campaigns: dataset.campaigns.clone(),
            next_id: 0,
        }
    }

    pub fn goals(&self) -> &[ConversionGoal] {
        &self.goals
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn goal(&self, id: &str) -> Option<&ConversionGoal> {
        self.goals.iter().find(|goal| goal.id == id)
    }

    pub fn campaign(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|campaign| campaign.id == id)
    }

    /// Campaigns linked to the given goal.
    pub fn campaigns_for_goal<'a>(
        &'a self,
        goal_id: &'a str,
    ) -> impl Iterator<Item = &'a Campaign> {
        self.campaigns
            .iter()
            .filter(move |campaign| campaign.goal_ids.iter().any(|id| id == goal_id))
    }

    pub fn add_goal(&mut self, goal: NewGoal) -> &ConversionGoal {
        let id = self.fresh_id("goal", |store, id| store.goal(id).is_some());
        self.goals.push(ConversionGoal {
            id,
            name: goal.name,
            description: goal.description,
            category: goal.category,
            value: goal.value,
            conversions: goal.conversions,
            target: goal.target,
            trend: 0.0,
            trend_data: None,
            created_at: Some(Utc::now()),
        });
        let created = &self.goals[self.goals.len() - 1];
        tracing::debug!(goal = created.id.as_str(), "goal added");
        created
    }

    pub fn update_goal(
        &mut self,
        id: &str,
        update: GoalUpdate,
    ) -> Result<&ConversionGoal, StoreError> {
        let goal = self
            .goals
            .iter_mut()
            .find(|goal| goal.id == id)
            .ok_or_else(|| StoreError::UnknownGoal(id.to_string()))?;
        if let Some(v) = update.name {
            goal.name = v;
        }
        if let Some(v) = update.description {
            goal.description = v;
        }
        if let Some(v) = update.category {
            goal.category = v;
        }
        if let Some(v) = update.value {
            goal.value = v;
        }
        if let Some(v) = update.conversions {
            goal.conversions = v;
        }
        if let Some(v) = update.target {
            goal.target = v;
        }
        if let Some(v) = update.trend {
            goal.trend = v;
        }
        if update.trend_data.is_some() {
            goal.trend_data = update.trend_data;
        }
        Ok(goal)
    }

    pub fn add_campaign(&mut self, campaign: NewCampaign) -> &Campaign {
        let id = self.fresh_id("campaign", |store, id| store.campaign(id).is_some());
        self.campaigns.push(Campaign {
            id,
            name: campaign.name,
            status: campaign.status,
            channel: campaign.channel,
            goal_ids: campaign.goal_ids,
            metrics: CampaignMetrics::default(),
            created_at: Some(Utc::now()),
        });
        let created = &self.campaigns[self.campaigns.len() - 1];
        tracing::debug!(campaign = created.id.as_str(), "campaign added");
        created
    }

    pub fn update_campaign(
        &mut self,
        id: &str,
        update: CampaignUpdate,
    ) -> Result<&Campaign, StoreError> {
        let campaign = self
            .campaigns
            .iter_mut()
            .find(|campaign| campaign.id == id)
            .ok_or_else(|| StoreError::UnknownCampaign(id.to_string()))?;
        if let Some(v) = update.name {
            campaign.name = v;
        }
        if let Some(v) = update.status {
            campaign.status = v;
        }
        if let Some(v) = update.channel {
            campaign.channel = v;
        }
        if let Some(v) = update.goal_ids {
            campaign.goal_ids = v;
        }
        if let Some(v) = update.metrics {
            campaign.metrics = v;
        }
        Ok(campaign)
    }

    /// Copies the current goals and campaigns back into a dataset, keeping its
    /// stages, paths, segments and broadcasts.
    pub fn apply_to(&self, dataset: &mut JourneyDataset) {
        dataset.goals = self.goals.clone();
        dataset.campaigns = self.campaigns.clone();
    }

    fn fresh_id(&mut self, prefix: &str, taken: impl Fn(&Self, &str) -> bool) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{prefix}-{}", self.next_id);
            if !taken(&*self, &id) {
                return id;
            }
        }
    }
}
