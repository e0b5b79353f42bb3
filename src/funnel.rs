use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Path, Stage, StageType};

/// Presentation time window. There is no time-series behind it: each range only
/// scales the stage totals by a fixed multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "7days")]
    SevenDays,
    #[serde(rename = "30days")]
    ThirtyDays,
    #[serde(rename = "90days")]
    #[default]
    NinetyDays,
    #[serde(rename = "quarter")]
    Quarter,
    #[serde(rename = "year")]
    Year,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub const ALL_RANGES: [TimeRange; 6] = [
        TimeRange::SevenDays,
        TimeRange::ThirtyDays,
        TimeRange::NinetyDays,
        TimeRange::Quarter,
        TimeRange::Year,
        TimeRange::All,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "7days" | "7d" => Some(Self::SevenDays),
            "30days" | "30d" => Some(Self::ThirtyDays),
            "90days" | "90d" => Some(Self::NinetyDays),
            "quarter" => Some(Self::Quarter),
            "year" => Some(Self::Year),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SevenDays => "7days",
            Self::ThirtyDays => "30days",
            Self::NinetyDays => "90days",
            Self::Quarter => "quarter",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDef {
    pub label: String,
    pub types: Vec<StageType>,
}

impl BucketDef {
    pub fn new(label: &str, types: &[StageType]) -> Self {
        Self {
            label: label.to_string(),
            types: types.to_vec(),
        }
    }

    pub fn lifecycle_defaults() -> Vec<BucketDef> {
        vec![
            BucketDef::new("Awareness", &[StageType::Visit]),
            BucketDef::new("Acquisition", &[StageType::Signup]),
            BucketDef::new("Activation", &[StageType::Trial, StageType::Feature]),
            BucketDef::new("Conversion", &[StageType::Conversion]),
            BucketDef::new("Retention", &[StageType::Retention]),
            BucketDef::new("Expansion", &[StageType::Upgrade]),
        ]
    }

    fn claims(&self, stage_type: &StageType) -> bool {
        self.types.iter().any(|claimed| claimed == stage_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub label: String,
    pub types: Vec<StageType>,
    pub count: u64,
    pub value: f64,
    pub conversion_rate: u32,
    pub drop_off: u32,
    pub flow_to_next: u64,
}

/// Sums stage counts and values per bucket, in declaration order. Every
/// definition yields a bucket even when no stage matches it.
pub fn aggregate(stages: &[Stage], bucket_defs: &[BucketDef], time_multiplier: f64) -> Vec<Bucket> {
    let multiplier = sanitize_multiplier(time_multiplier);
    let mut buckets: Vec<Bucket> = bucket_defs
        .iter()
        .map(|def| {
            let mut count = 0u64;
            let mut value = 0.0f64;
            for stage in stages.iter().filter(|stage| def.claims(&stage.stage_type)) {
                count = count.saturating_add(stage.count);
                value += stage.value.unwrap_or(0.0);
            }
            Bucket {
                label: def.label.clone(),
                types: def.types.clone(),
                count: scale(count as f64, multiplier),
                value: (value * multiplier).round(),
                conversion_rate: 100,
                drop_off: 0,
                flow_to_next: 0,
            }
        })
        .collect();

    for idx in 0..buckets.len() {
        buckets[idx].conversion_rate = conversion_rate(&buckets, idx);
    }
    for idx in 0..buckets.len() {
        buckets[idx].drop_off = match buckets.get(idx + 1) {
            Some(next) => 100u32.saturating_sub(next.conversion_rate),
            None => 0,
        };
    }
    buckets
}

/// Like [`aggregate`], additionally filling `flow_to_next` from the transition
/// counts of paths that lead from one bucket's stage types into the next one's.
/// Paths with a dangling endpoint are ignored.
pub fn aggregate_with_paths(
    stages: &[Stage],
    paths: &[Path],
    bucket_defs: &[BucketDef],
    time_multiplier: f64,
) -> Vec<Bucket> {
    let mut buckets = aggregate(stages, bucket_defs, time_multiplier);
    let multiplier = sanitize_multiplier(time_multiplier);
    let stage_types: HashMap<&str, &StageType> = stages
        .iter()
        .map(|stage| (stage.id.as_str(), &stage.stage_type))
        .collect();

    for idx in 0..bucket_defs.len().saturating_sub(1) {
        let current = &bucket_defs[idx];
        let next = &bucket_defs[idx + 1];
        let mut flow = 0u64;
        for path in paths {
            let (Some(source_type), Some(target_type)) = (
                stage_types.get(path.source.as_str()),
                stage_types.get(path.target.as_str()),
            ) else {
                continue;
            };
            if current.claims(source_type) && next.claims(target_type) {
                flow = flow.saturating_add(path.count);
            }
        }
        buckets[idx].flow_to_next = scale(flow as f64, multiplier);
    }
    buckets
}

/// Percentage of the previous bucket's count that reached bucket `idx`.
/// The first bucket, and any bucket following an empty one, reports 100.
/// An index past the end reports 0.
pub fn conversion_rate(buckets: &[Bucket], idx: usize) -> u32 {
    let Some(bucket) = buckets.get(idx) else {
        return 0;
    };
    if idx == 0 {
        return 100;
    }
    let previous = buckets[idx - 1].count;
    if previous == 0 {
        return 100;
    }
    (bucket.count as f64 / previous as f64 * 100.0).round() as u32
}

fn sanitize_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier > 0.0 {
        multiplier
    } else {
        0.0
    }
}

fn scale(total: f64, multiplier: f64) -> u64 {
    (total * multiplier).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;

    fn stage(id: &str, stage_type: StageType, count: u64, value: Option<f64>) -> Stage {
        Stage {
            id: id.to_string(),
            name: id.to_string(),
            stage_type,
            description: String::new(),
            count,
            value,
            position: Position::default(),
        }
    }

    fn path(id: &str, source: &str, target: &str, count: u64) -> Path {
        Path {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            count,
            conversion_rate: 0.0,
        }
    }

    #[test]
    fn visit_to_signup_scenario() {
        let stages = vec![
            stage("visit", StageType::Visit, 100_000, None),
            stage("signup", StageType::Signup, 25_000, None),
        ];
        let defs = vec![
            BucketDef::new("Awareness", &[StageType::Visit]),
            BucketDef::new("Acquisition", &[StageType::Signup]),
        ];
        let buckets = aggregate(&stages, &defs, 1.0);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "Awareness");
        assert_eq!(buckets[0].count, 100_000);
        assert_eq!(buckets[1].label, "Acquisition");
        assert_eq!(buckets[1].count, 25_000);
        assert_eq!(conversion_rate(&buckets, 1), 25);
        assert_eq!(buckets[1].conversion_rate, 25);
        assert_eq!(buckets[0].drop_off, 75);
    }

    #[test]
    fn empty_buckets_are_kept_in_declaration_order() {
        let stages = vec![stage("signup", StageType::Signup, 10, Some(5.0))];
        let defs = BucketDef::lifecycle_defaults();
        let buckets = aggregate(&stages, &defs, 1.0);
        assert_eq!(buckets.len(), defs.len());
        for (bucket, def) in buckets.iter().zip(&defs) {
            assert_eq!(bucket.label, def.label);
        }
        assert_eq!(buckets[0].count, 0);
        assert_eq!(buckets[0].value, 0.0);
        assert_eq!(buckets[1].count, 10);
        // Previous bucket is empty.
        assert_eq!(buckets[1].conversion_rate, 100);
    }

    #[test]
    fn first_bucket_rate_is_always_100() {
        let stages = vec![stage("visit", StageType::Visit, 0, None)];
        let buckets = aggregate(&stages, &BucketDef::lifecycle_defaults(), 3.0);
        assert_eq!(conversion_rate(&buckets, 0), 100);
        assert_eq!(conversion_rate(&[], 0), 0);
    }

    #[test]
    fn larger_multiplier_never_shrinks_counts() {
        let stages = vec![
            stage("visit", StageType::Visit, 1234, Some(10.0)),
            stage("trial", StageType::Trial, 77, None),
            stage("feature", StageType::Feature, 0, None),
        ];
        let defs = BucketDef::lifecycle_defaults();
        let mut previous: Option<Vec<Bucket>> = None;
        for range in TimeRange::ALL_RANGES {
            let multiplier = crate::config::TimeMultipliers::default().get(range);
            let buckets = aggregate(&stages, &defs, multiplier);
            if let Some(prev) = &previous {
                for (a, b) in prev.iter().zip(&buckets) {
                    assert!(b.count >= a.count, "{} shrank", b.label);
                }
            }
            previous = Some(buckets);
        }
    }

    #[test]
    fn values_and_multi_type_buckets_are_summed() {
        let stages = vec![
            stage("trial", StageType::Trial, 100, Some(20.0)),
            stage("feature", StageType::Feature, 50, None),
            stage("churn", StageType::Churn, 999, Some(1.0)),
        ];
        let buckets = aggregate(&stages, &BucketDef::lifecycle_defaults(), 0.3);
        let activation = &buckets[2];
        assert_eq!(activation.count, 45);
        assert_eq!(activation.value, 6.0);
        let total: u64 = buckets.iter().map(|bucket| bucket.count).sum();
        assert_eq!(total, 45);
    }

    #[test]
    fn flow_to_next_follows_paths_between_buckets() {
        let stages = vec![
            stage("visit", StageType::Visit, 1000, None),
            stage("signup", StageType::Signup, 300, None),
            stage("trial", StageType::Trial, 100, None),
        ];
        let paths = vec![
            path("p1", "visit", "signup", 280),
            path("p2", "signup", "trial", 90),
            path("p3", "visit", "trial", 5),
            path("p4", "visit", "missing", 50),
        ];
        let buckets =
            aggregate_with_paths(&stages, &paths, &BucketDef::lifecycle_defaults(), 1.0);
        assert_eq!(buckets[0].flow_to_next, 280);
        assert_eq!(buckets[1].flow_to_next, 90);
        assert_eq!(buckets[5].flow_to_next, 0);
    }

    #[test]
    fn parses_time_range_tokens() {
        assert_eq!(TimeRange::from_token("7days"), Some(TimeRange::SevenDays));
        assert_eq!(TimeRange::from_token("quarter"), Some(TimeRange::Quarter));
        assert_eq!(TimeRange::from_token("decade"), None);
        for range in TimeRange::ALL_RANGES {
            assert_eq!(TimeRange::from_token(range.as_str()), Some(range));
        }
    }
}
