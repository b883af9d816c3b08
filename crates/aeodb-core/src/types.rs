use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Funnel stage of a recorded answer-engine query.
///
/// The stage tag decides which metrics a record is eligible to contribute to:
/// mention rate reads the two early stages, average position reads
/// comparison/final-research, feature score reads evaluation only, and
/// sentiment reads every stage that carries a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyingJourneyStage {
    ProblemExploration,
    SolutionEducation,
    SolutionComparison,
    SolutionEvaluation,
    FinalResearch,
}

impl BuyingJourneyStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BuyingJourneyStage::ProblemExploration => "problem_exploration",
            BuyingJourneyStage::SolutionEducation => "solution_education",
            BuyingJourneyStage::SolutionComparison => "solution_comparison",
            BuyingJourneyStage::SolutionEvaluation => "solution_evaluation",
            BuyingJourneyStage::FinalResearch => "final_research",
        }
    }

    /// True for the stages that feed the mention-rate metric.
    #[must_use]
    pub fn is_early(self) -> bool {
        matches!(
            self,
            BuyingJourneyStage::ProblemExploration | BuyingJourneyStage::SolutionEducation
        )
    }

    /// True for the stages that feed the average-position metric.
    #[must_use]
    pub fn is_ranked(self) -> bool {
        matches!(
            self,
            BuyingJourneyStage::SolutionComparison | BuyingJourneyStage::FinalResearch
        )
    }
}

impl FromStr for BuyingJourneyStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "problem_exploration" => Ok(BuyingJourneyStage::ProblemExploration),
            "solution_education" => Ok(BuyingJourneyStage::SolutionEducation),
            "solution_comparison" => Ok(BuyingJourneyStage::SolutionComparison),
            "solution_evaluation" => Ok(BuyingJourneyStage::SolutionEvaluation),
            "final_research" => Ok(BuyingJourneyStage::FinalResearch),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

impl std::fmt::Display for BuyingJourneyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown buying journey stage: {0}")]
pub struct UnknownStage(pub String);

/// One evaluated query-response from an answer engine.
///
/// Read-only input to the aggregation pipeline; nothing mutates these after
/// they leave the row source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: i64,
    pub company_id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub batch_id: String,
    pub answer_engine: String,
    pub geographic_region: Option<String>,
    pub icp_vertical: Option<String>,
    pub buyer_persona: Option<String>,
    pub buying_journey_stage: Option<BuyingJourneyStage>,
    /// Stored on a 0..1 scale; displayed as 0..100.
    pub sentiment_score: Option<f64>,
    /// Valid only when > 0.
    pub ranking_position: Option<i32>,
    pub company_mentioned: bool,
    /// Feature-name → YES/NO/N/A map, either a JSON object or a
    /// string-encoded object. Parsed by [`crate::parsers::parse_solution_analysis`].
    pub solution_analysis: Option<serde_json::Value>,
    pub rank_list: Option<String>,
    pub response_text: Option<String>,
    pub citations: Vec<String>,
    pub mentioned_companies: Vec<String>,
}

/// Time-bucketing mode for the period segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Batch,
    Week,
    Month,
}

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(Granularity::Batch),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            other => Err(UnknownGranularity(other.to_string())),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Batch => write!(f, "batch"),
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown granularity: {0} (expected batch, week, or month)")]
pub struct UnknownGranularity(pub String);

/// One named time bucket produced by the segmenter. Never persisted;
/// rebuilt on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSegment {
    pub id: String,
    pub granularity: Granularity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
    pub response_count: u64,
}

/// The unit of aggregation at every level (segment, region, vertical,
/// persona, company).
///
/// Every metric is optional: `None` means "no eligible records", which is
/// distinct from a true `Some(0.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Share of early-stage records that mention the company, 0..100.
    pub mention_rate: Option<f64>,
    /// Mean ranking position over comparison/final-research records, 2 dp.
    pub avg_position: Option<f64>,
    /// Mean sentiment over scored records, 0..100.
    pub avg_sentiment: Option<f64>,
    /// Mean share of YES feature entries over evaluation records, 0..100.
    pub feature_score: Option<f64>,
    pub total_responses: u64,
}

/// Which account's rows a caller may see.
///
/// Always passed explicitly; there is no ambient "selected company" or
/// "current account" state anywhere in the aggregation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountScope {
    Account(i64),
    /// Omits the account filter entirely.
    SuperAdmin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_round_trips_through_str() {
        for stage in [
            BuyingJourneyStage::ProblemExploration,
            BuyingJourneyStage::SolutionEducation,
            BuyingJourneyStage::SolutionComparison,
            BuyingJourneyStage::SolutionEvaluation,
            BuyingJourneyStage::FinalResearch,
        ] {
            assert_eq!(stage.as_str().parse::<BuyingJourneyStage>(), Ok(stage));
        }
    }

    #[test]
    fn unknown_stage_is_an_error_not_a_panic() {
        let err = "awareness".parse::<BuyingJourneyStage>();
        assert_eq!(err, Err(UnknownStage("awareness".to_string())));
    }

    #[test]
    fn stage_eligibility_flags() {
        assert!(BuyingJourneyStage::ProblemExploration.is_early());
        assert!(BuyingJourneyStage::SolutionEducation.is_early());
        assert!(!BuyingJourneyStage::SolutionComparison.is_early());
        assert!(BuyingJourneyStage::SolutionComparison.is_ranked());
        assert!(BuyingJourneyStage::FinalResearch.is_ranked());
        assert!(!BuyingJourneyStage::SolutionEvaluation.is_ranked());
    }

    #[test]
    fn granularity_parses_lowercase_names() {
        assert_eq!("batch".parse(), Ok(Granularity::Batch));
        assert_eq!("week".parse(), Ok(Granularity::Week));
        assert_eq!("month".parse(), Ok(Granularity::Month));
        assert!("quarter".parse::<Granularity>().is_err());
    }

    #[test]
    fn metrics_snapshot_serializes_none_as_null() {
        let snapshot = MetricsSnapshot {
            mention_rate: Some(73.0),
            ..MetricsSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["mention_rate"], 73.0);
        assert!(json["avg_position"].is_null());
        assert_eq!(json["total_responses"], 0);
    }
}
