//! The metrics aggregation core: per-segment calculation, cross-group
//! weighted rollups, and period-over-period deltas.
//!
//! Everything here is a pure reduction over immutable record slices. The
//! four metrics are computed independently because each reads a different
//! stage-eligible subset of records; a single record can contribute to
//! anywhere between zero and four of them.

use serde::{Deserialize, Serialize};

use crate::parsers::{parse_solution_analysis, FeatureAnalysis};
use crate::types::{MetricsSnapshot, ResponseRecord};

/// Reduce one bucket of records into a [`MetricsSnapshot`].
///
/// A metric with no eligible records is `None`, never a silent zero, so
/// charts and deltas can tell "no data" apart from a true 0.
#[must_use]
pub fn compute_metrics(records: &[ResponseRecord]) -> MetricsSnapshot {
    let sentiments: Vec<f64> = records.iter().filter_map(|r| r.sentiment_score).collect();
    let avg_sentiment = mean(&sentiments).map(|m| (m * 100.0).round());

    let positions: Vec<f64> = records
        .iter()
        .filter(|r| r.buying_journey_stage.is_some_and(|s| s.is_ranked()))
        .filter_map(|r| r.ranking_position)
        .filter(|&p| p > 0)
        .map(f64::from)
        .collect();
    let avg_position = mean(&positions).map(round2);

    let early: Vec<&ResponseRecord> = records
        .iter()
        .filter(|r| r.buying_journey_stage.is_some_and(|s| s.is_early()))
        .collect();
    let mention_rate = if early.is_empty() {
        None
    } else {
        let mentioned = early.iter().filter(|r| r.company_mentioned).count();
        Some((fraction(mentioned, early.len()) * 100.0).round())
    };

    let feature_fractions: Vec<f64> = records
        .iter()
        .filter(|r| {
            r.buying_journey_stage
                .is_some_and(|s| s == crate::types::BuyingJourneyStage::SolutionEvaluation)
        })
        .filter_map(|r| r.solution_analysis.as_ref().map(|v| (r.id, v)))
        .map(|(id, value)| match parse_solution_analysis(value) {
            analysis @ FeatureAnalysis::Parsed(_) => analysis.yes_fraction() * 100.0,
            FeatureAnalysis::Malformed => {
                tracing::warn!(record_id = id, "malformed solution_analysis, scoring 0");
                0.0
            }
        })
        .collect();
    let feature_score = mean(&feature_fractions).map(f64::round);

    MetricsSnapshot {
        mention_rate,
        avg_position,
        avg_sentiment,
        feature_score,
        total_responses: records.len() as u64,
    }
}

/// Combine per-group snapshots (per-region, per-vertical, per-segment, ...)
/// into one parent snapshot by response-count-weighted averaging.
///
/// Each metric carries its own weight pool: a child contributes to a metric
/// only when it has responses at all and an actual value for that metric.
/// Zero total weight for a metric yields `None`.
#[must_use]
pub fn aggregate_snapshots(children: &[MetricsSnapshot]) -> MetricsSnapshot {
    let weighted = |value_of: fn(&MetricsSnapshot) -> Option<f64>| -> Option<f64> {
        let mut weight = 0u64;
        let mut sum = 0.0f64;
        for child in children {
            if child.total_responses == 0 {
                continue;
            }
            let Some(value) = value_of(child) else {
                continue;
            };
            weight += child.total_responses;
            #[allow(clippy::cast_precision_loss)]
            {
                sum += value * child.total_responses as f64;
            }
        }
        if weight == 0 {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            Some(sum / weight as f64)
        }
    };

    MetricsSnapshot {
        mention_rate: weighted(|c| c.mention_rate).map(f64::round),
        avg_position: weighted(|c| c.avg_position).map(round2),
        avg_sentiment: weighted(|c| c.avg_sentiment).map(f64::round),
        feature_score: weighted(|c| c.feature_score).map(f64::round),
        total_responses: children.iter().map(|c| c.total_responses).sum(),
    }
}

/// Fractional change between two metric values.
///
/// A missing or zero baseline reads as "+100%" when the current value is
/// positive and "no change" otherwise.
#[must_use]
pub fn fractional_delta(current: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(prev) if prev != 0.0 => (current - prev) / prev,
        _ => {
            if current > 0.0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Delta for average position: only comparable when both periods have data.
///
/// The returned change is the raw fraction, NOT sign-inverted for
/// lower-is-better; presentation owns that.
#[must_use]
pub fn position_delta(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (current, previous) {
        (Some(cur), Some(prev)) => Some(fractional_delta(cur, Some(prev))),
        _ => None,
    }
}

/// Per-metric fractional deltas between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricChanges {
    pub mention_rate: f64,
    pub avg_sentiment: f64,
    pub feature_score: f64,
    /// `None` when either period lacks position data.
    pub avg_position: Option<f64>,
}

impl MetricChanges {
    #[must_use]
    pub fn between(current: &MetricsSnapshot, previous: &MetricsSnapshot) -> Self {
        Self {
            mention_rate: fractional_delta(
                current.mention_rate.unwrap_or(0.0),
                previous.mention_rate,
            ),
            avg_sentiment: fractional_delta(
                current.avg_sentiment.unwrap_or(0.0),
                previous.avg_sentiment,
            ),
            feature_score: fractional_delta(
                current.feature_score.unwrap_or(0.0),
                previous.feature_score,
            ),
            avg_position: position_delta(current.avg_position, previous.avg_position),
        }
    }
}

/// A snapshot paired with its predecessor period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub current: MetricsSnapshot,
    pub previous: Option<MetricsSnapshot>,
    pub changes: Option<MetricChanges>,
}

impl ComparisonResult {
    #[must_use]
    pub fn new(current: MetricsSnapshot, previous: Option<MetricsSnapshot>) -> Self {
        let changes = previous
            .as_ref()
            .map(|prev| MetricChanges::between(&current, prev));
        Self {
            current,
            previous,
            changes,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        #[allow(clippy::cast_precision_loss)]
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
