//! The `report` command: per-segment metrics with deltas, printed as a
//! plain-text table. Runs the same segmenter and calculators the API serves.

use aeodb_core::metrics::{compute_metrics, ComparisonResult};
use aeodb_core::segments::partition_responses;
use aeodb_core::types::{AccountScope, Granularity, MetricsSnapshot, ResponseRecord};
use chrono::{Duration, Utc};

pub async fn run(company_id: i64, granularity_raw: &str, days: u32) -> anyhow::Result<()> {
    let granularity: Granularity = granularity_raw.parse()?;

    let pool = aeodb_db::connect_pool_from_env().await?;
    let end = Utc::now();
    let start = end - Duration::days(i64::from(days));
    // The CLI is an operator tool; it reads across accounts.
    let filter = aeodb_db::ResponseFilter {
        company_id,
        scope: AccountScope::SuperAdmin,
        geographic_region: None,
        icp_vertical: None,
        buyer_persona: None,
        batch_id: None,
        start,
        end,
    };
    let records = aeodb_db::fetch_responses(&pool, &filter).await?;
    if records.is_empty() {
        println!("no responses for company {company_id} in the last {days} days");
        return Ok(());
    }

    print!("{}", render_report(&records, granularity));
    Ok(())
}

fn render_report(records: &[ResponseRecord], granularity: Granularity) -> String {
    let buckets = partition_responses(records, granularity);
    let snapshots: Vec<MetricsSnapshot> = buckets
        .iter()
        .map(|bucket| {
            let owned: Vec<ResponseRecord> = bucket.records.iter().map(|&r| r.clone()).collect();
            compute_metrics(&owned)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&format!(
        "{:<40} {:>9} {:>14} {:>12} {:>14} {:>13}\n",
        "segment", "responses", "mention", "position", "sentiment", "features"
    ));
    for (i, bucket) in buckets.iter().enumerate() {
        let comparison = ComparisonResult::new(snapshots[i], snapshots.get(i + 1).copied());
        let current = comparison.current;
        let changes = comparison.changes;

        out.push_str(&format!(
            "{:<40} {:>9} {:>14} {:>12} {:>14} {:>13}\n",
            bucket.segment.label,
            current.total_responses,
            cell(current.mention_rate, changes.map(|c| c.mention_rate)),
            cell(current.avg_position, changes.and_then(|c| c.avg_position)),
            cell(current.avg_sentiment, changes.map(|c| c.avg_sentiment)),
            cell(current.feature_score, changes.map(|c| c.feature_score)),
        ));
    }
    out
}

/// One table cell: the metric value plus its delta against the next-older
/// segment, or a dash when there is no data to show.
fn cell(value: Option<f64>, delta: Option<f64>) -> String {
    match value {
        None => "-".to_owned(),
        Some(value) => match delta {
            Some(delta) => format!("{value} ({})", fmt_delta(delta)),
            None => format!("{value}"),
        },
    }
}

fn fmt_delta(delta: f64) -> String {
    format!("{:+.0}%", delta * 100.0)
}
