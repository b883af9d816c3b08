//! Period segmenter: partitions response records into named time buckets.
//!
//! Three bucketing modes: one bucket per generation batch, Monday-anchored
//! weeks, or calendar months. Buckets come back newest-first with stable
//! tie-breaking so dashboard segment lists never reorder between fetches.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::types::{Granularity, ResponseRecord, TimeSegment};

/// A time segment together with the records that fell into it.
#[derive(Debug, Clone)]
pub struct SegmentBucket<'a> {
    pub segment: TimeSegment,
    pub records: Vec<&'a ResponseRecord>,
}

/// Partition records into time buckets, newest-first.
///
/// Records with no `created_at` are treated as having been created "now",
/// captured once at the start of the call so one invocation is internally
/// consistent. Empty input yields an empty vec.
#[must_use]
pub fn partition_responses(
    records: &[ResponseRecord],
    granularity: Granularity,
) -> Vec<SegmentBucket<'_>> {
    if records.is_empty() {
        return Vec::new();
    }
    let now = Utc::now();

    let mut buckets = match granularity {
        Granularity::Batch => partition_by_batch(records, now),
        Granularity::Week => partition_by_week(records, now),
        Granularity::Month => partition_by_month(records, now),
    };

    // Newest first; ties broken by id descending so equal-timestamp batches
    // keep a stable order.
    buckets.sort_by(|a, b| {
        b.segment
            .start
            .cmp(&a.segment.start)
            .then_with(|| b.segment.id.cmp(&a.segment.id))
    });
    buckets
}

/// Like [`partition_responses`] but returns only the segments.
#[must_use]
pub fn segment_responses(records: &[ResponseRecord], granularity: Granularity) -> Vec<TimeSegment> {
    partition_responses(records, granularity)
        .into_iter()
        .map(|bucket| bucket.segment)
        .collect()
}

fn effective_time(record: &ResponseRecord, now: DateTime<Utc>) -> DateTime<Utc> {
    record.created_at.unwrap_or(now)
}

fn partition_by_batch(records: &[ResponseRecord], now: DateTime<Utc>) -> Vec<SegmentBucket<'_>> {
    let mut groups: HashMap<&str, Vec<&ResponseRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.batch_id.as_str()).or_default().push(record);
    }

    // First pass: batch time spans, so labels can disambiguate same-day runs.
    let mut spans: Vec<(&str, DateTime<Utc>, DateTime<Utc>, Vec<&ResponseRecord>)> = groups
        .into_iter()
        .map(|(batch_id, members)| {
            let mut start = effective_time(members[0], now);
            let mut end = start;
            for record in &members[1..] {
                let at = effective_time(record, now);
                start = start.min(at);
                end = end.max(at);
            }
            (batch_id, start, end, members)
        })
        .collect();
    spans.sort_by(|a, b| a.1.cmp(&b.1));

    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for (_, start, _, _) in &spans {
        *per_day.entry(start.date_naive()).or_insert(0) += 1;
    }

    spans
        .into_iter()
        .map(|(batch_id, start, end, members)| {
            let count = members.len();
            let shares_day = per_day.get(&start.date_naive()).copied().unwrap_or(0) > 1;
            let label = if shares_day {
                format!(
                    "{} ({})",
                    start.format("%b %-d, %Y %H:%M"),
                    count_label(count)
                )
            } else {
                format!("{} ({})", start.format("%b %-d, %Y"), count_label(count))
            };
            SegmentBucket {
                segment: TimeSegment {
                    id: batch_id.to_string(),
                    granularity: Granularity::Batch,
                    start,
                    end,
                    label,
                    response_count: count as u64,
                },
                records: members,
            }
        })
        .collect()
}

fn partition_by_week(records: &[ResponseRecord], now: DateTime<Utc>) -> Vec<SegmentBucket<'_>> {
    let mut groups: HashMap<NaiveDate, Vec<&ResponseRecord>> = HashMap::new();
    for record in records {
        let date = effective_time(record, now).date_naive();
        groups.entry(week_start(date)).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(monday, members)| {
            let count = members.len();
            let start = start_of_day(monday);
            // Monday + 7 days minus one millisecond lands on Sunday 23:59:59.999.
            let end = start + Duration::days(7) - Duration::milliseconds(1);
            // Simplified week-of-month numbering, not ISO: the grouping key is
            // the Monday date itself, so differently-numbered weeks can never
            // collide across months.
            let week_of_month = monday.day0() / 7 + 1;
            SegmentBucket {
                segment: TimeSegment {
                    id: format!("{}-W{week_of_month}", monday.year()),
                    granularity: Granularity::Week,
                    start,
                    end,
                    label: format!(
                        "Week of {} ({})",
                        monday.format("%b %-d, %Y"),
                        count_label(count)
                    ),
                    response_count: count as u64,
                },
                records: members,
            }
        })
        .collect()
}

fn partition_by_month(records: &[ResponseRecord], now: DateTime<Utc>) -> Vec<SegmentBucket<'_>> {
    let mut groups: HashMap<(i32, u32), Vec<&ResponseRecord>> = HashMap::new();
    for record in records {
        let date = effective_time(record, now).date_naive();
        groups
            .entry((date.year(), date.month()))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((year, month), members)| {
            let count = members.len();
            let first = month_start(year, month);
            let start = start_of_day(first);
            let next = if month == 12 {
                month_start(year + 1, 1)
            } else {
                month_start(year, month + 1)
            };
            let end = start_of_day(next) - Duration::milliseconds(1);
            SegmentBucket {
                segment: TimeSegment {
                    id: format!("{year}-{month:02}"),
                    granularity: Granularity::Month,
                    start,
                    end,
                    label: format!("{} ({})", first.format("%B %Y"), count_label(count)),
                    response_count: count as u64,
                },
                records: members,
            }
        })
        .collect()
}

fn count_label(count: usize) -> String {
    if count == 1 {
        "1 response".to_owned()
    } else {
        format!("{count} responses")
    }
}

/// Monday of the week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn month_start(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is a valid date")
}
