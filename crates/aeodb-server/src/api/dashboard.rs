//! Dashboard read endpoints: segments, per-segment metrics with deltas,
//! dimension breakdowns, and the raw response table.
//!
//! Every handler recomputes its aggregation from the row source on each
//! request; nothing here is cached or persisted.

use std::collections::BTreeMap;

use aeodb_core::metrics::{aggregate_snapshots, compute_metrics, ComparisonResult};
use aeodb_core::parsers::parse_rank_list;
use aeodb_core::segments::partition_responses;
use aeodb_core::types::{
    AccountScope, Granularity, MetricsSnapshot, ResponseRecord, TimeSegment,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, parse_date_param, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct SegmentQuery {
    granularity: Option<String>,
    start: Option<String>,
    end: Option<String>,
    region: Option<String>,
    vertical: Option<String>,
    persona: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BreakdownQuery {
    by: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponsesQuery {
    start: Option<String>,
    end: Option<String>,
    region: Option<String>,
    vertical: Option<String>,
    persona: Option<String>,
    batch_id: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SegmentMetricsItem {
    pub segment: TimeSegment,
    #[serde(flatten)]
    pub comparison: ComparisonResult,
}

#[derive(Debug, Serialize)]
pub(super) struct BreakdownGroup {
    pub key: String,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
pub(super) struct BreakdownData {
    pub by: String,
    pub groups: Vec<BreakdownGroup>,
    pub overall: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
pub(super) struct ResponseItem {
    #[serde(flatten)]
    pub record: ResponseRecord,
    /// Ranked company names from `rank_list`, `None` when absent or malformed.
    pub ranked_companies: Option<Vec<String>>,
}

fn parse_granularity(request_id: &str, raw: Option<&str>) -> Result<Granularity, ApiError> {
    let Some(raw) = raw else {
        return Err(ApiError::new(
            request_id.to_owned(),
            "validation_error",
            "missing required query parameter 'granularity'",
        ));
    };
    raw.parse::<Granularity>().map_err(|e| {
        ApiError::new(request_id.to_owned(), "validation_error", e.to_string())
    })
}

/// Resolve the company within the caller's scope, then fetch the filtered
/// records. Out-of-scope or unknown company ids are a 404, never an empty
/// dataset from another account.
async fn scoped_records(
    pool: &PgPool,
    request_id: &str,
    company_id: i64,
    scope: AccountScope,
    filter: aeodb_db::ResponseFilter,
) -> Result<Vec<ResponseRecord>, ApiError> {
    aeodb_db::get_company(pool, company_id, scope)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id.to_owned(), "not_found", "record not found"))?;

    aeodb_db::fetch_responses(pool, &filter)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))
}

pub(super) async fn list_segments(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(company_id): Path<i64>,
    Query(query): Query<SegmentQuery>,
) -> Result<Json<ApiResponse<Vec<TimeSegment>>>, ApiError> {
    let granularity = parse_granularity(&req_id.0, query.granularity.as_deref())?;
    let start = parse_date_param(&req_id.0, "start", query.start.as_deref(), false)?;
    let end = parse_date_param(&req_id.0, "end", query.end.as_deref(), true)?;

    let filter = aeodb_db::ResponseFilter {
        company_id,
        scope,
        geographic_region: query.region,
        icp_vertical: query.vertical,
        buyer_persona: query.persona,
        batch_id: None,
        start,
        end,
    };
    let records = scoped_records(&state.pool, &req_id.0, company_id, scope, filter).await?;
    let segments = partition_responses(&records, granularity)
        .into_iter()
        .map(|bucket| bucket.segment)
        .collect();

    Ok(Json(ApiResponse {
        data: segments,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_segment_metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(company_id): Path<i64>,
    Query(query): Query<SegmentQuery>,
) -> Result<Json<ApiResponse<Vec<SegmentMetricsItem>>>, ApiError> {
    let granularity = parse_granularity(&req_id.0, query.granularity.as_deref())?;
    let start = parse_date_param(&req_id.0, "start", query.start.as_deref(), false)?;
    let end = parse_date_param(&req_id.0, "end", query.end.as_deref(), true)?;

    let filter = aeodb_db::ResponseFilter {
        company_id,
        scope,
        geographic_region: query.region,
        icp_vertical: query.vertical,
        buyer_persona: query.persona,
        batch_id: None,
        start,
        end,
    };
    let records = scoped_records(&state.pool, &req_id.0, company_id, scope, filter).await?;

    // Buckets come back newest-first, so each segment's baseline is the one
    // right after it in the list.
    let buckets = partition_responses(&records, granularity);
    let snapshots: Vec<MetricsSnapshot> = buckets
        .iter()
        .map(|bucket| {
            let owned: Vec<ResponseRecord> =
                bucket.records.iter().map(|&r| r.clone()).collect();
            compute_metrics(&owned)
        })
        .collect();

    let data = buckets
        .into_iter()
        .enumerate()
        .map(|(i, bucket)| SegmentMetricsItem {
            segment: bucket.segment,
            comparison: ComparisonResult::new(snapshots[i], snapshots.get(i + 1).copied()),
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn dimension_value(record: &ResponseRecord, by: &str) -> Option<String> {
    match by {
        "region" => record.geographic_region.clone(),
        "vertical" => record.icp_vertical.clone(),
        "persona" => record.buyer_persona.clone(),
        _ => None,
    }
}

pub(super) async fn breakdown(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(company_id): Path<i64>,
    Query(query): Query<BreakdownQuery>,
) -> Result<Json<ApiResponse<BreakdownData>>, ApiError> {
    let by = match query.by.as_deref() {
        Some(by @ ("region" | "vertical" | "persona")) => by.to_owned(),
        Some(other) => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                format!("invalid 'by' value '{other}': expected region, vertical, or persona"),
            ))
        }
        None => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "missing required query parameter 'by'",
            ))
        }
    };
    let start = parse_date_param(&req_id.0, "start", query.start.as_deref(), false)?;
    let end = parse_date_param(&req_id.0, "end", query.end.as_deref(), true)?;

    let filter = aeodb_db::ResponseFilter {
        company_id,
        scope,
        geographic_region: None,
        icp_vertical: None,
        buyer_persona: None,
        batch_id: None,
        start,
        end,
    };
    let records = scoped_records(&state.pool, &req_id.0, company_id, scope, filter).await?;

    // Null dimension values land in an "unspecified" bucket so the overall
    // rollup covers every record the range matched.
    let mut grouped: BTreeMap<String, Vec<ResponseRecord>> = BTreeMap::new();
    for record in records {
        let key = dimension_value(&record, &by).unwrap_or_else(|| "unspecified".to_owned());
        grouped.entry(key).or_default().push(record);
    }

    let groups: Vec<BreakdownGroup> = grouped
        .into_iter()
        .map(|(key, members)| BreakdownGroup {
            key,
            metrics: compute_metrics(&members),
        })
        .collect();
    let overall =
        aggregate_snapshots(&groups.iter().map(|g| g.metrics).collect::<Vec<_>>());

    Ok(Json(ApiResponse {
        data: BreakdownData { by, groups, overall },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_responses(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(company_id): Path<i64>,
    Query(query): Query<ResponsesQuery>,
) -> Result<Json<ApiResponse<Vec<ResponseItem>>>, ApiError> {
    let start = parse_date_param(&req_id.0, "start", query.start.as_deref(), false)?;
    let end = parse_date_param(&req_id.0, "end", query.end.as_deref(), true)?;
    let limit = normalize_limit(query.limit);

    let filter = aeodb_db::ResponseFilter {
        company_id,
        scope,
        geographic_region: query.region,
        icp_vertical: query.vertical,
        buyer_persona: query.persona,
        batch_id: query.batch_id,
        start,
        end,
    };
    let records = scoped_records(&state.pool, &req_id.0, company_id, scope, filter).await?;

    // The row source orders ascending; the table wants the newest rows.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let data: Vec<ResponseItem> = records
        .into_iter()
        .rev()
        .take(limit as usize)
        .map(|record| {
            let ranked_companies = record
                .rank_list
                .as_deref()
                .and_then(|raw| parse_rank_list(raw).into_names());
            ResponseItem {
                record,
                ranked_companies,
            }
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{get_json, test_app};
    use super::*;
    use aeodb_core::types::BuyingJourneyStage;
    use aeodb_core::wizard::{CompanyDraft, SetupPlan};
    use axum::http::StatusCode;
    use chrono::{TimeZone, Utc};

    async fn seed_company(pool: &PgPool) -> i64 {
        let account_id = aeodb_db::create_account(pool, "Test Account")
            .await
            .expect("account");
        let plan = SetupPlan {
            company: CompanyDraft {
                name: "Acme Analytics".to_string(),
                industry: None,
            },
            products: Vec::new(),
            competitors: Vec::new(),
            icps: Vec::new(),
        };
        aeodb_db::submit_setup(pool, account_id, &plan)
            .await
            .expect("submit")
    }

    fn response(
        company_id: i64,
        batch_id: &str,
        day: u32,
        stage: BuyingJourneyStage,
        mentioned: bool,
        region: Option<&str>,
    ) -> aeodb_db::NewResponse {
        aeodb_db::NewResponse {
            company_id,
            batch_id: batch_id.to_string(),
            answer_engine: "perplexity".to_string(),
            geographic_region: region.map(ToOwned::to_owned),
            icp_vertical: None,
            buyer_persona: None,
            buying_journey_stage: Some(stage),
            sentiment_score: Some(0.5),
            ranking_position: None,
            company_mentioned: mentioned,
            solution_analysis: None,
            rank_list: None,
            response_text: None,
            citations: Vec::new(),
            mentioned_companies: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn dimension_value_reads_the_requested_field() {
        let record = ResponseRecord {
            id: 1,
            company_id: 1,
            created_at: None,
            batch_id: "b".to_string(),
            answer_engine: "perplexity".to_string(),
            geographic_region: Some("EMEA".to_string()),
            icp_vertical: None,
            buyer_persona: Some("CMO".to_string()),
            buying_journey_stage: None,
            sentiment_score: None,
            ranking_position: None,
            company_mentioned: false,
            solution_analysis: None,
            rank_list: None,
            response_text: None,
            citations: Vec::new(),
            mentioned_companies: Vec::new(),
        };
        assert_eq!(dimension_value(&record, "region").as_deref(), Some("EMEA"));
        assert_eq!(dimension_value(&record, "vertical"), None);
        assert_eq!(dimension_value(&record, "persona").as_deref(), Some("CMO"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn segments_endpoint_requires_a_granularity(pool: PgPool) {
        let company_id = seed_company(&pool).await;
        let (status, json) = get_json(
            test_app(pool),
            &format!("/api/v1/companies/{company_id}/segments?start=2025-03-01&end=2025-03-31"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn segments_endpoint_buckets_by_batch(pool: PgPool) {
        let company_id = seed_company(&pool).await;
        for (batch, day) in [("b1", 3), ("b1", 3), ("b2", 10)] {
            aeodb_db::insert_response(
                &pool,
                &response(
                    company_id,
                    batch,
                    day,
                    BuyingJourneyStage::ProblemExploration,
                    true,
                    None,
                ),
            )
            .await
            .expect("insert");
        }

        let (status, json) = get_json(
            test_app(pool),
            &format!(
                "/api/v1/companies/{company_id}/segments?granularity=batch&start=2025-03-01&end=2025-03-31"
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("segments");
        assert_eq!(data.len(), 2);
        // Newest first.
        assert_eq!(data[0]["id"], "b2");
        assert_eq!(data[0]["response_count"], 1);
        assert_eq!(data[1]["id"], "b1");
        assert_eq!(data[1]["response_count"], 2);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn metrics_endpoint_pairs_each_segment_with_the_older_one(pool: PgPool) {
        let company_id = seed_company(&pool).await;
        // Older batch: 1/2 mentioned. Newer batch: 2/2 mentioned.
        for (batch, day, mentioned) in [
            ("b1", 3, true),
            ("b1", 3, false),
            ("b2", 10, true),
            ("b2", 10, true),
        ] {
            aeodb_db::insert_response(
                &pool,
                &response(
                    company_id,
                    batch,
                    day,
                    BuyingJourneyStage::ProblemExploration,
                    mentioned,
                    None,
                ),
            )
            .await
            .expect("insert");
        }

        let (status, json) = get_json(
            test_app(pool),
            &format!(
                "/api/v1/companies/{company_id}/metrics?granularity=batch&start=2025-03-01&end=2025-03-31"
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("metrics");
        assert_eq!(data.len(), 2);

        // Newest segment compares against the older one: 50 -> 100 is +1.0.
        assert_eq!(data[0]["segment"]["id"], "b2");
        assert_eq!(data[0]["current"]["mention_rate"], 100.0);
        assert_eq!(data[0]["previous"]["mention_rate"], 50.0);
        assert_eq!(data[0]["changes"]["mention_rate"], 1.0);
        // The oldest segment has no baseline.
        assert!(data[1]["changes"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn breakdown_rolls_up_unspecified_alongside_named_groups(pool: PgPool) {
        let company_id = seed_company(&pool).await;
        for (region, mentioned) in [
            (Some("North America"), true),
            (Some("North America"), true),
            (None, false),
        ] {
            aeodb_db::insert_response(
                &pool,
                &response(
                    company_id,
                    "b1",
                    3,
                    BuyingJourneyStage::ProblemExploration,
                    mentioned,
                    region,
                ),
            )
            .await
            .expect("insert");
        }

        let (status, json) = get_json(
            test_app(pool),
            &format!(
                "/api/v1/companies/{company_id}/breakdown?by=region&start=2025-03-01&end=2025-03-31"
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let groups = json["data"]["groups"].as_array().expect("groups");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["key"], "North America");
        assert_eq!(groups[0]["metrics"]["mention_rate"], 100.0);
        assert_eq!(groups[1]["key"], "unspecified");
        assert_eq!(groups[1]["metrics"]["mention_rate"], 0.0);
        // Weighted rollup: (100*2 + 0*1) / 3 rounds to 67.
        assert_eq!(json["data"]["overall"]["mention_rate"], 67.0);
        assert_eq!(json["data"]["overall"]["total_responses"], 3);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn breakdown_rejects_unknown_dimensions(pool: PgPool) {
        let company_id = seed_company(&pool).await;
        let (status, json) = get_json(
            test_app(pool),
            &format!(
                "/api/v1/companies/{company_id}/breakdown?by=engine&start=2025-03-01&end=2025-03-31"
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn responses_endpoint_parses_rank_lists(pool: PgPool) {
        let company_id = seed_company(&pool).await;
        let mut with_ranking = response(
            company_id,
            "b1",
            3,
            BuyingJourneyStage::SolutionComparison,
            false,
            None,
        );
        with_ranking.rank_list = Some("1. Acme\n2. Globex".to_string());
        aeodb_db::insert_response(&pool, &with_ranking)
            .await
            .expect("insert");

        let (status, json) = get_json(
            test_app(pool),
            &format!(
                "/api/v1/companies/{company_id}/responses?start=2025-03-01&end=2025-03-31"
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("responses");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["ranked_companies"][0], "Acme");
        assert_eq!(data[0]["ranked_companies"][1], "Globex");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn metrics_for_unknown_company_is_404_not_empty(pool: PgPool) {
        seed_company(&pool).await;
        let (status, json) = get_json(
            test_app(pool),
            "/api/v1/companies/424242/metrics?granularity=week&start=2025-03-01&end=2025-03-31",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }
}
