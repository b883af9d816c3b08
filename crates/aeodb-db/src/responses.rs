//! The row source: filtered reads (and simulator writes) against the
//! `response_analyses` table.

use aeodb_core::types::{AccountScope, BuyingJourneyStage, ResponseRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, QueryBuilder};

use crate::DbError;

/// Filter for a row-source query. Every aggregation call passes one of
/// these explicitly; there is no ambient company or account fallback.
#[derive(Debug, Clone)]
pub struct ResponseFilter {
    pub company_id: i64,
    pub scope: AccountScope,
    pub geographic_region: Option<String>,
    pub icp_vertical: Option<String>,
    pub buyer_persona: Option<String>,
    pub batch_id: Option<String>,
    /// Inclusive range on `created_at`.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ResponseRow {
    id: i64,
    company_id: i64,
    created_at: Option<DateTime<Utc>>,
    batch_id: String,
    answer_engine: String,
    geographic_region: Option<String>,
    icp_vertical: Option<String>,
    buyer_persona: Option<String>,
    buying_journey_stage: Option<String>,
    sentiment_score: Option<f64>,
    ranking_position: Option<i32>,
    company_mentioned: bool,
    solution_analysis: Option<Value>,
    rank_list: Option<String>,
    response_text: Option<String>,
    citations: Value,
    mentioned_companies: Vec<String>,
}

impl From<ResponseRow> for ResponseRecord {
    fn from(row: ResponseRow) -> Self {
        let buying_journey_stage = row.buying_journey_stage.as_deref().and_then(|raw| {
            raw.parse::<BuyingJourneyStage>()
                .map_err(|e| tracing::warn!(record_id = row.id, error = %e, "ignoring unknown stage"))
                .ok()
        });
        let citations = row
            .citations
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        ResponseRecord {
            id: row.id,
            company_id: row.company_id,
            created_at: row.created_at,
            batch_id: row.batch_id,
            answer_engine: row.answer_engine,
            geographic_region: row.geographic_region,
            icp_vertical: row.icp_vertical,
            buyer_persona: row.buyer_persona,
            buying_journey_stage,
            sentiment_score: row.sentiment_score,
            ranking_position: row.ranking_position,
            company_mentioned: row.company_mentioned,
            solution_analysis: row.solution_analysis,
            rank_list: row.rank_list,
            response_text: row.response_text,
            citations,
            mentioned_companies: row.mentioned_companies,
        }
    }
}

/// Fetch response records matching a filter, ordered ascending by `created_at`.
///
/// The account scope is enforced with a join against `companies`, so a
/// company id from another account simply matches nothing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_responses(
    pool: &PgPool,
    filter: &ResponseFilter,
) -> Result<Vec<ResponseRecord>, DbError> {
    let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "SELECT r.id, r.company_id, r.created_at, r.batch_id, r.answer_engine, \
                r.geographic_region, r.icp_vertical, r.buyer_persona, \
                r.buying_journey_stage, r.sentiment_score, r.ranking_position, \
                r.company_mentioned, r.solution_analysis, r.rank_list, \
                r.response_text, r.citations, r.mentioned_companies \
         FROM response_analyses r \
         JOIN companies c ON c.id = r.company_id \
         WHERE r.company_id = ",
    );
    qb.push_bind(filter.company_id);

    if let AccountScope::Account(account_id) = filter.scope {
        qb.push(" AND c.account_id = ");
        qb.push_bind(account_id);
    }
    if let Some(region) = &filter.geographic_region {
        qb.push(" AND r.geographic_region = ");
        qb.push_bind(region);
    }
    if let Some(vertical) = &filter.icp_vertical {
        qb.push(" AND r.icp_vertical = ");
        qb.push_bind(vertical);
    }
    if let Some(persona) = &filter.buyer_persona {
        qb.push(" AND r.buyer_persona = ");
        qb.push_bind(persona);
    }
    if let Some(batch_id) = &filter.batch_id {
        qb.push(" AND r.batch_id = ");
        qb.push_bind(batch_id);
    }
    qb.push(" AND r.created_at >= ");
    qb.push_bind(filter.start);
    qb.push(" AND r.created_at <= ");
    qb.push_bind(filter.end);
    qb.push(" ORDER BY r.created_at ASC, r.id ASC");

    let rows: Vec<ResponseRow> = qb.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(ResponseRecord::from).collect())
}

/// A response record to insert (simulator and ingestion paths).
#[derive(Debug, Clone)]
pub struct NewResponse {
    pub company_id: i64,
    pub batch_id: String,
    pub answer_engine: String,
    pub geographic_region: Option<String>,
    pub icp_vertical: Option<String>,
    pub buyer_persona: Option<String>,
    pub buying_journey_stage: Option<BuyingJourneyStage>,
    pub sentiment_score: Option<f64>,
    pub ranking_position: Option<i32>,
    pub company_mentioned: bool,
    pub solution_analysis: Option<Value>,
    pub rank_list: Option<String>,
    pub response_text: Option<String>,
    pub citations: Vec<String>,
    pub mentioned_companies: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert one response record and return its generated id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_response(pool: &PgPool, response: &NewResponse) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO response_analyses \
             (company_id, batch_id, answer_engine, geographic_region, icp_vertical, \
              buyer_persona, buying_journey_stage, sentiment_score, ranking_position, \
              company_mentioned, solution_analysis, rank_list, response_text, \
              citations, mentioned_companies, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING id",
    )
    .bind(response.company_id)
    .bind(&response.batch_id)
    .bind(&response.answer_engine)
    .bind(&response.geographic_region)
    .bind(&response.icp_vertical)
    .bind(&response.buyer_persona)
    .bind(response.buying_journey_stage.map(BuyingJourneyStage::as_str))
    .bind(response.sentiment_score)
    .bind(response.ranking_position)
    .bind(response.company_mentioned)
    .bind(&response.solution_analysis)
    .bind(&response.rank_list)
    .bind(&response.response_text)
    .bind(Value::from(response.citations.clone()))
    .bind(&response.mentioned_companies)
    .bind(response.created_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
