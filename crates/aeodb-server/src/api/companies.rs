use aeodb_core::AccountScope;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CompanyItem {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<aeodb_db::CompanyRow> for CompanyItem {
    fn from(row: aeodb_db::CompanyRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            name: row.name,
            industry: row.industry,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CompanyDetailItem {
    #[serde(flatten)]
    pub company: CompanyItem,
    pub products: Vec<ProductItem>,
    pub competitors: Vec<CompetitorItem>,
    pub icps: Vec<IcpItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CompetitorItem {
    pub id: i64,
    pub name: String,
    pub website: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct IcpItem {
    pub id: i64,
    pub vertical: String,
    pub company_size: String,
    pub region: String,
    pub personas: Vec<PersonaItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct PersonaItem {
    pub id: i64,
    pub title: String,
    pub seniority: String,
    pub department: String,
}

pub(super) async fn list_companies(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
) -> Result<Json<ApiResponse<Vec<CompanyItem>>>, ApiError> {
    let rows = aeodb_db::list_companies(&state.pool, scope)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CompanyItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_company(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(company_id): Path<i64>,
) -> Result<Json<ApiResponse<CompanyDetailItem>>, ApiError> {
    let detail = aeodb_db::get_company_detail(&state.pool, company_id, scope)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = CompanyDetailItem {
        company: CompanyItem::from(detail.company),
        products: detail
            .products
            .into_iter()
            .map(|p| ProductItem {
                id: p.id,
                name: p.name,
                description: p.description,
            })
            .collect(),
        competitors: detail
            .competitors
            .into_iter()
            .map(|c| CompetitorItem {
                id: c.id,
                name: c.name,
                website: c.website,
            })
            .collect(),
        icps: detail
            .icps
            .into_iter()
            .map(|entry| IcpItem {
                id: entry.icp.id,
                vertical: entry.icp.vertical,
                company_size: entry.icp.company_size,
                region: entry.icp.region,
                personas: entry
                    .personas
                    .into_iter()
                    .map(|p| PersonaItem {
                        id: p.id,
                        title: p.title,
                        seniority: p.seniority,
                        department: p.department,
                    })
                    .collect(),
            })
            .collect(),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{get_json, test_app};
    use aeodb_core::wizard::{CompanyDraft, SetupPlan};
    use axum::http::StatusCode;
    use sqlx::PgPool;

    async fn seed_company(pool: &PgPool, name: &str) -> i64 {
        let account_id = aeodb_db::create_account(pool, "Test Account")
            .await
            .expect("account");
        let plan = SetupPlan {
            company: CompanyDraft {
                name: name.to_string(),
                industry: Some("SaaS".to_string()),
            },
            products: Vec::new(),
            competitors: Vec::new(),
            icps: Vec::new(),
        };
        aeodb_db::submit_setup(pool, account_id, &plan)
            .await
            .expect("submit")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_companies_returns_seeded_rows(pool: PgPool) {
        seed_company(&pool, "Acme Analytics").await;

        let (status, json) = get_json(test_app(pool), "/api/v1/companies").await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], "Acme Analytics");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn get_company_returns_404_for_unknown_id(pool: PgPool) {
        let (status, json) = get_json(test_app(pool), "/api/v1/companies/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn get_company_includes_nested_collections(pool: PgPool) {
        let company_id = seed_company(&pool, "Detail Co").await;

        let (status, json) =
            get_json(test_app(pool), &format!("/api/v1/companies/{company_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "Detail Co");
        assert!(json["data"]["products"].is_array());
        assert!(json["data"]["icps"].is_array());
    }
}
