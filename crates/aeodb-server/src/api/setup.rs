//! Setup wizard endpoints: session lifecycle, step transitions, enrichment
//! suggestions, and the transactional submission.
//!
//! The wizard state machine lives in `aeodb-core`; these handlers only load
//! it from the session row, apply one transition, and persist the result.

use aeodb_core::wizard::{SetupStep, SetupWizard, StepInput, WizardError};
use aeodb_core::AccountScope;
use aeodb_enrich::{Suggestion, SuggestionKind};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize, Default)]
pub(super) struct CreateSessionBody {
    /// Required for super-admin callers; account-scoped callers always use
    /// their own account.
    account_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionView {
    pub id: Uuid,
    pub account_id: i64,
    pub status: String,
    pub step: SetupStep,
    pub state: SetupWizard,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct SubmitResult {
    pub company_id: i64,
    pub status: &'static str,
}

fn map_wizard_error(request_id: String, error: &WizardError) -> ApiError {
    let code = match error {
        WizardError::StepMismatch { .. }
        | WizardError::Validation(_)
        | WizardError::CannotGoBack(_) => "validation_error",
        WizardError::NotAtReview(_) => "conflict",
    };
    ApiError::new(request_id, code, error.to_string())
}

fn session_view(
    request_id: &str,
    row: aeodb_db::SetupSessionRow,
) -> Result<SessionView, ApiError> {
    let wizard: SetupWizard = serde_json::from_value(row.state).map_err(|e| {
        tracing::error!(session_id = %row.id, error = %e, "corrupt wizard state");
        ApiError::new(
            request_id.to_owned(),
            "internal_error",
            "stored session state could not be read",
        )
    })?;
    Ok(SessionView {
        id: row.id,
        account_id: row.account_id,
        status: row.status,
        step: wizard.step,
        state: wizard,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn load_session(
    state: &AppState,
    request_id: &str,
    session_id: Uuid,
    scope: AccountScope,
) -> Result<(aeodb_db::SetupSessionRow, SetupWizard), ApiError> {
    let row = aeodb_db::get_setup_session(&state.pool, session_id, scope)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| {
            ApiError::new(request_id.to_owned(), "not_found", "record not found")
        })?;

    let wizard: SetupWizard = serde_json::from_value(row.state.clone()).map_err(|e| {
        tracing::error!(session_id = %row.id, error = %e, "corrupt wizard state");
        ApiError::new(
            request_id.to_owned(),
            "internal_error",
            "stored session state could not be read",
        )
    })?;
    Ok((row, wizard))
}

fn require_in_progress(
    request_id: &str,
    row: &aeodb_db::SetupSessionRow,
) -> Result<(), ApiError> {
    if row.status == "in_progress" {
        Ok(())
    } else {
        Err(ApiError::new(
            request_id.to_owned(),
            "conflict",
            format!("session is '{}', not in progress", row.status),
        ))
    }
}

pub(super) async fn create_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    body: Option<Json<CreateSessionBody>>,
) -> Result<Json<ApiResponse<SessionView>>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let account_id = match scope {
        AccountScope::Account(account_id) => account_id,
        AccountScope::SuperAdmin => body.account_id.ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "validation_error",
                "super-admin callers must provide 'account_id'",
            )
        })?,
    };

    let wizard = SetupWizard::new();
    let state_json = serde_json::to_value(&wizard).map_err(|e| {
        tracing::error!(error = %e, "wizard state failed to serialize");
        ApiError::new(req_id.0.clone(), "internal_error", "session creation failed")
    })?;
    let row = aeodb_db::create_setup_session(&state.pool, account_id, &state_json)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let view = session_view(&req_id.0, row)?;
    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<SessionView>>, ApiError> {
    let (row, _) = load_session(&state, &req_id.0, session_id, scope).await?;
    let view = session_view(&req_id.0, row)?;
    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn advance_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<StepInput>,
) -> Result<Json<ApiResponse<SessionView>>, ApiError> {
    let (mut row, mut wizard) = load_session(&state, &req_id.0, session_id, scope).await?;
    require_in_progress(&req_id.0, &row)?;

    wizard
        .advance(input)
        .map_err(|e| map_wizard_error(req_id.0.clone(), &e))?;
    persist_state(&state, &req_id.0, session_id, &wizard).await?;

    row.state = serde_json::to_value(&wizard)
        .map_err(|e| internal_serialize_error(&req_id.0, session_id, &e))?;
    row.updated_at = Utc::now();
    let view = session_view(&req_id.0, row)?;
    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn back_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<SessionView>>, ApiError> {
    let (mut row, mut wizard) = load_session(&state, &req_id.0, session_id, scope).await?;
    require_in_progress(&req_id.0, &row)?;

    wizard
        .back()
        .map_err(|e| map_wizard_error(req_id.0.clone(), &e))?;
    persist_state(&state, &req_id.0, session_id, &wizard).await?;

    row.state = serde_json::to_value(&wizard)
        .map_err(|e| internal_serialize_error(&req_id.0, session_id, &e))?;
    row.updated_at = Utc::now();
    let view = session_view(&req_id.0, row)?;
    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn suggestion_kind(step: SetupStep) -> Option<SuggestionKind> {
    match step {
        SetupStep::Products => Some(SuggestionKind::Products),
        SetupStep::Competitors => Some(SuggestionKind::Competitors),
        SetupStep::Icps => Some(SuggestionKind::Icps),
        SetupStep::Personas => Some(SuggestionKind::Personas),
        SetupStep::Company | SetupStep::Review | SetupStep::Done => None,
    }
}

pub(super) async fn generate_suggestions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Suggestion>>>, ApiError> {
    let (row, wizard) = load_session(&state, &req_id.0, session_id, scope).await?;
    require_in_progress(&req_id.0, &row)?;

    let Some(client) = &state.enrich else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            "suggestion service is not configured",
        ));
    };
    let Some(kind) = suggestion_kind(wizard.step) else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("no suggestions are available at step '{}'", wizard.step),
        ));
    };
    let Some(company) = &wizard.company else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "complete the company step before requesting suggestions",
        ));
    };

    let suggestions = client
        .suggest(kind, &company.name, company.industry.as_deref(), None)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, kind = %kind, error = %e, "suggestion call failed");
            ApiError::new(
                req_id.0.clone(),
                "internal_error",
                "suggestion service call failed",
            )
        })?;

    Ok(Json(ApiResponse {
        data: suggestions,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn submit_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(scope): Extension<AccountScope>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiResponse<SubmitResult>>, ApiError> {
    let (_, mut wizard) = load_session(&state, &req_id.0, session_id, scope).await?;

    let plan = wizard
        .finish()
        .map_err(|e| map_wizard_error(req_id.0.clone(), &e))?;
    let final_state = serde_json::to_value(&wizard)
        .map_err(|e| internal_serialize_error(&req_id.0, session_id, &e))?;

    let company_id =
        aeodb_db::submit_setup_session(&state.pool, session_id, scope, &plan, &final_state)
            .await
            .map_err(|e| match e {
                aeodb_db::DbError::InvalidSessionTransition { ref status } => ApiError::new(
                    req_id.0.clone(),
                    "conflict",
                    format!("session is '{status}', not in progress"),
                ),
                other => map_db_error(req_id.0.clone(), &other),
            })?;

    Ok(Json(ApiResponse {
        data: SubmitResult {
            company_id,
            status: "submitted",
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

async fn persist_state(
    state: &AppState,
    request_id: &str,
    session_id: Uuid,
    wizard: &SetupWizard,
) -> Result<(), ApiError> {
    let state_json = serde_json::to_value(wizard)
        .map_err(|e| internal_serialize_error(request_id, session_id, &e))?;
    aeodb_db::save_setup_session_state(&state.pool, session_id, &state_json)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))
}

fn internal_serialize_error(
    request_id: &str,
    session_id: Uuid,
    error: &serde_json::Error,
) -> ApiError {
    tracing::error!(session_id = %session_id, error = %error, "wizard state failed to serialize");
    ApiError::new(
        request_id.to_owned(),
        "internal_error",
        "session state could not be saved",
    )
}

#[cfg(test)]
mod tests {
    use super::super::tests::{get_json, post_json, test_app};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    async fn create_session(pool: &PgPool) -> String {
        let account_id = aeodb_db::create_account(pool, "Test Account")
            .await
            .expect("account");
        let (status, json) = post_json(
            test_app(pool.clone()),
            "/api/v1/setup/sessions",
            &json!({ "account_id": account_id }),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        json["data"]["id"].as_str().expect("session id").to_owned()
    }

    async fn advance(
        pool: &PgPool,
        session_id: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        post_json(
            test_app(pool.clone()),
            &format!("/api/v1/setup/sessions/{session_id}/advance"),
            &body,
            None,
        )
        .await
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn new_session_starts_at_the_company_step(pool: PgPool) {
        let session_id = create_session(&pool).await;

        let (status, json) = get_json(
            test_app(pool),
            &format!("/api/v1/setup/sessions/{session_id}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["step"], "company");
        assert_eq!(json["data"]["status"], "in_progress");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn advance_moves_the_wizard_forward(pool: PgPool) {
        let session_id = create_session(&pool).await;

        let (status, json) = advance(
            &pool,
            &session_id,
            json!({ "step": "company", "data": { "name": "Acme", "industry": "SaaS" } }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["step"], "products");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn wrong_step_payload_is_a_validation_error(pool: PgPool) {
        let session_id = create_session(&pool).await;

        let (status, json) = advance(
            &pool,
            &session_id,
            json!({ "step": "products", "data": [] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");

        // The failed transition must not have moved the session.
        let (_, json) = get_json(
            test_app(pool),
            &format!("/api/v1/setup/sessions/{session_id}"),
        )
        .await;
        assert_eq!(json["data"]["step"], "company");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn back_retraces_one_step(pool: PgPool) {
        let session_id = create_session(&pool).await;
        advance(
            &pool,
            &session_id,
            json!({ "step": "company", "data": { "name": "Acme", "industry": null } }),
        )
        .await;

        let (status, json) = post_json(
            test_app(pool.clone()),
            &format!("/api/v1/setup/sessions/{session_id}/back"),
            &json!({}),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["step"], "company");
        // Drafts survive going back.
        assert_eq!(json["data"]["state"]["company"]["name"], "Acme");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn submit_before_review_is_a_conflict(pool: PgPool) {
        let session_id = create_session(&pool).await;

        let (status, json) = post_json(
            test_app(pool),
            &format!("/api/v1/setup/sessions/{session_id}/submit"),
            &json!({}),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "conflict");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn full_walkthrough_submits_and_creates_the_company(pool: PgPool) {
        let session_id = create_session(&pool).await;
        for body in [
            json!({ "step": "company", "data": { "name": "Acme", "industry": "SaaS" } }),
            json!({ "step": "products", "data": [{ "name": "Acme One", "description": null }] }),
            json!({ "step": "competitors", "data": [{ "name": "Globex", "website": null }] }),
            json!({ "step": "icps", "data": [{
                "vertical": "SaaS", "company_size": "51-200", "region": "North America"
            }] }),
            json!({ "step": "personas", "data": [{
                "icp_index": 0, "title": "CMO", "seniority": "Executive", "department": "Marketing"
            }] }),
        ] {
            let (status, _) = advance(&pool, &session_id, body).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, json) = post_json(
            test_app(pool.clone()),
            &format!("/api/v1/setup/sessions/{session_id}/submit"),
            &json!({}),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "submitted");
        let company_id = json["data"]["company_id"].as_i64().expect("company id");

        let (status, json) = get_json(
            test_app(pool.clone()),
            &format!("/api/v1/companies/{company_id}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "Acme");
        assert_eq!(json["data"]["icps"][0]["personas"][0]["title"], "CMO");

        // A second submit finds the session already submitted.
        let (status, json) = post_json(
            test_app(pool),
            &format!("/api/v1/setup/sessions/{session_id}/submit"),
            &json!({}),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "conflict");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn generate_without_a_configured_service_is_a_bad_request(pool: PgPool) {
        let session_id = create_session(&pool).await;
        advance(
            &pool,
            &session_id,
            json!({ "step": "company", "data": { "name": "Acme", "industry": null } }),
        )
        .await;

        let (status, json) = post_json(
            test_app(pool),
            &format!("/api/v1/setup/sessions/{session_id}/generate"),
            &json!({}),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_session_is_404(pool: PgPool) {
        let (status, json) = get_json(
            test_app(pool),
            "/api/v1/setup/sessions/00000000-0000-0000-0000-000000000000",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }
}
