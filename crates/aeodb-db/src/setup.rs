//! Setup session persistence and the transactional submission.
//!
//! The five-table write (company → products → competitors → ICPs → personas)
//! runs inside a single transaction: a late insert failing rolls back
//! everything, so no orphaned company rows survive a partial submission.

use aeodb_core::wizard::SetupPlan;
use aeodb_core::AccountScope;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::DbError;

/// A row from the `setup_sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SetupSessionRow {
    pub id: Uuid,
    pub account_id: i64,
    pub state: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create a new setup session with the given initial wizard state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_setup_session(
    pool: &PgPool,
    account_id: i64,
    state: &Value,
) -> Result<SetupSessionRow, DbError> {
    let row = sqlx::query_as::<_, SetupSessionRow>(
        "INSERT INTO setup_sessions (account_id, state) VALUES ($1, $2) \
         RETURNING id, account_id, state, status, created_at, updated_at",
    )
    .bind(account_id)
    .bind(state)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Fetch a setup session visible to the scope.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_setup_session(
    pool: &PgPool,
    session_id: Uuid,
    scope: AccountScope,
) -> Result<Option<SetupSessionRow>, DbError> {
    let row = match scope {
        AccountScope::Account(account_id) => {
            sqlx::query_as::<_, SetupSessionRow>(
                "SELECT id, account_id, state, status, created_at, updated_at \
                 FROM setup_sessions WHERE id = $1 AND account_id = $2",
            )
            .bind(session_id)
            .bind(account_id)
            .fetch_optional(pool)
            .await?
        }
        AccountScope::SuperAdmin => {
            sqlx::query_as::<_, SetupSessionRow>(
                "SELECT id, account_id, state, status, created_at, updated_at \
                 FROM setup_sessions WHERE id = $1",
            )
            .bind(session_id)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(row)
}

/// Persist a new wizard state for an in-progress session.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the session does not exist (or is not
/// in progress), or [`DbError::Sqlx`] on query failure.
pub async fn save_setup_session_state(
    pool: &PgPool,
    session_id: Uuid,
    state: &Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE setup_sessions SET state = $2, updated_at = NOW() \
         WHERE id = $1 AND status = 'in_progress'",
    )
    .bind(session_id)
    .bind(state)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Submit a validated setup plan for an account in one transaction.
///
/// Returns the new company id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is committed in
/// that case.
pub async fn submit_setup(
    pool: &PgPool,
    account_id: i64,
    plan: &SetupPlan,
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;
    let company_id = insert_plan(&mut tx, account_id, plan).await?;
    tx.commit().await?;
    Ok(company_id)
}

/// Submit the plan for a wizard session: inserts everything and marks the
/// session submitted, all in one transaction.
///
/// Returns the new company id.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the session is missing or out of scope.
/// - [`DbError::InvalidSessionTransition`] if the session was already
///   submitted.
/// - [`DbError::Sqlx`] on any query failure (full rollback).
pub async fn submit_setup_session(
    pool: &PgPool,
    session_id: Uuid,
    scope: AccountScope,
    plan: &SetupPlan,
    final_state: &Value,
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let locked: Option<(i64, String)> = match scope {
        AccountScope::Account(account_id) => {
            sqlx::query_as(
                "SELECT account_id, status FROM setup_sessions \
                 WHERE id = $1 AND account_id = $2 FOR UPDATE",
            )
            .bind(session_id)
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?
        }
        AccountScope::SuperAdmin => {
            sqlx::query_as("SELECT account_id, status FROM setup_sessions WHERE id = $1 FOR UPDATE")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await?
        }
    };
    let (account_id, status) = locked.ok_or(DbError::NotFound)?;
    if status != "in_progress" {
        return Err(DbError::InvalidSessionTransition { status });
    }

    let company_id = insert_plan(&mut tx, account_id, plan).await?;

    sqlx::query(
        "UPDATE setup_sessions \
         SET state = $2, status = 'submitted', updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(session_id)
    .bind(final_state)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(company_id)
}

async fn insert_plan(
    tx: &mut Transaction<'_, Postgres>,
    account_id: i64,
    plan: &SetupPlan,
) -> Result<i64, DbError> {
    let company_id: i64 = sqlx::query_scalar(
        "INSERT INTO companies (account_id, name, industry) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(account_id)
    .bind(&plan.company.name)
    .bind(&plan.company.industry)
    .fetch_one(&mut **tx)
    .await?;

    for product in &plan.products {
        sqlx::query("INSERT INTO products (company_id, name, description) VALUES ($1, $2, $3)")
            .bind(company_id)
            .bind(&product.name)
            .bind(&product.description)
            .execute(&mut **tx)
            .await?;
    }

    for competitor in &plan.competitors {
        sqlx::query("INSERT INTO competitors (company_id, name, website) VALUES ($1, $2, $3)")
            .bind(company_id)
            .bind(&competitor.name)
            .bind(&competitor.website)
            .execute(&mut **tx)
            .await?;
    }

    for icp in &plan.icps {
        let icp_id: i64 = sqlx::query_scalar(
            "INSERT INTO ideal_customer_profiles (company_id, vertical, company_size, region) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(company_id)
        .bind(&icp.vertical)
        .bind(&icp.company_size)
        .bind(&icp.region)
        .fetch_one(&mut **tx)
        .await?;

        for persona in &icp.personas {
            sqlx::query(
                "INSERT INTO personas (icp_id, title, seniority, department) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(icp_id)
            .bind(&persona.title)
            .bind(&persona.seniority)
            .bind(&persona.department)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(company_id)
}
