//! Queries for the durable onboarding entities: accounts, companies,
//! products, competitors, ICPs, and personas.

use aeodb_core::AccountScope;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanyRow {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompetitorRow {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IcpRow {
    pub id: i64,
    pub company_id: i64,
    pub vertical: String,
    pub company_size: String,
    pub region: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonaRow {
    pub id: i64,
    pub icp_id: i64,
    pub title: String,
    pub seniority: String,
    pub department: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IcpWithPersonas {
    pub icp: IcpRow,
    pub personas: Vec<PersonaRow>,
}

/// A company with everything the wizard collected for it.
#[derive(Debug, Clone)]
pub struct CompanyDetail {
    pub company: CompanyRow,
    pub products: Vec<ProductRow>,
    pub competitors: Vec<CompetitorRow>,
    pub icps: Vec<IcpWithPersonas>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert an account and return its id. Mainly used by tests and the CLI.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_account(pool: &PgPool, name: &str) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar("INSERT INTO accounts (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// List companies visible to the given scope, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_companies(pool: &PgPool, scope: AccountScope) -> Result<Vec<CompanyRow>, DbError> {
    let rows = match scope {
        AccountScope::Account(account_id) => {
            sqlx::query_as::<_, CompanyRow>(
                "SELECT id, account_id, name, industry, created_at \
                 FROM companies WHERE account_id = $1 \
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(account_id)
            .fetch_all(pool)
            .await?
        }
        AccountScope::SuperAdmin => {
            sqlx::query_as::<_, CompanyRow>(
                "SELECT id, account_id, name, industry, created_at \
                 FROM companies ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Fetch one company if it exists and is visible to the scope.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_company(
    pool: &PgPool,
    company_id: i64,
    scope: AccountScope,
) -> Result<Option<CompanyRow>, DbError> {
    let row = match scope {
        AccountScope::Account(account_id) => {
            sqlx::query_as::<_, CompanyRow>(
                "SELECT id, account_id, name, industry, created_at \
                 FROM companies WHERE id = $1 AND account_id = $2",
            )
            .bind(company_id)
            .bind(account_id)
            .fetch_optional(pool)
            .await?
        }
        AccountScope::SuperAdmin => {
            sqlx::query_as::<_, CompanyRow>(
                "SELECT id, account_id, name, industry, created_at \
                 FROM companies WHERE id = $1",
            )
            .bind(company_id)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(row)
}

/// Fetch a company with its products, competitors, and ICPs (with personas).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the company does not exist in the scope,
/// or [`DbError::Sqlx`] if any query fails.
pub async fn get_company_detail(
    pool: &PgPool,
    company_id: i64,
    scope: AccountScope,
) -> Result<CompanyDetail, DbError> {
    let company = get_company(pool, company_id, scope)
        .await?
        .ok_or(DbError::NotFound)?;

    let products = sqlx::query_as::<_, ProductRow>(
        "SELECT id, company_id, name, description, created_at \
         FROM products WHERE company_id = $1 ORDER BY id",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    let competitors = sqlx::query_as::<_, CompetitorRow>(
        "SELECT id, company_id, name, website, created_at \
         FROM competitors WHERE company_id = $1 ORDER BY id",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    let icp_rows = sqlx::query_as::<_, IcpRow>(
        "SELECT id, company_id, vertical, company_size, region, created_at \
         FROM ideal_customer_profiles WHERE company_id = $1 ORDER BY id",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    let persona_rows = sqlx::query_as::<_, PersonaRow>(
        "SELECT p.id, p.icp_id, p.title, p.seniority, p.department, p.created_at \
         FROM personas p \
         JOIN ideal_customer_profiles i ON i.id = p.icp_id \
         WHERE i.company_id = $1 ORDER BY p.id",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    let icps = icp_rows
        .into_iter()
        .map(|icp| {
            let personas = persona_rows
                .iter()
                .filter(|p| p.icp_id == icp.id)
                .cloned()
                .collect();
            IcpWithPersonas { icp, personas }
        })
        .collect();

    Ok(CompanyDetail {
        company,
        products,
        competitors,
        icps,
    })
}
