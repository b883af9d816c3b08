use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use aeodb_core::AccountScope;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// API key auth settings used by middleware.
///
/// Regular keys map a bearer token to one account; admin keys resolve to
/// [`AccountScope::SuperAdmin`] and see every account.
#[derive(Debug, Clone)]
pub struct AuthState {
    account_keys: Arc<HashMap<String, i64>>,
    admin_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `AEODB_API_KEYS` (comma-separated
    /// `token:account_id` pairs) and `AEODB_ADMIN_KEYS` (comma-separated
    /// super-admin tokens).
    ///
    /// In development, empty/missing keys disable auth for local iteration
    /// (every request runs super-admin). In non-development envs,
    /// empty/missing keys fail startup.
    ///
    /// # Errors
    ///
    /// Fails on a malformed `token:account_id` pair, or on missing keys
    /// outside development.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw_accounts = std::env::var("AEODB_API_KEYS").unwrap_or_default();
        let raw_admins = std::env::var("AEODB_ADMIN_KEYS").unwrap_or_default();
        Self::from_key_strings(&raw_accounts, &raw_admins, is_development)
    }

    pub(crate) fn from_key_strings(
        raw_accounts: &str,
        raw_admins: &str,
        is_development: bool,
    ) -> anyhow::Result<Self> {
        let mut account_keys = HashMap::new();
        for pair in raw_accounts.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((token, account)) = pair.split_once(':') else {
                anyhow::bail!(
                    "AEODB_API_KEYS entries must be 'token:account_id' pairs, got '{pair}'"
                );
            };
            let account_id: i64 = account
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid account id in AEODB_API_KEYS: '{account}'"))?;
            account_keys.insert(token.trim().to_owned(), account_id);
        }

        let admin_keys: HashSet<String> = raw_admins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if account_keys.is_empty() && admin_keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "AEODB_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self {
                    account_keys: Arc::new(HashMap::new()),
                    admin_keys: Arc::new(HashSet::new()),
                    enabled: false,
                });
            }

            anyhow::bail!(
                "AEODB_API_KEYS (token:account_id pairs) or AEODB_ADMIN_KEYS is required outside development"
            );
        }

        Ok(Self {
            account_keys: Arc::new(account_keys),
            admin_keys: Arc::new(admin_keys),
            enabled: true,
        })
    }

    fn resolve(&self, token: &str) -> Option<AccountScope> {
        if self.admin_keys.contains(token) {
            return Some(AccountScope::SuperAdmin);
        }
        self.account_keys
            .get(token)
            .map(|&account_id| AccountScope::Account(account_id))
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Sliding fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for MiddlewareErrorBody {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing bearer token auth when enabled.
///
/// On success the resolved [`AccountScope`] is inserted into request
/// extensions; with auth disabled (development) every request runs
/// super-admin.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        req.extensions_mut().insert(AccountScope::SuperAdmin);
        return next.run(req).await;
    }

    let scope = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .and_then(|token| auth.resolve(token));

    match scope {
        Some(scope) => {
            req.extensions_mut().insert(scope);
            next.run(req).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "unauthorized",
                    message: "missing or invalid bearer token",
                },
            }),
        )
            .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "rate_limited",
                    message: "rate limit exceeded",
                },
            }),
        )
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}
