//! HTTP client for the suggestion service.
//!
//! Wraps `reqwest` with typed request/response handling. Every response
//! carries a JSON envelope whose `"status"` field is checked first; API-level
//! failures surface as [`EnrichError::Api`]. There is no retry — a failed
//! generate call is reported straight back to the wizard.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::EnrichError;
use crate::types::{SuggestEnvelope, SuggestRequest, Suggestion, SuggestionKind};

/// Client for the suggestion service.
///
/// Use [`EnrichClient::new`] for production or
/// [`EnrichClient::with_base_url`] to point at a mock server in tests.
pub struct EnrichClient {
    client: Client,
    api_key: Option<String>,
    base_url: Url,
}

impl EnrichClient {
    /// Creates a client for the given service base URL.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`EnrichError::Api`] if `base_url` is not a
    /// valid URL.
    pub fn new(base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Result<Self, EnrichError> {
        Self::with_base_url(api_key, timeout_secs, base_url)
    }

    /// Creates a new client with an explicit base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`EnrichError::Api`] if `base_url` is not a
    /// valid URL.
    pub fn with_base_url(
        api_key: Option<&str>,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, EnrichError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("aeodb/0.1 (setup-enrichment)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // join() appends to the path instead of replacing the last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| EnrichError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.map(ToOwned::to_owned),
            base_url,
        })
    }

    /// Request suggestions for one wizard step.
    ///
    /// # Errors
    ///
    /// - [`EnrichError::Api`] if the service returns an error status.
    /// - [`EnrichError::Http`] on network failure or non-2xx HTTP status.
    /// - [`EnrichError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn suggest(
        &self,
        kind: SuggestionKind,
        company: &str,
        industry: Option<&str>,
        context: Option<&str>,
    ) -> Result<Vec<Suggestion>, EnrichError> {
        let url = self
            .base_url
            .join("v1/suggest")
            .map_err(|e| EnrichError::Api(format!("invalid suggest URL: {e}")))?;

        let mut request = self.client.post(url).json(&SuggestRequest {
            kind,
            company,
            industry,
            context,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body = request.send().await?.error_for_status()?.text().await?;
        let envelope: SuggestEnvelope =
            serde_json::from_str(&body).map_err(|e| EnrichError::Deserialize {
                context: format!("suggest(kind={kind})"),
                source: e,
            })?;

        if envelope.status != "ok" {
            return Err(EnrichError::Api(
                envelope
                    .error
                    .unwrap_or_else(|| format!("status '{}' with no message", envelope.status)),
            ));
        }

        Ok(envelope.suggestions.unwrap_or_default())
    }
}
