use thiserror::Error;

/// Errors returned by the suggestion service client.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned `"status": "error"` with a message.
    #[error("enrichment API error: {0}")]
    Api(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
