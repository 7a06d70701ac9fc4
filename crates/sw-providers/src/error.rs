/// Errors that can occur when talking to a generation service.
///
/// One enum across providers so the orchestrator can record failure reasons
/// uniformly regardless of which backing service produced them.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Required credentials are missing or the client is not set up.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The service's API returned an error response.
    #[error("api error: {0}")]
    Api(String),

    /// The service rate limited the request.
    #[error("rate limited - retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The request or stream timed out.
    #[error("request timed out")]
    Timeout,

    /// A stream ended (or a response arrived) without any usable content.
    #[error("no usable content in response")]
    EmptyResult,

    /// Network, connection, or decoding failures.
    #[error("{0}")]
    Other(String),
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
