/// Errors from the persistence client. A failed save is terminal for its
/// cycle; the orchestrator never retries, the user resubmits instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Credentials missing or the client is not set up.
    #[error("store not configured: {0}")]
    NotConfigured(String),

    /// The store rejected the request.
    #[error("store api error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The store's response could not be interpreted.
    #[error("unexpected store response: {0}")]
    BadResponse(String),

    /// Network or connection failure.
    #[error("store transport error: {0}")]
    Transport(String),
}
