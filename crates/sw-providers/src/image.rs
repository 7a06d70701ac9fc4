use crate::error::{ProviderError, Result};

/// A generated illustration, referenced by a resolvable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub url: String,
}

// ---------------------------------------------------------------------------
// ImageProvider trait
// ---------------------------------------------------------------------------

/// Async seam for single-shot illustration generation.
///
/// One request, one response: either a resolvable asset reference or an
/// error. A well-formed response without a reference is an error too.
#[async_trait::async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<ImageAsset>;

    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// StubImageProvider
// ---------------------------------------------------------------------------

/// Canned image provider for tests: always returns the same URL, or always
/// fails with the configured reason.
pub struct StubImageProvider {
    result: std::result::Result<String, String>,
}

impl StubImageProvider {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { result: Ok(url.into()) }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self { result: Err(reason.into()) }
    }
}

#[async_trait::async_trait]
impl ImageProvider for StubImageProvider {
    async fn generate(&self, _prompt: &str) -> Result<ImageAsset> {
        match &self.result {
            Ok(url) => Ok(ImageAsset { url: url.clone() }),
            Err(reason) => Err(ProviderError::Api(reason.clone())),
        }
    }

    fn name(&self) -> &str {
        "stub-image"
    }
}
