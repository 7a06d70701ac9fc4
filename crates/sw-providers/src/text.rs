use futures_util::stream::{self, BoxStream, StreamExt};
use sw_core::prompts::TextPrompt;

use crate::error::{ProviderError, Result};

/// An ordered sequence of text fragments. The stream ends when the remote
/// signals end-of-stream; a mid-stream `Err` is an error marker and is
/// terminal for the consuming subtask.
pub type TextStream = BoxStream<'static, Result<String>>;

// ---------------------------------------------------------------------------
// TextStreamProvider trait
// ---------------------------------------------------------------------------

/// Async seam for streamed text generation (story and title).
///
/// Implementations must be `Send + Sync`; the orchestrator shares one
/// instance across concurrently running cycles. A returned stream belongs to
/// exactly one subtask of one cycle.
#[async_trait::async_trait]
pub trait TextStreamProvider: Send + Sync {
    /// Start a streamed completion for `prompt`.
    ///
    /// An `Err` here means the call could not be started at all; errors
    /// during streaming are delivered through the stream itself.
    async fn stream(&self, prompt: &TextPrompt) -> Result<TextStream>;

    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// StubTextProvider
// ---------------------------------------------------------------------------

/// A canned-response provider for tests and placeholder wiring. Every call
/// replays the same chunks, or fails to start when constructed with
/// [`StubTextProvider::failing`].
pub struct StubTextProvider {
    chunks: Vec<String>,
    start_error: Option<String>,
}

impl StubTextProvider {
    pub fn with_chunks(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            start_error: None,
        }
    }

    /// A provider whose `stream` call always fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self { chunks: Vec::new(), start_error: Some(reason.into()) }
    }
}

#[async_trait::async_trait]
impl TextStreamProvider for StubTextProvider {
    async fn stream(&self, _prompt: &TextPrompt) -> Result<TextStream> {
        if let Some(reason) = &self.start_error {
            return Err(ProviderError::Api(reason.clone()));
        }
        let chunks: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(stream::iter(chunks).boxed())
    }

    fn name(&self) -> &str {
        "stub-text"
    }
}
