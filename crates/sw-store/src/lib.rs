//! Persistence client for storyweave.
//!
//! [`StoryStore`] is the seam the join coordinator persists through: one
//! `save` per cycle and, under the save-then-patch policy, one
//! `attach_illustration` per cycle, both at-most-once by construction on
//! the caller's side. [`HttpStoryStore`] talks to a PostgREST-style
//! endpoint; [`MemoryStoryStore`] backs the tests.

pub mod error;
pub mod http;
pub mod memory;

pub use error::StoreError;
pub use http::HttpStoryStore;
pub use memory::MemoryStoryStore;

use sw_core::types::{StoryId, StoryRecord};

/// Async seam for story persistence. Implementations must be safe to call
/// concurrently from unrelated cycles; no global ordering is implied.
#[async_trait::async_trait]
pub trait StoryStore: Send + Sync {
    /// Persist an assembled record, returning its identifier.
    async fn save(&self, record: &StoryRecord) -> Result<StoryId, StoreError>;

    /// Attach a late-arriving illustration URL to an already-saved record.
    async fn attach_illustration(&self, id: &StoryId, url: &str) -> Result<(), StoreError>;
}
