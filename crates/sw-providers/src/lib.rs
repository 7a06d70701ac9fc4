//! Generation clients for storyweave.
//!
//! Two trait seams: [`TextStreamProvider`] for the streamed story and title
//! calls and [`ImageProvider`] for the single-shot illustration call, plus
//! OpenAI-compatible implementations of both and stub providers for tests.
//! The orchestrator only ever sees the traits; one failed call is terminal
//! for its subtask; no retries happen at this layer.

pub mod error;
pub mod image;
pub mod openai;
pub mod text;

pub use error::ProviderError;
pub use image::{ImageAsset, ImageProvider, StubImageProvider};
pub use openai::{OpenAiImageProvider, OpenAiTextProvider};
pub use text::{StubTextProvider, TextStream, TextStreamProvider};
