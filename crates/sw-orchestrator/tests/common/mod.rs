//! Shared test fixtures: channel-driven providers whose timing the test
//! controls, and a store wrapper that can hold a save open.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;

use sw_core::prompts::TextPrompt;
use sw_core::types::{PresetChoice, StoryId, StoryParams, StoryRecord};
use sw_providers::{ImageAsset, ImageProvider, ProviderError, TextStream, TextStreamProvider};
use sw_store::{StoreError, StoryStore};

pub fn params() -> StoryParams {
    StoryParams {
        hero: PresetChoice::preset("dragon"),
        hero_name: "Ember".to_string(),
        setting: PresetChoice::preset("forest"),
        length: PresetChoice::preset("3min"),
        moral: PresetChoice::preset("bravery"),
        age_range: "4-7".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Channel-driven providers
// ---------------------------------------------------------------------------

/// A text provider that serves pre-registered streams in order, one per
/// `stream` call. A channel-backed stream stays open until the test drops
/// its sender, which lets a test freeze a subtask mid-stream.
pub struct ScriptedTextProvider {
    streams: Mutex<VecDeque<flume::Receiver<Result<String, ProviderError>>>>,
}

impl ScriptedTextProvider {
    pub fn new() -> Self {
        Self { streams: Mutex::new(VecDeque::new()) }
    }

    /// Register a stream the test feeds by hand.
    pub fn push_channel(&self) -> flume::Sender<Result<String, ProviderError>> {
        let (tx, rx) = flume::unbounded();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    /// Register a stream that replays `chunks` and ends.
    pub fn push_chunks(&self, chunks: impl IntoIterator<Item = &'static str>) {
        let tx = self.push_channel();
        for chunk in chunks {
            tx.send(Ok(chunk.to_string())).unwrap();
        }
    }
}

#[async_trait::async_trait]
impl TextStreamProvider for ScriptedTextProvider {
    async fn stream(&self, _prompt: &TextPrompt) -> Result<TextStream, ProviderError> {
        let rx = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Api("no scripted stream left".to_string()))?;
        Ok(rx.into_stream().boxed())
    }

    fn name(&self) -> &str {
        "scripted-text"
    }
}

/// An image provider whose `generate` blocks until the test sends the
/// result through the matching gate.
pub struct GatedImageProvider {
    gates: Mutex<VecDeque<flume::Receiver<Result<String, ProviderError>>>>,
}

impl GatedImageProvider {
    pub fn new() -> Self {
        Self { gates: Mutex::new(VecDeque::new()) }
    }

    pub fn push_gate(&self) -> flume::Sender<Result<String, ProviderError>> {
        let (tx, rx) = flume::unbounded();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Register a call that resolves immediately with `url`.
    pub fn push_url(&self, url: &str) {
        let tx = self.push_gate();
        tx.send(Ok(url.to_string())).unwrap();
    }
}

#[async_trait::async_trait]
impl ImageProvider for GatedImageProvider {
    async fn generate(&self, _prompt: &str) -> Result<ImageAsset, ProviderError> {
        let rx = self
            .gates
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Api("no scripted image call left".to_string()))?;
        match rx.recv_async().await {
            Ok(Ok(url)) => Ok(ImageAsset { url }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ProviderError::Api("image gate dropped".to_string())),
        }
    }

    fn name(&self) -> &str {
        "gated-image"
    }
}

// ---------------------------------------------------------------------------
// Gated store
// ---------------------------------------------------------------------------

/// Wraps a [`StoryStore`] and holds every `save` open until the test fires
/// the gate, so a test can supersede a cycle while its save is in flight.
pub struct GatedStore<S> {
    inner: Arc<S>,
    gate: flume::Receiver<()>,
}

impl<S: StoryStore> GatedStore<S> {
    pub fn new(inner: Arc<S>) -> (Self, flume::Sender<()>) {
        let (tx, rx) = flume::unbounded();
        (Self { inner, gate: rx }, tx)
    }
}

#[async_trait::async_trait]
impl<S: StoryStore> StoryStore for GatedStore<S> {
    async fn save(&self, record: &StoryRecord) -> Result<StoryId, StoreError> {
        let _ = self.gate.recv_async().await;
        self.inner.save(record).await
    }

    async fn attach_illustration(&self, id: &StoryId, url: &str) -> Result<(), StoreError> {
        self.inner.attach_illustration(id, url).await
    }
}
