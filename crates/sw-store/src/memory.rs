use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use sw_core::types::{StoryId, StoryRecord};
use uuid::Uuid;

use crate::error::StoreError;
use crate::StoryStore;

/// In-memory store used by tests. Counts calls so the at-most-once
/// properties can be asserted, and can be switched to fail every save or
/// every patch.
#[derive(Default)]
pub struct MemoryStoryStore {
    records: Mutex<Vec<(StoryId, StoryRecord)>>,
    save_calls: AtomicUsize,
    patch_calls: AtomicUsize,
    fail_saves: Option<String>,
    fail_patches: Option<String>,
}

impl MemoryStoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every `save` fails with `reason`.
    pub fn failing_saves(reason: impl Into<String>) -> Self {
        Self { fail_saves: Some(reason.into()), ..Self::default() }
    }

    /// A store whose every `attach_illustration` fails with `reason`.
    pub fn failing_patches(reason: impl Into<String>) -> Self {
        Self { fail_patches: Some(reason.into()), ..Self::default() }
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of all persisted records.
    pub fn records(&self) -> Vec<(StoryId, StoryRecord)> {
        self.records.lock().expect("store lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl StoryStore for MemoryStoryStore {
    async fn save(&self, record: &StoryRecord) -> Result<StoryId, StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_saves {
            return Err(StoreError::Api { status: 500, body: reason.clone() });
        }
        let id = StoryId(Uuid::new_v4().to_string());
        self.records
            .lock()
            .expect("store lock poisoned")
            .push((id.clone(), record.clone()));
        Ok(id)
    }

    async fn attach_illustration(&self, id: &StoryId, url: &str) -> Result<(), StoreError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_patches {
            return Err(StoreError::Api { status: 500, body: reason.clone() });
        }
        let mut records = self.records.lock().expect("store lock poisoned");
        let Some((_, record)) = records.iter_mut().find(|(existing, _)| existing == id) else {
            return Err(StoreError::Api { status: 404, body: format!("no record {id}") });
        };
        record.image_url = Some(url.to_string());
        Ok(())
    }
}
