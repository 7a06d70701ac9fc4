//! In-process event bus for cycle progress.
//!
//! Subscribers get an unbounded channel; dropped receivers are pruned on
//! the next publish. Events are observational only, the coordinator never
//! waits on a subscriber.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use sw_core::types::{CycleId, StoryId, SubtaskKind, SubtaskState};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Everything observable about a cycle, in the order it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CycleEvent {
    /// A new cycle took over as current.
    CycleStarted { cycle: CycleId },
    /// A cycle was replaced before it settled.
    CycleSuperseded { cycle: CycleId },
    /// A subtask moved to a new state (streaming progress included).
    Subtask {
        cycle: CycleId,
        kind: SubtaskKind,
        state: SubtaskState,
    },
    /// The save was claimed and the store call is in flight.
    SaveStarted { cycle: CycleId },
    /// The store accepted the record.
    SaveCompleted { cycle: CycleId, story_id: StoryId },
    /// The store rejected the record.
    SaveFailed { cycle: CycleId, reason: String },
    /// A late illustration was patched onto an already-saved story.
    IllustrationAttached { cycle: CycleId, story_id: StoryId },
    /// The late-illustration patch failed; the story stays without an image.
    IllustrationAttachFailed {
        cycle: CycleId,
        story_id: StoryId,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<flume::Sender<CycleEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> flume::Receiver<CycleEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .push(tx);
        rx
    }

    /// Fan an event out to every live subscriber, pruning dead ones.
    pub fn publish(&self, event: CycleEvent) {
        let mut subscribers = self.subscribers.lock().expect("event bus lock poisoned");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .len()
    }
}
