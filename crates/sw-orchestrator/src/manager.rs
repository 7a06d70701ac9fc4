//! Cycle manager: the public front door. Validates a submission, mints the
//! next cycle id, installs the cycle as current, and spawns its three
//! subtask runners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use sw_core::prompts;
use sw_core::types::{
    CycleId, GenerationCycle, SavePolicy, SaveState, StoryId, StoryParams, SubtaskKind,
    ValidationError,
};
use sw_providers::{ImageProvider, TextStreamProvider};
use sw_store::StoryStore;

use crate::bus::{CycleEvent, EventBus};
use crate::coordinator::JoinCoordinator;
use crate::runner;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How one cycle ended, as seen by [`Orchestrator::wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The record was persisted.
    Saved(StoryId),
    /// Generation succeeded but the store rejected the record.
    SaveFailed(String),
    /// The story or title failed, so there was nothing to save.
    GenerationFailed { kind: SubtaskKind, reason: String },
    /// A later submission replaced this cycle before it settled.
    Superseded,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    coordinator: Arc<JoinCoordinator>,
    bus: EventBus,
    story: Arc<dyn TextStreamProvider>,
    title: Arc<dyn TextStreamProvider>,
    image: Arc<dyn ImageProvider>,
    next_cycle: AtomicU64,
    subtask_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        story: Arc<dyn TextStreamProvider>,
        title: Arc<dyn TextStreamProvider>,
        image: Arc<dyn ImageProvider>,
        store: Arc<dyn StoryStore>,
        policy: SavePolicy,
    ) -> Self {
        let bus = EventBus::new();
        Self {
            coordinator: Arc::new(JoinCoordinator::new(store, bus.clone(), policy)),
            bus,
            story,
            title,
            image,
            next_cycle: AtomicU64::new(0),
            subtask_timeout: None,
        }
    }

    /// Cap the wall-clock time of each subtask. A subtask that overruns is
    /// failed with a timeout reason; the cycle itself keeps going.
    pub fn with_subtask_timeout(mut self, limit: Duration) -> Self {
        self.subtask_timeout = Some(limit);
        self
    }

    /// Subscribe to progress events. Events published before the call are
    /// not replayed; combine with [`Orchestrator::snapshot`] to catch up.
    pub fn subscribe(&self) -> flume::Receiver<CycleEvent> {
        self.bus.subscribe()
    }

    /// Start a new generation cycle, superseding the current one.
    ///
    /// Validation failures are synchronous and leave the current cycle
    /// untouched.
    pub fn submit(&self, params: StoryParams) -> Result<CycleId, ValidationError> {
        params.validate()?;

        let id = CycleId(self.next_cycle.fetch_add(1, Ordering::SeqCst) + 1);
        let cycle_prompts = prompts::build_prompts(&params);
        info!(cycle = %id, hero_name = %params.hero_name, "starting generation cycle");

        self.coordinator.begin_cycle(id, params);

        tokio::spawn(runner::run_streamed(
            self.coordinator.clone(),
            id,
            SubtaskKind::Story,
            self.story.clone(),
            cycle_prompts.story,
            self.subtask_timeout,
        ));
        tokio::spawn(runner::run_streamed(
            self.coordinator.clone(),
            id,
            SubtaskKind::Title,
            self.title.clone(),
            cycle_prompts.title,
            self.subtask_timeout,
        ));
        tokio::spawn(runner::run_illustration(
            self.coordinator.clone(),
            id,
            self.image.clone(),
            cycle_prompts.illustration,
            self.subtask_timeout,
        ));

        Ok(id)
    }

    pub fn is_current(&self, id: CycleId) -> bool {
        self.coordinator.is_current(id)
    }

    pub fn snapshot(&self) -> Option<GenerationCycle> {
        self.coordinator.snapshot()
    }

    /// Wait until cycle `id` reaches an outcome.
    pub async fn wait(&self, id: CycleId) -> CycleOutcome {
        // Subscribe before inspecting the snapshot so no event can fall
        // between the two.
        let events = self.bus.subscribe();
        if let Some(outcome) = self.settled_outcome(id) {
            return outcome;
        }

        while let Ok(event) = events.recv_async().await {
            match event {
                CycleEvent::SaveCompleted { cycle, story_id } if cycle == id => {
                    return CycleOutcome::Saved(story_id);
                }
                CycleEvent::SaveFailed { cycle, reason } if cycle == id => {
                    return CycleOutcome::SaveFailed(reason);
                }
                CycleEvent::Subtask {
                    cycle,
                    kind,
                    state: sw_core::types::SubtaskState::Failed { reason },
                } if cycle == id && kind != SubtaskKind::Illustration => {
                    return CycleOutcome::GenerationFailed { kind, reason };
                }
                CycleEvent::CycleSuperseded { cycle } if cycle == id => {
                    return CycleOutcome::Superseded;
                }
                _ => {}
            }
        }
        CycleOutcome::Superseded
    }

    /// The outcome of `id` if it already settled (or was replaced).
    fn settled_outcome(&self, id: CycleId) -> Option<CycleOutcome> {
        let cycle = match self.coordinator.snapshot() {
            Some(cycle) if cycle.id == id => cycle,
            // The cycle is no longer current (or never existed).
            Some(_) => return Some(CycleOutcome::Superseded),
            None => return Some(CycleOutcome::Superseded),
        };
        match &cycle.save {
            SaveState::Completed { story_id } => Some(CycleOutcome::Saved(story_id.clone())),
            SaveState::Failed { reason } => Some(CycleOutcome::SaveFailed(reason.clone())),
            _ => {
                for kind in [SubtaskKind::Story, SubtaskKind::Title] {
                    if let sw_core::types::SubtaskState::Failed { reason } = cycle.subtask(kind) {
                        return Some(CycleOutcome::GenerationFailed {
                            kind,
                            reason: reason.clone(),
                        });
                    }
                }
                None
            }
        }
    }
}
