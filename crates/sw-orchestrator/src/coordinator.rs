//! Join coordinator: folds subtask transitions into the current cycle and
//! claims the single persistence attempt.
//!
//! All cycle state lives behind one `std::sync::Mutex`. The lock is only
//! held to mutate state and to claim follow-up work; store calls are always
//! awaited outside of it. Claiming (flipping `SaveState::NotStarted` to
//! `InFlight` under the lock) is what makes the save exactly-once even when
//! two subtasks finish on different executor threads at the same instant.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use sw_core::types::{
    CycleId, GenerationCycle, PatchState, SavePolicy, SaveState, StoryId, StoryParams,
    StoryRecord, SubtaskKind, SubtaskState,
};
use sw_store::StoryStore;

use crate::bus::{CycleEvent, EventBus};

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Coordinator-private bookkeeping around the current cycle. `needs_patch`
/// is set when a record was persisted without an illustration under the
/// save-then-patch policy.
struct CurrentCycle {
    cycle: GenerationCycle,
    needs_patch: bool,
}

/// Follow-up work claimed under the lock, executed outside of it.
enum FollowUp {
    None,
    Save(StoryRecord),
    Patch { story_id: StoryId, url: String },
}

pub struct JoinCoordinator {
    store: Arc<dyn StoryStore>,
    bus: EventBus,
    policy: SavePolicy,
    current: Mutex<Option<CurrentCycle>>,
}

impl JoinCoordinator {
    pub fn new(store: Arc<dyn StoryStore>, bus: EventBus, policy: SavePolicy) -> Self {
        Self {
            store,
            bus,
            policy,
            current: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> SavePolicy {
        self.policy
    }

    /// Install a new current cycle, superseding whatever was there. The old
    /// cycle's in-flight work keeps running but every result it reports from
    /// now on is discarded.
    ///
    /// Ids are minted in submission order but concurrent submitters may
    /// reach this point out of order; an id at or below the current one is
    /// ignored so the newest submission always stays current.
    pub fn begin_cycle(&self, id: CycleId, params: StoryParams) {
        let superseded = {
            let mut guard = self.lock();
            if let Some(cur) = guard.as_ref() {
                if cur.cycle.id >= id {
                    debug!(cycle = %id, current = %cur.cycle.id, "ignoring out-of-order cycle install");
                    return;
                }
            }
            let previous = guard.replace(CurrentCycle {
                cycle: GenerationCycle::new(id, params),
                needs_patch: false,
            });
            previous.filter(|prev| !prev.cycle.is_settled()).map(|prev| prev.cycle.id)
        };
        if let Some(old) = superseded {
            info!(cycle = %old, successor = %id, "cycle superseded");
            self.bus.publish(CycleEvent::CycleSuperseded { cycle: old });
        }
        self.bus.publish(CycleEvent::CycleStarted { cycle: id });
    }

    /// Whether `id` is still the current cycle. Runners poll this to stop
    /// streaming for superseded cycles early.
    pub fn is_current(&self, id: CycleId) -> bool {
        self.lock().as_ref().map(|cur| cur.cycle.id) == Some(id)
    }

    /// A clone of the current cycle state, for inspection.
    pub fn snapshot(&self) -> Option<GenerationCycle> {
        self.lock().as_ref().map(|cur| cur.cycle.clone())
    }

    /// Fold one subtask transition into the current cycle.
    ///
    /// Transitions tagged with a superseded cycle id are dropped, as are
    /// transitions for a slot that already reached a terminal state. When the
    /// transition completes the join predicate this also runs the save (and,
    /// under save-then-patch, the late-illustration patch).
    pub async fn apply(&self, id: CycleId, kind: SubtaskKind, state: SubtaskState) {
        let follow_up = {
            let mut guard = self.lock();
            let Some(cur) = guard.as_mut() else {
                return;
            };
            if cur.cycle.id != id {
                debug!(cycle = %id, subtask = %kind, "dropping transition from superseded cycle");
                return;
            }
            if cur.cycle.subtask(kind).is_terminal() {
                debug!(cycle = %id, subtask = %kind, "dropping transition for settled subtask");
                return;
            }
            *cur.cycle.subtask_mut(kind) = state.clone();
            self.bus.publish(CycleEvent::Subtask {
                cycle: id,
                kind,
                state,
            });
            self.claim_follow_up(cur)
        };
        self.run_follow_up(id, follow_up).await;
    }

    // -----------------------------------------------------------------------
    // Claiming
    // -----------------------------------------------------------------------

    /// Decide, under the lock, whether this state change triggers the save or
    /// the patch. The claimed slot is flipped to `InFlight` before the lock is
    /// released, so no other transition can claim the same work.
    fn claim_follow_up(&self, cur: &mut CurrentCycle) -> FollowUp {
        let cycle = &mut cur.cycle;

        if cycle.save == SaveState::NotStarted && self.save_ready(cycle) {
            let image_url = cycle.illustration.output().map(str::to_string);
            let record = StoryRecord::assemble(
                &cycle.params,
                cycle.title.output().unwrap_or_default(),
                cycle.story.output().unwrap_or_default(),
                image_url,
            );
            cur.needs_patch = record.image_url.is_none();
            cur.cycle.save = SaveState::InFlight;
            return FollowUp::Save(record);
        }

        if self.policy == SavePolicy::SaveThenPatch
            && cur.needs_patch
            && cur.cycle.patch == PatchState::NotStarted
        {
            if let (Some(story_id), Some(url)) = (
                cur.cycle.save.story_id().cloned(),
                cur.cycle.illustration.output().map(str::to_string),
            ) {
                cur.cycle.patch = PatchState::InFlight;
                return FollowUp::Patch { story_id, url };
            }
        }

        FollowUp::None
    }

    /// The join predicate: story and title must have succeeded; under the
    /// default policy the illustration must additionally be terminal (a
    /// failed illustration degrades the record rather than blocking it).
    fn save_ready(&self, cycle: &GenerationCycle) -> bool {
        let texts_ready = cycle.story.output().is_some() && cycle.title.output().is_some();
        match self.policy {
            SavePolicy::AwaitIllustration => texts_ready && cycle.illustration.is_terminal(),
            SavePolicy::SaveThenPatch => texts_ready,
        }
    }

    // -----------------------------------------------------------------------
    // Store calls
    // -----------------------------------------------------------------------

    async fn run_follow_up(&self, id: CycleId, follow_up: FollowUp) {
        match follow_up {
            FollowUp::None => {}
            FollowUp::Save(record) => self.run_save(id, record).await,
            FollowUp::Patch { story_id, url } => self.run_patch(id, story_id, url).await,
        }
    }

    async fn run_save(&self, id: CycleId, record: StoryRecord) {
        self.bus.publish(CycleEvent::SaveStarted { cycle: id });
        info!(cycle = %id, title = %record.title, "persisting story");
        let result = self.store.save(&record).await;

        let follow_up = {
            let mut guard = self.lock();
            let Some(cur) = guard.as_mut() else {
                return;
            };
            if cur.cycle.id != id {
                debug!(cycle = %id, "dropping save result from superseded cycle");
                return;
            }
            match result {
                Ok(story_id) => {
                    info!(cycle = %id, story_id = %story_id, "story saved");
                    cur.cycle.save = SaveState::Completed {
                        story_id: story_id.clone(),
                    };
                    self.bus.publish(CycleEvent::SaveCompleted {
                        cycle: id,
                        story_id,
                    });
                    // The illustration may have landed while the save was in
                    // flight; claim the patch now if so.
                    self.claim_follow_up(cur)
                }
                Err(err) => {
                    warn!(cycle = %id, error = %err, "save failed");
                    cur.cycle.save = SaveState::Failed {
                        reason: err.to_string(),
                    };
                    self.bus.publish(CycleEvent::SaveFailed {
                        cycle: id,
                        reason: err.to_string(),
                    });
                    FollowUp::None
                }
            }
        };
        // Only a patch can be claimed once the save slot is occupied.
        if let FollowUp::Patch { story_id, url } = follow_up {
            self.run_patch(id, story_id, url).await;
        }
    }

    async fn run_patch(&self, id: CycleId, story_id: StoryId, url: String) {
        debug!(cycle = %id, story_id = %story_id, "attaching late illustration");
        let result = self.store.attach_illustration(&story_id, &url).await;

        let mut guard = self.lock();
        let Some(cur) = guard.as_mut() else {
            return;
        };
        if cur.cycle.id != id {
            debug!(cycle = %id, "dropping patch result from superseded cycle");
            return;
        }
        match result {
            Ok(()) => {
                cur.cycle.patch = PatchState::Completed;
                self.bus.publish(CycleEvent::IllustrationAttached {
                    cycle: id,
                    story_id,
                });
            }
            Err(err) => {
                // The story itself is already saved; a failed patch only
                // leaves it without an image.
                warn!(cycle = %id, story_id = %story_id, error = %err, "illustration patch failed");
                cur.cycle.patch = PatchState::Failed {
                    reason: err.to_string(),
                };
                self.bus.publish(CycleEvent::IllustrationAttachFailed {
                    cycle: id,
                    story_id,
                    reason: err.to_string(),
                });
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CurrentCycle>> {
        self.current.lock().expect("cycle lock poisoned")
    }
}
