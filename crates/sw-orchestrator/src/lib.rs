//! Orchestration of a single generation cycle.
//!
//! A cycle fans out three subtasks (story text, title, illustration),
//! folds their transitions through the [`JoinCoordinator`], and persists
//! the finished story exactly once. Results from superseded cycles are
//! discarded rather than cancelled.

pub mod bus;
pub mod coordinator;
pub mod manager;
mod runner;

pub use bus::{CycleEvent, EventBus};
pub use coordinator::JoinCoordinator;
pub use manager::{CycleOutcome, Orchestrator};
