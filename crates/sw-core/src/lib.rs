//! Core domain types for storyweave.
//!
//! This crate holds everything the other crates agree on: the request
//! snapshot and preset catalog, the per-subtask and per-cycle state machines,
//! the persisted record shape, prompt construction, and configuration.
//! It deliberately has no I/O of its own.

pub mod config;
pub mod presets;
pub mod prompts;
pub mod types;
