//! Subtask runners: one spawned task per subtask, each reporting every
//! transition back through the coordinator. Runners never touch cycle state
//! directly and never cancel each other; a runner for a superseded cycle
//! simply stops early, and anything it still reports is dropped.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use sw_core::prompts::TextPrompt;
use sw_core::types::{CycleId, SubtaskKind, SubtaskState};
use sw_providers::{ImageProvider, TextStreamProvider};

use crate::coordinator::JoinCoordinator;

/// Drive one streamed text subtask (story or title) to a terminal state.
pub(crate) async fn run_streamed(
    coordinator: Arc<JoinCoordinator>,
    cycle: CycleId,
    kind: SubtaskKind,
    provider: Arc<dyn TextStreamProvider>,
    prompt: TextPrompt,
    limit: Option<Duration>,
) {
    let driven = drive_stream(&coordinator, cycle, kind, provider.as_ref(), &prompt);
    let outcome = match limit {
        Some(limit) => match tokio::time::timeout(limit, driven).await {
            Ok(outcome) => outcome,
            Err(_) => Some(SubtaskState::failed(format!(
                "timed out after {}s",
                limit.as_secs()
            ))),
        },
        None => driven.await,
    };
    if let Some(terminal) = outcome {
        coordinator.apply(cycle, kind, terminal).await;
    }
}

/// Consume the provider stream, reporting accumulated partial text after
/// every chunk. Returns `None` when the cycle was superseded mid-stream and
/// there is nothing left worth reporting.
async fn drive_stream(
    coordinator: &JoinCoordinator,
    cycle: CycleId,
    kind: SubtaskKind,
    provider: &dyn TextStreamProvider,
    prompt: &TextPrompt,
) -> Option<SubtaskState> {
    let mut stream = match provider.stream(prompt).await {
        Ok(stream) => stream,
        Err(err) => return Some(SubtaskState::failed(err.to_string())),
    };

    let mut accumulated = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                accumulated.push_str(&chunk);
                coordinator
                    .apply(
                        cycle,
                        kind,
                        SubtaskState::InProgress {
                            partial: accumulated.clone(),
                        },
                    )
                    .await;
                if !coordinator.is_current(cycle) {
                    debug!(cycle = %cycle, subtask = %kind, "cycle superseded, abandoning stream");
                    return None;
                }
            }
            Err(err) => return Some(SubtaskState::failed(err.to_string())),
        }
    }

    let text = accumulated.trim();
    if text.is_empty() {
        Some(SubtaskState::failed("stream ended with no content"))
    } else {
        Some(SubtaskState::succeeded(text))
    }
}

/// Run the single-shot illustration subtask to a terminal state.
pub(crate) async fn run_illustration(
    coordinator: Arc<JoinCoordinator>,
    cycle: CycleId,
    provider: Arc<dyn ImageProvider>,
    prompt: String,
    limit: Option<Duration>,
) {
    coordinator
        .apply(
            cycle,
            SubtaskKind::Illustration,
            SubtaskState::InProgress {
                partial: String::new(),
            },
        )
        .await;

    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, provider.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => {
                coordinator
                    .apply(
                        cycle,
                        SubtaskKind::Illustration,
                        SubtaskState::failed(format!("timed out after {}s", limit.as_secs())),
                    )
                    .await;
                return;
            }
        },
        None => provider.generate(&prompt).await,
    };

    let terminal = match result {
        Ok(asset) => SubtaskState::succeeded(asset.url),
        Err(err) => SubtaskState::failed(err.to_string()),
    };
    coordinator.apply(cycle, SubtaskKind::Illustration, terminal).await;
}
