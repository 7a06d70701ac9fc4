//! End-to-end orchestrator runs: submit, stream, join, save.

mod common;

use std::sync::Arc;
use std::time::Duration;

use sw_core::types::{SavePolicy, SubtaskKind, SubtaskState};
use sw_orchestrator::{CycleEvent, CycleOutcome, Orchestrator};
use sw_providers::{StubImageProvider, StubTextProvider};
use sw_store::MemoryStoryStore;

#[tokio::test]
async fn full_cycle_saves_the_assembled_story() {
    let store = Arc::new(MemoryStoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::with_chunks(["Once upon a time, ", "Ember flew home."])),
        Arc::new(StubTextProvider::with_chunks(["Ember ", "the Brave"])),
        Arc::new(StubImageProvider::with_url("https://img.example/ember.png")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );
    let events = orchestrator.subscribe();

    let id = orchestrator.submit(common::params()).unwrap();
    assert_eq!(orchestrator.wait(id).await, CycleOutcome::Saved(store.records()[0].0.clone()));

    assert_eq!(store.save_calls(), 1);
    let record = &store.records()[0].1;
    assert_eq!(record.content, "Once upon a time, Ember flew home.");
    assert_eq!(record.title, "Ember the Brave");
    assert_eq!(record.image_url.as_deref(), Some("https://img.example/ember.png"));
    assert_eq!(record.hero_name, "Ember");
    assert_eq!(record.hero_label, "Dragon");

    // Streaming progress was published before the save events.
    let mut saw_partial = false;
    let mut saw_save = false;
    while let Ok(event) = events.try_recv() {
        match event {
            CycleEvent::Subtask { kind: SubtaskKind::Story, state, .. } => {
                if state.output().is_none() && !state.is_terminal() {
                    assert!(!saw_save);
                    saw_partial = true;
                }
            }
            CycleEvent::SaveCompleted { .. } => saw_save = true,
            _ => {}
        }
    }
    assert!(saw_partial);
    assert!(saw_save);
}

#[tokio::test]
async fn resubmission_supersedes_the_running_cycle() {
    let store = Arc::new(MemoryStoryStore::new());
    let story = Arc::new(common::ScriptedTextProvider::new());
    let image = Arc::new(common::GatedImageProvider::new());
    let orchestrator = Orchestrator::new(
        story.clone(),
        Arc::new(StubTextProvider::with_chunks(["A Title"])),
        image.clone(),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );

    // First cycle freezes mid-story; its image call never resolves either.
    let first_story = story.push_channel();
    let _first_image = image.push_gate();
    let first = orchestrator.submit(common::params()).unwrap();
    first_story.send(Ok("Once".to_string())).unwrap();

    // Let the first cycle's runners claim their scripted calls before the
    // second cycle registers its own.
    loop {
        let cycle = orchestrator.snapshot().unwrap();
        if matches!(cycle.story, SubtaskState::InProgress { .. })
            && matches!(cycle.illustration, SubtaskState::InProgress { .. })
        {
            break;
        }
        tokio::task::yield_now().await;
    }

    // Second cycle completes normally.
    story.push_chunks(["A whole other story."]);
    image.push_url("https://img.example/second.png");
    let mut params = common::params();
    params.hero_name = "Luna".to_string();
    let second = orchestrator.submit(params).unwrap();

    assert_eq!(orchestrator.wait(first).await, CycleOutcome::Superseded);
    assert!(matches!(orchestrator.wait(second).await, CycleOutcome::Saved(_)));
    assert!(!orchestrator.is_current(first));
    assert!(orchestrator.is_current(second));

    // Only the second cycle was persisted.
    assert_eq!(store.save_calls(), 1);
    let record = &store.records()[0].1;
    assert_eq!(record.hero_name, "Luna");
    assert_eq!(record.content, "A whole other story.");
}

#[tokio::test]
async fn failed_illustration_still_saves_the_story() {
    let store = Arc::new(MemoryStoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::with_chunks(["Once upon a time, ", "Ember was brave."])),
        Arc::new(StubTextProvider::with_chunks(["Ember the Brave"])),
        Arc::new(StubImageProvider::failing("quota exceeded")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );
    let events = orchestrator.subscribe();

    let id = orchestrator.submit(common::params()).unwrap();
    assert!(matches!(orchestrator.wait(id).await, CycleOutcome::Saved(_)));

    assert_eq!(store.save_calls(), 1);
    let record = &store.records()[0].1;
    assert_eq!(record.title, "Ember the Brave");
    assert_eq!(record.content, "Once upon a time, Ember was brave.");
    assert_eq!(record.image_url, None);

    // The illustration failure is visible, but there is no save failure.
    let mut saw_illustration_failure = false;
    while let Ok(event) = events.try_recv() {
        match event {
            CycleEvent::Subtask { kind: SubtaskKind::Illustration, state, .. } => {
                if let SubtaskState::Failed { reason } = state {
                    assert_eq!(reason, "api error: quota exceeded");
                    saw_illustration_failure = true;
                }
            }
            CycleEvent::SaveFailed { .. } => panic!("unexpected save failure"),
            _ => {}
        }
    }
    assert!(saw_illustration_failure);
}

#[tokio::test]
async fn story_provider_failure_ends_the_cycle_without_a_save() {
    let store = Arc::new(MemoryStoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::failing("quota exceeded")),
        Arc::new(StubTextProvider::with_chunks(["A Title"])),
        Arc::new(StubImageProvider::with_url("https://img.example/x.png")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );

    let id = orchestrator.submit(common::params()).unwrap();
    let outcome = orchestrator.wait(id).await;

    assert!(matches!(
        outcome,
        CycleOutcome::GenerationFailed { kind: SubtaskKind::Story, .. }
    ));
    assert_eq!(store.save_calls(), 0);
}

#[tokio::test]
async fn title_provider_failure_ends_the_cycle_without_a_save() {
    let store = Arc::new(MemoryStoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::with_chunks(["Once upon a time."])),
        Arc::new(StubTextProvider::failing("quota exceeded")),
        Arc::new(StubImageProvider::with_url("https://img.example/x.png")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );

    let id = orchestrator.submit(common::params()).unwrap();
    let outcome = orchestrator.wait(id).await;

    assert!(matches!(
        outcome,
        CycleOutcome::GenerationFailed { kind: SubtaskKind::Title, .. }
    ));
    assert_eq!(store.save_calls(), 0);
    assert!(orchestrator.snapshot().unwrap().is_settled());
}

#[tokio::test]
async fn whitespace_only_stream_counts_as_failure() {
    let store = Arc::new(MemoryStoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::with_chunks(["  ", "\n"])),
        Arc::new(StubTextProvider::with_chunks(["A Title"])),
        Arc::new(StubImageProvider::with_url("https://img.example/x.png")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );

    let id = orchestrator.submit(common::params()).unwrap();
    match orchestrator.wait(id).await {
        CycleOutcome::GenerationFailed { kind: SubtaskKind::Story, reason } => {
            assert_eq!(reason, "stream ended with no content");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.save_calls(), 0);
}

#[tokio::test]
async fn store_rejection_surfaces_as_save_failed() {
    let store = Arc::new(MemoryStoryStore::failing_saves("db offline"));
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::with_chunks(["Once upon a time."])),
        Arc::new(StubTextProvider::with_chunks(["A Title"])),
        Arc::new(StubImageProvider::with_url("https://img.example/x.png")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );

    let id = orchestrator.submit(common::params()).unwrap();
    match orchestrator.wait(id).await {
        CycleOutcome::SaveFailed(reason) => assert!(reason.contains("db offline")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.save_calls(), 1);
}

#[tokio::test]
async fn save_then_patch_saves_early_and_patches_late() {
    let store = Arc::new(MemoryStoryStore::new());
    let image = Arc::new(common::GatedImageProvider::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::with_chunks(["Once upon a time."])),
        Arc::new(StubTextProvider::with_chunks(["A Title"])),
        image.clone(),
        store.clone(),
        SavePolicy::SaveThenPatch,
    );
    let gate = image.push_gate();

    let id = orchestrator.submit(common::params()).unwrap();
    let outcome = orchestrator.wait(id).await;
    assert!(matches!(outcome, CycleOutcome::Saved(_)));

    // Saved before the illustration resolved.
    assert_eq!(store.records()[0].1.image_url, None);
    assert_eq!(store.patch_calls(), 0);

    let events = orchestrator.subscribe();
    gate.send(Ok("https://img.example/late.png".to_string())).unwrap();
    loop {
        match events.recv_async().await.unwrap() {
            CycleEvent::IllustrationAttached { cycle, .. } => {
                assert_eq!(cycle, id);
                break;
            }
            _ => {}
        }
    }

    assert_eq!(store.patch_calls(), 1);
    assert_eq!(
        store.records()[0].1.image_url.as_deref(),
        Some("https://img.example/late.png")
    );
}

#[tokio::test]
async fn overrunning_subtask_is_timed_out() {
    let store = Arc::new(MemoryStoryStore::new());
    let story = Arc::new(common::ScriptedTextProvider::new());
    let orchestrator = Orchestrator::new(
        story.clone(),
        Arc::new(StubTextProvider::with_chunks(["A Title"])),
        Arc::new(StubImageProvider::with_url("https://img.example/x.png")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    )
    .with_subtask_timeout(Duration::from_millis(50));

    // The story stream never produces anything.
    let _story_feed = story.push_channel();
    let id = orchestrator.submit(common::params()).unwrap();

    match orchestrator.wait(id).await {
        CycleOutcome::GenerationFailed { kind: SubtaskKind::Story, reason } => {
            assert!(reason.contains("timed out"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.save_calls(), 0);
}

#[tokio::test]
async fn invalid_params_are_rejected_synchronously() {
    let store = Arc::new(MemoryStoryStore::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StubTextProvider::with_chunks(["Once"])),
        Arc::new(StubTextProvider::with_chunks(["A Title"])),
        Arc::new(StubImageProvider::with_url("https://img.example/x.png")),
        store.clone(),
        SavePolicy::AwaitIllustration,
    );

    let mut params = common::params();
    params.hero_name = String::new();
    assert!(orchestrator.submit(params).is_err());

    // No cycle was started.
    assert!(orchestrator.snapshot().is_none());
    assert_eq!(store.save_calls(), 0);
}
