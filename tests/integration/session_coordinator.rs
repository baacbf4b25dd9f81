//! Integration tests for the session coordinator: preset resolution at submit
//! time and provenance of the resulting artifacts.

use crate::integration::test_utils::{held, params, temp_store, ScriptedModel};
use lorakit::config::LorakitConfig;
use lorakit::generation::{GenerationQueue, TaskOutcome, TaskStatus};
use lorakit::metadata::{
    KEY_ADAPTER_COUNT, KEY_PRESET_ENTRIES, KEY_PRESET_NAME, KEY_VERSION, NO_PRESET,
};
use lorakit::{AdapterEntry, SessionCoordinator};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

const LIMIT: Duration = Duration::from_secs(5);

fn coordinator(model: std::sync::Arc<ScriptedModel>) -> (SessionCoordinator, TempDir) {
    let (store, dir) = temp_store();
    let queue = GenerationQueue::start(model, "2026.10.3");
    (SessionCoordinator::new(store, queue), dir)
}

async fn finish(session: &SessionCoordinator, task_id: lorakit::TaskId) -> TaskOutcome {
    timeout(LIMIT, session.wait(task_id)).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_portrait_scenario() {
    let model = ScriptedModel::new(3);
    let (session, _dir) = coordinator(model.clone());

    session
        .save_preset("portrait", vec![AdapterEntry::new("styleA", 0.8)])
        .unwrap();
    let task_id = session
        .submit_with_preset(Some("portrait"), held("a portrait"))
        .unwrap();
    session.delete_preset("portrait").unwrap();
    model.release();

    let outcome = finish(&session, task_id).await;
    let artifact = outcome.artifact().expect("task should succeed");
    assert_eq!(artifact.text(KEY_PRESET_NAME), Some("portrait"));
    assert_eq!(artifact.text(KEY_PRESET_ENTRIES), Some("styleA:0.8"));
    assert_eq!(artifact.number(KEY_ADAPTER_COUNT), Some(1.0));
    assert_eq!(artifact.text(KEY_VERSION), Some("2026.10.3"));

    assert!(session.load_preset("portrait").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_editing_preset_after_submit_changes_nothing() {
    let model = ScriptedModel::new(2);
    let (session, _dir) = coordinator(model.clone());

    let original = vec![
        AdapterEntry::new("styleA", 0.8),
        AdapterEntry::new("detail", 0.35).disabled(),
    ];
    session.save_preset("portrait", original.clone()).unwrap();
    let task_id = session
        .submit_with_preset(Some("portrait"), held("edited later"))
        .unwrap();
    session
        .save_preset("portrait", vec![AdapterEntry::new("styleB", 0.1)])
        .unwrap();
    model.release();

    let outcome = finish(&session, task_id).await;
    let snapshot = outcome.artifact().unwrap().preset_snapshot().unwrap();
    assert_eq!(snapshot.entries, original);
    assert_eq!(session.task(task_id).unwrap().preset.unwrap().entries, original);

    // The model saw only the enabled entries of the submit-time snapshot.
    let request = &model.requests()[0];
    assert_eq!(request.adapters(), vec![AdapterEntry::new("styleA", 0.8)]);
}

#[tokio::test]
async fn test_missing_preset_is_rejected_before_enqueue() {
    let model = ScriptedModel::new(2);
    let (session, _dir) = coordinator(model.clone());

    let err = session
        .submit_with_preset(Some("ghost"), params("never runs"))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(session.stats().pending, 0);
    assert!(model.invocations().is_empty());
}

#[tokio::test]
async fn test_submit_without_preset_and_no_dedup() {
    let model = ScriptedModel::new(2);
    let (session, _dir) = coordinator(model.clone());

    let first = session.submit_with_preset(None, params("same")).unwrap();
    let second = session.submit_with_preset(None, params("same")).unwrap();
    assert_ne!(first, second);

    for task_id in [first, second] {
        let outcome = finish(&session, task_id).await;
        assert_eq!(
            outcome.artifact().unwrap().text(KEY_PRESET_NAME),
            Some(NO_PRESET)
        );
    }
    assert_eq!(model.invocations(), vec![first, second]);
}

#[tokio::test]
async fn test_cancel_and_discard_through_session() {
    let model = ScriptedModel::new(2);
    let (session, _dir) = coordinator(model.clone());

    let blocker = session.submit_with_preset(None, held("blocker")).unwrap();
    let victim = session.submit_with_preset(None, params("victim")).unwrap();
    session.cancel(victim).unwrap();
    model.release();

    assert_eq!(finish(&session, blocker).await.status(), TaskStatus::Succeeded);
    assert_eq!(finish(&session, victim).await, TaskOutcome::Cancelled);

    session.discard(victim).unwrap();
    assert!(session.task(victim).is_err());
    assert_eq!(session.stats().cancelled, 1);
}

#[tokio::test]
async fn test_from_config_opens_workspace_store() {
    let workspace = TempDir::new().unwrap();
    let mut config = LorakitConfig::default();
    config.application.version = "2026.11.1".to_string();

    let model = ScriptedModel::new(2);
    let session = SessionCoordinator::from_config(&config, workspace.path(), model).unwrap();
    session
        .save_preset("night", vec![AdapterEntry::new("moody", 0.5)])
        .unwrap();
    assert!(workspace.path().join("lora_presets").is_dir());
    assert_eq!(session.list_presets().unwrap(), vec!["night"]);
    assert_eq!(session.preset_info("night").unwrap().adapter_count, 1);

    let task_id = session
        .submit_with_preset(Some("night"), params("city at night"))
        .unwrap();
    let outcome = finish(&session, task_id).await;
    assert_eq!(
        outcome.artifact().unwrap().text(KEY_VERSION),
        Some("2026.11.1")
    );
    session.shutdown().await;
}

#[tokio::test]
async fn test_from_config_rejects_invalid_config() {
    let workspace = TempDir::new().unwrap();
    let mut config = LorakitConfig::default();
    config.library.max_trigger_words = 0;

    let result = SessionCoordinator::from_config(&config, workspace.path(), ScriptedModel::new(2));
    assert!(result.is_err());
}
