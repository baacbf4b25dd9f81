//! Integration tests for the generation queue and worker
//!
//! Tests cover:
//! - FIFO dequeue order
//! - Cancellation of queued and running tasks
//! - Failure isolation between tasks, including panicking models
//! - Observation order, replay and termination
//! - Task record lifecycle (discard, stats, shutdown)

use crate::integration::test_utils::{held, params, scripted, with_previews, ScriptedModel};
use futures::StreamExt;
use lorakit::error::ApiError;
use lorakit::generation::{GenerationQueue, TaskId, TaskOutcome, TaskStatus, TaskUpdate};
use lorakit::metadata::{KEY_PRESET_NAME, NO_PRESET};
use std::time::Duration;
use tokio::time::timeout;

const LIMIT: Duration = Duration::from_secs(5);

async fn wait_for_status(queue: &GenerationQueue, task_id: TaskId, status: TaskStatus) {
    timeout(LIMIT, async {
        while queue.task(task_id).unwrap().status != status {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("task never reached expected status");
}

async fn wait(queue: &GenerationQueue, task_id: TaskId) -> TaskOutcome {
    timeout(LIMIT, queue.wait(task_id))
        .await
        .expect("task did not finish in time")
        .unwrap()
}

#[tokio::test]
async fn test_tasks_start_in_submission_order() {
    let model = ScriptedModel::new(3);
    let queue = GenerationQueue::start(model.clone(), "2026.10.0");

    let ids: Vec<TaskId> = (0..5)
        .map(|i| queue.submit(params(&format!("prompt {}", i)), None))
        .collect();
    for id in &ids {
        assert_eq!(wait(&queue, *id).await.status(), TaskStatus::Succeeded);
    }

    assert_eq!(model.invocations(), ids);
}

#[tokio::test]
async fn test_submit_returns_immediately_and_tasks_start_queued() {
    let model = ScriptedModel::new(2);
    let queue = GenerationQueue::start(model.clone(), "v");

    let first = queue.submit(held("first"), None);
    let second = queue.submit(params("second"), None);
    assert_ne!(first, second);
    assert_eq!(queue.task(second).unwrap().status, TaskStatus::Queued);

    model.release();
    wait(&queue, first).await;
    wait(&queue, second).await;
}

#[tokio::test]
async fn test_cancel_queued_task_never_reaches_model() {
    let model = ScriptedModel::new(2);
    let queue = GenerationQueue::start(model.clone(), "v");

    let running = queue.submit(held("running"), None);
    let queued = queue.submit(params("queued"), None);
    queue.cancel(queued).unwrap();
    assert_eq!(queue.task(queued).unwrap().status, TaskStatus::Cancelled);

    model.release();
    assert_eq!(wait(&queue, running).await.status(), TaskStatus::Succeeded);
    assert_eq!(wait(&queue, queued).await, TaskOutcome::Cancelled);
    assert_eq!(model.invocations(), vec![running]);
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test]
async fn test_cancel_running_task_stops_within_one_event() {
    let model = ScriptedModel::new(50);
    let queue = GenerationQueue::start(model.clone(), "v");

    let task_id = queue.submit(held("long"), None);
    wait_for_status(&queue, task_id, TaskStatus::Running).await;

    queue.cancel(task_id).unwrap();
    model.release();

    let updates: Vec<TaskUpdate> = timeout(LIMIT, queue.observe(task_id).unwrap().collect())
        .await
        .unwrap();
    let progress = updates
        .iter()
        .filter(|u| matches!(u, TaskUpdate::Progress(_)))
        .count();
    assert!(progress <= 1, "saw {} progress events after cancel", progress);
    assert_eq!(updates.last(), Some(&TaskUpdate::Finished(TaskOutcome::Cancelled)));
    assert_eq!(queue.task(task_id).unwrap().status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_terminal_and_unknown_tasks() {
    let model = ScriptedModel::new(2);
    let queue = GenerationQueue::start(model, "v");

    let task_id = queue.submit(params("done"), None);
    wait(&queue, task_id).await;
    assert!(matches!(queue.cancel(task_id), Err(ApiError::InvalidState(_))));

    queue.discard(task_id).unwrap();
    assert!(matches!(queue.cancel(task_id), Err(ApiError::NotFound(_))));
    assert!(queue.task(task_id).unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_failures_do_not_stop_the_worker() {
    let model = ScriptedModel::new(3);
    let queue = GenerationQueue::start(model.clone(), "v");

    let failing = queue.submit(scripted("boom", "fail"), None);
    let unavailable = queue.submit(scripted("offline", "unavailable"), None);
    let imageless = queue.submit(scripted("blank", "no_image"), None);
    let healthy = queue.submit(params("fine"), None);

    match wait(&queue, failing).await {
        TaskOutcome::Failed { error } => assert!(error.contains("scripted failure")),
        other => panic!("expected failure, got {:?}", other),
    }
    match wait(&queue, unavailable).await {
        TaskOutcome::Failed { error } => assert!(error.contains("scripted outage")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(matches!(
        wait(&queue, imageless).await,
        TaskOutcome::Failed { .. }
    ));
    assert_eq!(wait(&queue, healthy).await.status(), TaskStatus::Succeeded);

    let record = queue.task(failing).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.error.is_some());
    assert!(record.finished_at.is_some());

    let stats = queue.stats();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.running, 0);
}

#[tokio::test]
async fn test_model_panic_fails_only_its_task() {
    let model = ScriptedModel::new(3);
    let queue = GenerationQueue::start(model.clone(), "v");

    let at_start = queue.submit(scripted("explode", "panic"), None);
    let midway = queue.submit(scripted("explode later", "panic_midway"), None);
    let healthy = queue.submit(params("fine"), None);

    for task_id in [at_start, midway] {
        match wait(&queue, task_id).await {
            TaskOutcome::Failed { error } => assert!(error.contains("panicked")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
    assert_eq!(wait(&queue, healthy).await.status(), TaskStatus::Succeeded);
    assert_eq!(model.invocations(), vec![at_start, midway, healthy]);

    let replay: Vec<TaskUpdate> = queue.observe(midway).unwrap().collect().await;
    assert_eq!(replay.len(), 2);
    assert!(matches!(replay[0], TaskUpdate::Progress(_)));

    let stats = queue.stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.running, 0);
}

#[tokio::test]
async fn test_finished_tasks_keep_no_previews() {
    let model = ScriptedModel::new(4);
    let queue = GenerationQueue::start(model.clone(), "v");

    let task_id = queue.submit(with_previews("sketchy"), None);
    assert_eq!(wait(&queue, task_id).await.status(), TaskStatus::Succeeded);

    let replay: Vec<TaskUpdate> = queue.observe(task_id).unwrap().collect().await;
    let events: Vec<_> = replay
        .iter()
        .filter_map(|u| match u {
            TaskUpdate::Progress(event) => Some(event),
            TaskUpdate::Finished(_) => None,
        })
        .collect();
    assert_eq!(events.len(), model.steps());
    assert!(events.iter().all(|e| e.preview.is_none()));
}

#[tokio::test]
async fn test_observe_yields_each_event_once_in_order() {
    let model = ScriptedModel::with_delay(6, Duration::from_millis(2));
    let queue = GenerationQueue::start(model.clone(), "v");

    let task_id = queue.submit(params("observed"), None);
    let live: Vec<TaskUpdate> = timeout(LIMIT, queue.observe(task_id).unwrap().collect())
        .await
        .unwrap();

    let fractions: Vec<f32> = live
        .iter()
        .filter_map(|u| match u {
            TaskUpdate::Progress(event) => Some(event.fraction_complete),
            TaskUpdate::Finished(_) => None,
        })
        .collect();
    assert_eq!(fractions.len(), model.steps());
    assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));

    let outcome = match live.last() {
        Some(TaskUpdate::Finished(outcome)) => outcome.clone(),
        other => panic!("stream did not end with an outcome: {:?}", other),
    };
    let artifact = outcome.artifact().expect("artifact");
    assert_eq!(artifact.text(KEY_PRESET_NAME), Some(NO_PRESET));

    // A late observer replays the same history.
    let replay: Vec<TaskUpdate> = queue.observe(task_id).unwrap().collect().await;
    assert_eq!(replay, live);
}

#[tokio::test]
async fn test_discard_only_finished_tasks() {
    let model = ScriptedModel::new(2);
    let queue = GenerationQueue::start(model.clone(), "v");

    let task_id = queue.submit(held("held"), None);
    assert!(matches!(queue.discard(task_id), Err(ApiError::InvalidState(_))));

    model.release();
    wait(&queue, task_id).await;
    queue.discard(task_id).unwrap();
    assert!(queue.observe(task_id).is_err());
    assert!(matches!(queue.discard(task_id), Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_shutdown_leaves_queued_tasks_queued() {
    let model = ScriptedModel::new(2);
    let queue = GenerationQueue::start(model.clone(), "v");

    let current = queue.submit(held("current"), None);
    let waiting = queue.submit(params("waiting"), None);
    wait_for_status(&queue, current, TaskStatus::Running).await;

    let release = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        model.release();
    };
    timeout(LIMIT, async { tokio::join!(queue.shutdown(), release) })
        .await
        .unwrap();

    assert_eq!(queue.task(current).unwrap().status, TaskStatus::Succeeded);
    assert_eq!(queue.task(waiting).unwrap().status, TaskStatus::Queued);
    assert_eq!(queue.pending_count(), 1);
    assert_eq!(model.invocations(), vec![current]);
}
