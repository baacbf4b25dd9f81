//! Generation Task Queue
//!
//! FIFO queue of generation tasks drained by a single background worker. The queue
//! also keeps every task's record (status, progress history, outcome) so callers can
//! observe a task from any point and collect its result until they discard it.

use crate::error::ApiError;
use crate::generation::model::{GenerationModel, ModelRequest};
use crate::generation::task::{
    GenerationParameters, GenerationTask, ProgressEvent, TaskId, TaskOutcome, TaskStatus,
    TaskUpdate,
};
use crate::generation::worker;
use crate::preset::PresetSnapshot;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stream of progress events followed by one terminal outcome
pub type TaskStream = BoxStream<'static, TaskUpdate>;

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks waiting for the worker
    pub pending: usize,
    /// Tasks currently inside the model (0 or 1)
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Everything the worker needs to run one dequeued task
pub(crate) struct Job {
    pub request: ModelRequest,
    pub cancel: Arc<AtomicBool>,
}

struct TaskSlot {
    task: GenerationTask,
    events: Vec<ProgressEvent>,
    outcome: Option<TaskOutcome>,
    cancel: Arc<AtomicBool>,
    /// Bumped on every change observers care about
    version: watch::Sender<u64>,
}

impl TaskSlot {
    fn touch(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn clear_previews(&mut self) {
        for event in &mut self.events {
            event.preview = None;
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<TaskId>,
    tasks: HashMap<TaskId, TaskSlot>,
    stats: QueueStats,
}

/// State shared between the queue handle and its worker
pub(crate) struct QueueShared {
    state: Mutex<QueueState>,
    notify: Notify,
    running: AtomicBool,
}

impl QueueShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            running: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) async fn wait_for_work(&self) {
        self.notify.notified().await;
    }

    /// Pop the oldest queued task and mark it running
    pub(crate) fn begin_next(&self) -> Option<Job> {
        let mut state = self.state.lock();
        let QueueState {
            pending,
            tasks,
            stats,
        } = &mut *state;

        while let Some(task_id) = pending.pop_front() {
            let Some(slot) = tasks.get_mut(&task_id) else {
                continue;
            };
            if slot.task.status != TaskStatus::Queued {
                continue;
            }
            slot.task.status = TaskStatus::Running;
            slot.task.started_at = Some(Utc::now());
            slot.touch();
            stats.pending = stats.pending.saturating_sub(1);
            stats.running += 1;

            return Some(Job {
                request: ModelRequest {
                    task_id,
                    parameters: slot.task.parameters.clone(),
                    preset: slot.task.preset.clone(),
                },
                cancel: Arc::clone(&slot.cancel),
            });
        }
        None
    }

    /// Record a progress event for a running task
    ///
    /// Only the newest preview image is retained.
    pub(crate) fn publish(&self, event: ProgressEvent) {
        let mut state = self.state.lock();
        if let Some(slot) = state.tasks.get_mut(&event.task_id) {
            if event.preview.is_some() {
                slot.clear_previews();
            }
            slot.events.push(event);
            slot.touch();
        }
    }

    /// Move a running task to its terminal state
    pub(crate) fn finish(&self, task_id: TaskId, outcome: TaskOutcome) {
        let mut state = self.state.lock();
        let QueueState { tasks, stats, .. } = &mut *state;
        let Some(slot) = tasks.get_mut(&task_id) else {
            return;
        };
        if slot.task.status.is_terminal() {
            return;
        }

        stats.running = stats.running.saturating_sub(1);
        match &outcome {
            TaskOutcome::Succeeded(_) => {
                stats.succeeded += 1;
                info!(task_id = %task_id, "Generation task succeeded");
            }
            TaskOutcome::Failed { error } => {
                stats.failed += 1;
                slot.task.error = Some(error.clone());
                warn!(task_id = %task_id, error = %error, "Generation task failed");
            }
            TaskOutcome::Cancelled => {
                stats.cancelled += 1;
                info!(task_id = %task_id, "Generation task cancelled while running");
            }
        }

        slot.task.status = outcome.status();
        slot.task.finished_at = Some(Utc::now());
        slot.clear_previews();
        slot.outcome = Some(outcome);
        slot.touch();
    }
}

/// Single-worker generation queue
pub struct GenerationQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GenerationQueue {
    /// Create the queue and spawn its worker on the current tokio runtime
    pub fn start(model: Arc<dyn GenerationModel>, application_version: impl Into<String>) -> Self {
        let shared = Arc::new(QueueShared::new());
        let handle = tokio::spawn(worker::run(
            Arc::clone(&shared),
            model,
            application_version.into(),
        ));
        Self {
            shared,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue a task and return immediately
    pub fn submit(
        &self,
        parameters: GenerationParameters,
        preset: Option<PresetSnapshot>,
    ) -> TaskId {
        let task_id = TaskId::next();
        let (version, _) = watch::channel(0u64);
        let slot = TaskSlot {
            task: GenerationTask {
                task_id,
                parameters,
                preset,
                submitted_at: Utc::now(),
                started_at: None,
                finished_at: None,
                status: TaskStatus::Queued,
                error: None,
            },
            events: Vec::new(),
            outcome: None,
            cancel: Arc::new(AtomicBool::new(false)),
            version,
        };

        let queue_size = {
            let mut state = self.shared.state.lock();
            state.tasks.insert(task_id, slot);
            state.pending.push_back(task_id);
            state.stats.pending += 1;
            state.pending.len()
        };
        self.shared.notify.notify_one();

        debug!(task_id = %task_id, queue_size, "Enqueued generation task");
        task_id
    }

    /// Cancel a task
    ///
    /// Queued tasks are removed at once and never reach the model. Running tasks are
    /// flagged and stop at the model's next progress step.
    pub fn cancel(&self, task_id: TaskId) -> Result<(), ApiError> {
        let mut state = self.shared.state.lock();
        let QueueState {
            pending,
            tasks,
            stats,
        } = &mut *state;
        let slot = tasks
            .get_mut(&task_id)
            .ok_or_else(|| ApiError::NotFound(format!("task {}", task_id)))?;

        match slot.task.status {
            TaskStatus::Queued => {
                pending.retain(|id| *id != task_id);
                stats.pending = stats.pending.saturating_sub(1);
                stats.cancelled += 1;
                slot.task.status = TaskStatus::Cancelled;
                slot.task.finished_at = Some(Utc::now());
                slot.outcome = Some(TaskOutcome::Cancelled);
                slot.touch();
                info!(task_id = %task_id, "Cancelled queued generation task");
                Ok(())
            }
            TaskStatus::Running => {
                slot.cancel.store(true, Ordering::Release);
                debug!(task_id = %task_id, "Requested cancellation of running task");
                Ok(())
            }
            status => Err(ApiError::InvalidState(format!(
                "task {} is already {}",
                task_id,
                status.as_str()
            ))),
        }
    }

    /// Current record of a task
    pub fn task(&self, task_id: TaskId) -> Result<GenerationTask, ApiError> {
        self.shared
            .state
            .lock()
            .tasks
            .get(&task_id)
            .map(|slot| slot.task.clone())
            .ok_or_else(|| ApiError::NotFound(format!("task {}", task_id)))
    }

    /// Observe a task from its first progress event to its outcome
    ///
    /// Each event is yielded once, in the order the model produced it; the stream
    /// ends after the terminal outcome. Observing a finished task replays it.
    /// Replayed events carry a preview only if it is still the newest one, and
    /// none once the task has finished.
    pub fn observe(&self, task_id: TaskId) -> Result<TaskStream, ApiError> {
        let receiver = {
            let state = self.shared.state.lock();
            let slot = state
                .tasks
                .get(&task_id)
                .ok_or_else(|| ApiError::NotFound(format!("task {}", task_id)))?;
            slot.version.subscribe()
        };

        let observer = Observer {
            shared: Arc::clone(&self.shared),
            task_id,
            cursor: 0,
            done: false,
            receiver,
        };
        Ok(stream::unfold(observer, |mut observer| async move {
            let update = observer.next_update().await?;
            Some((update, observer))
        })
        .boxed())
    }

    /// Wait for a task's terminal outcome
    pub async fn wait(&self, task_id: TaskId) -> Result<TaskOutcome, ApiError> {
        let mut updates = self.observe(task_id)?;
        while let Some(update) = updates.next().await {
            if let TaskUpdate::Finished(outcome) = update {
                return Ok(outcome);
            }
        }
        Err(ApiError::NotFound(format!(
            "task {} was discarded before finishing",
            task_id
        )))
    }

    /// Drop the record of a finished task
    pub fn discard(&self, task_id: TaskId) -> Result<(), ApiError> {
        let mut state = self.shared.state.lock();
        let status = state
            .tasks
            .get(&task_id)
            .map(|slot| slot.task.status)
            .ok_or_else(|| ApiError::NotFound(format!("task {}", task_id)))?;
        if !status.is_terminal() {
            return Err(ApiError::InvalidState(format!(
                "task {} is still {}",
                task_id,
                status.as_str()
            )));
        }
        state.tasks.remove(&task_id);
        Ok(())
    }

    /// Number of tasks waiting for the worker
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.state.lock().stats.clone()
    }

    /// Stop the worker after its current task; queued tasks stay queued
    pub async fn shutdown(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.notify.notify_one();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Generation worker ended abnormally");
            }
        }
        info!("Stopped generation worker");
    }
}

impl Drop for GenerationQueue {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

struct Observer {
    shared: Arc<QueueShared>,
    task_id: TaskId,
    cursor: usize,
    done: bool,
    receiver: watch::Receiver<u64>,
}

enum Poll {
    Ready(TaskUpdate),
    Gone,
    Pending,
}

impl Observer {
    async fn next_update(&mut self) -> Option<TaskUpdate> {
        loop {
            if self.done {
                return None;
            }
            // Mark the current version seen before reading, so a change made after
            // the read always wakes `changed()` below.
            self.receiver.borrow_and_update();

            match self.poll_state() {
                Poll::Ready(update) => return Some(update),
                Poll::Gone => return None,
                Poll::Pending => {
                    if self.receiver.changed().await.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    fn poll_state(&mut self) -> Poll {
        let state = self.shared.state.lock();
        let Some(slot) = state.tasks.get(&self.task_id) else {
            return Poll::Gone;
        };
        if let Some(event) = slot.events.get(self.cursor) {
            self.cursor += 1;
            return Poll::Ready(TaskUpdate::Progress(event.clone()));
        }
        match &slot.outcome {
            Some(outcome) => {
                self.done = true;
                Poll::Ready(TaskUpdate::Finished(outcome.clone()))
            }
            None => Poll::Pending,
        }
    }
}
