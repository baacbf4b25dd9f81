//! Session coordinator
//!
//! Front door for callers: resolves presets into snapshots before anything reaches
//! the queue, and surfaces task progress and outcomes.

use crate::config::LorakitConfig;
use crate::error::ApiError;
use crate::generation::{
    GenerationModel, GenerationParameters, GenerationQueue, GenerationTask, QueueStats, TaskId,
    TaskOutcome, TaskStream,
};
use crate::preset::{AdapterEntry, Preset, PresetInfo, PresetSnapshot, PresetStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct SessionCoordinator {
    store: PresetStore,
    queue: GenerationQueue,
}

impl SessionCoordinator {
    pub fn new(store: PresetStore, queue: GenerationQueue) -> Self {
        Self { store, queue }
    }

    /// Open the configured preset store and start the worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(
        config: &LorakitConfig,
        workspace_root: &Path,
        model: Arc<dyn GenerationModel>,
    ) -> Result<Self, ApiError> {
        config.ensure_valid()?;
        let preset_dir = config.preset_directory(workspace_root);
        let store = PresetStore::open(&preset_dir)?;
        let queue = GenerationQueue::start(model, config.application.version.clone());
        info!(
            preset_directory = %preset_dir.display(),
            version = %config.application.version,
            "Session started"
        );
        Ok(Self::new(store, queue))
    }

    /// Resolve `preset_name` to a snapshot and enqueue a new task.
    ///
    /// Every call enqueues; identical submissions are not merged.
    pub fn submit_with_preset(
        &self,
        preset_name: Option<&str>,
        parameters: GenerationParameters,
    ) -> Result<TaskId, ApiError> {
        let snapshot = match preset_name {
            Some(name) => Some(PresetSnapshot::from(&self.store.load(name)?)),
            None => None,
        };
        let task_id = self.queue.submit(parameters, snapshot);
        debug!(task_id = %task_id, preset = preset_name.unwrap_or("none"), "Submitted task");
        Ok(task_id)
    }

    pub fn observe(&self, task_id: TaskId) -> Result<TaskStream, ApiError> {
        self.queue.observe(task_id)
    }

    pub async fn wait(&self, task_id: TaskId) -> Result<TaskOutcome, ApiError> {
        self.queue.wait(task_id).await
    }

    pub fn task(&self, task_id: TaskId) -> Result<GenerationTask, ApiError> {
        self.queue.task(task_id)
    }

    pub fn cancel(&self, task_id: TaskId) -> Result<(), ApiError> {
        self.queue.cancel(task_id)
    }

    pub fn discard(&self, task_id: TaskId) -> Result<(), ApiError> {
        self.queue.discard(task_id)
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await
    }

    pub fn save_preset(&self, name: &str, entries: Vec<AdapterEntry>) -> Result<Preset, ApiError> {
        self.store.save(name, entries)
    }

    pub fn load_preset(&self, name: &str) -> Result<Preset, ApiError> {
        self.store.load(name)
    }

    pub fn delete_preset(&self, name: &str) -> Result<(), ApiError> {
        self.store.delete(name)
    }

    pub fn list_presets(&self) -> Result<Vec<String>, ApiError> {
        self.store.list()
    }

    pub fn preset_info(&self, name: &str) -> Result<PresetInfo, ApiError> {
        self.store.info(name)
    }

    pub fn store(&self) -> &PresetStore {
        &self.store
    }
}
