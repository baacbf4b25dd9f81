//! Boundary to the external image generation model.
//!
//! The model is a black box: given a request it returns a lazy stream of steps,
//! zero or more progress reports followed by the finished image. Dropping the
//! stream aborts the invocation.

use crate::error::ModelError;
use crate::generation::task::{GenerationParameters, Phase, TaskId};
use crate::preset::{AdapterEntry, PresetSnapshot};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Raw image produced by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bytes,
        }
    }
}

/// Everything the model needs to run one task
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub task_id: TaskId,
    pub parameters: GenerationParameters,
    pub preset: Option<PresetSnapshot>,
}

impl ModelRequest {
    /// Adapters the model should apply, in preset order
    pub fn adapters(&self) -> Vec<AdapterEntry> {
        self.preset
            .as_ref()
            .map(|p| p.enabled_entries().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelStep {
    Progress {
        phase: Phase,
        fraction: f32,
        preview: Option<ImageData>,
    },
    Completed(ImageData),
}

/// Lazy per-task step stream
pub type StepStream = Pin<Box<dyn Stream<Item = Result<ModelStep, ModelError>> + Send>>;

/// External generation model
///
/// Implementations are never invoked concurrently by the worker.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// Start generating; the returned stream is polled one step at a time
    async fn generate(&self, request: &ModelRequest) -> Result<StepStream, ModelError>;

    /// Model name used in logs
    fn model_name(&self) -> &str;
}
