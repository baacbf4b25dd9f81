//! Asynchronous generation pipeline: task queue, model boundary and worker.

pub mod model;
pub mod queue;
pub mod task;
mod worker;

pub use model::{GenerationModel, ImageData, ModelRequest, ModelStep, StepStream};
pub use queue::{GenerationQueue, QueueStats, TaskStream};
pub use task::{
    GenerationParameters, GenerationTask, Phase, ProgressEvent, TaskId, TaskOutcome, TaskStatus,
    TaskUpdate,
};
