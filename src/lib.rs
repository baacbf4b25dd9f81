//! lorakit: LoRA presets and a single-worker image generation pipeline
//!
//! Named adapter presets are stored durably, resolved into value snapshots at
//! submit time, and carried through a FIFO generation queue whose one worker
//! drives an external model and stamps every resulting image with provenance
//! metadata.

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod library;
pub mod logging;
pub mod metadata;
pub mod preset;
pub mod session;

pub use error::{ApiError, ModelError, StorageError};
pub use generation::{
    GenerationModel, GenerationQueue, ModelRequest, ModelStep, TaskId, TaskOutcome, TaskStatus,
    TaskUpdate,
};
pub use metadata::Artifact;
pub use preset::{AdapterEntry, Preset, PresetSnapshot, PresetStore};
pub use session::SessionCoordinator;
