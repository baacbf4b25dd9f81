//! Named LoRA presets and their durable store.

pub mod storage;
pub mod types;

pub use storage::PresetStore;
pub use types::{AdapterEntry, Preset, PresetInfo, PresetSnapshot};
