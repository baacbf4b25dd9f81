//! Adapter library: `.safetensors` header reading, metadata extraction and a
//! searchable index of adapter files on disk.

pub mod extract;
pub mod safetensors;
pub mod scanner;

pub use extract::{extract_metadata, is_adapter_file, normalize_base_model, summary, AdapterMetadata};
pub use scanner::{AdapterLibrary, ScanStats};
