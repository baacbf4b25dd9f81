//! Minimal `.safetensors` header reader.
//!
//! Layout: 8-byte little-endian header length, then a JSON object mapping tensor
//! names to their descriptors, with an optional `__metadata__` string map. Tensor
//! data is never read.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

const METADATA_KEY: &str = "__metadata__";
/// Headers above this size are rejected
pub const MAX_HEADER_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Header length {0} exceeds limit")]
    TooLarge(u64),

    #[error("Header declares {declared} bytes but the file holds {actual}")]
    Truncated { declared: u64, actual: u64 },

    #[error("Header is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Header is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetensorsHeader {
    /// Free-form training metadata
    pub metadata: BTreeMap<String, String>,
    pub tensor_names: Vec<String>,
}

impl SafetensorsHeader {
    pub fn has_metadata(&self) -> bool {
        !self.metadata.is_empty()
    }
}

pub fn read_header(path: &Path) -> Result<SafetensorsHeader, HeaderError> {
    let file = File::open(path)?;
    parse_header(BufReader::new(file))
}

pub fn parse_header<R: Read>(mut reader: R) -> Result<SafetensorsHeader, HeaderError> {
    let mut len_bytes = [0u8; 8];
    reader.read_exact(&mut len_bytes)?;
    let len = u64::from_le_bytes(len_bytes);
    if len > MAX_HEADER_BYTES {
        return Err(HeaderError::TooLarge(len));
    }

    // Grows with the bytes actually present, not the declared length.
    let mut raw = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut raw)?;
    if (raw.len() as u64) < len {
        return Err(HeaderError::Truncated {
            declared: len,
            actual: raw.len() as u64,
        });
    }
    let parsed: Value =
        serde_json::from_slice(&raw).map_err(|e| HeaderError::InvalidJson(e.to_string()))?;
    let Value::Object(object) = parsed else {
        return Err(HeaderError::NotAnObject);
    };

    let mut header = SafetensorsHeader::default();
    for (key, value) in object {
        if key == METADATA_KEY {
            if let Value::Object(entries) = value {
                for (meta_key, meta_value) in entries {
                    let text = match meta_value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    header.metadata.insert(meta_key, text);
                }
            }
        } else {
            header.tensor_names.push(key);
        }
    }
    header.tensor_names.sort();
    Ok(header)
}

/// Encode a header-only file body; used to build fixtures
pub fn encode_header(metadata: &BTreeMap<String, String>, tensor_names: &[&str]) -> Vec<u8> {
    let mut object = serde_json::Map::new();
    if !metadata.is_empty() {
        let meta: serde_json::Map<String, Value> = metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        object.insert(METADATA_KEY.to_string(), Value::Object(meta));
    }
    for name in tensor_names {
        object.insert(
            name.to_string(),
            serde_json::json!({ "dtype": "F16", "shape": [0], "data_offsets": [0, 0] }),
        );
    }
    let json = Value::Object(object).to_string();
    let mut out = (json.len() as u64).to_le_bytes().to_vec();
    out.extend_from_slice(json.as_bytes());
    out
}
