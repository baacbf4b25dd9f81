//! Artifact metadata
//!
//! Attaches provenance to every generated image: the preset content used (copied
//! by value), the generation parameters and the application version. Given only
//! an artifact's metadata, the exact preset can be rebuilt with
//! [`snapshot_from_metadata`], even after the named preset was edited or deleted.

use crate::generation::model::ImageData;
use crate::generation::task::GenerationParameters;
use crate::preset::PresetSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const KEY_SCHEME: &str = "metadata_scheme";
pub const KEY_PRESET_NAME: &str = "preset_name";
pub const KEY_PRESET_ENTRIES: &str = "preset_entries";
pub const KEY_PRESET_SNAPSHOT: &str = "preset_snapshot";
pub const KEY_ADAPTER_COUNT: &str = "adapter_count";
pub const KEY_PARAMETERS: &str = "parameters";
pub const KEY_VERSION: &str = "version";
pub const PARAM_PREFIX: &str = "param.";

pub const METADATA_SCHEME: &str = "lorakit";
/// Largest integer magnitude an `f64` holds exactly (2^53)
const MAX_EXACT_INTEGER: u64 = 1 << 53;
pub const NO_PRESET: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Number(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            MetadataValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            MetadataValue::Text(_) => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// A finished image plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub image: ImageData,
    pub metadata: Metadata,
}

impl Artifact {
    pub fn text(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetadataValue::as_text)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(MetadataValue::as_number)
    }

    /// Preset content recorded in this artifact
    pub fn preset_snapshot(&self) -> Option<PresetSnapshot> {
        snapshot_from_metadata(&self.metadata)
    }
}

/// Build an artifact from a model image. Pure and deterministic.
pub fn embed(
    image: ImageData,
    parameters: &GenerationParameters,
    preset: Option<&PresetSnapshot>,
    application_version: &str,
) -> Artifact {
    let mut metadata = Metadata::new();
    metadata.insert(KEY_SCHEME.to_string(), METADATA_SCHEME.into());
    metadata.insert(KEY_VERSION.to_string(), application_version.into());

    match preset {
        Some(snapshot) => {
            metadata.insert(KEY_PRESET_NAME.to_string(), snapshot.name.as_str().into());
            metadata.insert(
                KEY_PRESET_ENTRIES.to_string(),
                format_entries(snapshot).into(),
            );
            metadata.insert(
                KEY_PRESET_SNAPSHOT.to_string(),
                snapshot_json(snapshot).to_string().into(),
            );
            metadata.insert(
                KEY_ADAPTER_COUNT.to_string(),
                (snapshot.enabled_entries().count() as f64).into(),
            );
        }
        None => {
            metadata.insert(KEY_PRESET_NAME.to_string(), NO_PRESET.into());
            metadata.insert(KEY_PRESET_ENTRIES.to_string(), NO_PRESET.into());
            metadata.insert(KEY_PRESET_SNAPSHOT.to_string(), NO_PRESET.into());
            metadata.insert(KEY_ADAPTER_COUNT.to_string(), 0.0_f64.into());
        }
    }

    let bag: serde_json::Map<String, Value> = parameters
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    metadata.insert(
        KEY_PARAMETERS.to_string(),
        Value::Object(bag).to_string().into(),
    );

    for (key, value) in parameters {
        let flattened = match value {
            Value::String(s) => Some(MetadataValue::Text(s.clone())),
            Value::Number(n) => flatten_number(n),
            Value::Bool(b) => Some(MetadataValue::Text(b.to_string())),
            _ => None,
        };
        if let Some(flattened) = flattened {
            metadata.insert(format!("{}{}", PARAM_PREFIX, key), flattened);
        }
    }

    Artifact { image, metadata }
}

/// Rebuild the preset snapshot recorded by [`embed`]
pub fn snapshot_from_metadata(metadata: &Metadata) -> Option<PresetSnapshot> {
    let raw = metadata.get(KEY_PRESET_SNAPSHOT)?.as_text()?;
    if raw == NO_PRESET {
        return None;
    }
    serde_json::from_str(raw).ok()
}

/// Integers beyond 2^53 are kept as text so seeds stay exact
fn flatten_number(n: &serde_json::Number) -> Option<MetadataValue> {
    let magnitude = n
        .as_u64()
        .or_else(|| n.as_i64().map(i64::unsigned_abs));
    match magnitude {
        Some(m) if m > MAX_EXACT_INTEGER => Some(MetadataValue::Text(n.to_string())),
        _ => n.as_f64().map(MetadataValue::Number),
    }
}

/// `styleA:0.8, styleB:0.5`; disabled entries are left out
fn format_entries(snapshot: &PresetSnapshot) -> String {
    snapshot
        .enabled_entries()
        .map(|entry| entry.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn snapshot_json(snapshot: &PresetSnapshot) -> Value {
    let entries: Vec<Value> = snapshot
        .entries
        .iter()
        .map(|e| {
            json!({
                "adapter_id": e.adapter_id,
                "weight": e.weight,
                "enabled": e.enabled,
            })
        })
        .collect();
    json!({ "name": snapshot.name, "entries": entries })
}
