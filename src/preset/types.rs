//! Preset records and validation rules.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

fn default_true() -> bool {
    true
}

/// One adapter selection inside a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterEntry {
    /// Adapter identifier, usually the `.safetensors` filename
    pub adapter_id: String,
    /// Blend weight applied to the adapter
    pub weight: f64,
    /// Disabled entries stay in the preset but are not applied
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AdapterEntry {
    pub fn new(adapter_id: impl Into<String>, weight: f64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            weight,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl fmt::Display for AdapterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.adapter_id, self.weight)
    }
}

/// A named, ordered collection of adapter selections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(rename = "preset_name")]
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<AdapterEntry>,
}

impl Preset {
    /// Number of entries that will actually be applied.
    pub fn adapter_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled).count()
    }

    pub fn info(&self) -> PresetInfo {
        PresetInfo {
            name: self.name.clone(),
            created_at: self.created_at,
            adapter_count: self.adapter_count(),
        }
    }
}

/// Summary of a preset without its entry list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub adapter_count: usize,
}

/// Value copy of a preset taken when a task is submitted.
///
/// Holds no link back to the store: later edits or deletes of the named preset
/// never reach a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetSnapshot {
    pub name: String,
    pub entries: Vec<AdapterEntry>,
}

impl PresetSnapshot {
    pub fn enabled_entries(&self) -> impl Iterator<Item = &AdapterEntry> {
        self.entries.iter().filter(|e| e.enabled)
    }
}

impl From<&Preset> for PresetSnapshot {
    fn from(preset: &Preset) -> Self {
        Self {
            name: preset.name.clone(),
            entries: preset.entries.clone(),
        }
    }
}

/// Reject empty or whitespace-only names.
pub fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation(
            "preset name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Reject duplicate adapter ids, empty ids and non-finite weights.
pub fn validate_entries(entries: &[AdapterEntry]) -> Result<(), ApiError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if entry.adapter_id.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "entry {} has an empty adapter id",
                index
            )));
        }
        if !entry.weight.is_finite() {
            return Err(ApiError::Validation(format!(
                "adapter '{}' has a non-finite weight",
                entry.adapter_id
            )));
        }
        if !seen.insert(entry.adapter_id.as_str()) {
            return Err(ApiError::Validation(format!(
                "duplicate adapter '{}'",
                entry.adapter_id
            )));
        }
    }
    Ok(())
}
