//! CLI presentation: text and json formatters per command family.

use crate::error::{ApiError, StorageError};
use crate::library::AdapterMetadata;
use crate::preset::{Preset, PresetInfo};
use comfy_table::presets::{UTF8_BORDERS_ONLY, UTF8_FULL};
use comfy_table::Table;
use serde_json::json;

fn to_json(value: &serde_json::Value) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Persistence(StorageError::Encode(e.to_string())))
}

pub fn format_preset_list_text(presets: &[PresetInfo]) -> String {
    if presets.is_empty() {
        return "No presets saved.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Preset", "Adapters", "Created"]);
    for info in presets {
        table.add_row(vec![
            info.name.clone(),
            info.adapter_count.to_string(),
            info.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    format!("{}\n\nTotal: {} presets.", table, presets.len())
}

pub fn format_preset_list_json(presets: &[PresetInfo]) -> Result<String, ApiError> {
    let arr: Vec<serde_json::Value> = presets
        .iter()
        .map(|info| {
            json!({
                "name": info.name,
                "adapter_count": info.adapter_count,
                "created_at": info.created_at.to_rfc3339(),
            })
        })
        .collect();
    to_json(&serde_json::Value::Array(arr))
}

pub fn format_preset_text(preset: &Preset) -> String {
    let mut out = format!(
        "Preset: {}\nCreated: {}\n\n",
        preset.name,
        preset.created_at.to_rfc3339()
    );
    if preset.entries.is_empty() {
        out.push_str("No adapters.");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Adapter", "Weight", "Enabled"]);
    for entry in &preset.entries {
        table.add_row(vec![
            entry.adapter_id.clone(),
            entry.weight.to_string(),
            if entry.enabled { "yes" } else { "no" }.to_string(),
        ]);
    }
    out.push_str(&table.to_string());
    out
}

pub fn format_preset_json(preset: &Preset) -> Result<String, ApiError> {
    let value = serde_json::to_value(preset)
        .map_err(|e| ApiError::Persistence(StorageError::Encode(e.to_string())))?;
    to_json(&value)
}

pub fn format_library_text(entries: &[AdapterMetadata]) -> String {
    if entries.is_empty() {
        return "No adapters found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["File", "Base model", "Trigger words", "Size (MB)"]);
    for meta in entries {
        let triggers = if meta.trigger_words.len() > 3 {
            format!(
                "{} (+{})",
                meta.trigger_words[..3].join(", "),
                meta.trigger_words.len() - 3
            )
        } else {
            meta.trigger_words.join(", ")
        };
        table.add_row(vec![
            meta.filename.clone(),
            meta.base_model.clone().unwrap_or_else(|| "Unknown".to_string()),
            triggers,
            format!("{:.2}", meta.file_size as f64 / (1024.0 * 1024.0)),
        ]);
    }
    format!("{}\n\nTotal: {} adapters.", table, entries.len())
}

pub fn format_library_json(entries: &[AdapterMetadata]) -> Result<String, ApiError> {
    let arr: Vec<serde_json::Value> = entries
        .iter()
        .map(|meta| {
            json!({
                "filename": meta.filename,
                "path": meta.path.display().to_string(),
                "base_model": meta.base_model.as_deref().unwrap_or("Unknown"),
                "trigger_words": meta.trigger_words,
                "description": meta.description.as_deref().unwrap_or(""),
                "file_size": meta.file_size,
                "extraction_errors": meta.extraction_errors,
            })
        })
        .collect();
    to_json(&serde_json::Value::Array(arr))
}
