//! Adapter metadata extraction
//!
//! Training tools write metadata under many different keys; each field below is
//! looked up through an ordered list of known keys and normalized.

use crate::library::safetensors::{read_header, SafetensorsHeader};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const ADAPTER_EXTENSION: &str = "safetensors";
pub const DEFAULT_MAX_TRIGGER_WORDS: usize = 20;

const BASE_MODEL_KEYS: &[&str] = &[
    "ss_base_model_version",
    "base_model",
    "ss_sd_model_name",
    "modelspec.architecture",
    "sd_model_name",
];
const TRIGGER_WORD_KEYS: &[&str] = &[
    "ss_tag_frequency",
    "trigger_words",
    "activation_text",
    "ss_dataset_dirs",
];
const DESCRIPTION_KEYS: &[&str] = &[
    "ss_training_comment",
    "description",
    "modelspec.description",
    "ss_output_name",
];
const EPOCH_KEYS: &[&str] = &["ss_epoch", "ss_num_epochs", "epochs"];
const STEP_KEYS: &[&str] = &["ss_steps", "ss_max_train_steps", "steps"];
const RESOLUTION_KEYS: &[&str] = &["ss_resolution", "ss_bucket_info", "resolution"];
const NETWORK_DIM_KEYS: &[&str] = &["ss_network_dim", "network_dim", "lora_network_dim"];
const NETWORK_ALPHA_KEYS: &[&str] = &["ss_network_alpha", "network_alpha", "lora_network_alpha"];
const CHARACTER_KEYS: &[&str] = &["ss_character", "character", "characters"];
const STYLE_KEYS: &[&str] = &["ss_style", "style", "styles", "art_style"];

const STYLE_KEYWORDS: &[&str] = &[
    "anime",
    "realistic",
    "photorealistic",
    "cartoon",
    "manga",
    "watercolor",
    "oil painting",
    "digital art",
    "concept art",
    "illustration",
    "sketch",
    "line art",
    "cel shaded",
    "3d render",
    "pixel art",
    "fantasy",
    "sci-fi",
    "cyberpunk",
    "steampunk",
    "art nouveau",
    "art deco",
    "impressionist",
    "surreal",
    "abstract",
    "minimalist",
    "vintage",
    "retro",
];

lazy_static! {
    static ref BASE_MODEL_PATTERNS: Vec<(Regex, &'static str)> = [
        (r"sd[-_]?1\.?5|stable[-_]?diffusion[-_]?1\.?5", "SD 1.5"),
        (r"sd[-_]?2\.?1|stable[-_]?diffusion[-_]?2\.?1", "SD 2.1"),
        (r"sdxl(?:[-_ ]?1\.?0)?|stable[-_]?diffusion[-_]?xl", "SDXL 1.0"),
        (r"pony|pdxl", "Pony"),
        (r"sd[-_]?3|stable[-_]?diffusion[-_]?3", "SD 3"),
        (r"flux", "Flux"),
    ]
    .into_iter()
    .map(|(pattern, name)| (Regex::new(pattern).expect("valid base model pattern"), name))
    .collect();
    static ref TRIGGER_SPLIT: Regex = Regex::new(r"[,;\n]").expect("valid split pattern");
    static ref CHARACTER_PATTERNS: Vec<Regex> = [
        r"character[:\s]+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)",
        r"(?:^|\s)([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+(?:from|character)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid character pattern"))
    .collect();
}

/// Metadata extracted from one adapter file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterMetadata {
    pub filename: String,
    pub path: PathBuf,
    pub file_size: u64,
    pub base_model: Option<String>,
    pub trigger_words: Vec<String>,
    pub description: Option<String>,
    pub characters: Vec<String>,
    pub styles: Vec<String>,
    pub training_epochs: Option<i64>,
    pub training_steps: Option<i64>,
    pub resolution: Option<String>,
    pub network_dim: Option<i64>,
    pub network_alpha: Option<f64>,
    pub raw_metadata: BTreeMap<String, String>,
    /// Problems met while reading; extraction itself never fails
    pub extraction_errors: Vec<String>,
}

/// Read and interpret an adapter file's header
pub fn extract_metadata(path: &Path, max_trigger_words: usize) -> AdapterMetadata {
    let mut result = AdapterMetadata {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        ..AdapterMetadata::default()
    };

    match std::fs::metadata(path) {
        Ok(meta) => result.file_size = meta.len(),
        Err(e) => result
            .extraction_errors
            .push(format!("Failed to get file size: {}", e)),
    }

    let header = match read_header(path) {
        Ok(header) => header,
        Err(e) => {
            let message = format!("Failed to extract metadata: {}", e);
            warn!(path = %path.display(), error = %e, "Error extracting adapter metadata");
            result.extraction_errors.push(message);
            return result;
        }
    };

    if !header.has_metadata() {
        result
            .extraction_errors
            .push("No metadata found in file".to_string());
        return result;
    }

    apply_header(&mut result, &header, max_trigger_words);
    result
}

fn apply_header(result: &mut AdapterMetadata, header: &SafetensorsHeader, max_trigger_words: usize) {
    let meta = &header.metadata;
    result.raw_metadata = meta.clone();
    result.base_model = extract_base_model(meta);
    result.trigger_words = extract_trigger_words(meta, max_trigger_words);
    result.description = first_non_empty(meta, DESCRIPTION_KEYS).map(|s| s.trim().to_string());
    result.training_epochs = extract_integer(meta, EPOCH_KEYS);
    result.training_steps = extract_integer(meta, STEP_KEYS);
    result.network_dim = extract_integer(meta, NETWORK_DIM_KEYS);
    result.network_alpha = extract_float(meta, NETWORK_ALPHA_KEYS);
    result.resolution = extract_resolution(meta);

    let text = format!(
        "{} {}",
        result.description.as_deref().unwrap_or(""),
        result.trigger_words.join(" ")
    );
    result.characters = extract_characters(&text, meta);
    result.styles = extract_styles(&text, meta);
}

fn first_non_empty<'a>(meta: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| meta.get(*key))
        .map(String::as_str)
        .find(|value| !value.trim().is_empty())
}

pub fn extract_base_model(meta: &BTreeMap<String, String>) -> Option<String> {
    first_non_empty(meta, BASE_MODEL_KEYS).map(normalize_base_model)
}

/// Map the many spellings of a base model onto a canonical name
pub fn normalize_base_model(raw: &str) -> String {
    let lower = raw.to_lowercase();
    BASE_MODEL_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&lower))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

pub fn extract_trigger_words(meta: &BTreeMap<String, String>, max_per_dataset: usize) -> Vec<String> {
    let mut words = Vec::new();

    for key in TRIGGER_WORD_KEYS {
        let Some(value) = meta.get(*key).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        match *key {
            "ss_tag_frequency" => {
                // {"dataset": {"tag": count, ...}, ...}
                let Ok(Value::Object(datasets)) = serde_json::from_str::<Value>(value) else {
                    continue;
                };
                for tags in datasets.values() {
                    let Value::Object(tags) = tags else {
                        continue;
                    };
                    let mut ranked: Vec<(&String, f64)> = tags
                        .iter()
                        .map(|(tag, count)| (tag, count.as_f64().unwrap_or(0.0)))
                        .collect();
                    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
                    words.extend(
                        ranked
                            .into_iter()
                            .take(max_per_dataset)
                            .map(|(tag, _)| tag.trim().to_string()),
                    );
                }
            }
            "ss_dataset_dirs" => {
                // Directory names look like "10_character_name"
                let Ok(Value::Object(dirs)) = serde_json::from_str::<Value>(value) else {
                    continue;
                };
                for dir_name in dirs.keys() {
                    if let Some((_, rest)) = dir_name.split_once('_') {
                        words.push(rest.replace('_', " "));
                    }
                }
            }
            _ => {
                words.extend(
                    TRIGGER_SPLIT
                        .split(value)
                        .map(str::trim)
                        .filter(|w| !w.is_empty())
                        .map(str::to_string),
                );
            }
        }
    }

    dedupe_case_insensitive(words)
}

fn extract_integer(meta: &BTreeMap<String, String>, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|key| meta.get(*key))
        .find_map(|value| value.trim().parse::<f64>().ok())
        .map(|value| value.trunc() as i64)
}

fn extract_float(meta: &BTreeMap<String, String>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| meta.get(*key))
        .find_map(|value| value.trim().parse::<f64>().ok())
}

pub fn extract_resolution(meta: &BTreeMap<String, String>) -> Option<String> {
    for key in RESOLUTION_KEYS {
        let Some(value) = meta.get(*key).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        if *key != "ss_bucket_info" {
            return Some(value.trim().to_string());
        }

        let Ok(info) = serde_json::from_str::<Value>(value) else {
            continue;
        };
        let Some(Value::Object(buckets)) = info.get("buckets") else {
            continue;
        };
        let mut resolutions = BTreeSet::new();
        for (bucket_key, bucket) in buckets {
            let normalized = bucket_key.replace('(', "[").replace(')', "]");
            let dims = serde_json::from_str::<Value>(&normalized)
                .ok()
                .filter(Value::is_array)
                .or_else(|| bucket.get("resolution").cloned());
            if let Some(Value::Array(dims)) = dims {
                if let [w, h] = dims.as_slice() {
                    if let (Some(w), Some(h)) = (w.as_i64(), h.as_i64()) {
                        resolutions.insert(format!("{}x{}", w, h));
                    }
                }
            }
        }
        if !resolutions.is_empty() {
            return Some(resolutions.into_iter().collect::<Vec<_>>().join(", "));
        }
    }
    None
}

pub fn extract_characters(text: &str, meta: &BTreeMap<String, String>) -> Vec<String> {
    let mut characters = split_list_keys(meta, CHARACTER_KEYS);
    for pattern in CHARACTER_PATTERNS.iter() {
        characters.extend(
            pattern
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
        );
    }
    dedupe_case_insensitive(characters)
}

pub fn extract_styles(text: &str, meta: &BTreeMap<String, String>) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut styles: Vec<String> = STYLE_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .map(|keyword| title_case(keyword))
        .collect();
    styles.extend(split_list_keys(meta, STYLE_KEYS));
    dedupe_case_insensitive(styles)
}

fn split_list_keys(meta: &BTreeMap<String, String>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| meta.get(*key))
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Upper-case every letter that does not follow another letter
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() && !prev_alpha {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

fn dedupe_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.is_empty() && seen.insert(item.to_lowercase()))
        .collect()
}

/// True for `.safetensors` files whose tensors look like LoRA weights
pub fn is_adapter_file(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ADAPTER_EXTENSION))
        .unwrap_or(false);
    if !has_extension || !path.is_file() {
        return false;
    }
    match read_header(path) {
        Ok(header) => header
            .tensor_names
            .iter()
            .any(|name| name.to_lowercase().contains("lora")),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Adapter file validation failed");
            false
        }
    }
}

/// Multi-line human-readable summary
pub fn summary(metadata: &AdapterMetadata) -> String {
    let mut lines = vec![format!("LoRA: {}", metadata.filename)];

    lines.push(format!(
        "  Base Model: {}",
        metadata.base_model.as_deref().unwrap_or("Unknown")
    ));

    if metadata.trigger_words.is_empty() {
        lines.push("  Trigger Words: No trigger words available".to_string());
    } else {
        let mut triggers = metadata
            .trigger_words
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if metadata.trigger_words.len() > 5 {
            triggers.push_str(&format!(" (+{} more)", metadata.trigger_words.len() - 5));
        }
        lines.push(format!("  Trigger Words: {}", triggers));
    }

    match &metadata.description {
        Some(description) => {
            let mut short: String = description.chars().take(100).collect();
            if description.chars().count() > 100 {
                short.push_str("...");
            }
            lines.push(format!("  Description: {}", short));
        }
        None => lines.push("  Description: No description".to_string()),
    }

    if !metadata.characters.is_empty() {
        lines.push(format!("  Characters: {}", metadata.characters.join(", ")));
    }
    if !metadata.styles.is_empty() {
        lines.push(format!("  Styles: {}", metadata.styles.join(", ")));
    }

    let size_mb = metadata.file_size as f64 / (1024.0 * 1024.0);
    lines.push(format!("  File Size: {:.2} MB", size_mb));

    if let Some(dim) = metadata.network_dim {
        lines.push(format!("  Network Dim: {}", dim));
    }
    if let Some(alpha) = metadata.network_alpha {
        lines.push(format!("  Network Alpha: {}", alpha));
    }
    if !metadata.extraction_errors.is_empty() {
        lines.push(format!(
            "  Warnings: {} extraction issues",
            metadata.extraction_errors.len()
        ));
    }

    lines.join("\n")
}
