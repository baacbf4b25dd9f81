//! Adapter library index
//!
//! Recursively scans adapter directories and keeps the extracted metadata keyed by
//! file path. Lookups copy entries out, so callers never hold the index lock.

use crate::library::extract::{extract_metadata, AdapterMetadata, ADAPTER_EXTENSION};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_scanned: usize,
    /// Files whose header could not be read
    pub files_failed: usize,
    pub total_indexed: usize,
    pub elapsed_ms: u64,
}

pub struct AdapterLibrary {
    paths: Vec<PathBuf>,
    max_trigger_words: usize,
    index: RwLock<BTreeMap<PathBuf, AdapterMetadata>>,
}

impl AdapterLibrary {
    pub fn new(paths: Vec<PathBuf>, max_trigger_words: usize) -> Self {
        Self {
            paths,
            max_trigger_words,
            index: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// All `.safetensors` files under the configured paths, sorted
    pub fn discover_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in &self.paths {
            if !root.exists() {
                warn!(path = %root.display(), "Adapter path does not exist");
                continue;
            }
            if !root.is_dir() {
                warn!(path = %root.display(), "Adapter path is not a directory");
                continue;
            }
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable entry during adapter scan");
                        continue;
                    }
                };
                if entry.file_type().is_file() && has_adapter_extension(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        files
    }

    /// Scan every configured path and index what is found
    pub fn scan(&self) -> ScanStats {
        let started = Instant::now();
        let files = self.discover_files();
        let total = files.len();
        info!(directories = self.paths.len(), files = total, "Starting adapter scan");

        let mut stats = ScanStats::default();
        for (index, path) in files.into_iter().enumerate() {
            let metadata = extract_metadata(&path, self.max_trigger_words);
            if metadata.raw_metadata.is_empty() && !metadata.extraction_errors.is_empty() {
                stats.files_failed += 1;
            }
            stats.files_scanned += 1;

            if (index + 1) % 10 == 0 || index + 1 == total {
                debug!(
                    scanned = index + 1,
                    total,
                    filename = %metadata.filename,
                    "Adapter scan progress"
                );
            }
            self.index.write().insert(path, metadata);
        }

        stats.total_indexed = self.len();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            indexed = stats.total_indexed,
            failed = stats.files_failed,
            elapsed_ms = stats.elapsed_ms,
            "Adapter scan complete"
        );
        stats
    }

    /// Run [`AdapterLibrary::scan`] on the blocking thread pool
    pub fn scan_in_background(self: &Arc<Self>) -> tokio::task::JoinHandle<ScanStats> {
        let library = Arc::clone(self);
        tokio::task::spawn_blocking(move || library.scan())
    }

    /// Re-read one file and update its entry
    pub fn refresh_file(&self, path: &Path) -> AdapterMetadata {
        let metadata = extract_metadata(path, self.max_trigger_words);
        self.index
            .write()
            .insert(path.to_path_buf(), metadata.clone());
        metadata
    }

    /// Returns true if the path was indexed
    pub fn remove_file(&self, path: &Path) -> bool {
        self.index.write().remove(path).is_some()
    }

    pub fn clear(&self) {
        self.index.write().clear();
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<AdapterMetadata> {
        self.index.read().get(path).cloned()
    }

    /// All entries, sorted by filename case-insensitively
    pub fn entries(&self) -> Vec<AdapterMetadata> {
        let mut all: Vec<AdapterMetadata> = self.index.read().values().cloned().collect();
        all.sort_by_key(|m| m.filename.to_lowercase());
        all
    }

    pub fn by_filename(&self, filename: &str) -> Vec<AdapterMetadata> {
        self.filter(|m| m.filename == filename)
    }

    /// Case-insensitive substring match on the normalized base model
    pub fn search_by_base_model(&self, base_model: &str) -> Vec<AdapterMetadata> {
        let needle = base_model.to_lowercase();
        self.filter(|m| {
            m.base_model
                .as_deref()
                .map(|b| b.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
    }

    /// Case-insensitive substring match on any trigger word
    pub fn search_by_trigger_word(&self, trigger_word: &str) -> Vec<AdapterMetadata> {
        let needle = trigger_word.to_lowercase();
        self.filter(|m| {
            m.trigger_words
                .iter()
                .any(|w| w.to_lowercase().contains(&needle))
        })
    }

    pub fn distinct_base_models(&self) -> Vec<String> {
        self.index
            .read()
            .values()
            .filter_map(|m| m.base_model.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn filter<F>(&self, predicate: F) -> Vec<AdapterMetadata>
    where
        F: Fn(&AdapterMetadata) -> bool,
    {
        self.index
            .read()
            .values()
            .filter(|m| predicate(m))
            .cloned()
            .collect()
    }
}

fn has_adapter_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ADAPTER_EXTENSION))
        .unwrap_or(false)
}
