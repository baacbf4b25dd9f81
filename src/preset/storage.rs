//! Preset storage implementation
//!
//! Stores one JSON record per preset in a flat directory:
//! `{root}/{hex(name)}.json`
//!
//! The file stem is the hex encoding of the UTF-8 name, so names that differ only
//! in case, or that contain path separators, never collide on disk. Names longer
//! than [`MAX_PLAIN_NAME_BYTES`] would overflow file name limits; their stem is
//! `{hex(first 32 bytes)}-{blake3(name)}` instead. The original name is always
//! kept inside the record.

use crate::error::{ApiError, StorageError};
use crate::preset::types::{validate_entries, validate_name, AdapterEntry, Preset, PresetInfo};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Names up to this many bytes are stored under their plain hex encoding
pub const MAX_PLAIN_NAME_BYTES: usize = 64;
const HASHED_PREFIX_BYTES: usize = 32;

/// Durable preset store
///
/// Reads go straight to disk. Every mutation holds `write_lock` for its whole
/// duration, so two saves to the same name produce one complete record.
pub struct PresetStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl PresetStore {
    /// Open (and create if needed) a preset directory
    ///
    /// Temporary files left behind by an interrupted save are removed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, ApiError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create preset directory at {:?}: {}", root, e),
            ))
        })?;

        let store = Self {
            root,
            write_lock: Mutex::new(()),
        };
        store.remove_stale_temp_files()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create or replace a preset
    ///
    /// The record is written to a temporary sibling and renamed over the target,
    /// so the previous record stays visible until the new one is complete.
    pub fn save(&self, name: &str, entries: Vec<AdapterEntry>) -> Result<Preset, ApiError> {
        validate_name(name)?;
        validate_entries(&entries)?;

        let preset = Preset {
            name: name.to_string(),
            created_at: Utc::now(),
            entries,
        };
        let serialized = serde_json::to_vec_pretty(&preset)
            .map_err(|e| StorageError::Encode(e.to_string()))?;

        let _guard = self.write_lock.lock();
        let record_path = self.record_path(name);
        let temp_path = record_path.with_extension(TEMP_EXTENSION);

        if let Err(e) = write_synced(&temp_path, &serialized) {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to write preset to {:?}: {}", temp_path, e),
            ))
            .into());
        }

        fs::rename(&temp_path, &record_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to rename temp file to {:?}: {}", record_path, e),
            ))
        })?;

        debug!(
            preset = %preset.name,
            entries = preset.entries.len(),
            path = %record_path.display(),
            "Saved preset"
        );
        Ok(preset)
    }

    /// Load a preset by exact name
    pub fn load(&self, name: &str) -> Result<Preset, ApiError> {
        let record_path = self.record_path(name);
        let bytes = match fs::read(&record_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ApiError::not_found_preset(name))
            }
            Err(e) => return Err(StorageError::IoError(e).into()),
        };

        let preset: Preset =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                path: record_path.clone(),
                reason: e.to_string(),
            })?;

        if preset.name != name {
            return Err(StorageError::Corrupt {
                path: record_path,
                reason: format!("record holds preset '{}'", preset.name),
            }
            .into());
        }

        Ok(preset)
    }

    /// Names of all stored presets, sorted ascending
    pub fn list(&self) -> Result<Vec<String>, ApiError> {
        let entries = fs::read_dir(&self.root).map_err(StorageError::IoError)?;
        let mut names = Vec::new();

        for entry in entries {
            let path = entry.map_err(StorageError::IoError)?.path();
            if !is_record_file(&path) {
                continue;
            }
            match decode_stem(&path).or_else(|| read_record_name(&path)) {
                Some(name) => names.push(name),
                None => warn!(path = %path.display(), "Skipping preset file with invalid name"),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Delete a preset. Deleting a missing preset is an error.
    pub fn delete(&self, name: &str) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock();
        let record_path = self.record_path(name);
        match fs::remove_file(&record_path) {
            Ok(()) => {
                debug!(preset = %name, "Deleted preset");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ApiError::not_found_preset(name)),
            Err(e) => Err(StorageError::IoError(e).into()),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.record_path(name).is_file()
    }

    pub fn info(&self, name: &str) -> Result<PresetInfo, ApiError> {
        Ok(self.load(name)?.info())
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", record_stem(name), RECORD_EXTENSION))
    }

    fn remove_stale_temp_files(&self) -> Result<(), ApiError> {
        let entries = fs::read_dir(&self.root).map_err(StorageError::IoError)?;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".tmp"))
                .unwrap_or(false);
            if is_temp && path.is_file() {
                warn!(path = %path.display(), "Removing leftover preset temp file");
                let _ = fs::remove_file(&path);
            }
        }
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn is_record_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
}

fn record_stem(name: &str) -> String {
    let bytes = name.as_bytes();
    if bytes.len() <= MAX_PLAIN_NAME_BYTES {
        return hex::encode(bytes);
    }
    format!(
        "{}-{}",
        hex::encode(&bytes[..HASHED_PREFIX_BYTES]),
        blake3::hash(bytes).to_hex()
    )
}

#[derive(Deserialize)]
struct RecordName {
    name: String,
}

/// Name stored inside a record whose stem is hashed
fn read_record_name(path: &Path) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    let record: RecordName = serde_json::from_slice(&bytes).ok()?;
    (record_stem(&record.name).as_str() == path.file_stem()?.to_str()?).then_some(record.name)
}

fn decode_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let bytes = hex::decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}
