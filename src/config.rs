//! Configuration System
//!
//! Layered configuration: built-in defaults, the global file, workspace files and
//! `LORAKIT__SECTION__KEY` environment overrides, in increasing precedence.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use merge::merge_policy::{DEFAULT_MAX_TRIGGER_WORDS, DEFAULT_PRESET_DIRECTORY};
pub use sources::environment::ENV_PREFIX;
pub use sources::workspace_file::ENV_NAME_VAR;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LorakitConfig {
    #[serde(default)]
    pub presets: PresetConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetConfig {
    /// Preset directory; relative paths resolve against the workspace root
    #[serde(default = "default_preset_directory")]
    pub directory: PathBuf,
}

fn default_preset_directory() -> PathBuf {
    PathBuf::from(DEFAULT_PRESET_DIRECTORY)
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            directory: default_preset_directory(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directories scanned for adapter files
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Trigger words kept per training dataset
    #[serde(default = "default_max_trigger_words")]
    pub max_trigger_words: usize,
}

fn default_max_trigger_words() -> usize {
    DEFAULT_MAX_TRIGGER_WORDS as usize
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            max_trigger_words: default_max_trigger_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Version string written into artifact metadata
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Presets(String),
    Library(String),
    Application(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Presets(msg) => write!(f, "Presets: {}", msg),
            ValidationError::Library(msg) => write!(f, "Library: {}", msg),
            ValidationError::Application(msg) => write!(f, "Application: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl LorakitConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.presets.directory.as_os_str().is_empty() {
            errors.push(ValidationError::Presets(
                "Preset directory cannot be empty".to_string(),
            ));
        }
        if self.library.max_trigger_words == 0 {
            errors.push(ValidationError::Library(
                "max_trigger_words must be at least 1".to_string(),
            ));
        }
        if self.application.version.trim().is_empty() {
            errors.push(ValidationError::Application(
                "Version cannot be empty".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "Unknown level '{}'",
                self.logging.level
            )));
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            errors.push(ValidationError::Logging(format!(
                "Unknown format '{}'",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into one error
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }

    /// Absolute preset directory for a workspace
    pub fn preset_directory(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.presets.directory)
    }

    /// Adapter directories, relative entries resolved against the workspace
    pub fn library_paths(&self, workspace_root: &Path) -> Vec<PathBuf> {
        self.library
            .paths
            .iter()
            .map(|p| resolve(workspace_root, p))
            .collect()
    }
}

fn resolve(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}
