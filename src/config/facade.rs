//! Configuration loading entry points.

use super::merge::merge_policy::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::LorakitConfig;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`LorakitConfig`] from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then global file, then workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<LorakitConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: LorakitConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace = %workspace_root.display(),
            preset_directory = %config.presets.directory.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Defaults, then exactly one explicit file, then environment.
    pub fn load_from_file(path: &Path) -> Result<LorakitConfig, ConfigError> {
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<LorakitConfig, ConfigError> {
        builder_with_defaults()?.build()?.try_deserialize()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
