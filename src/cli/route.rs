//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::parse::{Commands, ConfigCommands, LibraryCommands, PresetCommands};
use crate::cli::presentation::{
    format_library_json, format_library_text, format_preset_json, format_preset_list_json,
    format_preset_list_text, format_preset_text,
};
use crate::config::{ConfigLoader, LorakitConfig};
use crate::error::ApiError;
use crate::library::{extract_metadata, summary, AdapterLibrary, AdapterMetadata};
use crate::preset::{AdapterEntry, PresetInfo, PresetStore};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace root plus the merged configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: LorakitConfig,
}

impl RunContext {
    /// Load and validate configuration for a workspace
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref cfg_path) => ConfigLoader::load_from_file(cfg_path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.ensure_valid()?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &LorakitConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Preset { command } => self.handle_preset(command),
            Commands::Library { command } => self.handle_library(command),
            Commands::Config { command } => self.handle_config(command),
        }
    }

    fn open_store(&self) -> Result<PresetStore, ApiError> {
        PresetStore::open(self.config.preset_directory(&self.workspace_root))
    }

    fn handle_preset(&self, command: &PresetCommands) -> Result<String, ApiError> {
        let store = self.open_store()?;
        match command {
            PresetCommands::List { format } => {
                let infos = store
                    .list()?
                    .iter()
                    .map(|name| store.info(name))
                    .collect::<Result<Vec<PresetInfo>, ApiError>>()?;
                if format == "json" {
                    format_preset_list_json(&infos)
                } else {
                    Ok(format_preset_list_text(&infos))
                }
            }
            PresetCommands::Show { name, format } => {
                let preset = store.load(name)?;
                if format == "json" {
                    format_preset_json(&preset)
                } else {
                    Ok(format_preset_text(&preset))
                }
            }
            PresetCommands::Save { name, adapters } => {
                self.handle_preset_save(&store, name, adapters.clone())
            }
            PresetCommands::Delete { name, force } => {
                self.handle_preset_delete(&store, name, *force)
            }
        }
    }

    fn handle_preset_save(
        &self,
        store: &PresetStore,
        name: &str,
        adapters: Vec<AdapterEntry>,
    ) -> Result<String, ApiError> {
        let replaced = store.exists(name);
        let preset = store.save(name, adapters)?;
        info!(preset = %preset.name, replaced, "Preset saved from CLI");
        Ok(format!(
            "{} preset '{}' with {} active adapters",
            if replaced { "Replaced" } else { "Saved" },
            preset.name,
            preset.adapter_count()
        ))
    }

    fn handle_preset_delete(
        &self,
        store: &PresetStore,
        name: &str,
        force: bool,
    ) -> Result<String, ApiError> {
        if !store.exists(name) {
            return Err(ApiError::not_found_preset(name));
        }

        // Confirm removal unless --force
        if !force {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete preset '{}'?", name))
                .interact()
                .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;

            if !confirmed {
                return Ok("Deletion cancelled".to_string());
            }
        }

        store.delete(name)?;
        Ok(format!("Deleted preset '{}'", name))
    }

    fn handle_library(&self, command: &LibraryCommands) -> Result<String, ApiError> {
        match command {
            LibraryCommands::Scan { paths, format } => {
                let library = self.library(paths);
                library.scan();
                let entries = library.entries();
                render_library(&entries, format)
            }
            LibraryCommands::Search {
                base_model,
                trigger,
                format,
            } => {
                let library = self.library(&[]);
                library.scan();
                let entries = search(&library, base_model.as_deref(), trigger.as_deref());
                debug!(matches = entries.len(), "Library search finished");
                render_library(&entries, format)
            }
            LibraryCommands::Show { file } => {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    self.workspace_root.join(file)
                };
                if !path.is_file() {
                    return Err(ApiError::NotFound(format!("adapter file {}", path.display())));
                }
                Ok(summary(&extract_metadata(
                    &path,
                    self.config.library.max_trigger_words,
                )))
            }
        }
    }

    fn library(&self, extra_paths: &[PathBuf]) -> AdapterLibrary {
        let paths = if extra_paths.is_empty() {
            self.config.library_paths(&self.workspace_root)
        } else {
            extra_paths
                .iter()
                .map(|p| {
                    if p.is_absolute() {
                        p.clone()
                    } else {
                        self.workspace_root.join(p)
                    }
                })
                .collect()
        };
        AdapterLibrary::new(paths, self.config.library.max_trigger_words)
    }

    fn handle_config(&self, command: &ConfigCommands) -> Result<String, ApiError> {
        match command {
            ConfigCommands::Show => toml::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
            // Construction already validated it.
            ConfigCommands::Validate => Ok("Configuration is valid".to_string()),
        }
    }
}

fn render_library(entries: &[AdapterMetadata], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        format_library_json(entries)
    } else {
        Ok(format_library_text(entries))
    }
}

/// Entries matching every given filter, in library order
fn search(
    library: &AdapterLibrary,
    base_model: Option<&str>,
    trigger: Option<&str>,
) -> Vec<AdapterMetadata> {
    let by_model: Option<BTreeSet<PathBuf>> =
        base_model.map(|b| library.search_by_base_model(b).into_iter().map(|m| m.path).collect());
    let by_trigger: Option<BTreeSet<PathBuf>> = trigger.map(|t| {
        library
            .search_by_trigger_word(t)
            .into_iter()
            .map(|m| m.path)
            .collect()
    });

    library
        .entries()
        .into_iter()
        .filter(|m| by_model.as_ref().map_or(true, |set| set.contains(&m.path)))
        .filter(|m| by_trigger.as_ref().map_or(true, |set| set.contains(&m.path)))
        .collect()
}
