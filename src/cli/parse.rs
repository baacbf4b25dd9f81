//! CLI parse: clap types for lorakit. Definitions plus argument value parsers.

use crate::preset::AdapterEntry;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lorakit - LoRA preset and adapter library management
#[derive(Parser)]
#[command(name = "lorakit")]
#[command(about = "Manage LoRA presets and inspect adapter libraries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage saved presets
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },
    /// Inspect adapter files on disk
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum PresetCommands {
    /// List saved presets
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one preset's entries
    Show {
        name: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create or replace a preset
    Save {
        name: String,
        /// Adapter entry as ID:WEIGHT, or ID:WEIGHT:off to store it disabled
        #[arg(long = "adapter", value_parser = parse_entry)]
        adapters: Vec<AdapterEntry>,
    },
    /// Delete a preset
    Delete {
        name: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum LibraryCommands {
    /// Scan adapter directories and list what was found
    Scan {
        /// Extra directory to scan (repeatable); defaults to library.paths
        #[arg(long = "path")]
        paths: Vec<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Search scanned adapters
    Search {
        /// Base model substring, e.g. "sdxl"
        #[arg(long)]
        base_model: Option<String>,
        /// Trigger word substring
        #[arg(long)]
        trigger: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the metadata summary of one adapter file
    Show { file: PathBuf },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the merged configuration as TOML
    Show,
    /// Validate the merged configuration
    Validate,
}

/// Parse `ID:WEIGHT` or `ID:WEIGHT:off`
pub fn parse_entry(raw: &str) -> Result<AdapterEntry, String> {
    let mut parts = raw.rsplitn(3, ':').collect::<Vec<_>>();
    parts.reverse();
    let (id, weight, enabled) = match parts.as_slice() {
        [id, weight] => (*id, *weight, true),
        [id, weight, "off"] => (*id, *weight, false),
        [id, weight, "on"] => (*id, *weight, true),
        _ => return Err(format!("expected ID:WEIGHT[:off], got '{}'", raw)),
    };
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|_| format!("invalid weight '{}' in '{}'", weight, raw))?;
    let entry = AdapterEntry::new(id.trim(), weight);
    Ok(if enabled { entry } else { entry.disabled() })
}
