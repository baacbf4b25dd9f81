//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_PRESET_DIRECTORY: &str = "lora_presets";
pub const DEFAULT_MAX_TRIGGER_WORDS: i64 = 20;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("presets.directory", DEFAULT_PRESET_DIRECTORY)?
        .set_default("library.max_trigger_words", DEFAULT_MAX_TRIGGER_WORDS)?
        .set_default("application.version", env!("CARGO_PKG_VERSION"))
}
