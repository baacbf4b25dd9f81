//! Integration tests for the layered configuration system

use crate::integration::test_utils::{with_xdg_env, with_xdg_env_vars};
use lorakit::config::{ConfigLoader, ENV_NAME_VAR};
use std::path::PathBuf;
use tempfile::TempDir;

fn write(path: &std::path::Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_defaults_without_any_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(workspace.path()).unwrap());
    assert_eq!(config.presets.directory, PathBuf::from("lora_presets"));
    assert_eq!(config.library.max_trigger_words, 20);
    assert_eq!(config.application.version, env!("CARGO_PKG_VERSION"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_global_file_is_read() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        &test_dir.path().join("xdg_config/lorakit/config.toml"),
        "[library]\nmax_trigger_words = 7\n",
    );

    let config = with_xdg_env(&test_dir, || {
        assert_eq!(
            ConfigLoader::global_config_path().unwrap(),
            test_dir.path().join("xdg_config/lorakit/config.toml")
        );
        ConfigLoader::load(workspace.path()).unwrap()
    });
    assert_eq!(config.library.max_trigger_words, 7);
}

#[test]
fn test_workspace_overrides_global_and_env_file_overrides_base() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        &test_dir.path().join("xdg_config/lorakit/config.toml"),
        "[presets]\ndirectory = \"global_presets\"\n\n[application]\nversion = \"2026.1.0\"\n",
    );
    write(
        &workspace.path().join("config/config.toml"),
        "[presets]\ndirectory = \"workspace_presets\"\n",
    );
    write(
        &workspace.path().join("config/staging.toml"),
        "[application]\nversion = \"2026.10.9\"\n",
    );

    let config = with_xdg_env_vars(&test_dir, &[(ENV_NAME_VAR, "staging")], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });
    assert_eq!(config.presets.directory, PathBuf::from("workspace_presets"));
    assert_eq!(config.application.version, "2026.10.9");
    assert_eq!(
        config.preset_directory(workspace.path()),
        workspace.path().join("workspace_presets")
    );
}

#[test]
fn test_environment_overrides_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/config.toml"),
        "[presets]\ndirectory = \"from_file\"\n",
    );

    let config = with_xdg_env_vars(
        &test_dir,
        &[
            ("LORAKIT__PRESETS__DIRECTORY", "/srv/from_env"),
            ("LORAKIT__LIBRARY__PATHS", "/mnt/a,/mnt/b"),
        ],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );
    assert_eq!(config.presets.directory, PathBuf::from("/srv/from_env"));
    assert_eq!(
        config.library.paths,
        vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]
    );
}

#[test]
fn test_malformed_workspace_file_is_an_error() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/config.toml"),
        "[presets\ndirectory = ",
    );

    let result = with_xdg_env(&test_dir, || ConfigLoader::load(workspace.path()));
    assert!(result.is_err());
}
