//! Integration tests for configuration loading and data folder resolution
//!
//! Covers:
//! - Missing config files degrade to defaults with a warning
//! - Priority order: CLI argument → ALS_DATA_FOLDER → TOML → platform default
//! - Partial TOML files fill the remaining fields with defaults
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.
//! Tests that touch ALS_DATA_FOLDER or OPENAI_* are marked #[serial].

use als_common::config::{
    default_data_folder, load_toml_config, parse_toml_config, resolve_data_folder, EngineParams,
    LlmConfig, TomlConfig, DATA_FOLDER_ENV,
};
use als_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_default_data_folder_is_not_empty() {
    let folder = default_data_folder();
    assert!(!folder.as_os_str().is_empty());
    assert!(folder.ends_with("als") || folder.ends_with("als_data"));
}

#[test]
#[serial]
fn test_resolution_falls_through_to_default() {
    env::remove_var(DATA_FOLDER_ENV);
    let resolved = resolve_data_folder(None, &TomlConfig::default());
    assert_eq!(resolved, default_data_folder());
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/als-env-folder");
    let config = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/als-toml-folder")),
        ..TomlConfig::default()
    };

    let resolved = resolve_data_folder(None, &config);
    assert_eq!(resolved, PathBuf::from("/tmp/als-env-folder"));

    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
#[serial]
fn test_cli_beats_env_var() {
    env::set_var(DATA_FOLDER_ENV, "/tmp/als-env-folder");

    let resolved = resolve_data_folder(Some(Path::new("/tmp/als-cli-folder")), &TomlConfig::default());
    assert_eq!(resolved, PathBuf::from("/tmp/als-cli-folder"));

    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(DATA_FOLDER_ENV, "   ");
    let config = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/als-toml-folder")),
        ..TomlConfig::default()
    };

    let resolved = resolve_data_folder(None, &config);
    assert_eq!(resolved, PathBuf::from("/tmp/als-toml-folder"));

    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = parse_toml_config(
        r#"
port = 6000

[engine]
eq_target = 30

[logging]
level = "debug"
"#,
    )
    .unwrap();

    assert_eq!(config.port, Some(6000));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.engine.eq_target, 30);
    assert_eq!(config.engine.fla_target, EngineParams::default().fla_target);
    assert_eq!(config.llm, LlmConfig::default());
    assert!(config.data_folder.is_none());
}

#[test]
fn test_invalid_engine_values_rejected() {
    let result = parse_toml_config("[engine]\nsimilarity_threshold = 1.5\n");
    assert!(matches!(result, Err(Error::Config(_))));

    let result = parse_toml_config("[engine]\neq_target = 0\n");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_rejected() {
    let result = parse_toml_config("port = \"not a number\"");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "data_folder = \"/srv/als\"\ndataset_file = \"bank.json\"\n[llm]\nenabled = false\n",
    )
    .unwrap();

    let config = load_toml_config(Some(path.as_path())).unwrap();
    assert_eq!(config.data_folder, Some(PathBuf::from("/srv/als")));
    assert!(!config.llm.enabled);
    assert_eq!(
        config.dataset_path(Path::new("/srv/als")),
        PathBuf::from("/srv/als/bank.json")
    );
}

#[test]
fn test_missing_explicit_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_toml_config(Some(dir.path().join("absent.toml").as_path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_llm_model_env_override() {
    let llm = LlmConfig::default();

    env::remove_var("OPENAI_MODEL");
    assert_eq!(llm.resolved_model(), "gpt-4o-mini");

    env::set_var("OPENAI_MODEL", "gpt-4.1");
    assert_eq!(llm.resolved_model(), "gpt-4.1");
    env::remove_var("OPENAI_MODEL");
}

#[test]
#[serial]
fn test_llm_api_key_from_configured_variable() {
    let llm = LlmConfig {
        api_key_env: "ALS_TEST_LLM_KEY".to_string(),
        ..LlmConfig::default()
    };

    env::remove_var("ALS_TEST_LLM_KEY");
    assert!(llm.api_key().is_none());

    env::set_var("ALS_TEST_LLM_KEY", "sk-test");
    assert_eq!(llm.api_key().as_deref(), Some("sk-test"));
    env::remove_var("ALS_TEST_LLM_KEY");
}
