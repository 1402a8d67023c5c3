//! Configuration resolution tests
//!
//! Uses serial_test to prevent ENV variable race conditions: every test that
//! reads the process environment is marked #[serial].

use ayur_common::config::{
    load_toml_config, CliOverrides, ServiceConfig, TomlConfig, DEFAULT_PLANTNET_BASE_URL,
    DEFAULT_PLANTNET_PROJECT, DEFAULT_PORT, ENV_API_KEY, ENV_BASE_URL, ENV_DATA_DIR, ENV_HOST,
    ENV_MOCK_MODE, ENV_PORT, ENV_PROJECT,
};
use ayur_common::Error;
use serial_test::serial;
use std::path::PathBuf;

fn clear_env() {
    for name in [
        ENV_API_KEY,
        ENV_PROJECT,
        ENV_MOCK_MODE,
        ENV_BASE_URL,
        ENV_DATA_DIR,
        ENV_HOST,
        ENV_PORT,
    ] {
        std::env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    clear_env();

    let config = ServiceConfig::resolve(&CliOverrides::default(), &TomlConfig::default()).unwrap();

    assert!(config.plantnet_api_key.is_none());
    assert_eq!(config.plantnet_project, DEFAULT_PLANTNET_PROJECT);
    assert_eq!(config.plantnet_base_url, DEFAULT_PLANTNET_BASE_URL);
    assert_eq!(config.port, DEFAULT_PORT);
    assert!(!config.mock_mode);
    // Missing credential falls back to mock mode
    assert!(config.use_mock());
    assert!(config.store_path().ends_with("plants.json"));
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "env-key");
    std::env::set_var(ENV_PROJECT, "weurope");

    let toml_config = TomlConfig {
        plantnet_api_key: Some("toml-key".to_string()),
        plantnet_project: Some("canada".to_string()),
        port: Some(9100),
        ..Default::default()
    };

    let config = ServiceConfig::resolve(&CliOverrides::default(), &toml_config).unwrap();
    assert_eq!(config.plantnet_api_key.as_deref(), Some("env-key"));
    assert_eq!(config.plantnet_project, "weurope");
    assert_eq!(config.port, 9100);
    assert!(!config.use_mock());

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "env-key");
    std::env::set_var(ENV_DATA_DIR, "/tmp/from-env");

    let cli = CliOverrides {
        plantnet_api_key: Some("cli-key".to_string()),
        data_dir: Some(PathBuf::from("/tmp/from-cli")),
        port: Some(7000),
        ..Default::default()
    };

    let config = ServiceConfig::resolve(&cli, &TomlConfig::default()).unwrap();
    assert_eq!(config.plantnet_api_key.as_deref(), Some("cli-key"));
    assert_eq!(config.data_dir, PathBuf::from("/tmp/from-cli"));
    assert_eq!(config.port, 7000);

    clear_env();
}

#[test]
#[serial]
fn test_blank_values_are_treated_as_absent() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "   ");
    std::env::set_var(ENV_PROJECT, "");

    let config = ServiceConfig::resolve(&CliOverrides::default(), &TomlConfig::default()).unwrap();
    assert!(config.plantnet_api_key.is_none());
    assert_eq!(config.plantnet_project, "all");
    assert!(config.use_mock());

    clear_env();
}

#[test]
#[serial]
fn test_mock_mode_flag_forces_mock_with_credential() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "real-key");
    std::env::set_var(ENV_MOCK_MODE, "True");

    let config = ServiceConfig::resolve(&CliOverrides::default(), &TomlConfig::default()).unwrap();
    assert!(config.mock_mode);
    assert!(config.use_mock());

    std::env::set_var(ENV_MOCK_MODE, "false");
    let toml_config = TomlConfig {
        mock_mode: Some(true),
        ..Default::default()
    };
    // Env "false" wins over TOML true
    let config = ServiceConfig::resolve(&CliOverrides::default(), &toml_config).unwrap();
    assert!(!config.mock_mode);
    assert!(!config.use_mock());

    clear_env();
}

#[test]
#[serial]
fn test_invalid_port_env_is_config_error() {
    clear_env();
    std::env::set_var(ENV_PORT, "not-a-port");

    let result = ServiceConfig::resolve(&CliOverrides::default(), &TomlConfig::default());
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
fn test_load_explicit_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "plantnet_api_key = \"abc\"\nmock_mode = true\ndata_dir = \"/var/lib/ayur\"\n",
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.plantnet_api_key.as_deref(), Some("abc"));
    assert_eq!(config.mock_mode, Some(true));
    assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/ayur")));
}

#[test]
fn test_load_explicit_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_toml_config(Some(&dir.path().join("missing.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_malformed_toml_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = [not toml").unwrap();

    let result = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}
