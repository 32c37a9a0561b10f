//! Tests for bootstrap configuration loading and root folder resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate DQV_ROOT_FOLDER are marked with #[serial].

use dqv_common::config::{
    load_bootstrap_config, load_toml_config, resolve_root_folder, write_toml_config,
    ReasoningProvider, StorageKind, TomlConfig,
};
use dqv_common::Error;
use rust_decimal::Decimal;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

const ROOT_ENV: &str = "DQV_ROOT_FOLDER";

#[test]
fn test_load_full_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dqv-validator.toml");
    std::fs::write(
        &path,
        r#"
        port = 6000
        root_folder = "/srv/dqv"

        [logging]
        level = "debug"

        [timeouts]
        reasoning_secs = 20

        [storage]
        kind = "http"
        base_url = "https://acct.blob.core.windows.net/delivery-documents"
        sas_token = "sv=2024&sig=abc"

        [reasoning]
        provider = "stub"
        max_prompt_chars = 4000
        "#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.port, 6000);
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/dqv")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.timeouts.reasoning_secs, 20);
    // Unspecified fields in a present section keep their defaults
    assert_eq!(config.timeouts.storage_secs, 30);
    assert_eq!(config.storage.kind, StorageKind::Http);
    assert_eq!(config.reasoning.provider, ReasoningProvider::Stub);
    assert_eq!(config.reasoning.max_prompt_chars, 4000);
    assert_eq!(config.reasoning.deployment, "gpt-4o");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(err.to_string().contains("Parse TOML failed"));
}

#[test]
fn test_out_of_range_tolerances_are_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dqv-validator.toml");

    for matching in [
        "absolute_tolerance = \"-0.5\"",
        "relative_tolerance = \"-0.001\"",
        "relative_tolerance = \"1.5\"",
    ] {
        std::fs::write(&path, format!("[matching]\n{}\n", matching)).unwrap();
        let err = load_toml_config(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{}", matching);
        assert!(err.to_string().contains("matching."), "{}", err);
    }

    std::fs::write(&path, "[matching]\nrelative_tolerance = \"1\"\n").unwrap();
    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.matching.relative_tolerance, Decimal::ONE);
}

#[test]
fn test_explicit_missing_config_is_error() {
    let result = load_bootstrap_config(Some(Path::new("/nonexistent/dqv/config.toml")));
    assert!(result.is_err());
}

#[test]
fn test_write_then_load_preserves_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub").join("dqv-validator.toml");

    let mut config = TomlConfig::default();
    config.port = 7001;
    config.reasoning.provider = ReasoningProvider::AzureOpenai;
    config.reasoning.endpoint = Some("https://example.openai.azure.com".to_string());

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();

    assert_eq!(loaded.port, 7001);
    assert_eq!(loaded.reasoning.provider, ReasoningProvider::AzureOpenai);
    assert_eq!(
        loaded.reasoning.endpoint.as_deref(),
        Some("https://example.openai.azure.com")
    );
    assert_eq!(
        loaded.matching.absolute_tolerance,
        config.matching.absolute_tolerance
    );
}

#[test]
#[serial]
fn test_cli_argument_overrides_env_and_toml() {
    env::set_var(ROOT_ENV, "/from/env");
    let mut toml = TomlConfig::default();
    toml.root_folder = Some(PathBuf::from("/from/toml"));

    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), ROOT_ENV, &toml);
    assert_eq!(resolved, PathBuf::from("/from/cli"));

    env::remove_var(ROOT_ENV);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    env::set_var(ROOT_ENV, "/from/env");
    let mut toml = TomlConfig::default();
    toml.root_folder = Some(PathBuf::from("/from/toml"));

    let resolved = resolve_root_folder(None, ROOT_ENV, &toml);
    assert_eq!(resolved, PathBuf::from("/from/env"));

    env::remove_var(ROOT_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(ROOT_ENV);
    let mut toml = TomlConfig::default();
    toml.root_folder = Some(PathBuf::from("/from/toml"));

    let resolved = resolve_root_folder(None, ROOT_ENV, &toml);
    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_default_root_folder_when_nothing_configured() {
    env::remove_var(ROOT_ENV);
    let resolved = resolve_root_folder(None, ROOT_ENV, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
    assert!(resolved.to_string_lossy().contains("dqv"));
}
