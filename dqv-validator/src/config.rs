//! Engine configuration and collaborator secrets
//!
//! Secrets resolve ENV → TOML. The engine itself never reads the
//! environment: everything is resolved here and passed in at construction.

use dqv_common::config::TomlConfig;
use dqv_common::time::secs_to_duration;
use tracing::{info, warn};

use crate::services::EngineConfig;

/// Environment variable holding the OCR service key
pub const OCR_API_KEY_ENV: &str = "DQV_OCR_API_KEY";

/// Environment variable holding the reasoning service key
pub const REASONING_API_KEY_ENV: &str = "DQV_REASONING_API_KEY";

/// Characters of extracted text kept in results and responses
pub const TEXT_PREVIEW_CHARS: usize = 500;

/// Build the engine configuration from the bootstrap TOML
pub fn engine_config(toml_config: &TomlConfig) -> EngineConfig {
    EngineConfig {
        matching: toml_config.matching.clone(),
        storage_timeout: secs_to_duration(toml_config.timeouts.storage_secs),
        ocr_timeout: secs_to_duration(toml_config.timeouts.ocr_secs),
        reasoning_timeout: secs_to_duration(toml_config.timeouts.reasoning_secs),
        preview_chars: TEXT_PREVIEW_CHARS,
    }
}

/// Resolve a collaborator API key
///
/// **Priority:** ENV → TOML. Returns `None` when neither holds a usable key.
pub fn resolve_api_key(env_var_name: &str, toml_value: Option<&str>, label: &str) -> Option<String> {
    let env_key = std::env::var(env_var_name)
        .ok()
        .filter(|key| is_valid_key(key));
    let toml_key = toml_value.filter(|key| is_valid_key(key));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} API key found in both {} and TOML config. Using environment.",
            label, env_var_name
        );
    }

    if let Some(key) = env_key {
        info!("{} API key loaded from environment variable", label);
        return Some(key);
    }

    toml_key.map(|key| {
        info!("{} API key loaded from TOML config", label);
        key.to_string()
    })
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    fn test_engine_config_uses_toml_timeouts() {
        let mut toml_config = TomlConfig::default();
        toml_config.timeouts.reasoning_secs = 5;

        let config = engine_config(&toml_config);
        assert_eq!(config.storage_timeout, Duration::from_secs(30));
        assert_eq!(config.ocr_timeout, Duration::from_secs(60));
        assert_eq!(config.reasoning_timeout, Duration::from_secs(5));
        assert_eq!(config.preview_chars, 500);
    }

    #[test]
    #[serial]
    fn test_environment_key_wins_over_toml() {
        std::env::set_var("DQV_TEST_KEY_A", "from-env");
        let key = resolve_api_key("DQV_TEST_KEY_A", Some("from-toml"), "Test");
        std::env::remove_var("DQV_TEST_KEY_A");
        assert_eq!(key.as_deref(), Some("from-env"));
    }

    #[test]
    #[serial]
    fn test_toml_key_used_when_environment_blank() {
        std::env::set_var("DQV_TEST_KEY_B", "   ");
        let key = resolve_api_key("DQV_TEST_KEY_B", Some("from-toml"), "Test");
        std::env::remove_var("DQV_TEST_KEY_B");
        assert_eq!(key.as_deref(), Some("from-toml"));
    }

    #[test]
    #[serial]
    fn test_missing_key_is_none() {
        std::env::remove_var("DQV_TEST_KEY_C");
        assert_eq!(resolve_api_key("DQV_TEST_KEY_C", None, "Test"), None);
        assert_eq!(resolve_api_key("DQV_TEST_KEY_C", Some(""), "Test"), None);
    }
}
