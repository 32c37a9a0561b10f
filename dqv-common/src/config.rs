//! Bootstrap configuration loading and root folder resolution
//!
//! Settings sources priority:
//! 1. Command-line arguments (--port, --root-folder, --config)
//! 2. Environment variables (DQV_ROOT_FOLDER, DQV_*_API_KEY)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing default TOML file is not an error: the service starts with
//! built-in defaults and logs a warning. A TOML file that exists but does not
//! parse is a configuration error.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port for dqv-validator
pub const DEFAULT_PORT: u16 = 5801;

/// File name of the validator bootstrap config inside the config directory
pub const CONFIG_FILE_NAME: &str = "dqv-validator.toml";

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime; the service must restart to
/// pick up changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Root folder for the result database and local documents
    ///
    /// If not specified, falls back to environment → OS default
    pub root_folder: Option<PathBuf>,

    pub logging: LoggingConfig,
    pub matching: MatchingConfig,
    pub timeouts: TimeoutConfig,
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub reasoning: ReasoningConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            root_folder: None,
            logging: LoggingConfig::default(),
            matching: MatchingConfig::default(),
            timeouts: TimeoutConfig::default(),
            storage: StorageConfig::default(),
            ocr: OcrConfig::default(),
            reasoning: ReasoningConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Which candidate wins when several fall within tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreakPolicy {
    /// First occurrence in reading order, then plain-formatted over other tags
    ReadingOrder,
    /// Plain-formatted candidates first, then reading order
    PlainFirst,
}

/// Interpretation of a lone comma followed by exactly three digits (`1,234`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeparatorPolicy {
    /// `1,234` reads as one thousand two hundred thirty-four
    Thousands,
    /// `1,234` reads as one point two three four
    Decimal,
}

/// Deterministic matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub absolute_tolerance: Decimal,
    pub relative_tolerance: Decimal,
    pub tie_break: TieBreakPolicy,
    /// Skip date components when matching (they stay in the candidate list)
    pub exclude_date_like: bool,
    pub ambiguous_separator: SeparatorPolicy,
}

impl MatchingConfig {
    /// Reject tolerances that cannot describe a closeness bound
    pub fn validate(&self) -> Result<()> {
        if self.absolute_tolerance.is_sign_negative() {
            return Err(Error::Config(format!(
                "matching.absolute_tolerance must not be negative (got {})",
                self.absolute_tolerance
            )));
        }
        if self.relative_tolerance.is_sign_negative() || self.relative_tolerance > Decimal::ONE {
            return Err(Error::Config(format!(
                "matching.relative_tolerance must be between 0 and 1 (got {})",
                self.relative_tolerance
            )));
        }
        Ok(())
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            absolute_tolerance: Decimal::new(1, 2), // 0.01
            relative_tolerance: Decimal::ZERO,
            tie_break: TieBreakPolicy::ReadingOrder,
            exclude_date_like: true,
            ambiguous_separator: SeparatorPolicy::Thousands,
        }
    }
}

/// Upper bounds for the external calls of one validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub storage_secs: u64,
    pub ocr_secs: u64,
    pub reasoning_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            storage_secs: 30,
            ocr_secs: 60,
            reasoning_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    /// Documents under `<root_folder>/documents` (or `documents_dir`)
    Fs,
    /// Documents fetched from a blob container URL
    Http,
}

/// Document storage collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub documents_dir: Option<PathBuf>,
    /// Container URL, e.g. `https://acct.blob.core.windows.net/delivery-documents`
    pub base_url: Option<String>,
    /// Shared access signature appended as query string (without leading `?`)
    pub sas_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Fs,
            documents_dir: None,
            base_url: None,
            sas_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OcrKind {
    /// In-process extraction: PDF text layer or UTF-8 text
    Local,
    /// Document Intelligence style analyze/poll REST API
    DocumentIntelligence,
}

/// OCR/layout collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub kind: OcrKind,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub api_version: String,
    pub poll_interval_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            kind: OcrKind::Local,
            endpoint: None,
            api_key: None,
            model: "prebuilt-read".to_string(),
            api_version: "2023-07-31".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasoningProvider {
    /// Azure OpenAI chat-completions deployment
    AzureOpenai,
    /// Deterministic in-process stand-in
    Stub,
    /// No secondary validation; every semantic verdict is unavailable
    Disabled,
}

/// Reasoning (LLM) collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub provider: ReasoningProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: String,
    pub api_version: String,
    /// Document text beyond this many characters is not sent
    pub max_prompt_chars: usize,
    pub requests_per_second: u32,
    /// Extra attempts after an HTTP 429 response
    pub rate_limit_retries: u32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: ReasoningProvider::Disabled,
            endpoint: None,
            api_key: None,
            deployment: "gpt-4o".to_string(),
            api_version: "2024-10-21".to_string(),
            max_prompt_chars: 2000,
            requests_per_second: 2,
            rate_limit_retries: 2,
        }
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    config.matching.validate()?;
    Ok(config)
}

/// Load bootstrap config with graceful degradation
///
/// An explicitly requested file must exist. The platform default file is
/// optional: when absent, built-in defaults are used.
pub fn load_bootstrap_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        info!("Loading config: {}", path.display());
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config: {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!(
                "Config file not found at {}, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Platform config file path (`~/.config/dqv/dqv-validator.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dqv").join(CONFIG_FILE_NAME))
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/dqv (or /var/lib/dqv for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("dqv"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/dqv"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("dqv"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/dqv"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("dqv"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\dqv"))
    } else {
        PathBuf::from("./dqv_data")
    }
}
