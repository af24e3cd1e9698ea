//! Configuration file parser for ~/.config/presswire/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Identifying user agent sent with every outbound request.
pub const DEFAULT_USER_AGENT: &str = "presswire/0.1 (newsroom feed reader)";

/// One `[[sources]]` table, exactly as written in the config file.
///
/// Every field is optional here; the registry decides which entries are
/// usable (see [`crate::registry::build`]).
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub id: Option<String>,
    pub name: Option<String>,
    pub maker: Option<String>,
    pub category: Option<String>,
    pub base_url: Option<String>,
    pub feed_url: Option<String>,
    /// Whether the locator may fall back to discovery. Defaults to enabled.
    pub discovery: Option<bool>,
    pub discovery_url: Option<String>,
    pub language: Option<String>,
    pub tags: Vec<String>,
}

/// Top-level pipeline configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum published records kept per source before the global merge.
    pub per_source_limit: usize,

    /// Maximum records in the final output.
    pub total_limit: usize,

    /// Number of sources processed concurrently.
    pub workers: usize,

    /// Hard per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Response bodies larger than this are discarded.
    pub max_response_bytes: usize,

    /// Age in seconds after which intermediaries should revalidate cached responses.
    pub revalidate_secs: u64,

    /// Hard cap on the number of discovered feed candidates tried per source.
    pub max_candidates: usize,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Permit requests to localhost and private networks (tests, local mirrors).
    pub allow_private_hosts: bool,

    /// Newsroom sources. Empty means "use the built-in registry".
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            per_source_limit: 15,
            total_limit: 60,
            workers: 4,
            request_timeout_secs: 10,
            max_response_bytes: 5 * 1024 * 1024,
            revalidate_secs: 1800,
            max_candidates: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_hosts: false,
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "per_source_limit",
        "total_limit",
        "workers",
        "request_timeout_secs",
        "max_response_bytes",
        "revalidate_secs",
        "max_candidates",
        "user_agent",
        "allow_private_hosts",
        "sources",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text. Blank input yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    /// Per-request timeout as a `Duration`, never zero.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
