//! Configuration loading, validation, and management for Optic.
//!
//! Loads configuration from `~/.optic/config.toml` (or an explicit path) with
//! environment variable overrides. Range checks run on every load; the fields
//! the poll loop cannot start without are checked by [`AppConfig::require_runtime`].

use optic_core::Credential;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Highest `MOONDREAM_API_KEY_<n>` index scanned from the environment.
const MAX_NUMBERED_KEYS: usize = 32;

/// The root configuration structure.
///
/// Maps directly to `~/.optic/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The account whose mentions are answered
    #[serde(default)]
    pub account: AccountConfig,

    /// Poll loop timing
    #[serde(default)]
    pub polling: PollingConfig,

    /// Where the resume checkpoint lives
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Vision inference backend and credential pool
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Twitter API v2 access
    #[serde(default)]
    pub twitter: TwitterConfig,

    /// Reply composition
    #[serde(default)]
    pub reply: ReplyConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Numeric platform id of the bot account
    #[serde(default)]
    pub user_id: String,

    /// Handle stripped from mention text, without the leading `@`
    #[serde(default = "default_handle")]
    pub handle: String,
}

fn default_handle() -> String {
    "optic_agent".into()
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            handle: default_handle(),
        }
    }
}

impl AccountConfig {
    /// The handle without a leading `@`.
    pub fn bare_handle(&self) -> &str {
        self.handle.trim().trim_start_matches('@')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep after a completed cycle
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Sleep after a transient fetch failure
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Sleep after a rate-limit signal that carried no usable reset time
    #[serde(default = "default_rate_limit_fallback_secs")]
    pub rate_limit_fallback_secs: u64,

    /// Mentions requested per fetch (platform accepts 5..=100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound for every outbound call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}
fn default_error_backoff_secs() -> u64 {
    30
}
fn default_rate_limit_fallback_secs() -> u64 {
    5
}
fn default_page_size() -> u32 {
    10
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            rate_limit_fallback_secs: default_rate_limit_fallback_secs(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Checkpoint file. Defaults to `~/.optic/last_seen_id.txt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CheckpointConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("last_seen_id.txt"))
    }
}

/// How the processor draws a credential from the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Plain round-robin; a failing key costs the mention
    #[default]
    Rotate,
    /// Validate with a throwaway probe query before the real one
    Probe,
    /// Retry the real query on the next key, at most once around the pool
    Failover,
}

impl std::fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Rotate => "rotate",
            Self::Probe => "probe",
            Self::Failover => "failover",
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_provider")]
    pub provider: String,

    #[serde(default = "default_inference_url")]
    pub api_url: String,

    /// The credential pool, in rotation order
    #[serde(default)]
    pub api_keys: Vec<String>,

    #[serde(default)]
    pub credential_mode: CredentialMode,

    /// Used when a mention carries nothing but the handle
    #[serde(default = "default_prompt")]
    pub default_prompt: String,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

fn default_inference_provider() -> String {
    "moondream".into()
}
fn default_inference_url() -> String {
    "https://api.moondream.ai/v1".into()
}
fn default_prompt() -> String {
    "Describe this image.".into()
}
fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_inference_provider(),
            api_url: default_inference_url(),
            api_keys: vec![],
            credential_mode: CredentialMode::default(),
            default_prompt: default_prompt(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_keys", &format!("[{} REDACTED]", self.api_keys.len()))
            .field("credential_mode", &self.credential_mode)
            .field("default_prompt", &self.default_prompt)
            .field("max_image_bytes", &self.max_image_bytes)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default = "default_twitter_url")]
    pub api_url: String,

    /// App-only bearer token, used to read mentions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// OAuth 2.0 user-context token, used to post replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_access_token: Option<String>,
}

fn default_twitter_url() -> String {
    "https://api.twitter.com/2".into()
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_url: default_twitter_url(),
            bearer_token: None,
            user_access_token: None,
        }
    }
}

impl std::fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("api_url", &self.api_url)
            .field("bearer_token", &redact(&self.bearer_token))
            .field("user_access_token", &redact(&self.user_access_token))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    /// Platform limit for one reply
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    280
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`~/.optic/config.toml`).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_path(&Self::config_path())
    }

    /// Load from `path`, then apply environment overrides:
    /// - `MOONDREAM_API_KEY_1` … `MOONDREAM_API_KEY_32`, `MOONDREAM_API_KEYS`
    ///   (comma separated), used when the file has no keys
    /// - `TWITTER_BEARER_TOKEN`, `TWITTER_USER_ACCESS_TOKEN`, used when unset
    /// - `OPTIC_ACCOUNT_ID`, `OPTIC_BOT_HANDLE` (override)
    pub fn load_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.inference.api_keys.is_empty() {
            let mut keys: Vec<String> = (1..=MAX_NUMBERED_KEYS)
                .filter_map(|i| non_empty(&format!("MOONDREAM_API_KEY_{i}")))
                .collect();
            if let Some(list) = non_empty("MOONDREAM_API_KEYS") {
                keys.extend(
                    list.split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(String::from),
                );
            }
            if !keys.is_empty() {
                tracing::debug!(count = keys.len(), "Credential pool loaded from environment");
                self.inference.api_keys = keys;
            }
        }

        if self.twitter.bearer_token.is_none() {
            self.twitter.bearer_token = non_empty("TWITTER_BEARER_TOKEN");
        }
        if self.twitter.user_access_token.is_none() {
            self.twitter.user_access_token = non_empty("TWITTER_USER_ACCESS_TOKEN");
        }

        if let Some(id) = non_empty("OPTIC_ACCOUNT_ID") {
            self.account.user_id = id;
        }
        if let Some(handle) = non_empty("OPTIC_BOT_HANDLE") {
            self.account.handle = handle;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".optic")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Range checks that hold for any usable configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.polling;
        if p.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "polling.interval_secs must be > 0".into(),
            ));
        }
        if p.error_backoff_secs == 0 {
            return Err(ConfigError::ValidationError(
                "polling.error_backoff_secs must be > 0".into(),
            ));
        }
        if p.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "polling.request_timeout_secs must be > 0".into(),
            ));
        }
        if !(5..=100).contains(&p.page_size) {
            return Err(ConfigError::ValidationError(
                "polling.page_size must be between 5 and 100".into(),
            ));
        }
        if self.reply.max_chars < 20 {
            return Err(ConfigError::ValidationError(
                "reply.max_chars must be at least 20".into(),
            ));
        }
        if self.inference.api_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "inference.api_keys must not contain blank entries".into(),
            ));
        }
        Ok(())
    }

    /// Everything `run` and `once` need before the first fetch.
    ///
    /// A failure here is fatal at startup and never happens at runtime.
    pub fn require_runtime(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.account.user_id.trim().is_empty() {
            missing.push("account.user_id (or OPTIC_ACCOUNT_ID)");
        }
        if self.account.bare_handle().is_empty() {
            missing.push("account.handle (or OPTIC_BOT_HANDLE)");
        }
        if self.inference.api_keys.is_empty() {
            missing.push("inference.api_keys (or MOONDREAM_API_KEY_1..)");
        }
        if self.twitter.bearer_token.is_none() {
            missing.push("twitter.bearer_token (or TWITTER_BEARER_TOKEN)");
        }
        if self.twitter.user_access_token.is_none() {
            missing.push("twitter.user_access_token (or TWITTER_USER_ACCESS_TOKEN)");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing.join(", ")))
        }
    }

    /// The credential pool in rotation order.
    pub fn credentials(&self) -> Vec<Credential> {
        self.inference
            .api_keys
            .iter()
            .map(|k| Credential::new(k.trim()))
            .collect()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required configuration: {0}")]
    Missing(String),
}
