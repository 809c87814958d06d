//! TOML configuration parsing.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! Secrets are never read from the file: the OpenAI key comes from
//! `OPENAI_API_KEY` and the Google bearer token from `GOOGLE_ACCESS_TOKEN`
//! or the token file named in `[google].token_path`.
//!
//! ```toml
//! [openai]
//! model = "gpt-4o-mini"
//!
//! [google]
//! token_path = "credentials/token.json"
//!
//! [cache]
//! ttl_seconds = 300
//!
//! [analysis]
//! default_since_hours = 48
//!
//! [retry]
//! max_attempts = 3
//! base_delay_secs = 2
//! multiplier = 2
//! max_delay_secs = 60
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAIConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_openai_base_url(),
            timeout_secs: default_openai_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleConfig {
    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,
    #[serde(default = "default_docs_base_url")]
    pub docs_base_url: String,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_google_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            drive_base_url: default_drive_base_url(),
            docs_base_url: default_docs_base_url(),
            token_path: default_token_path(),
            timeout_secs: default_google_timeout_secs(),
        }
    }
}

fn default_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}
fn default_docs_base_url() -> String {
    "https://docs.googleapis.com/v1".to_string()
}
fn default_token_path() -> PathBuf {
    PathBuf::from("credentials/token.json")
}
fn default_google_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_since_hours")]
    pub default_since_hours: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_since_hours: default_since_hours(),
        }
    }
}

fn default_since_hours() -> u32 {
    48
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> f64 {
    2.0
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_delay_secs() -> f64 {
    60.0
}

impl RetryConfig {
    /// Build the backoff policy used around raw upstream calls.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: secs(self.base_delay_secs),
            multiplier: self.multiplier,
            max_delay: secs(self.max_delay_secs),
        }
    }
}

/// Negative, NaN or overflowing values become zero; `validate` rejects them first.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check the invariants the pipeline relies on.
pub fn validate(config: &Config) -> Result<()> {
    if config.openai.model.trim().is_empty() {
        anyhow::bail!("openai.model must not be empty");
    }

    if config.cache.ttl_seconds == 0 {
        anyhow::bail!("cache.ttl_seconds must be > 0");
    }

    if config.analysis.default_since_hours == 0 {
        anyhow::bail!("analysis.default_since_hours must be > 0");
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be >= 1");
    }
    for (name, value) in [
        ("base_delay_secs", retry.base_delay_secs),
        ("multiplier", retry.multiplier),
        ("max_delay_secs", retry.max_delay_secs),
    ] {
        if !value.is_finite() {
            anyhow::bail!("retry.{} must be a finite number", name);
        }
    }
    if retry.multiplier < 1.0 {
        anyhow::bail!("retry.multiplier must be >= 1.0");
    }
    if retry.base_delay_secs < 0.0 || retry.max_delay_secs < 0.0 {
        anyhow::bail!("retry delays must not be negative");
    }
    if retry.base_delay_secs > retry.max_delay_secs {
        anyhow::bail!(
            "retry.base_delay_secs ({}) must not exceed retry.max_delay_secs ({})",
            retry.base_delay_secs,
            retry.max_delay_secs
        );
    }

    Ok(())
}
