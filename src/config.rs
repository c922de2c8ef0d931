//! Client configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults
//! are overridden by the user's file, which only needs the keys it changes.
//!
//! ## Config File Location
//!
//! `config.toml` is read from the directory given by `--config-dir`
//! (default: the current directory). A missing file means stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [backend]
//! base_url = "https://copperzync-backend.onrender.com"
//! user_agent = "CopperZync"
//! max_connections_per_host = 2
//!
//! [timeouts]
//! request_secs = 30         # One HTTP attempt
//! operation_secs = 35       # Whole analyze call, retries included
//! connectivity_secs = 3     # Network reachability pre-check
//! health_secs = 30          # GET /health
//! reachability_secs = 10    # GET /
//!
//! [retry]
//! max_retries = 1           # Extra attempts after the first (0-10)
//! backoff = "immediate"     # "immediate" or "exponential"
//! backoff_base_secs = 1     # Exponential: base * 2^attempt
//!
//! [images]
//! max_dimension = 800       # Longer edge cap for uploads, in pixels
//! quality = 70              # JPEG quality (1-100)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::retry::BackoffKind;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Client configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Where the analysis backend lives and how to talk to it.
    pub backend: BackendConfig,
    /// Timeouts for each kind of network wait.
    pub timeouts: TimeoutsConfig,
    /// Retry budget and backoff for `POST /analyze`.
    pub retry: RetryConfig,
    /// Upload preparation (downsizing and JPEG quality).
    pub images: ImagesConfig,
}

impl ClientConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match Url::parse(&self.backend.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(_) => {
                return Err(ConfigError::Validation(
                    "backend.base_url must be an http(s) URL with a host".into(),
                ));
            }
            Err(e) => {
                return Err(ConfigError::Validation(format!(
                    "backend.base_url is not a valid URL: {e}"
                )));
            }
        }
        if self.backend.max_connections_per_host == 0 {
            return Err(ConfigError::Validation(
                "backend.max_connections_per_host must be non-zero".into(),
            ));
        }
        let timeouts = [
            ("request_secs", self.timeouts.request_secs),
            ("operation_secs", self.timeouts.operation_secs),
            ("connectivity_secs", self.timeouts.connectivity_secs),
            ("health_secs", self.timeouts.health_secs),
            ("reachability_secs", self.timeouts.reachability_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Validation(format!(
                "timeouts.{name} must be non-zero"
            )));
        }
        if self.retry.max_retries > 10 {
            return Err(ConfigError::Validation(
                "retry.max_retries must be 0-10".into(),
            ));
        }
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "images.max_dimension must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Backend endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Root URL; `/analyze`, `/health` and `/` hang off it.
    pub base_url: String,
    pub user_agent: String,
    /// Idle pooled connections kept per host.
    pub max_connections_per_host: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://copperzync-backend.onrender.com".to_string(),
            user_agent: "CopperZync".to_string(),
            max_connections_per_host: 2,
        }
    }
}

/// Timeouts, in whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub request_secs: u64,
    pub operation_secs: u64,
    pub connectivity_secs: u64,
    pub health_secs: u64,
    pub reachability_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            operation_secs: 35,
            connectivity_secs: 3,
            health_secs: 30,
            reachability_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff: BackoffKind,
    pub backoff_base_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: BackoffKind::Immediate,
            backoff_base_secs: 1,
        }
    }
}

/// Upload preparation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Longer-edge cap in pixels; smaller images are sent at their own size.
    pub max_dimension: u32,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            quality: 70,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ClientConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ClientConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ClientConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<ClientConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# CopperZync Client Configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Backend
# ---------------------------------------------------------------------------
[backend]
# Root URL of the analysis service. POST /analyze, GET /health and GET /
# are resolved against it.
base_url = "https://copperzync-backend.onrender.com"

# Sent as the User-Agent header.
user_agent = "CopperZync"

# Idle connections kept open per host for reuse.
max_connections_per_host = 2

# ---------------------------------------------------------------------------
# Timeouts (seconds)
# ---------------------------------------------------------------------------
[timeouts]
# One HTTP attempt. The backend may need a while to wake from a cold start.
request_secs = 30

# Ceiling for a whole analyze call, every retry included.
operation_secs = 35

# How long to wait for the network reachability pre-check.
connectivity_secs = 3

# GET /health
health_secs = 30

# GET / (reachability test)
reachability_secs = 10

# ---------------------------------------------------------------------------
# Retries
# ---------------------------------------------------------------------------
[retry]
# Extra attempts after the first (0-10). Applies to network failures and to
# responses where the backend could not identify anything.
max_retries = 1

# "immediate" retries at once; "exponential" waits base * 2^attempt seconds.
backoff = "immediate"
backoff_base_secs = 1

# ---------------------------------------------------------------------------
# Upload images
# ---------------------------------------------------------------------------
[images]
# Longer edge cap in pixels. Smaller photos are sent at their own size.
max_dimension = 800

# JPEG quality (1 = worst, 100 = best).
quality = 70
"##
}
