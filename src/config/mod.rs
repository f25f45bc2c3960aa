// SPDX-License-Identifier: MPL-2.0
//! This module handles loader configuration, including loading and saving
//! settings to a `settings.toml` file.
//!
//! # Configuration Sections
//!
//! - `[loader]` - Retry budget, backoff base delay and preloading
//! - `[visibility]` - Trigger threshold and proximity margin
//! - `[cache]` - Optional bound on cached handles
//! - `[diagnostics]` - Event log capacity
//!
//! # Path Resolution
//!
//! 1. Use `load_from_path()`/`save_to_path()` with explicit path
//! 2. Set `LAZY_MOUNT_CONFIG_DIR` environment variable
//! 3. Falls back to platform-specific config directory
//!
//! Out-of-range values are accepted on load and clamped when converted to
//! domain types.
//!
//! # Examples
//!
//! ```no_run
//! use lazy_mount::config::{self, Config};
//!
//! // Load existing configuration (returns tuple with optional warning)
//! let (mut config, _warning) = config::load();
//!
//! config.loader.retries = Some(5);
//! config::save(&config).expect("Failed to save config");
//! ```

pub mod defaults;
mod paths;

pub use defaults::*;
pub use paths::{get_app_config_dir, get_app_config_dir_with_override, APP_NAME, ENV_CONFIG_DIR};

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::diagnostics::{event_capacity_bounds, EventCapacity};
use crate::domain::visibility::{ProximityMargin, VisibilityThreshold};
use crate::error::{Error, Result};
use crate::loader::{CacheConfig, RetryPolicy};
use crate::visibility::ObserveOptions;

const CONFIG_FILE: &str = "settings.toml";

/// Warning returned by [`load`] when an existing file cannot be used.
pub const CONFIG_LOAD_WARNING: &str = "config-load-error";

// =============================================================================
// Section Structs
// =============================================================================

/// Retry and preload settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Retries after the first failed attempt.
    #[serde(default = "default_retries", skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Backoff base delay in milliseconds; doubles on every retry.
    #[serde(default = "default_delay_ms", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,

    /// Warm the cache at mount time instead of waiting for visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preload: Option<bool>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay_ms: default_delay_ms(),
            preload: Some(false),
        }
    }
}

/// Visibility trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisibilityConfig {
    /// Visible fraction of a region that triggers loading.
    #[serde(default = "default_threshold", skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    /// Margin around the viewport, e.g. `"50px"`.
    #[serde(default = "default_margin", skip_serializing_if = "Option::is_none")]
    pub margin: Option<String>,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            margin: default_margin(),
        }
    }
}

/// Loader cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CacheSection {
    /// Entry bound; absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

/// Diagnostics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticsConfig {
    /// Number of events kept in memory.
    #[serde(
        default = "default_buffer_capacity",
        skip_serializing_if = "Option::is_none"
    )]
    pub buffer_capacity: Option<usize>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

// =============================================================================
// Main Config Struct (Sectioned)
// =============================================================================

/// Loader configuration with logical sections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub visibility: VisibilityConfig,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Retry policy. Retry budget and delay are taken as given.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.loader.retries.unwrap_or(DEFAULT_RETRIES),
            self.loader.delay_ms.unwrap_or(DEFAULT_BASE_DELAY_MS),
        )
    }

    #[must_use]
    pub fn preload(&self) -> bool {
        self.loader.preload.unwrap_or(false)
    }

    /// Observer options. An unparsable margin falls back to the default.
    #[must_use]
    pub fn observe_options(&self) -> ObserveOptions {
        let threshold = self
            .visibility
            .threshold
            .map_or_else(VisibilityThreshold::default, VisibilityThreshold::new);

        let margin = match self.visibility.margin.as_deref() {
            None => ProximityMargin::default(),
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!(%err, "invalid visibility margin, using default");
                ProximityMargin::default()
            }),
        };

        ObserveOptions { threshold, margin }
    }

    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            retry: self.retry_policy(),
            max_entries: self.cache.max_entries.and_then(NonZeroUsize::new),
        }
    }

    #[must_use]
    pub fn event_capacity(&self) -> EventCapacity {
        self.diagnostics
            .buffer_capacity
            .map_or_else(EventCapacity::default, EventCapacity::new)
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_retries() -> Option<u32> {
    Some(DEFAULT_RETRIES)
}

fn default_delay_ms() -> Option<u64> {
    Some(DEFAULT_BASE_DELAY_MS)
}

fn default_threshold() -> Option<f32> {
    Some(DEFAULT_VISIBILITY_THRESHOLD)
}

fn default_margin() -> Option<String> {
    Some(ProximityMargin::default().to_string())
}

fn default_buffer_capacity() -> Option<usize> {
    Some(event_capacity_bounds::DEFAULT)
}

// =============================================================================
// Config Path Resolution
// =============================================================================

/// Returns the config file path with an optional override.
fn get_config_path_with_override(base_dir: Option<PathBuf>) -> Option<PathBuf> {
    get_app_config_dir_with_override(base_dir).map(|mut path| {
        path.push(CONFIG_FILE);
        path
    })
}

// =============================================================================
// Load Functions
// =============================================================================

/// Loads the configuration from the default path.
///
/// Returns a tuple of (config, optional_warning). If loading fails, returns
/// default config with a warning explaining what went wrong.
#[must_use]
pub fn load() -> (Config, Option<String>) {
    load_with_override(None)
}

/// Loads the configuration from a custom directory.
#[must_use]
pub fn load_with_override(base_dir: Option<PathBuf>) -> (Config, Option<String>) {
    if let Some(path) = get_config_path_with_override(base_dir) {
        if path.exists() {
            match load_from_path(&path) {
                Ok(config) => return (config, None),
                Err(err) => {
                    warn!(path = %path.display(), %err, "config unusable, using defaults");
                    return (Config::default(), Some(CONFIG_LOAD_WARNING.to_string()));
                }
            }
        }
    }
    (Config::default(), None)
}

/// Loads configuration from a specific path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

// =============================================================================
// Save Functions
// =============================================================================

/// Saves the configuration to the default path.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save(config: &Config) -> Result<()> {
    save_with_override(config, None)
}

/// Saves the configuration to a custom directory.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save_with_override(config: &Config, base_dir: Option<PathBuf>) -> Result<()> {
    if let Some(path) = get_config_path_with_override(base_dir) {
        return save_to_path(config, &path);
    }
    Ok(())
}

/// Saves configuration to a specific path, creating parent directories.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config).map_err(Error::from)?;
    fs::write(path, content)?;
    Ok(())
}
