//! Application configuration.
//!
//! Loaded from `modern-images.toml` in the working directory (or the file
//! given with `--config`). Every key is optional; the file is merged on top
//! of the stock defaults.
//!
//! ```toml
//! settings_file = "modern-images-settings.toml"  # where format preferences live
//!
//! [encoding]
//! quality = 80      # AVIF quality (1-100)
//! avif_speed = 6    # rav1e speed preset (1 = slowest, 10 = fastest)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncodeSettings, Quality, Speed};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "modern-images.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Path of the preference store, relative to the working directory.
    pub settings_file: String,
    /// Encoder settings handed to the image writer.
    pub encoding: EncodingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_file: "modern-images-settings.toml".to_string(),
            encoding: EncodingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.quality) {
            return Err(ConfigError::Validation(
                "encoding.quality must be 1-100".into(),
            ));
        }
        if !(1..=10).contains(&self.encoding.avif_speed) {
            return Err(ConfigError::Validation(
                "encoding.avif_speed must be 1-10".into(),
            ));
        }
        if self.settings_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "settings_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            quality: Quality::new(self.encoding.quality),
            avif_speed: Speed::new(self.encoding.avif_speed as u8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub quality: u32,
    pub avif_speed: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        let defaults = EncodeSettings::default();
        Self {
            quality: defaults.quality.value(),
            avif_speed: defaults.avif_speed.value() as u32,
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
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

/// Load `path` as a raw TOML value. `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to defaults if it is absent.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = resolve_config(load_raw_config(path)?)?;
    tracing::debug!(path = %path.display(), ?config, "loaded config");
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# modern-images configuration
# ===========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# File holding the per-type format preferences (see `modern-images settings`).
settings_file = "modern-images-settings.toml"

[encoding]
# Lossy WebP and AVIF encoding quality, 1 (worst) to 100 (best).
quality = 80
# rav1e speed preset, 1 (slowest, smallest) to 10 (fastest, largest).
avif_speed = 6
"##
}
