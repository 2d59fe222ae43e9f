//! Per-type format preferences: validation, descriptors, and persistence.
//!
//! Preferences are a flat map from setting key to chosen format value:
//!
//! ```toml
//! [modern-images-wp-setting]
//! modern_image_output_format_for_jpeg = "image/webp"
//! modern_image_output_format_for_png = "image/avif"
//! modern_image_output_format_for_gif = ""            # keep original
//! ```
//!
//! Saving always goes through [`sanitize`], a pure function that either
//! returns validated preferences or a typed [`SanitizeError`]. Stores only
//! persist what `sanitize` accepted. Reading never validates: a hand-edited
//! file may hold values the policy does not know, and the policy treats
//! those as "keep original".

use crate::formats::{SourceMime, TargetFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Name of the settings record.
pub const OPTION_NAME: &str = "modern-images-wp-setting";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("unknown format {value:?} for {key}")]
    UnknownChoice { key: String, value: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    Write(#[from] toml::ser::Error),
    #[error("Invalid settings: {0}")]
    Invalid(#[from] SanitizeError),
}

/// Chosen output format per source type, keyed by setting key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatPreference(BTreeMap<String, String>);

impl FormatPreference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chosen format value for a source type. The empty "keep original"
    /// value reads as `None`.
    pub fn get(&self, mime: SourceMime) -> Option<&str> {
        self.0
            .get(mime.setting_key())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, mime: SourceMime, value: impl Into<String>) {
        self.0.insert(mime.setting_key().to_string(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate raw form input into preferences.
///
/// - keys that are not setting keys are dropped
/// - values are coerced to plain text (see [`plain_text`])
/// - a value that is neither empty nor a known format is rejected
pub fn sanitize(raw: &BTreeMap<String, String>) -> Result<FormatPreference, SanitizeError> {
    let mut sanitized = FormatPreference::new();
    for (key, value) in raw {
        let Some(mime) = SourceMime::from_setting_key(key) else {
            tracing::debug!(key = %key, "dropping unrecognized setting key");
            continue;
        };
        let value = plain_text(value);
        if !value.is_empty() && TargetFormat::from_value(&value).is_none() {
            return Err(SanitizeError::UnknownChoice {
                key: key.clone(),
                value,
            });
        }
        sanitized.set(mime, value);
    }
    Ok(sanitized)
}

/// Reduce a form value to a single line of plain text.
///
/// Strips markup tags and percent-encoded octets, turns control characters
/// into spaces, collapses whitespace runs and trims.
pub fn plain_text(input: &str) -> String {
    let mut stripped = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?')) => {
                // Skip to the closing bracket; an unterminated tag eats the rest.
                for n in chars.by_ref() {
                    if n == '>' {
                        break;
                    }
                }
            }
            '%' => {
                let mut probe = chars.clone();
                let is_octet = matches!(
                    (probe.next(), probe.next()),
                    (Some(a), Some(b)) if a.is_ascii_hexdigit() && b.is_ascii_hexdigit()
                );
                if is_octet {
                    chars.next();
                    chars.next();
                } else {
                    stripped.push(c);
                }
            }
            c if c.is_control() => stripped.push(' '),
            c => stripped.push(c),
        }
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One entry of the settings screen: a source type and its choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSetting {
    pub mime: SourceMime,
    pub id: &'static str,
    pub title: String,
    pub description: String,
    /// `(value, label)` pairs, "keep original" first.
    pub choices: Vec<(&'static str, String)>,
}

/// Descriptors for every configurable source type, in display order.
pub fn sub_settings() -> Vec<SubSetting> {
    SourceMime::ALL
        .into_iter()
        .map(|mime| {
            let mut choices = vec![("", format!("Use original ({})", mime.label()))];
            choices.extend(
                TargetFormat::ALL
                    .into_iter()
                    .map(|f| (f.value(), f.label().to_string())),
            );
            SubSetting {
                mime,
                id: mime.setting_key(),
                title: format!("For {} images", mime.label()),
                description: format!("Select the target format for {} images.", mime.label()),
                choices,
            }
        })
        .collect()
}

/// Where preferences live.
pub trait PreferenceStore {
    /// Current preferences. A store with nothing saved yields an empty map.
    fn get(&self) -> Result<FormatPreference, StoreError>;

    /// Sanitize `raw` and persist it, replacing whatever was stored.
    fn save(&self, raw: &BTreeMap<String, String>) -> Result<FormatPreference, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(rename = "modern-images-wp-setting", default)]
    setting: FormatPreference,
}

/// Preferences stored in a TOML file under the [`OPTION_NAME`] table.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FileStore {
    fn get(&self) -> Result<FormatPreference, StoreError> {
        if !self.path.exists() {
            return Ok(FormatPreference::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let file: StoreFile = toml::from_str(&content)?;
        Ok(file.setting)
    }

    fn save(&self, raw: &BTreeMap<String, String>) -> Result<FormatPreference, StoreError> {
        let setting = sanitize(raw)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = StoreFile { setting };
        fs::write(&self.path, toml::to_string_pretty(&file)?)?;
        tracing::info!(path = %self.path.display(), "saved format preferences");
        Ok(file.setting)
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    setting: Mutex<FormatPreference>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with preferences already in place, bypassing sanitization.
    pub fn with_preferences(setting: FormatPreference) -> Self {
        Self {
            setting: Mutex::new(setting),
        }
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self) -> Result<FormatPreference, StoreError> {
        Ok(self
            .setting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, raw: &BTreeMap<String, String>) -> Result<FormatPreference, StoreError> {
        let setting = sanitize(raw)?;
        *self.setting.lock().unwrap_or_else(|e| e.into_inner()) = setting.clone();
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn sanitize_keeps_known_keys_and_values() {
        let prefs = sanitize(&raw(&[
            ("modern_image_output_format_for_jpeg", "image/webp"),
            ("modern_image_output_format_for_gif", ""),
        ]))
        .unwrap();
        assert_eq!(prefs.get(SourceMime::Jpeg), Some("image/webp"));
        assert_eq!(prefs.get(SourceMime::Gif), None);
        assert_eq!(prefs.iter().count(), 2);
    }

    #[test]
    fn sanitize_drops_unknown_keys() {
        let prefs = sanitize(&raw(&[
            ("modern_image_output_format_for_tiff", "image/webp"),
            ("option_page", "media"),
        ]))
        .unwrap();
        assert!(prefs.is_empty());
    }

    #[test]
    fn sanitize_strips_markup_before_matching() {
        let prefs = sanitize(&raw(&[(
            "modern_image_output_format_for_png",
            "  <b>image/avif</b>\n",
        )]))
        .unwrap();
        assert_eq!(prefs.get(SourceMime::Png), Some("image/avif"));
    }

    #[test]
    fn sanitize_rejects_unknown_choice() {
        let err = sanitize(&raw(&[("modern_image_output_format_for_png", "image/heic")]))
            .unwrap_err();
        assert_eq!(
            err,
            SanitizeError::UnknownChoice {
                key: "modern_image_output_format_for_png".into(),
                value: "image/heic".into(),
            }
        );
    }

    #[test]
    fn plain_text_cleanup() {
        assert_eq!(plain_text("a\tb\r\n  c"), "a b c");
        assert_eq!(plain_text("<script>x</script>y"), "xy");
        assert_eq!(plain_text("50%20off"), "50off");
        assert_eq!(plain_text("100% sure"), "100% sure");
        assert_eq!(plain_text("a < b"), "a < b");
        assert_eq!(plain_text("   "), "");
    }

    #[test]
    fn get_treats_empty_as_absent() {
        let mut prefs = FormatPreference::new();
        prefs.set(SourceMime::Avif, "");
        assert_eq!(prefs.get(SourceMime::Avif), None);
        assert_eq!(prefs.get(SourceMime::Jpeg), None);
    }

    #[test]
    fn sub_settings_cover_every_source_type() {
        let subs = sub_settings();
        assert_eq!(subs.len(), SourceMime::ALL.len());
        let jpeg = &subs[0];
        assert_eq!(jpeg.id, "modern_image_output_format_for_jpeg");
        assert_eq!(jpeg.title, "For JPEG images");
        let values: Vec<&str> = jpeg.choices.iter().map(|(v, _)| *v).collect();
        assert_eq!(values, ["", "image/webp", "image/avif", "image/jpegxl"]);
        assert_eq!(jpeg.choices[0].1, "Use original (JPEG)");
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("settings.toml"));
        assert!(store.get().unwrap().is_empty());
    }

    #[test]
    fn file_store_save_then_get() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("nested/settings.toml"));
        store
            .save(&raw(&[
                ("modern_image_output_format_for_jpeg", "image/avif"),
                ("bogus", "x"),
            ]))
            .unwrap();

        let prefs = store.get().unwrap();
        assert_eq!(prefs.get(SourceMime::Jpeg), Some("image/avif"));
        assert_eq!(prefs.iter().count(), 1);

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("[modern-images-wp-setting]"));
    }

    #[test]
    fn file_store_save_overwrites_wholesale() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("settings.toml"));
        store
            .save(&raw(&[("modern_image_output_format_for_jpeg", "image/avif")]))
            .unwrap();
        store
            .save(&raw(&[("modern_image_output_format_for_png", "image/webp")]))
            .unwrap();

        let prefs = store.get().unwrap();
        assert_eq!(prefs.get(SourceMime::Jpeg), None);
        assert_eq!(prefs.get(SourceMime::Png), Some("image/webp"));
    }

    #[test]
    fn file_store_rejected_save_keeps_previous() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("settings.toml"));
        store
            .save(&raw(&[("modern_image_output_format_for_gif", "image/webp")]))
            .unwrap();
        let result = store.save(&raw(&[("modern_image_output_format_for_gif", "image/bmp")]));
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert_eq!(store.get().unwrap().get(SourceMime::Gif), Some("image/webp"));
    }

    #[test]
    fn file_store_reads_unvalidated_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(
            &path,
            "[modern-images-wp-setting]\nmodern_image_output_format_for_png = \"image/heic\"\n",
        )
        .unwrap();
        let prefs = FileStore::new(path).get().unwrap();
        assert_eq!(prefs.get(SourceMime::Png), Some("image/heic"));
    }

    #[test]
    fn file_store_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "[modern-images-wp-setting\n").unwrap();
        assert!(matches!(FileStore::new(path).get(), Err(StoreError::Parse(_))));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get().unwrap().is_empty());
        store
            .save(&raw(&[("modern_image_output_format_for_webp", "image/jpegxl")]))
            .unwrap();
        assert_eq!(
            store.get().unwrap().get(SourceMime::WebP),
            Some("image/jpegxl")
        );
    }
}
