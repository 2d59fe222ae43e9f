//! Format resolution policy: decide whether an upload is converted, and to
//! what.
//!
//! Resolution runs a fixed sequence of guards, any of which ends in
//! [`ConversionOutcome::Unchanged`]:
//!
//! ```text
//! source MIME recognized?            no  → Unchanged
//! preference set (and not "")?       no  → Unchanged
//! extension known for the format?    no  → Unchanged
//! writer wrote <stem>.<ext>?         no  → Unchanged
//!                                    yes → Converted
//! ```
//!
//! The first three guards are pure and exposed on their own as
//! [`FormatResolutionPolicy::plan`]. [`FormatResolutionPolicy::resolve`]
//! adds the single delegated write. Nothing here deletes, renames or
//! regenerates anything: the original file stays where it is, and derived
//! sizes are not touched.
//!
//! A type configured to convert to itself (AVIF → AVIF) goes through the
//! writer like any other conversion; whether that re-compresses is the
//! writer's business.

use crate::formats::{ExtensionTable, SourceMime, TargetFormat};
use crate::imaging::{Dimensions, ImageWriter};
use crate::settings::FormatPreference;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One upload to consider for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Absolute path of the uploaded file.
    pub path: PathBuf,
    /// Detected MIME type of the upload.
    pub mime: String,
    /// Pixel dimensions of the original.
    pub dimensions: Dimensions,
}

impl ConversionRequest {
    pub fn new(path: impl Into<PathBuf>, mime: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            path: path.into(),
            mime: mime.into(),
            dimensions,
        }
    }
}

/// Where and how a conversion would be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPlan {
    pub source: SourceMime,
    pub format: TargetFormat,
    pub extension: String,
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Keep the original metadata as is.
    Unchanged,
    Converted {
        path: PathBuf,
        file_name: String,
        width: u32,
        height: u32,
    },
}

impl ConversionOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FormatResolutionPolicy {
    extensions: ExtensionTable,
}

impl FormatResolutionPolicy {
    pub fn new(extensions: ExtensionTable) -> Self {
        Self { extensions }
    }

    /// Decide the conversion target without writing anything.
    ///
    /// Returns `None` whenever the upload must be left alone.
    pub fn plan(
        &self,
        source_mime: &str,
        preferences: &FormatPreference,
        original: &Path,
    ) -> Option<ConversionPlan> {
        let Some(source) = SourceMime::from_mime(source_mime) else {
            tracing::debug!(mime = source_mime, "not a convertible type");
            return None;
        };
        let Some(choice) = preferences.get(source) else {
            tracing::debug!(mime = source_mime, "keeping original format");
            return None;
        };
        let Some(extension) = self.extensions.get(choice) else {
            tracing::debug!(format = choice, "no extension for format, skipping");
            return None;
        };
        let Some(format) = TargetFormat::from_value(choice) else {
            tracing::debug!(format = choice, "no encoder target for format, skipping");
            return None;
        };
        let stem = original.file_stem()?;

        let mut name = OsString::from(stem);
        name.push(".");
        name.push(extension);
        let path = original.with_file_name(&name);

        Some(ConversionPlan {
            source,
            format,
            extension: extension.to_string(),
            file_name: name.to_string_lossy().into_owned(),
            path,
        })
    }

    /// Plan the conversion and, if there is one, hand it to the writer.
    ///
    /// Writer failures are logged and turned into `Unchanged`. There is no
    /// retry.
    pub fn resolve(
        &self,
        request: &ConversionRequest,
        preferences: &FormatPreference,
        writer: &impl ImageWriter,
    ) -> ConversionOutcome {
        let Some(plan) = self.plan(&request.mime, preferences, &request.path) else {
            return ConversionOutcome::Unchanged;
        };

        match writer.write(&request.path, &plan.path, plan.format) {
            Ok(written) => {
                let Dimensions { width, height } = written.unwrap_or(request.dimensions);
                tracing::info!(
                    source = %request.path.display(),
                    target = %plan.path.display(),
                    format = %plan.format,
                    "converted upload"
                );
                ConversionOutcome::Converted {
                    path: plan.path,
                    file_name: plan.file_name,
                    width,
                    height,
                }
            }
            Err(e) => {
                tracing::warn!(
                    source = %request.path.display(),
                    format = %plan.format,
                    error = %e,
                    "conversion failed, keeping original"
                );
                ConversionOutcome::Unchanged
            }
        }
    }
}
