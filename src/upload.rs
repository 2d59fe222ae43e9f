//! Upload entry point.
//!
//! [`UploadConverter`] is built once with its collaborators and then called
//! for every newly processed upload:
//!
//! ```rust,ignore
//! let converter = UploadConverter::new(
//!     FileStore::new("settings.toml"),
//!     RustWriter::default(),
//!     FormatResolutionPolicy::default(),
//! );
//! let metadata = converter.process(metadata, Path::new("/srv/uploads/2024/05/photo.jpg"));
//! ```
//!
//! `process` never fails. Every problem along the way (missing file, unknown
//! type, unreadable settings, failed encode) leaves the metadata exactly as
//! it came in, so an optional conversion can never break an upload.

use crate::imaging::{ImageWriter, detect_mime};
use crate::metadata::AttachmentMetadata;
use crate::policy::{ConversionOutcome, ConversionPlan, ConversionRequest, FormatResolutionPolicy};
use crate::settings::PreferenceStore;
use std::path::Path;

pub struct UploadConverter<S, W> {
    store: S,
    writer: W,
    policy: FormatResolutionPolicy,
}

impl<S: PreferenceStore, W: ImageWriter> UploadConverter<S, W> {
    pub fn new(store: S, writer: W, policy: FormatResolutionPolicy) -> Self {
        Self {
            store,
            writer,
            policy,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Run the conversion for one upload and return the metadata to persist.
    pub fn process(
        &self,
        mut metadata: AttachmentMetadata,
        attached_file: &Path,
    ) -> AttachmentMetadata {
        let outcome = self.convert(attached_file);
        metadata.apply(&outcome);
        metadata
    }

    /// Run the conversion for one upload and report what happened.
    pub fn convert(&self, attached_file: &Path) -> ConversionOutcome {
        let Some(request) = self.request_for(attached_file) else {
            return ConversionOutcome::Unchanged;
        };
        let preferences = match self.store.get() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "could not read format preferences");
                return ConversionOutcome::Unchanged;
            }
        };
        self.policy.resolve(&request, &preferences, &self.writer)
    }

    /// What `convert` would do, without writing anything.
    pub fn plan(&self, attached_file: &Path) -> Option<ConversionPlan> {
        let mime = detect_mime(attached_file)?;
        let preferences = self
            .store
            .get()
            .inspect_err(|e| tracing::warn!(error = %e, "could not read format preferences"))
            .ok()?;
        self.policy.plan(mime.mime(), &preferences, attached_file)
    }

    fn request_for(&self, attached_file: &Path) -> Option<ConversionRequest> {
        if !attached_file.is_file() {
            tracing::debug!(path = %attached_file.display(), "attached file missing");
            return None;
        }
        let Some(mime) = detect_mime(attached_file) else {
            tracing::debug!(path = %attached_file.display(), "not a recognized image");
            return None;
        };
        let dimensions = match self.writer.identify(attached_file) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(path = %attached_file.display(), error = %e, "could not identify image");
                return None;
            }
        };
        Some(ConversionRequest::new(attached_file, mime.mime(), dimensions))
    }
}
