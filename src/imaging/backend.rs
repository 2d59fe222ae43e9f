//! Image writer trait and shared types.
//!
//! The [`ImageWriter`] trait is the only place pixels are touched: it
//! identifies a source image and writes a re-encoded copy of it. The
//! conversion policy decides *whether* and *where* to write; the writer
//! decides *how*.
//!
//! The production implementation is
//! [`RustWriter`](super::rust_backend::RustWriter). Tests use the recording
//! `MockWriter` in this module.

use crate::formats::TargetFormat;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No encoder for {0}")]
    UnsupportedFormat(TargetFormat),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Decode/encode capability injected into the conversion pipeline.
pub trait ImageWriter: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, WriterError>;

    /// Re-encode `source` as `format` and write it to `target`.
    ///
    /// Returns the dimensions of the written image when the writer knows
    /// them. On error nothing must be left at `target`.
    fn write(
        &self,
        source: &Path,
        target: &Path,
        format: TargetFormat,
    ) -> Result<Option<Dimensions>, WriterError>;
}
