//! Content-based MIME detection.
//!
//! The upload's file extension is not trusted; the type comes from the first
//! bytes of the file. AVIF is recognized by its ISO-BMFF `ftyp` brand, since
//! that check does not depend on which decoders are compiled in. Everything
//! else goes through `image::guess_format`.

use crate::formats::SourceMime;
use image::ImageFormat;
use std::io::Read;
use std::path::Path;

/// Bytes needed for every signature we check.
const HEADER_LEN: usize = 32;

/// Detect the MIME type of an image file from its contents.
///
/// Returns `None` for unreadable files and for anything outside the
/// recognized set.
pub fn detect_mime(path: &Path) -> Option<SourceMime> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    let file = std::fs::File::open(path).ok()?;
    file.take(HEADER_LEN as u64).read_to_end(&mut header).ok()?;
    detect_mime_bytes(&header)
}

/// Detect the MIME type from a file header.
pub fn detect_mime_bytes(header: &[u8]) -> Option<SourceMime> {
    if is_avif_header(header) {
        return Some(SourceMime::Avif);
    }
    match image::guess_format(header).ok()? {
        ImageFormat::Jpeg => Some(SourceMime::Jpeg),
        ImageFormat::Png => Some(SourceMime::Png),
        ImageFormat::WebP => Some(SourceMime::WebP),
        ImageFormat::Gif => Some(SourceMime::Gif),
        ImageFormat::Avif => Some(SourceMime::Avif),
        _ => None,
    }
}

fn is_avif_header(header: &[u8]) -> bool {
    header.len() >= 12 && &header[4..8] == b"ftyp" && matches!(&header[8..12], b"avif" | b"avis")
}
