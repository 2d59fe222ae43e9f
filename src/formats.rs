//! Static format tables.
//!
//! Everything the conversion policy looks up lives here:
//!
//! | Table | Maps |
//! |---|---|
//! | [`SourceMime`] | recognized upload MIME type → preference setting key |
//! | [`TargetFormat`] | stored preference value → encoder target |
//! | [`ExtensionTable`] | preference value → output file extension |
//! | [`upload_mimes`] | extra upload extensions the host must accept |
//!
//! Preference values are the MIME-like strings persisted by the settings
//! store (`image/webp`, `image/avif`, `image/jpegxl`). The empty string means
//! "keep original" and is never a key in any table.

use std::collections::BTreeMap;
use std::fmt;

/// Source image types eligible for conversion.
///
/// This is a fixed allow-list: anything else is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceMime {
    Jpeg,
    Png,
    WebP,
    Gif,
    Avif,
}

impl SourceMime {
    /// All recognized source types, in settings display order.
    pub const ALL: [SourceMime; 5] = [
        SourceMime::Jpeg,
        SourceMime::Png,
        SourceMime::WebP,
        SourceMime::Gif,
        SourceMime::Avif,
    ];

    /// Parse a detected MIME type. Matching is exact on the canonical
    /// lower-case form.
    pub fn from_mime(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.mime() == mime)
    }

    /// Parse the short name used on the command line (`jpeg`, `png`, ...).
    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.short_name().eq_ignore_ascii_case(name))
    }

    /// Parse a full preference setting key.
    pub fn from_setting_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.setting_key() == key)
    }

    pub fn mime(self) -> &'static str {
        match self {
            SourceMime::Jpeg => "image/jpeg",
            SourceMime::Png => "image/png",
            SourceMime::WebP => "image/webp",
            SourceMime::Gif => "image/gif",
            SourceMime::Avif => "image/avif",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            SourceMime::Jpeg => "jpeg",
            SourceMime::Png => "png",
            SourceMime::WebP => "webp",
            SourceMime::Gif => "gif",
            SourceMime::Avif => "avif",
        }
    }

    /// Key under which the preference for this type is stored.
    pub fn setting_key(self) -> &'static str {
        match self {
            SourceMime::Jpeg => "modern_image_output_format_for_jpeg",
            SourceMime::Png => "modern_image_output_format_for_png",
            SourceMime::WebP => "modern_image_output_format_for_webp",
            SourceMime::Gif => "modern_image_output_format_for_gif",
            SourceMime::Avif => "modern_image_output_format_for_avif",
        }
    }

    /// Human-readable name ("JPEG", "WebP", ...).
    pub fn label(self) -> &'static str {
        match self {
            SourceMime::Jpeg => "JPEG",
            SourceMime::Png => "PNG",
            SourceMime::WebP => "WebP",
            SourceMime::Gif => "GIF",
            SourceMime::Avif => "AVIF",
        }
    }
}

impl fmt::Display for SourceMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Output formats a preference can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    WebP,
    Avif,
    JpegXl,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 3] = [TargetFormat::WebP, TargetFormat::Avif, TargetFormat::JpegXl];

    /// The stored preference value for this format.
    pub fn value(self) -> &'static str {
        match self {
            TargetFormat::WebP => "image/webp",
            TargetFormat::Avif => "image/avif",
            TargetFormat::JpegXl => "image/jpegxl",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.value() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetFormat::WebP => "WebP",
            TargetFormat::Avif => "AVIF",
            TargetFormat::JpegXl => "JPEG XL",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Preference value → output file extension.
///
/// A format with no entry here is never attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionTable {
    entries: BTreeMap<String, String>,
}

impl ExtensionTable {
    /// The table shipped with the crate: webp, avif and jxl.
    pub fn standard() -> Self {
        Self::from_pairs([
            (TargetFormat::WebP.value(), "webp"),
            (TargetFormat::Avif.value(), "avif"),
            (TargetFormat::JpegXl.value(), "jxl"),
        ])
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(format, ext)| (format.to_string(), ext.to_string()))
                .collect(),
        }
    }

    /// Extension for a preference value, if the format is writable.
    pub fn get(&self, format: &str) -> Option<&str> {
        self.entries.get(format).map(String::as_str)
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Upload extensions (and their MIME types) the host must accept so modern
/// formats can be uploaded in the first place.
pub fn upload_mimes() -> &'static [(&'static str, &'static str)] {
    &[
        ("webp", "image/webp"),
        ("avif", "image/avif"),
        ("jxl", "image/jxl"),
    ]
}
