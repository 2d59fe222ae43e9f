//! Attachment metadata as produced for a freshly processed upload.
//!
//! Only `file`, `width` and `height` are interpreted. Every other field
//! (`sizes`, `image_meta`, `filesize`, ...) is carried through verbatim so
//! the host gets back exactly what it handed in, plus the rewrite.
//!
//! ```json
//! {"file": "2024/05/photo.jpg", "width": 4000, "height": 3000, "sizes": {}}
//! ```
//!
//! becomes, after a WebP conversion,
//!
//! ```json
//! {"file": "2024/05/photo.webp", "width": 4000, "height": 3000, "sizes": {}}
//! ```

use crate::policy::ConversionOutcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentMetadata {
    /// Path of the file relative to the uploads directory.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AttachmentMetadata {
    pub fn new(file: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            file: file.into(),
            width,
            height,
            extra: serde_json::Map::new(),
        }
    }

    /// Fold a conversion outcome in. `Unchanged` leaves everything as is.
    pub fn apply(&mut self, outcome: &ConversionOutcome) {
        let ConversionOutcome::Converted {
            file_name,
            width,
            height,
            ..
        } = outcome
        else {
            return;
        };
        self.file = match self.file.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{file_name}"),
            None => file_name.clone(),
        };
        self.width = *width;
        self.height = *height;
    }
}
