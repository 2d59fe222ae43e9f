//! CLI output formatting.
//!
//! Each `format_*` function returns the lines to print so the layout can be
//! tested without capturing stdout. The `print_*` wrappers are what `main`
//! calls.
//!
//! ## Settings
//!
//! ```text
//! For JPEG images
//!     jpeg → WebP (image/webp)
//! For PNG images
//!     png → Use original (PNG)
//! ```
//!
//! ## Plan
//!
//! ```text
//! uploads/photo.jpg
//!     would convert JPEG → uploads/photo.webp (WebP)
//! ```

use crate::formats::upload_mimes;
use crate::policy::ConversionPlan;
use crate::settings::{FormatPreference, sub_settings};
use std::path::Path;

/// One block per source type showing the active choice.
pub fn format_settings(preferences: &FormatPreference) -> Vec<String> {
    let mut lines = Vec::new();
    for sub in sub_settings() {
        lines.push(sub.title.clone());
        let name = sub.mime.short_name();
        let current = preferences.get(sub.mime).unwrap_or("");
        let detail = match sub.choices.iter().find(|(value, _)| *value == current) {
            Some(("", label)) => label.clone(),
            Some((value, label)) => format!("{label} ({value})"),
            None => format!("unrecognized value {current:?}, original is kept"),
        };
        lines.push(format!("    {name} → {detail}"));
    }
    lines
}

pub fn format_plan(path: &Path, plan: Option<&ConversionPlan>) -> Vec<String> {
    let detail = match plan {
        Some(plan) => format!(
            "would convert {} → {} ({})",
            plan.source.label(),
            plan.path.display(),
            plan.format.label()
        ),
        None => "keep original".to_string(),
    };
    vec![path.display().to_string(), format!("    {detail}")]
}

pub fn format_upload_mimes() -> Vec<String> {
    upload_mimes()
        .iter()
        .map(|(ext, mime)| format!("{ext:<6}{mime}"))
        .collect()
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

pub fn print_settings(preferences: &FormatPreference) {
    print_lines(format_settings(preferences));
}

pub fn print_plan(path: &Path, plan: Option<&ConversionPlan>) {
    print_lines(format_plan(path, plan));
}

pub fn print_upload_mimes() {
    print_lines(format_upload_mimes());
}
