//! Image handling — everything that reads or writes pixels.
//!
//! | Operation | Where |
//! |---|---|
//! | **Detect MIME** | [`detect_mime`] (magic bytes) |
//! | **Identify** | [`ImageWriter::identify`] |
//! | **Re-encode** | [`ImageWriter::write`] |
//!
//! The module is split into:
//! - **Backend**: [`ImageWriter`] trait + [`RustWriter`]
//! - **Parameters**: encoder quality and speed
//! - **Sniffing**: content-based MIME detection

pub mod backend;
mod params;
pub mod rust_backend;
mod sniff;

pub use backend::{Dimensions, ImageWriter, WriterError};
pub use params::{EncodeSettings, Quality, Speed};
pub use rust_backend::RustWriter;
pub use sniff::{detect_mime, detect_mime_bytes};
