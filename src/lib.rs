//! # modern-images
//!
//! Convert uploaded images to modern formats by per-type policy. An
//! administrator picks, for each source type (JPEG, PNG, WebP, GIF, AVIF),
//! whether to keep the original or convert to WebP, AVIF or JPEG XL. Every
//! new upload is then checked against that choice and, if a conversion is
//! configured, re-encoded next to the original.
//!
//! # Pipeline
//!
//! ```text
//! upload ─▶ detect MIME ─▶ preferences ─▶ policy.plan ─▶ writer.write ─▶ metadata.apply
//!            (imaging)      (settings)      (policy)       (imaging)       (metadata)
//! ```
//!
//! Any step may bail out, and bailing out always means "keep the original".
//! An optional conversion never fails an upload.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`formats`] | Static tables: recognized source types, target formats, extensions, upload MIME additions |
//! | [`settings`] | Preference map, pure `sanitize`, settings descriptors, file and memory stores |
//! | [`policy`] | The format resolution policy: guards, target path, single delegated write |
//! | [`imaging`] | `ImageWriter` trait, `RustWriter`, content-based MIME detection |
//! | [`metadata`] | Attachment metadata with pass-through fields and outcome application |
//! | [`upload`] | `UploadConverter`, the explicitly wired upload entry point |
//! | [`config`] | `modern-images.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit wiring
//!
//! There is no global instance and no hook registry. The caller builds a
//! [`upload::UploadConverter`] from a store, a writer and a policy once, and
//! calls it directly for each upload.
//!
//! ## The original stays
//!
//! The converted file is written beside the original (`photo.jpg` →
//! `photo.webp`) and the metadata is pointed at it. The original is never
//! deleted or renamed, and derived sizes (thumbnails) are not regenerated.
//!
//! ## Writers may refuse
//!
//! Which formats can actually be written depends on the writer. The bundled
//! [`imaging::RustWriter`] writes WebP and AVIF; JPEG XL is selectable but
//! has no encoder, so those uploads quietly keep their original format.

pub mod config;
pub mod formats;
pub mod imaging;
pub mod metadata;
pub mod output;
pub mod policy;
pub mod settings;
pub mod upload;
