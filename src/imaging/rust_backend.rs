//! Pure Rust image writer built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 decode) + BT.601 YUV→RGB |
//! | Identify (AVIF) | `avif-parse` container metadata |
//! | Encode → WebP | `webp::Encoder` (lossy, driven by [`Quality`](super::Quality)) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → JPEG XL | not available, always [`WriterError::UnsupportedFormat`] |
//!
//! The `image` crate's `"avif"` feature only enables the encoder. Its decoder
//! needs `"avif-native"` (libdav1d), so AVIF sources go through `rav1d`, the
//! Rust port of dav1d, instead.

use super::backend::{Dimensions, ImageWriter, WriterError};
use super::params::EncodeSettings;
use crate::formats::TargetFormat;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writer backed by the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Default)]
pub struct RustWriter {
    settings: EncodeSettings,
}

impl RustWriter {
    pub fn new(settings: EncodeSettings) -> Self {
        Self { settings }
    }
}

fn is_avif(path: &Path) -> bool {
    super::sniff::detect_mime(path) == Some(crate::formats::SourceMime::Avif)
}

/// Load and decode an image from disk, trusting content over extension.
fn load_image(path: &Path) -> Result<DynamicImage, WriterError> {
    if is_avif(path) {
        return decode_avif(path);
    }
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| {
            WriterError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

fn read_avif(path: &Path) -> Result<avif_parse::AvifData, WriterError> {
    let file_data = std::fs::read(path)?;
    avif_parse::read_avif(&mut std::io::Cursor::new(&file_data)).map_err(|e| {
        WriterError::ProcessingFailed(format!("Failed to parse AVIF {}: {e:?}", path.display()))
    })
}

/// Extract dimensions from an AVIF file's container metadata (no decode needed).
fn identify_avif(path: &Path) -> Result<Dimensions, WriterError> {
    let meta = read_avif(path)?.primary_item_metadata().map_err(|e| {
        WriterError::ProcessingFailed(format!(
            "Failed to read AVIF metadata {}: {e:?}",
            path.display()
        ))
    })?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

/// Decode the primary item of an AVIF file with rav1d.
fn decode_avif(path: &Path) -> Result<DynamicImage, WriterError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use rav1d::src::lib as dav1d;
    use std::ptr::NonNull;

    let avif = read_avif(path)?;
    let av1: &[u8] = &avif.primary_item;
    let failed = |step: &str, code: i32| {
        WriterError::ProcessingFailed(format!(
            "rav1d {step} failed ({code}) for {}",
            path.display()
        ))
    };

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe { dav1d::dav1d_default_settings(NonNull::from(&mut settings).cast()) };
    let mut settings = unsafe { settings.assume_init() };
    // Single still frame.
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(failed("open", rc.0));
    }

    let mut data = Dav1dData::default();
    let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
    if buf.is_null() {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(failed("data_create", -1));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

    let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            dav1d::dav1d_data_unref(NonNull::new(&mut data));
            dav1d::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(failed("send_data", rc.0));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(failed("get_picture", rc.0));
    }

    // The planes borrow decoder memory: convert before releasing the picture.
    let rgb = picture_to_rgb(&pic);
    unsafe {
        dav1d::dav1d_picture_unref(NonNull::new(&mut pic));
        dav1d::dav1d_close(NonNull::new(&mut ctx));
    }
    let (width, height, rgb) = rgb?;

    image::RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| {
            WriterError::ProcessingFailed("Decoded AVIF buffer has the wrong size".into())
        })
}

/// One plane of a decoded picture.
#[derive(Clone, Copy)]
struct Plane {
    ptr: *const u8,
    /// Row stride in bytes.
    stride: isize,
    bpc: u32,
}

impl Plane {
    fn sample(&self, x: u32, y: u32) -> f32 {
        let row = y as isize * self.stride;
        if self.bpc <= 8 {
            (unsafe { *self.ptr.offset(row + x as isize) }) as f32
        } else {
            // High bit depths are stored one u16 per sample.
            (unsafe { *(self.ptr.offset(row + x as isize * 2) as *const u16) }) as f32
        }
    }
}

/// Convert a decoded picture to interleaved RGB8 with BT.601 coefficients.
fn picture_to_rgb(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<(u32, u32, Vec<u8>), WriterError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let plane = |i: usize, stride: isize| {
        pic.data[i]
            .map(|p| Plane {
                ptr: p.as_ptr() as *const u8,
                stride,
                bpc,
            })
            .ok_or_else(|| WriterError::ProcessingFailed(format!("AVIF plane {i} missing")))
    };

    let luma = plane(0, pic.stride[0])?;
    // (chroma planes, horizontal subsampling, vertical subsampling)
    let chroma = match pic.p.layout {
        DAV1D_PIXEL_LAYOUT_I400 => None,
        DAV1D_PIXEL_LAYOUT_I420 => Some((true, true)),
        DAV1D_PIXEL_LAYOUT_I422 => Some((true, false)),
        DAV1D_PIXEL_LAYOUT_I444 => Some((false, false)),
        other => {
            return Err(WriterError::ProcessingFailed(format!(
                "Unsupported AVIF pixel layout: {other}"
            )));
        }
    };
    let chroma = match chroma {
        Some((ss_x, ss_y)) => Some((
            plane(1, pic.stride[1])?,
            plane(2, pic.stride[1])?,
            ss_x,
            ss_y,
        )),
        None => None,
    };

    let max = ((1u32 << bpc) - 1) as f32;
    let center = (1u32 << (bpc - 1)) as f32;
    let scale = 255.0 / max;
    let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let luma_value = luma.sample(x, y);
            match chroma {
                None => rgb.extend([to_u8(luma_value); 3]),
                Some((cb_plane, cr_plane, ss_x, ss_y)) => {
                    let cx = if ss_x { x / 2 } else { x };
                    let cy = if ss_y { y / 2 } else { y };
                    let cb = cb_plane.sample(cx, cy) - center;
                    let cr = cr_plane.sample(cx, cy) - center;
                    rgb.extend([
                        to_u8(luma_value + 1.402 * cr),
                        to_u8(luma_value - 0.344136 * cb - 0.714136 * cr),
                        to_u8(luma_value + 1.772 * cb),
                    ]);
                }
            }
        }
    }
    Ok((width, height, rgb))
}

/// Sibling path the encoder writes to before the final rename.
fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    target.with_file_name(name)
}

fn encode(
    img: &DynamicImage,
    path: &Path,
    format: TargetFormat,
    settings: &EncodeSettings,
) -> Result<(), WriterError> {
    match format {
        TargetFormat::WebP => {
            // libwebp only takes 8-bit RGB(A).
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = webp::Encoder::from_image(&rgba).map_err(|e| {
                WriterError::ProcessingFailed(format!("WebP encoder rejected image: {e}"))
            })?;
            let encoded = encoder.encode(settings.quality.value() as f32);
            let mut writer = BufWriter::new(File::create(path)?);
            writer.write_all(&encoded)?;
            writer.flush()?;
            Ok(())
        }
        TargetFormat::Avif => {
            let writer = BufWriter::new(File::create(path)?);
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                writer,
                settings.avif_speed.value(),
                settings.quality.value() as u8,
            );
            img.write_with_encoder(encoder)
                .map_err(|e| WriterError::ProcessingFailed(format!("AVIF encode failed: {}", e)))
        }
        TargetFormat::JpegXl => Err(WriterError::UnsupportedFormat(format)),
    }
}

impl ImageWriter for RustWriter {
    fn identify(&self, path: &Path) -> Result<Dimensions, WriterError> {
        if is_avif(path) {
            return identify_avif(path);
        }
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                WriterError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
            })?;
        Ok(Dimensions { width, height })
    }

    fn write(
        &self,
        source: &Path,
        target: &Path,
        format: TargetFormat,
    ) -> Result<Option<Dimensions>, WriterError> {
        // Bail before decoding; there is nothing to encode with.
        if format == TargetFormat::JpegXl {
            return Err(WriterError::UnsupportedFormat(format));
        }

        let img = load_image(source)?;
        let staging = staging_path(target);
        if let Err(e) = encode(&img, &staging, format, &self.settings) {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&staging, target) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        Ok(Some(Dimensions {
            width: img.width(),
            height: img.height(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{ImageEncoder, RgbImage};

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = File::create(path).unwrap();
        let writer = BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    fn fast_writer() -> RustWriter {
        RustWriter::new(EncodeSettings {
            quality: Quality::new(60),
            avif_speed: crate::imaging::Speed::new(10),
        })
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustWriter::default().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustWriter::default().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn write_jpeg_to_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        create_test_jpeg(&source, 64, 48);
        let target = tmp.path().join("photo.webp");

        let dims = fast_writer()
            .write(&source, &target, TargetFormat::WebP)
            .unwrap();
        assert_eq!(dims, Some(Dimensions { width: 64, height: 48 }));
        assert!(std::fs::metadata(&target).unwrap().len() > 0);
        assert!(!staging_path(&target).exists());
        assert_eq!(
            crate::imaging::detect_mime(&target),
            Some(crate::formats::SourceMime::WebP)
        );
    }

    #[test]
    fn write_jpeg_to_avif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        create_test_jpeg(&source, 32, 24);
        let target = tmp.path().join("photo.avif");

        fast_writer()
            .write(&source, &target, TargetFormat::Avif)
            .unwrap();
        assert!(target.exists());
        let dims = fast_writer().identify(&target).unwrap();
        assert_eq!(dims, Dimensions { width: 32, height: 24 });
    }

    #[test]
    fn write_jpegxl_is_unsupported_and_leaves_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        create_test_jpeg(&source, 16, 16);
        let target = tmp.path().join("photo.jxl");

        let result = fast_writer().write(&source, &target, TargetFormat::JpegXl);
        assert!(matches!(
            result,
            Err(WriterError::UnsupportedFormat(TargetFormat::JpegXl))
        ));
        assert!(!target.exists());
        assert!(!staging_path(&target).exists());
    }

    #[test]
    fn write_undecodable_source_leaves_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"\xFF\xD8\xFF\xE0 truncated").unwrap();
        let target = tmp.path().join("broken.webp");

        assert!(fast_writer()
            .write(&source, &target, TargetFormat::WebP)
            .is_err());
        assert!(!target.exists());
        assert!(!staging_path(&target).exists());
    }

    #[test]
    fn staging_path_is_a_sibling() {
        assert_eq!(
            staging_path(Path::new("/u/2024/photo.webp")),
            PathBuf::from("/u/2024/photo.webp.partial")
        );
    }

    /// Create a small valid AVIF file by encoding a JPEG through the writer.
    fn create_test_avif(path: &Path, width: u32, height: u32) {
        let jpeg = path.with_extension("src.jpg");
        create_test_jpeg(&jpeg, width, height);
        fast_writer().write(&jpeg, path, TargetFormat::Avif).unwrap();
        std::fs::remove_file(jpeg).unwrap();
    }

    #[test]
    fn decode_avif_keeps_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.avif");
        create_test_avif(&path, 64, 48);

        let decoded = load_image(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn write_avif_to_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.avif");
        create_test_avif(&source, 40, 30);
        let target = tmp.path().join("photo.webp");

        let dims = fast_writer()
            .write(&source, &target, TargetFormat::WebP)
            .unwrap();
        assert_eq!(dims, Some(Dimensions { width: 40, height: 30 }));
        assert_eq!(
            crate::imaging::detect_mime(&target),
            Some(crate::formats::SourceMime::WebP)
        );
        assert!(source.exists());
    }

    #[test]
    fn write_avif_onto_itself() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.avif");
        create_test_avif(&path, 32, 32);

        let dims = fast_writer()
            .write(&path, &path, TargetFormat::Avif)
            .unwrap();
        assert_eq!(dims, Some(Dimensions { width: 32, height: 32 }));
        assert_eq!(
            fast_writer().identify(&path).unwrap(),
            Dimensions { width: 32, height: 32 }
        );
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn webp_quality_controls_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        create_test_jpeg(&source, 128, 128);
        let writer_at = |q| {
            RustWriter::new(EncodeSettings {
                quality: Quality::new(q),
                ..EncodeSettings::default()
            })
        };

        let low = tmp.path().join("low.webp");
        let high = tmp.path().join("high.webp");
        writer_at(10).write(&source, &low, TargetFormat::WebP).unwrap();
        writer_at(100).write(&source, &high, TargetFormat::WebP).unwrap();

        let size = |p: &Path| std::fs::metadata(p).unwrap().len();
        assert!(size(&low) < size(&high));
    }
}
