//! Image normalization ahead of upload: camera-native formats are
//! re-encoded as JPEG, oversized payloads are shrunk to a size budget.
//!
//! HEIC/HEIF decodes through the system libheif (see [`super::heif`]);
//! everything else uses the `image` crate's pure-Rust decoders (JPEG,
//! PNG, TIFF, WebP).

use anyhow::Context;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};

use super::heif;
use super::SubmitError;

/// Re-encode quality for camera-native conversion and size reduction.
pub const JPEG_QUALITY: u8 = 80;
/// Payloads above this are recompressed before upload.
pub const SIZE_BUDGET_BYTES: usize = 1024 * 1024;
/// Longest edge after size reduction.
pub const MAX_DIMENSION: u32 = 1920;

const CAMERA_NATIVE_TYPES: &[&str] = &["image/heic", "image/heif", "image/tiff"];
const CAMERA_NATIVE_EXTS: &[&str] = &["heic", "heif", "tif", "tiff"];

/// A candidate image as it arrived at the boundary: bytes plus the
/// declared media type and filename.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

fn replace_extension(filename: &str, ext: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) => format!("{}.{}", stem, ext),
        None => format!("{}.{}", filename, ext),
    }
}

/// Declared type or extension marks a format browsers do not render.
pub fn is_camera_native(upload: &RawUpload) -> bool {
    if CAMERA_NATIVE_TYPES.contains(&upload.content_type.to_ascii_lowercase().as_str()) {
        return true;
    }
    matches!(extension(&upload.filename), Some(ext) if CAMERA_NATIVE_EXTS.contains(&ext.as_str()))
}

/// Produce a payload safe and reasonably small for upload.
///
/// Conversion failure is terminal (`ConversionFailed`); size reduction
/// failure is not, the pre-compression payload is used instead.
pub fn normalize(upload: RawUpload) -> Result<RawUpload, SubmitError> {
    let upload = if is_camera_native(&upload) {
        convert_to_jpeg(upload)?
    } else {
        upload
    };

    if upload.bytes.len() <= SIZE_BUDGET_BYTES {
        return Ok(upload);
    }
    match shrink(&upload) {
        Ok(smaller) => {
            debug!(
                from = upload.bytes.len(),
                to = smaller.bytes.len(),
                "image recompressed"
            );
            Ok(smaller)
        }
        Err(e) => {
            warn!(error = %e, size = upload.bytes.len(), "size reduction failed, uploading as-is");
            Ok(upload)
        }
    }
}

fn convert_to_jpeg(upload: RawUpload) -> Result<RawUpload, SubmitError> {
    let img = decode_camera_native(&upload)
        .map_err(|e| SubmitError::ConversionFailed(e.to_string()))?;
    let bytes =
        encode_jpeg(&img, JPEG_QUALITY).map_err(|e| SubmitError::ConversionFailed(e.to_string()))?;
    Ok(RawUpload {
        filename: replace_extension(&upload.filename, "jpg"),
        content_type: "image/jpeg".into(),
        bytes: bytes.into(),
    })
}

fn decode_camera_native(upload: &RawUpload) -> anyhow::Result<DynamicImage> {
    if is_heif(upload) {
        heif::decode(&upload.bytes)
    } else {
        Ok(image::load_from_memory(&upload.bytes)?)
    }
}

fn is_heif(upload: &RawUpload) -> bool {
    let declared = upload.content_type.to_ascii_lowercase();
    if declared == "image/heic" || declared == "image/heif" {
        return true;
    }
    matches!(extension(&upload.filename), Some(ext) if ext == "heic" || ext == "heif")
}

fn shrink(upload: &RawUpload) -> anyhow::Result<RawUpload> {
    let img = image::load_from_memory(&upload.bytes).context("decode for size reduction")?;
    let img = if img.width().max(img.height()) > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    // Step quality down until the budget holds.
    for quality in [JPEG_QUALITY, 60, 40, 25, 10] {
        let bytes = encode_jpeg(&img, quality)?;
        if bytes.len() <= SIZE_BUDGET_BYTES {
            return Ok(RawUpload {
                filename: replace_extension(&upload.filename, "jpg"),
                content_type: "image/jpeg".into(),
                bytes: bytes.into(),
            });
        }
    }
    anyhow::bail!("image does not fit under {} bytes", SIZE_BUDGET_BYTES)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> anyhow::Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)
        .context("encode jpeg")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use rand::{Rng, SeedableRng};
    use std::io::Cursor;

    fn upload(filename: &str, content_type: &str, bytes: Vec<u8>) -> RawUpload {
        RawUpload {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn noise_image(width: u32, height: u32) -> RgbImage {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        RgbImage::from_fn(width, height, |_, _| image::Rgb(rng.gen::<[u8; 3]>()))
    }

    #[test]
    fn tiff_is_converted_to_jpeg_with_renamed_extension() {
        let tiff = encode(&noise_image(64, 48), ImageFormat::Tiff);
        let out = normalize(upload("morning.tiff", "image/tiff", tiff)).unwrap();

        assert_eq!(out.filename, "morning.jpg");
        assert_eq!(out.content_type, "image/jpeg");
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn heic_extension_is_recognized_as_camera_native() {
        let by_ext = upload("IMG_0042.HEIC", "application/octet-stream", vec![0; 16]);
        let by_type = upload("photo", "image/heif", vec![0; 16]);
        let plain = upload("photo.jpg", "image/jpeg", vec![0; 16]);
        assert!(is_camera_native(&by_ext));
        assert!(is_camera_native(&by_type));
        assert!(!is_camera_native(&plain));
    }

    #[test]
    fn undecodable_camera_native_payload_is_a_terminal_conversion_error() {
        let out = normalize(upload("IMG_0042.heic", "image/heic", vec![0xde, 0xad, 0xbe, 0xef]));
        assert!(matches!(out, Err(SubmitError::ConversionFailed(_))));
    }

    #[test]
    fn small_browser_friendly_image_passes_through_untouched() {
        let jpeg = encode(&noise_image(32, 32), ImageFormat::Jpeg);
        let original = upload("snack.jpg", "image/jpeg", jpeg.clone());
        let out = normalize(original).unwrap();

        assert_eq!(out.filename, "snack.jpg");
        assert_eq!(out.bytes.as_ref(), jpeg.as_slice());
    }

    #[test]
    fn oversized_image_is_shrunk_under_the_budget() {
        // Noise does not compress, so this PNG lands well above 1 MiB.
        let png = encode(&noise_image(2100, 1400), ImageFormat::Png);
        assert!(png.len() > SIZE_BUDGET_BYTES);

        let out = normalize(upload("feast.png", "image/png", png)).unwrap();
        assert!(out.bytes.len() <= SIZE_BUDGET_BYTES);
        assert_eq!(out.content_type, "image/jpeg");
        assert_eq!(out.filename, "feast.jpg");

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert!(decoded.width().max(decoded.height()) <= MAX_DIMENSION);
    }

    #[test]
    fn oversized_but_undecodable_payload_falls_back_to_the_original() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let mut blob = vec![0u8; SIZE_BUDGET_BYTES + 1];
        rng.fill(blob.as_mut_slice());

        let out = normalize(upload("mystery.png", "image/png", blob.clone())).unwrap();
        assert_eq!(out.bytes.as_ref(), blob.as_slice());
    }
}
