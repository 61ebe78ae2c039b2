// src/engine/decoder.rs
//
// Decode boundary: format sniffing, the decompression-bomb firewall, the
// image-crate decode into a PixelBuffer, and EXIF auto-orientation.

use crate::engine::buffer::PixelBuffer;
use crate::engine::orientation::{apply_orientation, orientation_from_bytes, Orientation};
use crate::engine::pool::ExecutionConfig;
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::ImagingError;
use image::{ImageError, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::debug;

type DecoderResult<T> = std::result::Result<T, ImagingError>;

/// Knobs for [`decode_with_options`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Undo the EXIF orientation so the result displays upright.
    pub auto_orient: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { auto_orient: true }
    }
}

/// Sniff the container format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ImagingError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(ImagingError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Stored (not oriented) dimensions, read from the header only.
pub fn read_dimensions(bytes: &[u8]) -> DecoderResult<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagingError::decode_failed(format!("failed to read header: {e}")))?;
    if reader.format().is_none() {
        return Err(ImagingError::unsupported_format("unknown"));
    }
    reader.into_dimensions().map_err(map_image_error)
}

/// Inspect encoded bytes and ensure the image dimensions are safe before decoding.
/// Headers that cannot be read are left for the decoder to reject.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> DecoderResult<()> {
    match read_dimensions(bytes) {
        Ok((width, height)) => check_dimensions(width, height),
        Err(_) => Ok(()),
    }
}

fn map_image_error(err: ImageError) -> ImagingError {
    match err {
        ImageError::Unsupported(e) => ImagingError::unsupported_format(e.to_string()),
        ImageError::Limits(e) => ImagingError::decode_failed(format!("decoder limit: {e}")),
        other => ImagingError::decode_failed(other.to_string()),
    }
}

/// Decode with default options (auto-orient on).
pub fn decode(bytes: &[u8], config: &ExecutionConfig) -> DecoderResult<PixelBuffer> {
    decode_with_options(bytes, &DecodeOptions::default(), config)
}

pub fn decode_with_options(
    bytes: &[u8],
    options: &DecodeOptions,
    config: &ExecutionConfig,
) -> DecoderResult<PixelBuffer> {
    if bytes.is_empty() {
        return Err(ImagingError::decode_failed("empty input"));
    }
    let format = detect_format(bytes).ok_or_else(|| ImagingError::unsupported_format("unknown"))?;
    ensure_dimensions_safe(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format).map_err(map_image_error)?;
    check_dimensions(img.width(), img.height())?;
    let buf = PixelBuffer::from_source(&img, config);

    let orientation = if options.auto_orient && format == ImageFormat::Jpeg {
        orientation_from_bytes(bytes)
    } else {
        Orientation::Unspecified
    };
    debug!(
        target: "pixelflow::decode",
        ?format,
        width = buf.width(),
        height = buf.height(),
        ?orientation,
        "decoded"
    );

    if orientation.is_identity() {
        Ok(buf)
    } else {
        Ok(apply_orientation(&buf, orientation, config))
    }
}
