// lib.rs
//
// pixelflow: a parallel pixel engine
//
// Design goals:
// - Every operation reads through one Scanner and writes a fresh buffer
// - Output is bit-identical for any worker count
// - Separable resampling with a named kernel library
// - EXIF orientation that never fails
// - An optional lazy pipeline over an encode/decode boundary

pub mod engine;
pub mod error;
pub mod ops;

use image::ImageReader;
use std::io::{BufRead, BufReader, Cursor, Seek};
use std::path::Path;

pub use engine::adjust::{
    adjust_brightness, adjust_contrast, adjust_fn, adjust_gamma, adjust_hue, adjust_saturation,
    adjust_sigmoid, grayscale, hsl_to_rgb, invert, rgb_to_hsl,
};
pub use engine::blur::{blur, sharpen};
pub use engine::compose::{
    crop, crop_anchor, crop_center, overlay, overlay_center, paste, paste_center, Anchor,
};
pub use engine::convolve::{convolve3x3, convolve5x5, ConvolveOptions};
pub use engine::histogram::{histogram, BINS};
pub use engine::kernels::{Kernel, Window};
pub use engine::orientation::{
    apply_orientation, orientation_from_bytes, read_orientation, Orientation,
};
pub use engine::resample::{fill, fit, resize, thumbnail, ResamplePlan};
pub use engine::transform::{
    flip_h, flip_v, rotate, rotate180, rotate270, rotate90, transpose, transverse,
};
pub use engine::{
    decode, decode_with_options, encode, max_workers, open, save, set_max_workers,
    DecodeOptions, ExecutionConfig, Format, ImageEngine, PixelBuffer, PixelSource,
    PremultipliedRgba, Rect, Scanner,
};
pub use error::{ErrorCategory, ImagingError, Result};
pub use ops::{Operation, OutputFormat, PngCompression, PresetConfig};

/// Header facts read without decoding pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

fn read_inspect_metadata<R: BufRead + Seek>(reader: R) -> Result<InspectMetadata> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| ImagingError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{f:?}").to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ImagingError::decode_failed(format!("failed to read dimensions: {e}")))?;

    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Inspect encoded bytes. Stored dimensions, EXIF orientation ignored.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    read_inspect_metadata(Cursor::new(data))
}

pub fn inspect_header_from_path(path: impl AsRef<Path>) -> Result<InspectMetadata> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ImagingError::file_not_found(path.to_string_lossy().into_owned())
        } else {
            ImagingError::file_read_failed(path.to_string_lossy().into_owned(), e)
        }
    })?;
    read_inspect_metadata(BufReader::new(file))
}

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn supported_input_formats() -> &'static [&'static str] {
    &["jpeg", "png", "gif", "tiff", "bmp"]
}

pub fn supported_output_formats() -> &'static [&'static str] {
    &["jpeg", "png", "gif", "tiff", "bmp"]
}
