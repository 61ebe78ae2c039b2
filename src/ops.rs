// src/ops.rs
//
// Lazy pipeline operations.
// These are cheap to create and store - the expensive work happens when the
// pipeline runs.

use crate::engine::compose::Anchor;
use crate::engine::convolve::ConvolveOptions;
use crate::engine::encoder::Format;
use crate::engine::kernels::Kernel;
use crate::engine::orientation::Orientation;
use crate::engine::PixelBuffer;
use crate::error::ImagingError;
use std::sync::Arc;

/// Image operations that can be queued for lazy execution.
///
/// Each operation is self-contained: parameters are owned, overlay
/// images are shared through `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Resize with optional width/height (maintains aspect ratio if one is None)
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        kernel: Kernel,
    },

    /// Shrink to fit inside a box; never enlarges
    Fit {
        max_width: u32,
        max_height: u32,
        kernel: Kernel,
    },

    /// Resize and crop to exactly `width x height`
    Fill {
        width: u32,
        height: u32,
        anchor: Anchor,
        kernel: Kernel,
    },

    /// Crop a region from the image
    Crop { x: u32, y: u32, width: u32, height: u32 },

    /// Crop a `width x height` region positioned by an anchor
    CropAnchor { width: u32, height: u32, anchor: Anchor },

    /// Rotate counter-clockwise by a multiple of 90 degrees
    Rotate { degrees: i32 },

    /// Rotate counter-clockwise by any angle; the canvas grows
    RotateAngle { degrees: f64, background: [u8; 4] },

    FlipH,
    FlipV,
    Transpose,
    Transverse,

    /// Undo a stored EXIF orientation
    Orient { orientation: Orientation },

    /// Gaussian blur
    Blur { sigma: f64 },

    /// Unsharp mask
    Sharpen { sigma: f64 },

    /// Brightness, percentage (-100 to 100)
    Brightness { percentage: f64 },

    /// Contrast, percentage (-100 to 100)
    Contrast { percentage: f64 },

    Gamma { gamma: f64 },

    /// Saturation, percentage (-100 to 100)
    Saturation { percentage: f64 },

    /// Hue shift in degrees
    Hue { degrees: f64 },

    /// Sigmoidal contrast; negative factors decrease contrast
    Sigmoid { midpoint: f64, factor: f64 },

    Grayscale,
    Invert,

    Convolve3x3 {
        kernel: [f64; 9],
        options: ConvolveOptions,
    },

    Convolve5x5 {
        kernel: [f64; 25],
        options: ConvolveOptions,
    },

    /// Blend another image over this one. `position: None` centers it.
    Overlay {
        image: Arc<PixelBuffer>,
        position: Option<(i32, i32)>,
        opacity: f64,
    },
}

impl Operation {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "resize",
            Self::Fit { .. } => "fit",
            Self::Fill { .. } => "fill",
            Self::Crop { .. } => "crop",
            Self::CropAnchor { .. } => "crop_anchor",
            Self::Rotate { .. } => "rotate",
            Self::RotateAngle { .. } => "rotate_angle",
            Self::FlipH => "flip_h",
            Self::FlipV => "flip_v",
            Self::Transpose => "transpose",
            Self::Transverse => "transverse",
            Self::Orient { .. } => "orient",
            Self::Blur { .. } => "blur",
            Self::Sharpen { .. } => "sharpen",
            Self::Brightness { .. } => "brightness",
            Self::Contrast { .. } => "contrast",
            Self::Gamma { .. } => "gamma",
            Self::Saturation { .. } => "saturation",
            Self::Hue { .. } => "hue",
            Self::Sigmoid { .. } => "sigmoid",
            Self::Grayscale => "grayscale",
            Self::Invert => "invert",
            Self::Convolve3x3 { .. } => "convolve3x3",
            Self::Convolve5x5 { .. } => "convolve5x5",
            Self::Overlay { .. } => "overlay",
        }
    }
}

/// zlib effort for PNG output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PngCompression {
    Fast,
    #[default]
    Default,
    Best,
}

/// Output format for encoding
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg { quality: u8 },
    Png { compression: PngCompression },
    Gif,
    Tiff,
    Bmp,
}

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

impl OutputFormat {
    /// Parse a format name. For JPEG `quality` is the 1-100 encoder
    /// quality (default 80); for PNG it selects the compression effort
    /// (below 34 fast, from 67 best). Other formats ignore it.
    pub fn from_str(format: &str, quality: Option<u8>) -> Result<Self, ImagingError> {
        let q = quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
        match format.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg { quality: q }),
            "png" => {
                let compression = match quality {
                    None => PngCompression::Default,
                    Some(q) if q < 34 => PngCompression::Fast,
                    Some(q) if q < 67 => PngCompression::Default,
                    Some(_) => PngCompression::Best,
                };
                Ok(Self::Png { compression })
            }
            "gif" => Ok(Self::Gif),
            "tif" | "tiff" => Ok(Self::Tiff),
            "bmp" => Ok(Self::Bmp),
            other => Err(ImagingError::unsupported_format(other.to_string())),
        }
    }

    /// Container this output is written as.
    pub fn format(&self) -> Format {
        match self {
            Self::Jpeg { .. } => Format::Jpeg,
            Self::Png { .. } => Format::Png,
            Self::Gif => Format::Gif,
            Self::Tiff => Format::Tiff,
            Self::Bmp => Format::Bmp,
        }
    }

    /// Default encoder settings for a container.
    pub fn for_format(format: Format) -> Self {
        match format {
            Format::Jpeg => Self::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
            Format::Png => Self::Png {
                compression: PngCompression::Default,
            },
            Format::Gif => Self::Gif,
            Format::Tiff => Self::Tiff,
            Format::Bmp => Self::Bmp,
        }
    }
}

// =============================================================================
// PRESETS - Common configurations for web image output
// =============================================================================

/// Preset configuration for common use cases.
/// When both dimensions are set the image is center-filled to exactly that
/// size; otherwise it is resized keeping the aspect ratio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetConfig {
    /// Target width (None = maintain aspect ratio)
    pub width: Option<u32>,
    /// Target height (None = maintain aspect ratio)
    pub height: Option<u32>,
    /// Output format
    pub format: OutputFormat,
}

impl PresetConfig {
    pub fn new(width: Option<u32>, height: Option<u32>, format: OutputFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Get the built-in preset by name
    pub fn get(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "thumbnail" => Some(Self::thumbnail()),
            "avatar" => Some(Self::avatar()),
            "hero" => Some(Self::hero()),
            "social" => Some(Self::social()),
            _ => None,
        }
    }

    /// Thumbnail preset: 150x150, JPEG quality 75
    /// Use case: Gallery thumbnails, preview images
    pub fn thumbnail() -> Self {
        Self::new(Some(150), Some(150), OutputFormat::Jpeg { quality: 75 })
    }

    /// Avatar preset: 200x200, PNG (keeps transparency)
    pub fn avatar() -> Self {
        Self::new(
            Some(200),
            Some(200),
            OutputFormat::Png {
                compression: PngCompression::Best,
            },
        )
    }

    /// Hero preset: 1920 width, JPEG quality 85
    pub fn hero() -> Self {
        Self::new(Some(1920), None, OutputFormat::Jpeg { quality: 85 })
    }

    /// Social preset: 1200x630, JPEG quality 80
    /// Use case: OGP/Twitter Card images
    pub fn social() -> Self {
        Self::new(Some(1200), Some(630), OutputFormat::Jpeg { quality: 80 })
    }

    /// The geometry step this preset queues.
    pub fn operation(&self) -> Operation {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Operation::Fill {
                width,
                height,
                anchor: Anchor::Center,
                kernel: Kernel::default(),
            },
            (width, height) => Operation::Resize {
                width,
                height,
                kernel: Kernel::default(),
            },
        }
    }
}
