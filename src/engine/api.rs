// src/engine/api.rs
//
// ImageEngine: the lazy front-end. Operations are queued on the engine and
// nothing is decoded or computed until a sink (to_pixels, to_bytes,
// to_file) runs.

use crate::engine::buffer::PixelBuffer;
use crate::engine::compose::Anchor;
use crate::engine::convolve::ConvolveOptions;
use crate::engine::decoder::{decode_with_options, detect_format, read_dimensions, DecodeOptions};
use crate::engine::encoder::encode;
use crate::engine::io::{extract_icc_profile, save, Source};
use crate::engine::kernels::Kernel;
use crate::engine::orientation::{orientation_from_bytes, Orientation};
use crate::engine::pipeline::apply_ops;
use crate::engine::pool::ExecutionConfig;
use crate::error::ImagingError;
use crate::ops::{Operation, OutputFormat, PresetConfig};
use image::ImageFormat;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

type ApiResult<T> = std::result::Result<T, ImagingError>;

/// The main image processing engine.
///
/// ```no_run
/// use pixelflow::{ImageEngine, OutputFormat};
///
/// let bytes = std::fs::read("photo.jpg")?;
/// let jpeg = ImageEngine::from_bytes(bytes)
///     .resize(Some(800), None)
///     .rotate(90)
///     .grayscale()
///     .to_bytes(&OutputFormat::Jpeg { quality: 75 })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct ImageEngine {
    /// Encoded source; `None` when built from pixels
    source: Option<Source>,
    /// Cached raw bytes (loaded on demand for Path sources)
    source_bytes: Option<Arc<Vec<u8>>>,
    /// Decoded image, shared between clones so no pixels are copied until
    /// an operation actually runs
    decoded: Option<Arc<PixelBuffer>>,
    /// Queued operations
    ops: Vec<Operation>,
    /// ICC color profile extracted from the source image
    icc_profile: Option<Arc<Vec<u8>>>,
    /// Re-embed the source ICC profile into JPEG/PNG output
    keep_icc: bool,
    decode_options: DecodeOptions,
    /// `None` uses the process-wide default at run time
    config: Option<ExecutionConfig>,
}

impl ImageEngine {
    fn with_source(source: Option<Source>, decoded: Option<Arc<PixelBuffer>>) -> Self {
        Self {
            source,
            source_bytes: None,
            decoded,
            ops: Vec::new(),
            icc_profile: None,
            keep_icc: true,
            decode_options: DecodeOptions::default(),
            config: None,
        }
    }

    // =========================================================================
    // CONSTRUCTORS
    // =========================================================================

    /// Create engine from encoded bytes. Decoding is lazy.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_source(Some(Source::Memory(Arc::new(bytes.into()))), None)
    }

    /// Create engine from a file path. Nothing is read until needed.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::with_source(Some(Source::Path(path.into())), None)
    }

    /// Create engine from already decoded pixels.
    pub fn from_pixels(pixels: impl Into<Arc<PixelBuffer>>) -> Self {
        Self::with_source(None, Some(pixels.into()))
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    /// Worker configuration for this engine's pipeline.
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Undo the EXIF orientation at decode time (on by default).
    pub fn auto_orient(mut self, enabled: bool) -> Self {
        if self.decode_options.auto_orient != enabled {
            self.decoded = None;
        }
        self.decode_options.auto_orient = enabled;
        self
    }

    /// Re-embed the source ICC profile into JPEG/PNG output (on by default).
    pub fn keep_icc(mut self, keep: bool) -> Self {
        self.keep_icc = keep;
        self
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Queue any operation.
    pub fn op(mut self, op: Operation) -> Self {
        self.ops.push(op);
        self
    }

    /// Resize with the default kernel. One missing dimension follows the
    /// aspect ratio.
    pub fn resize(self, width: Option<u32>, height: Option<u32>) -> Self {
        self.resize_with(width, height, Kernel::default())
    }

    pub fn resize_with(self, width: Option<u32>, height: Option<u32>, kernel: Kernel) -> Self {
        self.op(Operation::Resize {
            width,
            height,
            kernel,
        })
    }

    pub fn fit(self, max_width: u32, max_height: u32) -> Self {
        self.op(Operation::Fit {
            max_width,
            max_height,
            kernel: Kernel::default(),
        })
    }

    pub fn fill(self, width: u32, height: u32, anchor: Anchor) -> Self {
        self.op(Operation::Fill {
            width,
            height,
            anchor,
            kernel: Kernel::default(),
        })
    }

    /// Centered fill.
    pub fn thumbnail(self, width: u32, height: u32) -> Self {
        self.fill(width, height, Anchor::Center)
    }

    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        self.op(Operation::Crop {
            x,
            y,
            width,
            height,
        })
    }

    pub fn crop_anchor(self, width: u32, height: u32, anchor: Anchor) -> Self {
        self.op(Operation::CropAnchor {
            width,
            height,
            anchor,
        })
    }

    /// Counter-clockwise, multiples of 90 only.
    pub fn rotate(self, degrees: i32) -> Self {
        self.op(Operation::Rotate { degrees })
    }

    pub fn rotate_angle(self, degrees: f64, background: [u8; 4]) -> Self {
        self.op(Operation::RotateAngle {
            degrees,
            background,
        })
    }

    pub fn flip_h(self) -> Self {
        self.op(Operation::FlipH)
    }

    pub fn flip_v(self) -> Self {
        self.op(Operation::FlipV)
    }

    pub fn transpose(self) -> Self {
        self.op(Operation::Transpose)
    }

    pub fn transverse(self) -> Self {
        self.op(Operation::Transverse)
    }

    pub fn orient(self, orientation: Orientation) -> Self {
        self.op(Operation::Orient { orientation })
    }

    pub fn blur(self, sigma: f64) -> Self {
        self.op(Operation::Blur { sigma })
    }

    pub fn sharpen(self, sigma: f64) -> Self {
        self.op(Operation::Sharpen { sigma })
    }

    pub fn brightness(self, percentage: f64) -> Self {
        self.op(Operation::Brightness { percentage })
    }

    pub fn contrast(self, percentage: f64) -> Self {
        self.op(Operation::Contrast { percentage })
    }

    pub fn gamma(self, gamma: f64) -> Self {
        self.op(Operation::Gamma { gamma })
    }

    pub fn saturation(self, percentage: f64) -> Self {
        self.op(Operation::Saturation { percentage })
    }

    pub fn hue(self, degrees: f64) -> Self {
        self.op(Operation::Hue { degrees })
    }

    pub fn sigmoid(self, midpoint: f64, factor: f64) -> Self {
        self.op(Operation::Sigmoid { midpoint, factor })
    }

    pub fn grayscale(self) -> Self {
        self.op(Operation::Grayscale)
    }

    pub fn invert(self) -> Self {
        self.op(Operation::Invert)
    }

    pub fn convolve3x3(self, kernel: [f64; 9], options: ConvolveOptions) -> Self {
        self.op(Operation::Convolve3x3 { kernel, options })
    }

    pub fn convolve5x5(self, kernel: [f64; 25], options: ConvolveOptions) -> Self {
        self.op(Operation::Convolve5x5 { kernel, options })
    }

    /// Blend `image` over the current result; `position: None` centers it.
    pub fn overlay(
        self,
        image: impl Into<Arc<PixelBuffer>>,
        position: Option<(i32, i32)>,
        opacity: f64,
    ) -> Self {
        self.op(Operation::Overlay {
            image: image.into(),
            position,
            opacity,
        })
    }

    /// Apply a built-in preset (`thumbnail`, `avatar`, `hero`, `social`).
    /// Returns the engine with the preset's geometry queued and the output
    /// format to encode with.
    pub fn preset(self, name: &str) -> ApiResult<(Self, OutputFormat)> {
        let preset = PresetConfig::get(name).ok_or_else(|| ImagingError::invalid_preset(name.to_string()))?;
        let format = preset.format.clone();
        Ok((self.op(preset.operation()), format))
    }

    /// Queued operations, in order.
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Upright source dimensions, from the header alone when nothing has
    /// been decoded yet. Queued operations are not taken into account.
    pub fn dimensions(&mut self) -> ApiResult<(u32, u32)> {
        if let Some(decoded) = &self.decoded {
            return Ok(decoded.dimensions());
        }
        let bytes = self.ensure_source_bytes()?.clone();
        let (w, h) = read_dimensions(&bytes)?;
        if self.decode_options.auto_orient && detect_format(&bytes) == Some(ImageFormat::Jpeg) {
            Ok(orientation_from_bytes(&bytes).display_dimensions(w, h))
        } else {
            Ok((w, h))
        }
    }

    /// EXIF orientation of the source. Pixel sources are `Unspecified`.
    pub fn orientation(&mut self) -> ApiResult<Orientation> {
        if self.source.is_none() {
            return Ok(Orientation::Unspecified);
        }
        Ok(orientation_from_bytes(self.ensure_source_bytes()?))
    }

    /// ICC profile found in the source, if any.
    pub fn icc_profile(&mut self) -> ApiResult<Option<&[u8]>> {
        if self.source.is_some() {
            self.ensure_source_bytes()?;
        }
        Ok(self.icc_profile.as_deref().map(Vec::as_slice))
    }

    // =========================================================================
    // SINKS
    // =========================================================================

    /// Run the pipeline and return the pixels.
    pub fn to_pixels(&mut self) -> ApiResult<PixelBuffer> {
        let config = self.config.unwrap_or_else(ExecutionConfig::global);
        let decoded = self.ensure_decoded(&config)?;
        debug!(
            target: "pixelflow::pipeline",
            ops = self.ops.len(),
            workers = config.max_workers(),
            "compute"
        );
        Ok(apply_ops(Cow::Borrowed(decoded.as_ref()), &self.ops, &config)?.into_owned())
    }

    /// Run the pipeline and encode the result.
    pub fn to_bytes(&mut self, format: &OutputFormat) -> ApiResult<Vec<u8>> {
        let pixels = self.to_pixels()?;
        encode(&pixels, format, self.output_icc())
    }

    /// Run the pipeline and write the result. Without `format` the file
    /// extension decides.
    pub fn to_file(&mut self, path: impl AsRef<Path>, format: Option<&OutputFormat>) -> ApiResult<()> {
        let pixels = self.to_pixels()?;
        save(&pixels, path, format, self.output_icc())
    }

    fn output_icc(&self) -> Option<&[u8]> {
        if self.keep_icc {
            self.icc_profile.as_deref().map(Vec::as_slice)
        } else {
            None
        }
    }

    /// Ensure source bytes are loaded (lazy loading for Path sources)
    fn ensure_source_bytes(&mut self) -> ApiResult<&Arc<Vec<u8>>> {
        if self.source_bytes.is_none() {
            let source = self
                .source
                .as_ref()
                .ok_or_else(|| ImagingError::internal("engine has no encoded source"))?;
            let bytes = source.load()?;
            if self.icc_profile.is_none() {
                self.icc_profile = extract_icc_profile(&bytes).map(Arc::new);
            }
            self.source_bytes = Some(bytes);
        }
        self.source_bytes
            .as_ref()
            .ok_or_else(|| ImagingError::internal("source bytes load failed"))
    }

    fn ensure_decoded(&mut self, config: &ExecutionConfig) -> ApiResult<Arc<PixelBuffer>> {
        if let Some(decoded) = &self.decoded {
            return Ok(Arc::clone(decoded));
        }
        let options = self.decode_options;
        let bytes = self.ensure_source_bytes()?.clone();
        let decoded = Arc::new(decode_with_options(&bytes, &options, config)?);
        self.decoded = Some(Arc::clone(&decoded));
        Ok(decoded)
    }
}
