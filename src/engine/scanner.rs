// src/engine/scanner.rs
//
// Scanner: uniform straight-alpha RGBA8 reads from any pixel source.
//
// Every transform reads its input through a `PixelSource`, so decoded
// images of any layout (gray, 16-bit, float, premultiplied) feed the
// same row loops without an up-front conversion.

use crate::engine::buffer::{PixelBuffer, CHANNELS};
use crate::engine::pool::{parallel_rows, ExecutionConfig};
use crate::error::ImagingError;
use image::{DynamicImage, GenericImageView, RgbaImage};

/// Something that can hand out straight-alpha RGBA8 pixels.
pub trait PixelSource: Sync {
    /// `(width, height)` of the source.
    fn bounds(&self) -> (u32, u32);

    /// Copy the rectangle `[x0, x1) x [y0, y1)` into `dst`, packed
    /// row-major with `(x1 - x0) * 4` bytes per row.
    ///
    /// Callers go through [`Scanner::scan`], which validates the
    /// rectangle and the destination length first.
    fn read_rgba(&self, x0: u32, y0: u32, x1: u32, y1: u32, dst: &mut [u8]);

    /// Direct access when the source already is a `PixelBuffer`.
    fn as_pixel_buffer(&self) -> Option<&PixelBuffer> {
        None
    }
}

/// Bounds-checked reader over a [`PixelSource`].
pub struct Scanner<'a, S: PixelSource + ?Sized> {
    src: &'a S,
    width: u32,
    height: u32,
}

impl<'a, S: PixelSource + ?Sized> Scanner<'a, S> {
    pub fn new(src: &'a S) -> Self {
        let (width, height) = src.bounds();
        Self { src, width, height }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Fill `dst` with the rectangle `[x0, x1) x [y0, y1)`.
    ///
    /// # Panics
    /// When the rectangle leaves the source bounds or `dst` is not exactly
    /// `(x1 - x0) * (y1 - y0) * 4` bytes long.
    pub fn scan(&self, x0: u32, y0: u32, x1: u32, y1: u32, dst: &mut [u8]) {
        assert!(
            x0 <= x1 && x1 <= self.width && y0 <= y1 && y1 <= self.height,
            "scan rectangle ({x0},{y0})-({x1},{y1}) outside {}x{} source",
            self.width,
            self.height
        );
        let expected = (x1 - x0) as usize * (y1 - y0) as usize * CHANNELS;
        assert_eq!(dst.len(), expected, "scan destination has the wrong length");
        if expected == 0 {
            return;
        }
        self.src.read_rgba(x0, y0, x1, y1, dst);
    }

    /// One full row.
    pub fn scan_row(&self, y: u32, dst: &mut [u8]) {
        self.scan(0, y, self.width, y + 1, dst);
    }
}

impl PixelBuffer {
    /// Materialize any source as a `PixelBuffer`, reading rows in parallel.
    pub fn from_source<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
        if let Some(buf) = src.as_pixel_buffer() {
            return buf.clone();
        }
        let (width, height) = src.bounds();
        let mut out = PixelBuffer::new(width, height);
        if out.is_empty() {
            return out;
        }
        let scanner = Scanner::new(src);
        let stride = out.stride();
        parallel_rows(config, out.as_raw_mut(), stride, |rows, chunk| {
            scanner.scan(0, rows.start as u32, width, rows.end as u32, chunk);
        });
        out
    }
}

impl PixelSource for PixelBuffer {
    fn bounds(&self) -> (u32, u32) {
        self.dimensions()
    }

    fn read_rgba(&self, x0: u32, y0: u32, x1: u32, y1: u32, dst: &mut [u8]) {
        let span = x0 as usize * CHANNELS..x1 as usize * CHANNELS;
        let row_len = span.len();
        for (y, out) in (y0..y1).zip(dst.chunks_exact_mut(row_len)) {
            out.copy_from_slice(&self.row(y)[span.clone()]);
        }
    }

    fn as_pixel_buffer(&self) -> Option<&PixelBuffer> {
        Some(self)
    }
}

/// Walk `[x0, x1) x [y0, y1)` of a packed interleaved buffer, converting
/// each `channels`-wide sample group to RGBA8.
#[allow(clippy::too_many_arguments)]
fn scan_interleaved<T: Copy>(
    raw: &[T],
    width: u32,
    channels: usize,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    dst: &mut [u8],
    convert: impl Fn(&[T]) -> [u8; 4],
) {
    let w = width as usize;
    let row_out = (x1 - x0) as usize * CHANNELS;
    for (y, out) in (y0 as usize..y1 as usize).zip(dst.chunks_exact_mut(row_out)) {
        let start = (y * w + x0 as usize) * channels;
        let end = (y * w + x1 as usize) * channels;
        for (px, o) in raw[start..end]
            .chunks_exact(channels)
            .zip(out.chunks_exact_mut(CHANNELS))
        {
            o.copy_from_slice(&convert(px));
        }
    }
}

#[inline]
fn narrow16(v: u16) -> u8 {
    ((v as u32 + 128) / 257) as u8
}

#[inline]
fn narrow_f32(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

impl PixelSource for RgbaImage {
    fn bounds(&self) -> (u32, u32) {
        self.dimensions()
    }

    fn read_rgba(&self, x0: u32, y0: u32, x1: u32, y1: u32, dst: &mut [u8]) {
        let w = self.width() as usize;
        let raw = self.as_raw();
        let row_out = (x1 - x0) as usize * CHANNELS;
        for (y, out) in (y0 as usize..y1 as usize).zip(dst.chunks_exact_mut(row_out)) {
            let start = (y * w + x0 as usize) * CHANNELS;
            out.copy_from_slice(&raw[start..start + row_out]);
        }
    }
}

impl PixelSource for DynamicImage {
    fn bounds(&self) -> (u32, u32) {
        self.dimensions()
    }

    fn read_rgba(&self, x0: u32, y0: u32, x1: u32, y1: u32, dst: &mut [u8]) {
        let w = self.width();
        match self {
            DynamicImage::ImageRgba8(img) => img.read_rgba(x0, y0, x1, y1, dst),
            DynamicImage::ImageRgb8(img) => {
                scan_interleaved(img.as_raw(), w, 3, x0, y0, x1, y1, dst, |p| [p[0], p[1], p[2], 255])
            }
            DynamicImage::ImageLuma8(img) => {
                scan_interleaved(img.as_raw(), w, 1, x0, y0, x1, y1, dst, |p| [p[0], p[0], p[0], 255])
            }
            DynamicImage::ImageLumaA8(img) => {
                scan_interleaved(img.as_raw(), w, 2, x0, y0, x1, y1, dst, |p| [p[0], p[0], p[0], p[1]])
            }
            DynamicImage::ImageRgba16(img) => {
                scan_interleaved(img.as_raw(), w, 4, x0, y0, x1, y1, dst, |p| {
                    [narrow16(p[0]), narrow16(p[1]), narrow16(p[2]), narrow16(p[3])]
                })
            }
            DynamicImage::ImageRgb16(img) => {
                scan_interleaved(img.as_raw(), w, 3, x0, y0, x1, y1, dst, |p| {
                    [narrow16(p[0]), narrow16(p[1]), narrow16(p[2]), 255]
                })
            }
            DynamicImage::ImageLuma16(img) => {
                scan_interleaved(img.as_raw(), w, 1, x0, y0, x1, y1, dst, |p| {
                    let g = narrow16(p[0]);
                    [g, g, g, 255]
                })
            }
            DynamicImage::ImageLumaA16(img) => {
                scan_interleaved(img.as_raw(), w, 2, x0, y0, x1, y1, dst, |p| {
                    let g = narrow16(p[0]);
                    [g, g, g, narrow16(p[1])]
                })
            }
            DynamicImage::ImageRgba32F(img) => {
                scan_interleaved(img.as_raw(), w, 4, x0, y0, x1, y1, dst, |p| {
                    [narrow_f32(p[0]), narrow_f32(p[1]), narrow_f32(p[2]), narrow_f32(p[3])]
                })
            }
            DynamicImage::ImageRgb32F(img) => {
                scan_interleaved(img.as_raw(), w, 3, x0, y0, x1, y1, dst, |p| {
                    [narrow_f32(p[0]), narrow_f32(p[1]), narrow_f32(p[2]), 255]
                })
            }
            // Layouts added to `image` later: per-pixel generic path.
            other => {
                let row_out = (x1 - x0) as usize * CHANNELS;
                for (y, out) in (y0..y1).zip(dst.chunks_exact_mut(row_out)) {
                    for (x, o) in (x0..x1).zip(out.chunks_exact_mut(CHANNELS)) {
                        o.copy_from_slice(&other.get_pixel(x, y).0);
                    }
                }
            }
        }
    }
}

/// Read-only view over premultiplied RGBA8 bytes (for example a
/// compositor surface). Pixels are un-premultiplied as they are scanned.
#[derive(Clone, Copy, Debug)]
pub struct PremultipliedRgba<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: &'a [u8],
}

impl<'a> PremultipliedRgba<'a> {
    pub fn new(width: u32, height: u32, stride: usize, data: &'a [u8]) -> Result<Self, ImagingError> {
        let row_bytes = width as usize * CHANNELS;
        if stride < row_bytes {
            return Err(ImagingError::invalid_buffer(format!(
                "stride {stride} is smaller than width * 4 = {row_bytes}"
            )));
        }
        if data.len() < stride * height as usize {
            return Err(ImagingError::invalid_buffer(format!(
                "expected at least {} bytes, got {}",
                stride * height as usize,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }
}

#[inline]
fn unpremultiply(px: &[u8]) -> [u8; 4] {
    match px[3] {
        0 => [0, 0, 0, 0],
        255 => [px[0], px[1], px[2], 255],
        a => {
            let a16 = a as u16;
            let un = |c: u8| ((c as u16 * 255 / a16).min(255)) as u8;
            [un(px[0]), un(px[1]), un(px[2]), a]
        }
    }
}

impl PixelSource for PremultipliedRgba<'_> {
    fn bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_rgba(&self, x0: u32, y0: u32, x1: u32, y1: u32, dst: &mut [u8]) {
        let row_out = (x1 - x0) as usize * CHANNELS;
        for (y, out) in (y0 as usize..y1 as usize).zip(dst.chunks_exact_mut(row_out)) {
            let start = y * self.stride + x0 as usize * CHANNELS;
            for (px, o) in self.data[start..start + row_out]
                .chunks_exact(CHANNELS)
                .zip(out.chunks_exact_mut(CHANNELS))
            {
                o.copy_from_slice(&unpremultiply(px));
            }
        }
    }
}
