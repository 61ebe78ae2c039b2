// src/engine/buffer.rs
//
// PixelBuffer: the one in-memory pixel representation every transform
// produces. Row-major RGBA8, straight alpha, stride >= width * 4.

use crate::error::ImagingError;
use std::borrow::Cow;

/// Bytes per pixel. Fixed: R, G, B, A.
pub const CHANNELS: usize = 4;

/// Half-open integer rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle with origin `(x, y)` and the given size.
    pub fn from_xywh(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(
            x,
            y,
            x.saturating_add(width.min(i32::MAX as u32) as i32),
            y.saturating_add(height.min(i32::MAX as u32) as i32),
        )
    }

    pub fn width(&self) -> u32 {
        (self.x1 - self.x0).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y1 - self.y0).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Intersection of two rectangles; an empty intersection is normalized
    /// to the zero rectangle.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let r = Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if r.is_empty() {
            Rect::default()
        } else {
            r
        }
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }
}

/// Owned RGBA8 image, straight (non-premultiplied) alpha.
///
/// Pixel `(x, y)` starts at byte `y * stride + x * 4`. Transforms never
/// mutate their input; each returns a freshly allocated buffer.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Transparent black buffer with a tightly packed stride.
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * CHANNELS;
        Self {
            width,
            height,
            stride,
            pixels: vec![0; stride * height as usize],
        }
    }

    /// Buffer filled with one straight-alpha color.
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let mut buf = Self::new(width, height);
        for px in buf.pixels.chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&color);
        }
        buf
    }

    /// Wrap tightly packed RGBA8 bytes.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImagingError> {
        Self::from_raw_with_stride(width, height, width as usize * CHANNELS, pixels)
    }

    /// Wrap RGBA8 bytes with an explicit row stride.
    pub fn from_raw_with_stride(
        width: u32,
        height: u32,
        stride: usize,
        mut pixels: Vec<u8>,
    ) -> Result<Self, ImagingError> {
        let row_bytes = (width as usize)
            .checked_mul(CHANNELS)
            .ok_or_else(|| ImagingError::invalid_buffer("row size overflows usize"))?;
        if stride < row_bytes {
            return Err(ImagingError::invalid_buffer(format!(
                "stride {stride} is smaller than width * 4 = {row_bytes}"
            )));
        }
        let required = stride
            .checked_mul(height as usize)
            .ok_or_else(|| ImagingError::invalid_buffer("buffer size overflows usize"))?;
        if pixels.len() < required {
            return Err(ImagingError::invalid_buffer(format!(
                "expected at least {required} bytes, got {}",
                pixels.len()
            )));
        }
        pixels.truncate(required);
        Ok(Self {
            width,
            height,
            stride,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes per row (>= width * 4).
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn rect(&self) -> Rect {
        Rect::from_xywh(0, 0, self.width, self.height)
    }

    /// Raw bytes including any row padding.
    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// The `width * 4` visible bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.pixels[start..start + self.width as usize * CHANNELS]
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = y as usize * self.stride + x as usize * CHANNELS;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = y as usize * self.stride + x as usize * CHANNELS;
        self.pixels[i..i + CHANNELS].copy_from_slice(&rgba);
    }

    /// Tightly packed pixel bytes; borrows when the stride has no padding.
    pub fn to_packed(&self) -> Cow<'_, [u8]> {
        let row_bytes = self.width as usize * CHANNELS;
        if self.stride == row_bytes {
            return Cow::Borrowed(&self.pixels[..row_bytes * self.height as usize]);
        }
        let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
        for y in 0..self.height {
            packed.extend_from_slice(self.row(y));
        }
        Cow::Owned(packed)
    }

    /// Consume into tightly packed RGBA8 bytes.
    pub fn into_packed(self) -> Vec<u8> {
        let row_bytes = self.width as usize * CHANNELS;
        if self.stride != row_bytes {
            return self.to_packed().into_owned();
        }
        let mut pixels = self.pixels;
        pixels.truncate(row_bytes * self.height as usize);
        pixels
    }

    /// True when every alpha byte is 255.
    pub fn is_opaque(&self) -> bool {
        (0..self.height).all(|y| self.row(y).iter().skip(3).step_by(CHANNELS).all(|&a| a == 255))
    }
}
