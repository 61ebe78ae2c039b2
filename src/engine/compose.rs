// src/engine/compose.rs
//
// Cropping and compositing. Positions are signed: an image may be pasted
// partly (or entirely) outside the background; only the intersection is
// touched.

use crate::engine::buffer::{PixelBuffer, Rect, CHANNELS};
use crate::engine::pool::{parallel_rows, ExecutionConfig};
use crate::engine::resample::materialize;
use crate::engine::scanner::{PixelSource, Scanner};
use crate::error::ImagingError;
use std::str::FromStr;

/// Which part of the source an anchored crop keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    Top,
    TopRight,
    Left,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl FromStr for Anchor {
    type Err = ImagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Ok(match key.as_str() {
            "center" | "centre" => Self::Center,
            "topleft" => Self::TopLeft,
            "top" => Self::Top,
            "topright" => Self::TopRight,
            "left" => Self::Left,
            "right" => Self::Right,
            "bottomleft" => Self::BottomLeft,
            "bottom" => Self::Bottom,
            "bottomright" => Self::BottomRight,
            _ => return Err(ImagingError::unknown_anchor(s.to_string())),
        })
    }
}

fn source_rect<S: PixelSource + ?Sized>(src: &S) -> Rect {
    let (w, h) = src.bounds();
    Rect::from_xywh(0, 0, w, h)
}

/// Top-left corner of a `w x h` box anchored inside `b`.
fn anchor_point(b: Rect, w: i32, h: i32, anchor: Anchor) -> (i32, i32) {
    let cx = b.x0 + (b.width() as i32 - w) / 2;
    let cy = b.y0 + (b.height() as i32 - h) / 2;
    match anchor {
        Anchor::TopLeft => (b.x0, b.y0),
        Anchor::Top => (cx, b.y0),
        Anchor::TopRight => (b.x1 - w, b.y0),
        Anchor::Left => (b.x0, cy),
        Anchor::Right => (b.x1 - w, cy),
        Anchor::BottomLeft => (b.x0, b.y1 - h),
        Anchor::Bottom => (cx, b.y1 - h),
        Anchor::BottomRight => (b.x1 - w, b.y1 - h),
        Anchor::Center => (cx, cy),
    }
}

/// Cut out `rect` intersected with the source bounds. A rectangle that
/// misses the image yields an empty buffer.
pub fn crop<S: PixelSource + ?Sized>(src: &S, rect: Rect, config: &ExecutionConfig) -> PixelBuffer {
    let r = rect.intersect(&source_rect(src));
    if r.is_empty() {
        return PixelBuffer::default();
    }
    let mut dst = PixelBuffer::new(r.width(), r.height());
    let scanner = Scanner::new(src);
    let stride = dst.stride();
    let (x0, x1) = (r.x0 as u32, r.x1 as u32);
    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        let y0 = r.y0 as u32 + rows.start as u32;
        let y1 = r.y0 as u32 + rows.end as u32;
        scanner.scan(x0, y0, x1, y1, chunk);
    });
    dst
}

/// Crop a `width x height` region positioned by `anchor`.
pub fn crop_anchor<S: PixelSource + ?Sized>(
    src: &S,
    width: u32,
    height: u32,
    anchor: Anchor,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let bounds = source_rect(src);
    let (w, h) = (width.min(i32::MAX as u32) as i32, height.min(i32::MAX as u32) as i32);
    let (x, y) = anchor_point(bounds, w, h, anchor);
    crop(src, Rect::from_xywh(x, y, width, height), config)
}

pub fn crop_center<S: PixelSource + ?Sized>(
    src: &S,
    width: u32,
    height: u32,
    config: &ExecutionConfig,
) -> PixelBuffer {
    crop_anchor(src, width, height, Anchor::Center, config)
}

/// Region of the background covered by `img` placed at `pos`, plus the
/// full placement rectangle.
fn placement(bg: Rect, img: Rect, pos: (i32, i32)) -> (Rect, Rect) {
    let placed = img.translate(pos.0, pos.1);
    (placed.intersect(&bg), placed)
}

/// Copy `img` over `background` at `pos`, replacing pixels (no blending).
pub fn paste<B, S>(background: &B, img: &S, pos: (i32, i32), config: &ExecutionConfig) -> PixelBuffer
where
    B: PixelSource + ?Sized,
    S: PixelSource + ?Sized,
{
    let mut dst = materialize(background, config).into_owned();
    let (inter, placed) = placement(dst.rect(), source_rect(img), pos);
    if inter.is_empty() {
        return dst;
    }
    let scanner = Scanner::new(img);
    let stride = dst.stride();
    let (sx0, sx1) = ((inter.x0 - placed.x0) as u32, (inter.x1 - placed.x0) as u32);
    let span = inter.x0 as usize * CHANNELS..inter.x1 as usize * CHANNELS;
    let band = inter.y0 as usize * stride..inter.y1 as usize * stride;
    parallel_rows(config, &mut dst.as_raw_mut()[band], stride, |rows, chunk| {
        for (y, row) in rows.zip(chunk.chunks_exact_mut(stride)) {
            let sy = (inter.y0 + y as i32 - placed.y0) as u32;
            scanner.scan(sx0, sy, sx1, sy + 1, &mut row[span.clone()]);
        }
    });
    dst
}

fn centered(bg: (u32, u32), img: (u32, u32)) -> (i32, i32) {
    (
        (bg.0 / 2) as i32 - (img.0 / 2) as i32,
        (bg.1 / 2) as i32 - (img.1 / 2) as i32,
    )
}

pub fn paste_center<B, S>(background: &B, img: &S, config: &ExecutionConfig) -> PixelBuffer
where
    B: PixelSource + ?Sized,
    S: PixelSource + ?Sized,
{
    paste(background, img, centered(background.bounds(), img.bounds()), config)
}

/// Straight-alpha "over" of one foreground pixel onto `d`.
#[inline]
fn blend(d: &mut [u8], s: &[u8], opacity: f64) {
    let a1 = d[3] as f64;
    let a2 = s[3] as f64;
    let mut coef2 = opacity * a2 / 255.0;
    let mut coef1 = (1.0 - coef2) * a1 / 255.0;
    let sum = coef1 + coef2;
    if sum == 0.0 {
        return;
    }
    coef1 /= sum;
    coef2 /= sum;
    for c in 0..3 {
        d[c] = (d[c] as f64 * coef1 + s[c] as f64 * coef2) as u8;
    }
    d[3] = (a1 + a2 * opacity * (255.0 - a1) / 255.0).min(255.0) as u8;
}

/// Blend `img` over `background` at `pos`. `opacity` is clamped to
/// `[0, 1]`; zero opacity returns a copy of the background.
pub fn overlay<B, S>(
    background: &B,
    img: &S,
    pos: (i32, i32),
    opacity: f64,
    config: &ExecutionConfig,
) -> PixelBuffer
where
    B: PixelSource + ?Sized,
    S: PixelSource + ?Sized,
{
    let opacity = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) };
    let mut dst = materialize(background, config).into_owned();
    let (inter, placed) = placement(dst.rect(), source_rect(img), pos);
    if inter.is_empty() || opacity == 0.0 {
        return dst;
    }
    let scanner = Scanner::new(img);
    let stride = dst.stride();
    let (sx0, sx1) = ((inter.x0 - placed.x0) as u32, (inter.x1 - placed.x0) as u32);
    let span = inter.x0 as usize * CHANNELS..inter.x1 as usize * CHANNELS;
    let band = inter.y0 as usize * stride..inter.y1 as usize * stride;
    parallel_rows(config, &mut dst.as_raw_mut()[band], stride, |rows, chunk| {
        let mut scanline = vec![0u8; span.len()];
        for (y, row) in rows.zip(chunk.chunks_exact_mut(stride)) {
            let sy = (inter.y0 + y as i32 - placed.y0) as u32;
            scanner.scan(sx0, sy, sx1, sy + 1, &mut scanline);
            for (d, s) in row[span.clone()]
                .chunks_exact_mut(CHANNELS)
                .zip(scanline.chunks_exact(CHANNELS))
            {
                blend(d, s, opacity);
            }
        }
    });
    dst
}

pub fn overlay_center<B, S>(
    background: &B,
    img: &S,
    opacity: f64,
    config: &ExecutionConfig,
) -> PixelBuffer
where
    B: PixelSource + ?Sized,
    S: PixelSource + ?Sized,
{
    overlay(
        background,
        img,
        centered(background.bounds(), img.bounds()),
        opacity,
        config,
    )
}
