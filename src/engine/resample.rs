// src/engine/resample.rs
//
// Separable resampling: one horizontal pass over scanner rows, then one
// vertical pass over the intermediate buffer. Both passes read their
// taps from a precomputed `ResamplePlan` and weight color by alpha.
//
// The same plan machinery drives Gaussian blur (see blur.rs).

use crate::engine::buffer::{PixelBuffer, CHANNELS};
use crate::engine::compose::{crop_anchor, Anchor};
use crate::engine::kernels::Kernel;
use crate::engine::pool::{parallel_rows, ExecutionConfig};
use crate::engine::scanner::{PixelSource, Scanner};
use std::borrow::Cow;
use std::ops::Range;
use tracing::trace;

/// Sources at least this large in both dimensions are cropped before
/// being resized by `fill`; smaller ones are resized first.
const FILL_CROP_FIRST_MIN: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    lo: usize,
    offset: usize,
    len: usize,
}

/// Per-axis tap table: for every destination index, a contiguous source
/// range and one normalized weight per source index in it.
#[derive(Clone, Debug)]
pub struct ResamplePlan {
    src_len: usize,
    spans: Vec<Span>,
    weights: Vec<f64>,
}

impl ResamplePlan {
    /// Plan for scaling `src_len` samples to `dst_len` with `kernel`.
    ///
    /// Taps that fall outside the source are clamped to the nearest edge
    /// sample, merging their weight into it. A kernel that fails
    /// [`Kernel::validate`] is planned as [`Kernel::Box`].
    pub fn new(kernel: &Kernel, src_len: usize, dst_len: usize) -> Self {
        let kernel = match kernel.validate() {
            Ok(()) => kernel,
            Err(_) => &Kernel::Box,
        };
        let mut plan = Self::with_capacity(src_len, dst_len);
        if src_len == 0 {
            plan.spans.resize(dst_len, Span { lo: 0, offset: 0, len: 0 });
            return plan;
        }

        let du = src_len as f64 / dst_len as f64;
        let scale = du.max(1.0);
        let radius = (kernel.support() * scale).ceil();
        let last = src_len as i64 - 1;
        let mut taps = Vec::new();

        for v in 0..dst_len {
            let center = (v as f64 + 0.5) * du - 0.5;
            let begin = (center - radius).ceil() as i64;
            let end = (center + radius).floor() as i64;
            let lo = begin.clamp(0, last);
            let hi = end.clamp(0, last);

            taps.clear();
            taps.resize((hi - lo + 1).max(0) as usize, 0.0);
            for u in begin..=end {
                let w = kernel.weight((u as f64 - center) / scale);
                if w != 0.0 {
                    taps[(u.clamp(0, last) - lo) as usize] += w;
                }
            }
            plan.push(lo as usize, &taps);
        }
        plan
    }

    /// Blur plan: `taps[k]` is the weight at distance `k`. Windows are
    /// truncated at the edges and renormalized.
    pub fn gaussian(taps: &[f64], len: usize) -> Self {
        let mut plan = Self::with_capacity(len, len);
        let radius = taps.len().saturating_sub(1);
        let mut window = Vec::with_capacity(2 * radius + 1);
        for x in 0..len {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(len - 1);
            window.clear();
            window.extend((lo..=hi).map(|u| taps[u.abs_diff(x)]));
            plan.push(lo, &window);
        }
        plan
    }

    fn with_capacity(src_len: usize, dst_len: usize) -> Self {
        Self {
            src_len,
            spans: Vec::with_capacity(dst_len),
            weights: Vec::new(),
        }
    }

    /// Normalize, trim zero-weight edges and append one span.
    fn push(&mut self, lo: usize, taps: &[f64]) {
        let sum: f64 = taps.iter().sum();
        let first = taps.iter().position(|&w| w != 0.0).unwrap_or(taps.len());
        let last = taps.iter().rposition(|&w| w != 0.0).map_or(first, |i| i + 1);
        let offset = self.weights.len();
        if sum != 0.0 {
            self.weights.extend(taps[first..last].iter().map(|w| w / sum));
        } else {
            self.weights.extend_from_slice(&taps[first..last]);
        }
        self.spans.push(Span {
            lo: lo + first,
            offset,
            len: last - first,
        });
    }

    /// Destination length.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn src_len(&self) -> usize {
        self.src_len
    }

    /// Source indices contributing to destination index `i`.
    pub fn range(&self, i: usize) -> Range<usize> {
        let s = self.spans[i];
        s.lo..s.lo + s.len
    }

    /// Weights matching [`range`](Self::range), summing to 1.
    pub fn weights(&self, i: usize) -> &[f64] {
        let s = self.spans[i];
        &self.weights[s.offset..s.offset + s.len]
    }

    fn entry(&self, i: usize) -> (usize, &[f64]) {
        (self.spans[i].lo, self.weights(i))
    }
}

/// Alpha-weighted RGBA accumulator.
#[derive(Clone, Copy, Default)]
pub(crate) struct Accum {
    r: f64,
    g: f64,
    b: f64,
    a: f64,
}

impl Accum {
    #[inline]
    pub(crate) fn add(&mut self, px: &[u8], w: f64) {
        let aw = px[3] as f64 * w;
        self.r += px[0] as f64 * aw;
        self.g += px[1] as f64 * aw;
        self.b += px[2] as f64 * aw;
        self.a += aw;
    }

    #[inline]
    pub(crate) fn finish(&self) -> [u8; 4] {
        if self.a == 0.0 {
            return [0; 4];
        }
        let inv = 1.0 / self.a;
        [
            clamp_u8(self.r * inv),
            clamp_u8(self.g * inv),
            clamp_u8(self.b * inv),
            clamp_u8(self.a),
        ]
    }
}

#[inline]
pub(crate) fn clamp_u8(x: f64) -> u8 {
    ((x + 0.5) as i64).clamp(0, 255) as u8
}

/// Borrow the source as a `PixelBuffer` when it is one, else materialize it.
pub(crate) fn materialize<'a, S: PixelSource + ?Sized>(
    src: &'a S,
    config: &ExecutionConfig,
) -> Cow<'a, PixelBuffer> {
    match src.as_pixel_buffer() {
        Some(buf) => Cow::Borrowed(buf),
        None => Cow::Owned(PixelBuffer::from_source(src, config)),
    }
}

/// Apply `plan` along x to every row of `src`.
pub(crate) fn horizontal_pass<S: PixelSource + ?Sized>(
    src: &S,
    plan: &ResamplePlan,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let (src_w, src_h) = src.bounds();
    let mut dst = PixelBuffer::new(plan.len() as u32, src_h);
    if dst.is_empty() {
        return dst;
    }
    let scanner = Scanner::new(src);
    let stride = dst.stride();
    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        let mut scanline = vec![0u8; src_w as usize * CHANNELS];
        for (y, out) in rows.zip(chunk.chunks_exact_mut(stride)) {
            scanner.scan_row(y as u32, &mut scanline);
            for (i, o) in out.chunks_exact_mut(CHANNELS).enumerate() {
                let (lo, weights) = plan.entry(i);
                let mut acc = Accum::default();
                for (px, &w) in scanline[lo * CHANNELS..].chunks_exact(CHANNELS).zip(weights) {
                    acc.add(px, w);
                }
                o.copy_from_slice(&acc.finish());
            }
        }
    });
    dst
}

/// Apply `plan` along y. Work is split by destination rows; each column
/// still sums its taps in ascending source order.
pub(crate) fn vertical_pass(
    src: &PixelBuffer,
    plan: &ResamplePlan,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let width = src.width();
    let mut dst = PixelBuffer::new(width, plan.len() as u32);
    if dst.is_empty() {
        return dst;
    }
    let stride = dst.stride();
    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        let mut accs = vec![Accum::default(); width as usize];
        for (y, out) in rows.zip(chunk.chunks_exact_mut(stride)) {
            accs.fill(Accum::default());
            let (lo, weights) = plan.entry(y);
            for (k, &w) in weights.iter().enumerate() {
                let row = src.row((lo + k) as u32);
                for (acc, px) in accs.iter_mut().zip(row.chunks_exact(CHANNELS)) {
                    acc.add(px, w);
                }
            }
            for (acc, o) in accs.iter().zip(out.chunks_exact_mut(CHANNELS)) {
                o.copy_from_slice(&acc.finish());
            }
        }
    });
    dst
}

/// Resolve a requested size against the source: a zero dimension is
/// derived from the other one, preserving aspect ratio.
pub fn target_dimensions(src_w: u32, src_h: u32, width: u32, height: u32) -> (u32, u32) {
    let derive = |target: u32, other_src: u32, this_src: u32| -> u32 {
        let v = (target as f64 * other_src as f64 / this_src as f64 + 0.5).floor();
        v.max(1.0) as u32
    };
    match (width, height) {
        (0, 0) => (0, 0),
        (0, h) => (derive(h, src_w, src_h), h),
        (w, 0) => (w, derive(w, src_h, src_w)),
        (w, h) => (w, h),
    }
}

/// Resize to `width x height`. A zero dimension preserves the aspect
/// ratio; both zero (or an empty source) yields an empty buffer.
pub fn resize<S: PixelSource + ?Sized>(
    src: &S,
    width: u32,
    height: u32,
    kernel: &Kernel,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let (src_w, src_h) = src.bounds();
    if src_w == 0 || src_h == 0 || (width == 0 && height == 0) {
        return PixelBuffer::default();
    }
    let (dst_w, dst_h) = target_dimensions(src_w, src_h, width, height);

    trace!(
        target: "pixelflow::resample",
        src_w, src_h, dst_w, dst_h, ?kernel, "resize"
    );

    if (dst_w, dst_h) == (src_w, src_h) {
        return materialize(src, config).into_owned();
    }
    if *kernel == Kernel::Nearest {
        return resize_nearest(src, dst_w, dst_h, config);
    }

    if dst_w == src_w {
        let plan = ResamplePlan::new(kernel, src_h as usize, dst_h as usize);
        return vertical_pass(&materialize(src, config), &plan, config);
    }
    let plan_x = ResamplePlan::new(kernel, src_w as usize, dst_w as usize);
    let tmp = horizontal_pass(src, &plan_x, config);
    if dst_h == src_h {
        return tmp;
    }
    let plan_y = ResamplePlan::new(kernel, src_h as usize, dst_h as usize);
    vertical_pass(&tmp, &plan_y, config)
}

/// Point sampling: destination `i` reads source `floor((i + 0.5) * ratio)`.
fn resize_nearest<S: PixelSource + ?Sized>(
    src: &S,
    dst_w: u32,
    dst_h: u32,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let (src_w, src_h) = src.bounds();
    let dx = src_w as f64 / dst_w as f64;
    let dy = src_h as f64 / dst_h as f64;
    let x_map: Vec<usize> = (0..dst_w)
        .map(|x| (((x as f64 + 0.5) * dx) as usize).min(src_w as usize - 1))
        .collect();

    let mut dst = PixelBuffer::new(dst_w, dst_h);
    let scanner = Scanner::new(src);
    let stride = dst.stride();
    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        let mut scanline = vec![0u8; src_w as usize * CHANNELS];
        for (y, out) in rows.zip(chunk.chunks_exact_mut(stride)) {
            let sy = (((y as f64 + 0.5) * dy) as u32).min(src_h - 1);
            scanner.scan_row(sy, &mut scanline);
            for (&sx, o) in x_map.iter().zip(out.chunks_exact_mut(CHANNELS)) {
                o.copy_from_slice(&scanline[sx * CHANNELS..(sx + 1) * CHANNELS]);
            }
        }
    });
    dst
}

/// Shrink to fit inside `max_width x max_height`, preserving aspect
/// ratio. Sources that already fit are copied unchanged.
pub fn fit<S: PixelSource + ?Sized>(
    src: &S,
    max_width: u32,
    max_height: u32,
    kernel: &Kernel,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let (src_w, src_h) = src.bounds();
    if max_width == 0 || max_height == 0 || src_w == 0 || src_h == 0 {
        return PixelBuffer::default();
    }
    if src_w <= max_width && src_h <= max_height {
        return materialize(src, config).into_owned();
    }

    let src_aspect = src_w as f64 / src_h as f64;
    let max_aspect = max_width as f64 / max_height as f64;
    let (w, h) = if src_aspect > max_aspect {
        let h = (max_width as f64 / src_aspect + 0.5) as u32;
        (max_width, h.max(1))
    } else {
        let w = (max_height as f64 * src_aspect + 0.5) as u32;
        (w.max(1), max_height)
    };
    resize(src, w, h, kernel, config)
}

/// Resize and crop to exactly `width x height`, keeping the region
/// selected by `anchor`.
pub fn fill<S: PixelSource + ?Sized>(
    src: &S,
    width: u32,
    height: u32,
    anchor: Anchor,
    kernel: &Kernel,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let (src_w, src_h) = src.bounds();
    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return PixelBuffer::default();
    }
    if (src_w, src_h) == (width, height) {
        return materialize(src, config).into_owned();
    }

    let src_aspect = src_w as f64 / src_h as f64;
    let dst_aspect = width as f64 / height as f64;

    if src_w >= FILL_CROP_FIRST_MIN && src_h >= FILL_CROP_FIRST_MIN {
        let cropped = if src_aspect < dst_aspect {
            let crop_h = src_w as f64 * height as f64 / width as f64;
            crop_anchor(src, src_w, (crop_h.max(1.0) + 0.5) as u32, anchor, config)
        } else {
            let crop_w = src_h as f64 * width as f64 / height as f64;
            crop_anchor(src, (crop_w.max(1.0) + 0.5) as u32, src_h, anchor, config)
        };
        return resize(&cropped, width, height, kernel, config);
    }

    let resized = if src_aspect < dst_aspect {
        resize(src, width, 0, kernel, config)
    } else {
        resize(src, 0, height, kernel, config)
    };
    crop_anchor(&resized, width, height, anchor, config)
}

/// Centered `fill`.
pub fn thumbnail<S: PixelSource + ?Sized>(
    src: &S,
    width: u32,
    height: u32,
    kernel: &Kernel,
    config: &ExecutionConfig,
) -> PixelBuffer {
    fill(src, width, height, Anchor::Center, kernel, config)
}
