// src/engine/blur.rs
//
// Gaussian blur and unsharp-mask sharpen. Blur reuses the resampling
// passes with an equal-length Gaussian plan per axis.

use crate::engine::buffer::PixelBuffer;
use crate::engine::pool::{parallel_rows, ExecutionConfig};
use crate::engine::resample::{horizontal_pass, materialize, vertical_pass, ResamplePlan};
use crate::engine::scanner::PixelSource;
use std::f64::consts::PI;

/// Gaussian taps at integer distances `0..=ceil(3 * sigma)`, cut at
/// `extent - 1`: no window over `extent` samples reaches further.
fn gaussian_taps(sigma: f64, extent: usize) -> Vec<f64> {
    let radius = ((sigma * 3.0).ceil() as usize).min(extent.saturating_sub(1));
    let norm = sigma * (2.0 * PI).sqrt();
    (0..=radius)
        .map(|x| {
            let x = x as f64;
            (-(x * x) / (2.0 * sigma * sigma)).exp() / norm
        })
        .collect()
}

/// Gaussian blur with standard deviation `sigma`. `sigma <= 0` returns
/// an unchanged copy.
pub fn blur<S: PixelSource + ?Sized>(src: &S, sigma: f64, config: &ExecutionConfig) -> PixelBuffer {
    let (width, height) = src.bounds();
    if sigma.is_nan() || sigma <= 0.0 || width == 0 || height == 0 {
        return materialize(src, config).into_owned();
    }
    let taps = gaussian_taps(sigma, width.max(height) as usize);
    let horizontal = horizontal_pass(
        src,
        &ResamplePlan::gaussian(&taps, width as usize),
        config,
    );
    vertical_pass(
        &horizontal,
        &ResamplePlan::gaussian(&taps, height as usize),
        config,
    )
}

/// Unsharp mask: `clamp(2 * src - blur(src, sigma))` on every channel,
/// alpha included. `sigma <= 0` returns an unchanged copy.
pub fn sharpen<S: PixelSource + ?Sized>(
    src: &S,
    sigma: f64,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let original = materialize(src, config);
    if sigma.is_nan() || sigma <= 0.0 || original.is_empty() {
        return original.into_owned();
    }
    let blurred = blur(&*original, sigma, config);

    let mut dst = PixelBuffer::new(original.width(), original.height());
    let stride = dst.stride();
    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        for (y, out) in rows.zip(chunk.chunks_exact_mut(stride)) {
            let y = y as u32;
            for ((o, &s), &b) in out
                .iter_mut()
                .zip(original.row(y))
                .zip(blurred.row(y))
            {
                *o = (2 * s as i16 - b as i16).clamp(0, 255) as u8;
            }
        }
    });
    dst
}
