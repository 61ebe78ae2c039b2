// src/engine/convolve.rs
//
// Small square convolution kernels (emboss, edge detect, box/sharpen
// masks). Edges are clamped; alpha is copied from the source.

use crate::engine::buffer::{PixelBuffer, CHANNELS};
use crate::engine::pool::{parallel_rows, ExecutionConfig};
use crate::engine::resample::{clamp_u8, materialize};
use crate::engine::scanner::PixelSource;

/// Post-processing applied to every convolution sum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConvolveOptions {
    /// Divide the kernel by its sum (or by the sum of its positive
    /// entries when the total is zero).
    pub normalize: bool,
    /// Take the absolute value of each channel sum.
    pub abs: bool,
    /// Added to each channel after `abs`.
    pub bias: i32,
}

struct Coef {
    dx: i64,
    dy: i64,
    k: f64,
}

fn normalize(kernel: &mut [f64]) {
    let sum: f64 = kernel.iter().sum();
    let positive: f64 = kernel.iter().filter(|&&k| k > 0.0).sum();
    let divisor = if sum != 0.0 { sum } else { positive };
    if divisor != 0.0 {
        kernel.iter_mut().for_each(|k| *k /= divisor);
    }
}

fn convolve<S: PixelSource + ?Sized>(
    src: &S,
    kernel: &mut [f64],
    radius: i64,
    options: &ConvolveOptions,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let src = materialize(src, config);
    let (w, h) = src.dimensions();
    let mut dst = PixelBuffer::new(w, h);
    if dst.is_empty() {
        return dst;
    }
    if options.normalize {
        normalize(kernel);
    }

    let side = 2 * radius + 1;
    let coefs: Vec<Coef> = kernel
        .iter()
        .enumerate()
        .filter(|&(_, &k)| k != 0.0)
        .map(|(i, &k)| Coef {
            dx: i as i64 % side - radius,
            dy: i as i64 / side - radius,
            k,
        })
        .collect();

    let (max_x, max_y) = (w as i64 - 1, h as i64 - 1);
    let bias = options.bias as f64;
    let stride = dst.stride();
    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        for (y, out) in rows.zip(chunk.chunks_exact_mut(stride)) {
            let src_row = src.row(y as u32);
            for (x, d) in out.chunks_exact_mut(CHANNELS).enumerate() {
                let mut sum = [0.0f64; 3];
                for c in &coefs {
                    let ix = (x as i64 + c.dx).clamp(0, max_x) as u32;
                    let iy = (y as i64 + c.dy).clamp(0, max_y) as u32;
                    let s = src.pixel(ix, iy);
                    for (acc, &v) in sum.iter_mut().zip(&s[..3]) {
                        *acc += v as f64 * c.k;
                    }
                }
                for (dc, mut v) in d.iter_mut().zip(sum) {
                    if options.abs {
                        v = v.abs();
                    }
                    *dc = clamp_u8(v + bias);
                }
                d[3] = src_row[x * CHANNELS + 3];
            }
        }
    });
    dst
}

/// Convolve with a row-major 3x3 kernel.
pub fn convolve3x3<S: PixelSource + ?Sized>(
    src: &S,
    kernel: [f64; 9],
    options: &ConvolveOptions,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let mut kernel = kernel;
    convolve(src, &mut kernel, 1, options, config)
}

/// Convolve with a row-major 5x5 kernel.
pub fn convolve5x5<S: PixelSource + ?Sized>(
    src: &S,
    kernel: [f64; 25],
    options: &ConvolveOptions,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let mut kernel = kernel;
    convolve(src, &mut kernel, 2, options, config)
}
