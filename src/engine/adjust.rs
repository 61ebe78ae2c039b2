// src/engine/adjust.rs
//
// Photometric adjustments. Per-channel curves are baked into a 256-entry
// lookup table; color-space adjustments go through HSL per pixel. Alpha
// is never modified.

use crate::engine::buffer::{PixelBuffer, CHANNELS};
use crate::engine::pool::{parallel_rows, ExecutionConfig};
use crate::engine::resample::{clamp_u8, materialize};
use crate::engine::scanner::PixelSource;

/// Copy `src` and rewrite every pixel in place with `f`.
fn map_pixels<S, F>(src: &S, config: &ExecutionConfig, f: F) -> PixelBuffer
where
    S: PixelSource + ?Sized,
    F: Fn(&mut [u8]) + Sync,
{
    let mut dst = materialize(src, config).into_owned();
    if dst.is_empty() {
        return dst;
    }
    let stride = dst.stride();
    let row_bytes = dst.width() as usize * CHANNELS;
    parallel_rows(config, dst.as_raw_mut(), stride, |_, chunk| {
        for row in chunk.chunks_exact_mut(stride) {
            for px in row[..row_bytes].chunks_exact_mut(CHANNELS) {
                f(px);
            }
        }
    });
    dst
}

/// Apply `f` to every straight-alpha RGBA pixel.
pub fn adjust_fn<S, F>(src: &S, f: F, config: &ExecutionConfig) -> PixelBuffer
where
    S: PixelSource + ?Sized,
    F: Fn([u8; 4]) -> [u8; 4] + Sync,
{
    map_pixels(src, config, |px| {
        let out = f([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&out);
    })
}

fn apply_lut<S: PixelSource + ?Sized>(src: &S, lut: &[u8; 256], config: &ExecutionConfig) -> PixelBuffer {
    map_pixels(src, config, |px| {
        px[0] = lut[px[0] as usize];
        px[1] = lut[px[1] as usize];
        px[2] = lut[px[2] as usize];
    })
}

fn build_lut(f: impl Fn(f64) -> u8) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = f(i as f64);
    }
    lut
}

/// Rec. 601 luma, alpha kept.
pub fn grayscale<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    map_pixels(src, config, |px| {
        let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
        let y = (y + 0.5) as u8;
        px[0] = y;
        px[1] = y;
        px[2] = y;
    })
}

pub fn invert<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    map_pixels(src, config, |px| {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    })
}

/// Shift brightness by `percentage` in `[-100, 100]` (clamped).
pub fn adjust_brightness<S: PixelSource + ?Sized>(
    src: &S,
    percentage: f64,
    config: &ExecutionConfig,
) -> PixelBuffer {
    if percentage == 0.0 || percentage.is_nan() {
        return materialize(src, config).into_owned();
    }
    let shift = 255.0 * percentage.clamp(-100.0, 100.0) / 100.0;
    apply_lut(src, &build_lut(|i| clamp_u8(i + shift)), config)
}

/// Scale contrast around mid-gray. `-100` flattens to gray, `100`
/// thresholds at mid-gray.
pub fn adjust_contrast<S: PixelSource + ?Sized>(
    src: &S,
    percentage: f64,
    config: &ExecutionConfig,
) -> PixelBuffer {
    if percentage == 0.0 || percentage.is_nan() {
        return materialize(src, config).into_owned();
    }
    let v = (100.0 + percentage.clamp(-100.0, 100.0)) / 100.0;
    let lut = build_lut(|i| {
        let x = i / 255.0;
        if (0.0..=1.0).contains(&v) {
            clamp_u8((0.5 + (x - 0.5) * v) * 255.0)
        } else if v > 1.0 && v < 2.0 {
            clamp_u8((0.5 + (x - 0.5) / (2.0 - v)) * 255.0)
        } else {
            ((x + 0.5) as u8).saturating_mul(255)
        }
    });
    apply_lut(src, &lut, config)
}

/// Gamma correction; `gamma < 1` darkens, `gamma > 1` brightens.
pub fn adjust_gamma<S: PixelSource + ?Sized>(
    src: &S,
    gamma: f64,
    config: &ExecutionConfig,
) -> PixelBuffer {
    if gamma == 1.0 || gamma.is_nan() {
        return materialize(src, config).into_owned();
    }
    let e = 1.0 / gamma.max(0.0001);
    apply_lut(src, &build_lut(|i| clamp_u8((i / 255.0).powf(e) * 255.0)), config)
}

/// Scale HSL saturation by `1 + percentage / 100`, `percentage` clamped
/// to `[-100, 100]`.
pub fn adjust_saturation<S: PixelSource + ?Sized>(
    src: &S,
    percentage: f64,
    config: &ExecutionConfig,
) -> PixelBuffer {
    if percentage == 0.0 || percentage.is_nan() {
        return materialize(src, config).into_owned();
    }
    let multiplier = 1.0 + percentage.clamp(-100.0, 100.0) / 100.0;
    map_pixels(src, config, |px| {
        let (h, s, l) = rgb_to_hsl(px[0], px[1], px[2]);
        let [r, g, b] = hsl_to_rgb(h, (s * multiplier).min(1.0), l);
        px[..3].copy_from_slice(&[r, g, b]);
    })
}

/// Rotate hue by `shift` degrees. Multiples of 360 return a copy.
pub fn adjust_hue<S: PixelSource + ?Sized>(
    src: &S,
    shift: f64,
    config: &ExecutionConfig,
) -> PixelBuffer {
    if shift % 360.0 == 0.0 || !shift.is_finite() {
        return materialize(src, config).into_owned();
    }
    let summand = shift / 360.0;
    map_pixels(src, config, |px| {
        let (h, s, l) = rgb_to_hsl(px[0], px[1], px[2]);
        let h = (h + summand).rem_euclid(1.0);
        let [r, g, b] = hsl_to_rgb(h, s, l);
        px[..3].copy_from_slice(&[r, g, b]);
    })
}

/// Sigmoidal contrast. `midpoint` in `[0, 1]` is the center of the curve;
/// positive `factor` increases contrast, negative decreases it.
pub fn adjust_sigmoid<S: PixelSource + ?Sized>(
    src: &S,
    midpoint: f64,
    factor: f64,
    config: &ExecutionConfig,
) -> PixelBuffer {
    if factor == 0.0 || factor.is_nan() {
        return materialize(src, config).into_owned();
    }
    let sigmoid = |a: f64, b: f64, x: f64| 1.0 / (1.0 + (b * (a - x)).exp());
    let a = midpoint.clamp(0.0, 1.0);
    let b = factor.abs();
    let sig0 = sigmoid(a, b, 0.0);
    let sig1 = sigmoid(a, b, 1.0);
    const E: f64 = 1.0e-6;

    let lut = if factor > 0.0 {
        build_lut(|i| {
            let x = i / 255.0;
            clamp_u8((sigmoid(a, b, x) - sig0) / (sig1 - sig0) * 255.0)
        })
    } else {
        build_lut(|i| {
            let x = i / 255.0;
            let arg = ((sig1 - sig0) * x + sig0).clamp(E, 1.0 - E);
            clamp_u8((a - (1.0 / arg - 1.0).ln() / b) * 255.0)
        })
    };
    apply_lut(src, &lut, config)
}

/// RGB bytes to HSL, each component in `[0, 1]`.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (rr, gg, bb) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = rr.max(gg).max(bb);
    let min = rr.min(gg).min(bb);
    let l = (max + min) / 2.0;
    if max == min {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == rr {
        (gg - bb) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == gg {
        (bb - rr) / d + 2.0
    } else {
        (rr - gg) / d + 4.0
    };
    (h / 6.0, s, l)
}

pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [u8; 3] {
    if s == 0.0 {
        let v = clamp_u8(l * 255.0);
        return [v, v, v];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        clamp_u8(hue_to_rgb(p, q, h + 1.0 / 3.0) * 255.0),
        clamp_u8(hue_to_rgb(p, q, h) * 255.0),
        clamp_u8(hue_to_rgb(p, q, h - 1.0 / 3.0) * 255.0),
    ]
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ExecutionConfig {
        ExecutionConfig::new(2)
    }

    fn sample() -> PixelBuffer {
        let mut buf = PixelBuffer::new(4, 3);
        for y in 0..3 {
            for x in 0..4 {
                buf.put_pixel(x, y, [(x * 60) as u8, (y * 100) as u8, 128, 100 + x as u8]);
            }
        }
        buf
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn neutral_parameters_copy_the_source() {
            let src = sample();
            let c = cfg();
            assert_eq!(adjust_brightness(&src, 0.0, &c), src);
            assert_eq!(adjust_contrast(&src, 0.0, &c), src);
            assert_eq!(adjust_gamma(&src, 1.0, &c), src);
            assert_eq!(adjust_saturation(&src, 0.0, &c), src);
            assert_eq!(adjust_hue(&src, 720.0, &c), src);
            assert_eq!(adjust_sigmoid(&src, 0.5, 0.0, &c), src);
        }

        #[test]
        fn double_invert_is_identity() {
            let src = sample();
            assert_eq!(invert(&invert(&src, &cfg()), &cfg()), src);
        }
    }

    mod curve_tests {
        use super::*;

        #[test]
        fn brightness_shifts_and_clamps() {
            let src = PixelBuffer::filled(1, 1, [10, 200, 250, 77]);
            let out = adjust_brightness(&src, 10.0, &cfg());
            assert_eq!(out.pixel(0, 0), [36, 226, 255, 77]);
            let out = adjust_brightness(&src, -500.0, &cfg());
            assert_eq!(out.pixel(0, 0), [0, 0, 0, 77]);
        }

        #[test]
        fn contrast_extremes() {
            let src = PixelBuffer::filled(1, 1, [10, 128, 250, 255]);
            assert_eq!(adjust_contrast(&src, -100.0, &cfg()).pixel(0, 0), [128, 128, 128, 255]);
            assert_eq!(adjust_contrast(&src, 100.0, &cfg()).pixel(0, 0), [0, 255, 255, 255]);
        }

        #[test]
        fn gamma_brightens_midtones() {
            let src = PixelBuffer::filled(1, 1, [0, 64, 255, 255]);
            let out = adjust_gamma(&src, 2.0, &cfg()).pixel(0, 0);
            assert_eq!(out[0], 0);
            assert!(out[1] > 64);
            assert_eq!(out[2], 255);
        }

        #[test]
        fn sigmoid_keeps_endpoints() {
            let src = PixelBuffer::filled(1, 1, [0, 255, 128, 255]);
            for factor in [5.0, -5.0] {
                let out = adjust_sigmoid(&src, 0.5, factor, &cfg()).pixel(0, 0);
                assert_eq!(out[0], 0);
                assert_eq!(out[1], 255);
            }
        }

        #[test]
        fn grayscale_uses_luma_weights() {
            let src = PixelBuffer::filled(1, 1, [255, 0, 0, 9]);
            assert_eq!(grayscale(&src, &cfg()).pixel(0, 0), [76, 76, 76, 9]);
        }

        #[test]
        fn adjust_fn_sees_every_pixel() {
            let out = adjust_fn(&sample(), |[r, g, b, a]| [g, r, b, a], &cfg());
            assert_eq!(out.pixel(1, 2), [200, 60, 128, 101]);
        }
    }

    mod hsl_tests {
        use super::*;

        #[test]
        fn hsl_round_trips_primaries() {
            for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], [12, 34, 56], [200, 200, 200]] {
                let (h, s, l) = rgb_to_hsl(rgb[0], rgb[1], rgb[2]);
                assert_eq!(hsl_to_rgb(h, s, l), rgb);
            }
        }

        #[test]
        fn hue_shift_rotates_primaries() {
            let src = PixelBuffer::filled(1, 1, [255, 0, 0, 255]);
            assert_eq!(adjust_hue(&src, 120.0, &cfg()).pixel(0, 0), [0, 255, 0, 255]);
            assert_eq!(adjust_hue(&src, -120.0, &cfg()).pixel(0, 0), [0, 0, 255, 255]);
        }

        #[test]
        fn full_desaturation_is_gray() {
            let src = PixelBuffer::filled(1, 1, [200, 50, 50, 255]);
            let px = adjust_saturation(&src, -100.0, &cfg()).pixel(0, 0);
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }
}
