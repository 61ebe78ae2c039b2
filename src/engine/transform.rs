// src/engine/transform.rs
//
// Geometric remaps. The exact ones (flips, quarter turns, transpose,
// transverse) copy whole source rows or columns into destination rows;
// `rotate` handles arbitrary angles with bilinear sampling.
//
// Rotation angles are counter-clockwise.

use crate::engine::buffer::{PixelBuffer, CHANNELS};
use crate::engine::pool::{parallel_rows, ExecutionConfig};
use crate::engine::resample::{clamp_u8, materialize};
use crate::engine::scanner::{PixelSource, Scanner};

/// What a destination row is read from.
#[derive(Clone, Copy)]
enum Line {
    /// Source row `i`.
    Row,
    /// Source column `i`, top to bottom.
    Column,
}

/// Which source line feeds destination row `y` out of `n` rows.
#[derive(Clone, Copy)]
enum Pick {
    Same,
    Mirrored,
}

fn reverse_pixels(row: &mut [u8]) {
    let n = row.len() / CHANNELS;
    for i in 0..n / 2 {
        let j = n - 1 - i;
        for c in 0..CHANNELS {
            row.swap(i * CHANNELS + c, j * CHANNELS + c);
        }
    }
}

fn remap<S: PixelSource + ?Sized>(
    src: &S,
    line: Line,
    pick: Pick,
    reverse: bool,
    config: &ExecutionConfig,
) -> PixelBuffer {
    let (w, h) = src.bounds();
    let (dst_w, dst_h) = match line {
        Line::Row => (w, h),
        Line::Column => (h, w),
    };
    let mut dst = PixelBuffer::new(dst_w, dst_h);
    if dst.is_empty() {
        return dst;
    }
    let scanner = Scanner::new(src);
    let stride = dst.stride();
    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        for (y, out) in rows.zip(chunk.chunks_exact_mut(stride)) {
            let y = y as u32;
            let i = match pick {
                Pick::Same => y,
                Pick::Mirrored => dst_h - 1 - y,
            };
            match line {
                Line::Row => scanner.scan(0, i, w, i + 1, out),
                Line::Column => scanner.scan(i, 0, i + 1, h, out),
            }
            if reverse {
                reverse_pixels(out);
            }
        }
    });
    dst
}

/// Mirror left-right.
pub fn flip_h<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    remap(src, Line::Row, Pick::Same, true, config)
}

/// Mirror top-bottom.
pub fn flip_v<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    remap(src, Line::Row, Pick::Mirrored, false, config)
}

/// Rotate 90 degrees counter-clockwise.
pub fn rotate90<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    remap(src, Line::Column, Pick::Mirrored, false, config)
}

pub fn rotate180<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    remap(src, Line::Row, Pick::Mirrored, true, config)
}

/// Rotate 270 degrees counter-clockwise (90 clockwise).
pub fn rotate270<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    remap(src, Line::Column, Pick::Same, true, config)
}

/// Flip along the main diagonal: `dst(x, y) = src(y, x)`.
pub fn transpose<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    remap(src, Line::Column, Pick::Same, false, config)
}

/// Flip along the anti-diagonal.
pub fn transverse<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> PixelBuffer {
    remap(src, Line::Column, Pick::Mirrored, true, config)
}

#[inline]
fn rotate_point(x: f64, y: f64, sin: f64, cos: f64) -> (f64, f64) {
    (x * cos - y * sin, x * sin + y * cos)
}

/// Canvas size that holds a `w x h` image rotated by `angle` degrees.
pub fn rotated_size(w: u32, h: u32, angle: f64) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (0, 0);
    }
    let (sin, cos) = angle.to_radians().sin_cos();
    let (fw, fh) = ((w - 1) as f64, (h - 1) as f64);
    let corners = [
        (0.0, 0.0),
        rotate_point(fw, 0.0, sin, cos),
        rotate_point(fw, fh, sin, cos),
        rotate_point(0.0, fh, sin, cos),
    ];
    let extent = |pick: fn(&(f64, f64)) -> f64| {
        let (lo, hi) = corners
            .iter()
            .map(pick)
            .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let mut size = hi - lo + 1.0;
        if size - size.floor() > 0.1 {
            size += 1.0;
        }
        size as u32
    };
    (extent(|p| p.0), extent(|p| p.1))
}

/// Rotate by an arbitrary `angle` in degrees, counter-clockwise. The canvas
/// grows to fit; uncovered area is `background`. Right angles take the
/// exact remap paths.
pub fn rotate<S: PixelSource + ?Sized>(
    src: &S,
    angle: f64,
    background: [u8; 4],
    config: &ExecutionConfig,
) -> PixelBuffer {
    let angle = angle - (angle / 360.0).floor() * 360.0;
    if angle == 0.0 || angle == 360.0 {
        return materialize(src, config).into_owned();
    } else if angle == 90.0 {
        return rotate90(src, config);
    } else if angle == 180.0 {
        return rotate180(src, config);
    } else if angle == 270.0 {
        return rotate270(src, config);
    }

    let src = materialize(src, config);
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = rotated_size(src_w, src_h, angle);
    let mut dst = PixelBuffer::new(dst_w, dst_h);
    if dst.is_empty() {
        return dst;
    }

    let src_off = (src_w as f64 / 2.0 - 0.5, src_h as f64 / 2.0 - 0.5);
    let dst_off = (dst_w as f64 / 2.0 - 0.5, dst_h as f64 / 2.0 - 0.5);
    let (sin, cos) = angle.to_radians().sin_cos();
    let stride = dst.stride();

    parallel_rows(config, dst.as_raw_mut(), stride, |rows, chunk| {
        for (y, out) in rows.zip(chunk.chunks_exact_mut(stride)) {
            for (x, o) in out.chunks_exact_mut(CHANNELS).enumerate() {
                let (xf, yf) = rotate_point(
                    x as f64 - dst_off.0,
                    y as f64 - dst_off.1,
                    sin,
                    cos,
                );
                o.copy_from_slice(&sample_bilinear(&src, xf + src_off.0, yf + src_off.1, background));
            }
        }
    });
    dst
}

/// Alpha-aware bilinear sample. Taps outside the image read `background`;
/// points more than one pixel outside are pure background.
fn sample_bilinear(src: &PixelBuffer, xf: f64, yf: f64, background: [u8; 4]) -> [u8; 4] {
    let x0 = xf.floor();
    let y0 = yf.floor();
    let (w, h) = (src.width() as f64, src.height() as f64);
    if x0 < -1.0 || y0 < -1.0 || x0 >= w || y0 >= h {
        return background;
    }
    let (xq, yq) = (xf - x0, yf - y0);
    let taps = [
        (x0, y0, (1.0 - xq) * (1.0 - yq)),
        (x0 + 1.0, y0, xq * (1.0 - yq)),
        (x0, y0 + 1.0, (1.0 - xq) * yq),
        (x0 + 1.0, y0 + 1.0, xq * yq),
    ];
    let (mut r, mut g, mut b, mut a) = (0.0, 0.0, 0.0, 0.0);
    for (px, py, wt) in taps {
        let s = if px >= 0.0 && py >= 0.0 && px < w && py < h {
            src.pixel(px as u32, py as u32)
        } else {
            background
        };
        let wa = s[3] as f64 * wt;
        r += s[0] as f64 * wa;
        g += s[1] as f64 * wa;
        b += s[2] as f64 * wa;
        a += wa;
    }
    if a == 0.0 {
        return [0; 4];
    }
    let inv = 1.0 / a;
    [clamp_u8(r * inv), clamp_u8(g * inv), clamp_u8(b * inv), clamp_u8(a)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ExecutionConfig {
        ExecutionConfig::single_threaded()
    }

    /// 3x2 image with a distinct value per pixel:
    ///  0 1 2
    ///  3 4 5
    fn numbered() -> PixelBuffer {
        let mut buf = PixelBuffer::new(3, 2);
        for y in 0..2 {
            for x in 0..3 {
                buf.put_pixel(x, y, [(y * 3 + x) as u8, 0, 0, 255]);
            }
        }
        buf
    }

    fn reds(buf: &PixelBuffer) -> Vec<Vec<u8>> {
        (0..buf.height())
            .map(|y| (0..buf.width()).map(|x| buf.pixel(x, y)[0]).collect())
            .collect()
    }

    mod exact_remap_tests {
        use super::*;

        #[test]
        fn flips() {
            assert_eq!(reds(&flip_h(&numbered(), &cfg())), vec![vec![2, 1, 0], vec![5, 4, 3]]);
            assert_eq!(reds(&flip_v(&numbered(), &cfg())), vec![vec![3, 4, 5], vec![0, 1, 2]]);
        }

        #[test]
        fn quarter_turns_are_counter_clockwise() {
            assert_eq!(
                reds(&rotate90(&numbered(), &cfg())),
                vec![vec![2, 5], vec![1, 4], vec![0, 3]]
            );
            assert_eq!(
                reds(&rotate270(&numbered(), &cfg())),
                vec![vec![3, 0], vec![4, 1], vec![5, 2]]
            );
            assert_eq!(reds(&rotate180(&numbered(), &cfg())), vec![vec![5, 4, 3], vec![2, 1, 0]]);
        }

        #[test]
        fn diagonals() {
            assert_eq!(
                reds(&transpose(&numbered(), &cfg())),
                vec![vec![0, 3], vec![1, 4], vec![2, 5]]
            );
            assert_eq!(
                reds(&transverse(&numbered(), &cfg())),
                vec![vec![5, 2], vec![4, 1], vec![3, 0]]
            );
        }

        #[test]
        fn identity_laws() {
            let src = numbered();
            let c = cfg();
            assert_eq!(flip_h(&flip_h(&src, &c), &c), src);
            assert_eq!(flip_v(&flip_v(&src, &c), &c), src);
            assert_eq!(transpose(&transpose(&src, &c), &c), src);
            let mut turned = src.clone();
            for _ in 0..4 {
                turned = rotate90(&turned, &c);
            }
            assert_eq!(turned, src);
            assert_eq!(rotate270(&rotate90(&src, &c), &c), src);
        }

        #[test]
        fn empty_input_stays_empty() {
            assert!(rotate90(&PixelBuffer::default(), &cfg()).is_empty());
        }
    }

    mod rotate_tests {
        use super::*;

        #[test]
        fn right_angles_use_exact_paths() {
            let src = numbered();
            assert_eq!(rotate(&src, 90.0, [0; 4], &cfg()), rotate90(&src, &cfg()));
            assert_eq!(rotate(&src, -90.0, [0; 4], &cfg()), rotate270(&src, &cfg()));
            assert_eq!(rotate(&src, 540.0, [0; 4], &cfg()), rotate180(&src, &cfg()));
            assert_eq!(rotate(&src, 720.0, [0; 4], &cfg()), src);
        }

        #[test]
        fn forty_five_degrees_grows_canvas() {
            assert_eq!(rotated_size(10, 10, 45.0), (14, 14));
            let src = PixelBuffer::filled(10, 10, [10, 20, 30, 255]);
            let out = rotate(&src, 45.0, [0, 0, 0, 0], &cfg());
            assert_eq!(out.dimensions(), (14, 14));
            assert_eq!(out.pixel(7, 7), [10, 20, 30, 255]);
            assert_eq!(out.pixel(0, 0), [0, 0, 0, 0]);
        }

        #[test]
        fn background_fills_corners() {
            let src = PixelBuffer::filled(8, 8, [255, 255, 255, 255]);
            let out = rotate(&src, 30.0, [0, 0, 255, 255], &cfg());
            assert_eq!(out.pixel(0, 0), [0, 0, 255, 255]);
        }

        #[test]
        fn worker_count_does_not_change_output() {
            let src = numbered();
            assert_eq!(
                rotate(&src, 17.0, [1, 2, 3, 4], &ExecutionConfig::new(1)),
                rotate(&src, 17.0, [1, 2, 3, 4], &ExecutionConfig::new(8))
            );
        }
    }
}
