// src/engine/histogram.rs
//
// Normalized luminance histogram.

use crate::engine::buffer::CHANNELS;
use crate::engine::pool::{parallel_map, ExecutionConfig};
use crate::engine::scanner::{PixelSource, Scanner};

/// Number of histogram bins (one per 8-bit luminance level).
pub const BINS: usize = 256;

/// Fraction of pixels at each Rec. 601 luminance level. Sums to 1 for a
/// non-empty source; all zeros for an empty one. Alpha is ignored.
pub fn histogram<S: PixelSource + ?Sized>(src: &S, config: &ExecutionConfig) -> [f64; BINS] {
    let (w, h) = src.bounds();
    let mut result = [0.0; BINS];
    let total = w as u64 * h as u64;
    if total == 0 {
        return result;
    }

    let scanner = Scanner::new(src);
    let partials = parallel_map(config, h as usize, |rows| {
        let mut counts = [0u64; BINS];
        let mut scanline = vec![0u8; w as usize * CHANNELS];
        for y in rows {
            scanner.scan_row(y as u32, &mut scanline);
            for px in scanline.chunks_exact(CHANNELS) {
                let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
                counts[((y + 0.5) as usize).min(BINS - 1)] += 1;
            }
        }
        counts
    });

    let mut counts = [0u64; BINS];
    for part in &partials {
        for (c, p) in counts.iter_mut().zip(part) {
            *c += p;
        }
    }
    let total = total as f64;
    for (r, c) in result.iter_mut().zip(counts) {
        *r = c as f64 / total;
    }
    result
}
