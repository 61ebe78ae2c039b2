// src/engine.rs
//
// The core of pixelflow. A parallel pixel engine that:
// 1. Reads any PixelSource through the Scanner
// 2. Splits work into disjoint row bands on a bounded worker pool
// 3. Produces a fresh PixelBuffer from every operation
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULES
// =============================================================================

// Pixel model and parallel machinery
pub mod buffer;
pub mod pool;
pub mod scanner;

// Resampling
pub mod kernels;
pub mod resample;

// Operations
pub mod adjust;
pub mod blur;
pub mod compose;
pub mod convolve;
pub mod histogram;
pub mod orientation;
pub mod transform;

// Codec boundary and lazy pipeline
pub mod api;
pub mod decoder;
pub mod encoder;
pub mod io;
pub mod pipeline;

pub use api::ImageEngine;
pub use buffer::{PixelBuffer, Rect, CHANNELS};
pub use decoder::{check_dimensions, decode, decode_with_options, DecodeOptions};
pub use encoder::{embed_icc_jpeg, embed_icc_png, encode, Format};
pub use io::{extract_icc_profile, open, save, Source};
pub use pipeline::{apply_ops, calc_resize_dimensions, optimize_ops};
pub use pool::{max_workers, set_max_workers, ExecutionConfig, MAX_WORKERS_ENV};
pub use scanner::{PixelSource, PremultipliedRgba, Scanner};
