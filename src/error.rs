// src/error.rs
//
// Error type shared by the engine, the codec boundary and the lazy pipeline.
//
// Categories:
// - UserError: bad arguments or unknown names; fix the call
// - CodecError: the bytes could not be read or written in that format
// - ResourceLimit: security limits and filesystem trouble
// - InternalBug: should not happen
//
// Orientation parsing degrades to Unspecified and degenerate parameters
// (sigma <= 0, opacity <= 0, ...) are identity operations, so neither has a
// variant here.

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

type Text = Cow<'static, str>;

/// How a caller should react to an [`ImagingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    UserError,
    CodecError,
    ResourceLimit,
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserError => "UserError",
            Self::CodecError => "CodecError",
            Self::ResourceLimit => "ResourceLimit",
            Self::InternalBug => "InternalBug",
        }
    }

    /// Stable code for logs and bindings.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserError => "PIXELFLOW_USER_ERROR",
            Self::CodecError => "PIXELFLOW_CODEC_ERROR",
            Self::ResourceLimit => "PIXELFLOW_RESOURCE_LIMIT",
            Self::InternalBug => "PIXELFLOW_INTERNAL_BUG",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ImagingError {
    // --- filesystem ---
    #[error("no such file: {path}")]
    FileNotFound { path: Text },

    #[error("cannot read '{path}': {source}")]
    FileReadFailed {
        path: Text,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write '{path}': {source}")]
    FileWriteFailed {
        path: Text,
        #[source]
        source: std::io::Error,
    },

    // --- codec boundary ---
    #[error("unsupported image format: {format}")]
    UnsupportedFormat { format: Text },

    #[error("decode failed: {message}")]
    DecodeFailed { message: Text },

    #[error("{format} encode failed: {message}")]
    EncodeFailed { format: Text, message: Text },

    #[error("dimension {dimension} is above the {max} pixel limit")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("{pixels} pixels is above the {max} pixel limit")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // --- engine arguments ---
    #[error("unknown resampling kernel '{name}'")]
    UnknownKernel { name: Text },

    #[error("unknown anchor '{name}'")]
    UnknownAnchor { name: Text },

    #[error(
        "crop {width}x{height} at ({x}, {y}) does not fit inside {img_width}x{img_height}"
    )]
    InvalidCropBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("crop size {width}x{height} has a zero side")]
    InvalidCropDimensions { width: u32, height: u32 },

    #[error("rotate takes multiples of 90 degrees, got {degrees}; use RotateAngle for the rest")]
    InvalidRotationAngle { degrees: i32 },

    #[error("resize needs a non-zero width or height, got width={width:?} height={height:?}")]
    InvalidResizeDimensions {
        width: Option<u32>,
        height: Option<u32>,
    },

    #[error("invalid pixel buffer: {reason}")]
    InvalidBuffer { reason: Text },

    #[error("unknown preset '{name}' (thumbnail, avatar, hero, social)")]
    InvalidPreset { name: Text },

    #[error("{name} = {value}: {reason}")]
    InvalidArgument { name: Text, value: Text, reason: Text },

    #[error("internal error: {message}")]
    Internal { message: Text },
}

impl ImagingError {
    pub fn file_not_found(path: impl Into<Text>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Text>, source: std::io::Error) -> Self {
        let path = path.into();
        Self::FileReadFailed { path, source }
    }

    pub fn file_write_failed(path: impl Into<Text>, source: std::io::Error) -> Self {
        let path = path.into();
        Self::FileWriteFailed { path, source }
    }

    pub fn unsupported_format(format: impl Into<Text>) -> Self {
        Self::UnsupportedFormat { format: format.into() }
    }

    pub fn decode_failed(message: impl Into<Text>) -> Self {
        Self::DecodeFailed { message: message.into() }
    }

    pub fn encode_failed(format: impl Into<Text>, message: impl Into<Text>) -> Self {
        let (format, message) = (format.into(), message.into());
        Self::EncodeFailed { format, message }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn unknown_kernel(name: impl Into<Text>) -> Self {
        Self::UnknownKernel { name: name.into() }
    }

    pub fn unknown_anchor(name: impl Into<Text>) -> Self {
        Self::UnknownAnchor { name: name.into() }
    }

    /// `(x, y, width, height)` is the requested crop, `img_*` the source size.
    pub fn invalid_crop_bounds(x: u32, y: u32, width: u32, height: u32, img_width: u32, img_height: u32) -> Self {
        Self::InvalidCropBounds { x, y, width, height, img_width, img_height }
    }

    pub fn invalid_crop_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidCropDimensions { width, height }
    }

    pub fn invalid_rotation_angle(degrees: i32) -> Self {
        Self::InvalidRotationAngle { degrees }
    }

    pub fn invalid_resize_dimensions(width: Option<u32>, height: Option<u32>) -> Self {
        Self::InvalidResizeDimensions { width, height }
    }

    pub fn invalid_buffer(reason: impl Into<Text>) -> Self {
        Self::InvalidBuffer { reason: reason.into() }
    }

    pub fn invalid_preset(name: impl Into<Text>) -> Self {
        Self::InvalidPreset { name: name.into() }
    }

    pub fn invalid_argument(name: impl Into<Text>, value: impl Into<Text>, reason: impl Into<Text>) -> Self {
        let (name, value, reason) = (name.into(), value.into(), reason.into());
        Self::InvalidArgument { name, value, reason }
    }

    pub fn internal(message: impl Into<Text>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// True for the categories a caller can act on: user errors and
    /// resource limits.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::UserError | ErrorCategory::ResourceLimit)
    }

    pub fn category(&self) -> ErrorCategory {
        use ImagingError::*;
        match self {
            FileNotFound { .. }
            | UnknownKernel { .. }
            | UnknownAnchor { .. }
            | InvalidCropBounds { .. }
            | InvalidCropDimensions { .. }
            | InvalidRotationAngle { .. }
            | InvalidResizeDimensions { .. }
            | InvalidBuffer { .. }
            | InvalidPreset { .. }
            | InvalidArgument { .. } => ErrorCategory::UserError,

            UnsupportedFormat { .. } | DecodeFailed { .. } | EncodeFailed { .. } => {
                ErrorCategory::CodecError
            }

            // Disk and permission trouble sits with the limits.
            DimensionExceedsLimit { .. }
            | PixelCountExceedsLimit { .. }
            | FileReadFailed { .. }
            | FileWriteFailed { .. } => ErrorCategory::ResourceLimit,

            Internal { .. } => ErrorCategory::InternalBug,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImagingError>;

#[cfg(test)]
mod tests {
    use super::*;

    mod display_tests {
        use super::*;

        #[test]
        fn test_messages_carry_payload() {
            let err = ImagingError::file_not_found("/photos/cat.jpg");
            assert!(err.to_string().contains("/photos/cat.jpg"));

            let err = ImagingError::unknown_kernel("sinc9000");
            assert_eq!(err.to_string(), "unknown resampling kernel 'sinc9000'");

            let err = ImagingError::invalid_crop_bounds(5, 6, 10, 10, 12, 12);
            assert_eq!(err.to_string(), "crop 10x10 at (5, 6) does not fit inside 12x12");
        }

        #[test]
        fn test_io_source_is_chained() {
            use std::error::Error as _;
            let err = ImagingError::file_read_failed(
                "in.png",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            );
            assert!(err.source().is_some());
        }

        #[test]
        fn test_category_display_and_codes() {
            assert_eq!(ErrorCategory::UserError.to_string(), "UserError");
            assert_eq!(ErrorCategory::InternalBug.code(), "PIXELFLOW_INTERNAL_BUG");
        }
    }

    mod category_tests {
        use super::*;

        #[test]
        fn test_user_errors() {
            for err in [
                ImagingError::file_not_found("test.jpg"),
                ImagingError::unknown_kernel("foo"),
                ImagingError::unknown_anchor("middle"),
                ImagingError::invalid_crop_dimensions(0, 100),
                ImagingError::invalid_rotation_angle(45),
                ImagingError::invalid_resize_dimensions(None, None),
                ImagingError::invalid_buffer("stride too small"),
                ImagingError::invalid_preset("unknown"),
                ImagingError::invalid_argument("sigma", "NaN", "must be finite"),
            ] {
                assert_eq!(err.category(), ErrorCategory::UserError, "{err}");
                assert!(err.is_recoverable());
            }
        }

        #[test]
        fn test_codec_errors() {
            for err in [
                ImagingError::unsupported_format("webp"),
                ImagingError::decode_failed("truncated"),
                ImagingError::encode_failed("jpeg", "zero width"),
            ] {
                assert_eq!(err.category(), ErrorCategory::CodecError, "{err}");
                assert!(!err.is_recoverable());
            }
        }

        #[test]
        fn test_resource_limits() {
            for err in [
                ImagingError::dimension_exceeds_limit(40000, 32768),
                ImagingError::pixel_count_exceeds_limit(1_000_000_000, 100_000_000),
                ImagingError::file_write_failed(
                    "out.png",
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                ),
            ] {
                assert_eq!(err.category(), ErrorCategory::ResourceLimit, "{err}");
                assert!(err.is_recoverable());
            }
        }

        #[test]
        fn test_internal_is_not_recoverable() {
            let err = ImagingError::internal("worker vanished");
            assert_eq!(err.category(), ErrorCategory::InternalBug);
            assert!(!err.is_recoverable());
        }
    }
}
