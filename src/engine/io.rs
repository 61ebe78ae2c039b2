// src/engine/io.rs
//
// I/O operations: Source enum, file loading and saving, and ICC profile
// extraction for pass-through.

use crate::engine::buffer::PixelBuffer;
use crate::engine::decoder::{decode_with_options, DecodeOptions};
use crate::engine::encoder::{encode, Format};
use crate::engine::pool::ExecutionConfig;
use crate::error::ImagingError;
use crate::ops::OutputFormat;
use img_parts::{jpeg::Jpeg, png::Png, Bytes, ImageICC};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

type IoResult<T> = std::result::Result<T, ImagingError>;

/// Image source - in-memory data or a file path (read only when needed)
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory encoded image data
    Memory(Arc<Vec<u8>>),
    /// File path for lazy loading
    Path(PathBuf),
}

impl Source {
    /// Load the encoded bytes. Memory sources are shared, not copied.
    pub fn load(&self) -> IoResult<Arc<Vec<u8>>> {
        match self {
            Source::Memory(data) => Ok(Arc::clone(data)),
            Source::Path(path) => read_file(path).map(Arc::new),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) => None,
        }
    }

    /// Bytes of a memory source; `None` for paths, which must be loaded first.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Source::Memory(data) => Some(data.as_slice()),
            Source::Path(_) => None,
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Read a whole file, separating "missing" from other read failures.
pub fn read_file(path: impl AsRef<Path>) -> IoResult<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ImagingError::file_not_found(path_string(path))
        } else {
            ImagingError::file_read_failed(path_string(path), e)
        }
    })
}

/// Read and decode an image file.
pub fn open(
    path: impl AsRef<Path>,
    options: &DecodeOptions,
    config: &ExecutionConfig,
) -> IoResult<PixelBuffer> {
    let path = path.as_ref();
    let bytes = read_file(path)?;
    debug!(target: "pixelflow::decode", path = %path.display(), bytes = bytes.len(), "read");
    decode_with_options(&bytes, options, config)
}

/// Encode and write `buf`. Without an explicit `format` the file
/// extension decides, with default encoder settings.
pub fn save(
    buf: &PixelBuffer,
    path: impl AsRef<Path>,
    format: Option<&OutputFormat>,
    icc: Option<&[u8]>,
) -> IoResult<()> {
    let path = path.as_ref();
    let from_ext;
    let format = match format {
        Some(f) => f,
        None => {
            let container = Format::from_path(path).ok_or_else(|| {
                ImagingError::unsupported_format(format!(
                    "cannot infer format from '{}'",
                    path.display()
                ))
            })?;
            from_ext = OutputFormat::for_format(container);
            &from_ext
        }
    };
    let bytes = encode(buf, format, icc)?;
    std::fs::write(path, &bytes).map_err(|e| ImagingError::file_write_failed(path_string(path), e))?;
    debug!(target: "pixelflow::encode", path = %path.display(), bytes = bytes.len(), "wrote");
    Ok(())
}

/// Extract ICC profile from image data.
/// Supports JPEG (APP2 marker) and PNG (iCCP chunk). Profiles that fail
/// header validation are ignored.
pub fn extract_icc_profile(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 12 {
        return None;
    }

    let icc_data = if data[0] == 0xFF && data[1] == 0xD8 {
        let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(data)).ok()?;
        jpeg.icc_profile()?.to_vec()
    } else if data[..4] == [0x89, 0x50, 0x4E, 0x47] {
        let png = Png::from_bytes(Bytes::copy_from_slice(data)).ok()?;
        png.icc_profile()?.to_vec()
    } else {
        return None;
    };

    validate_icc_profile(&icc_data).then_some(icc_data)
}

fn is_signature(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (32..=126).contains(&b) || b == 0)
}

/// Validate ICC profile header
/// ICC profiles start with a 128-byte header whose size field matches the
/// data length and whose signature fields are ASCII.
pub(crate) fn validate_icc_profile(icc_data: &[u8]) -> bool {
    if icc_data.len() < 128 {
        return false;
    }

    let profile_size =
        u32::from_be_bytes([icc_data[0], icc_data[1], icc_data[2], icc_data[3]]) as usize;
    if profile_size != icc_data.len() {
        return false;
    }

    // Major version is 2, 4 or 5 in practice.
    if icc_data[8] > 10 {
        return false;
    }

    // CMM type, then profile class, data color space and PCS.
    is_signature(&icc_data[4..8]) && is_signature(&icc_data[12..24])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::encoder::embed_icc_png;
    use crate::ops::PngCompression;
    use tempfile::tempdir;

    /// Smallest header-only profile that passes validation.
    pub(crate) fn minimal_icc() -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[..4].copy_from_slice(&128u32.to_be_bytes());
        data[4..8].copy_from_slice(b"ADBE");
        data[8] = 2;
        data[12..16].copy_from_slice(b"mntr");
        data[16..20].copy_from_slice(b"RGB ");
        data[20..24].copy_from_slice(b"XYZ ");
        data
    }

    fn sample(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::filled(w, h, [10, 120, 200, 255])
    }

    fn cfg() -> ExecutionConfig {
        ExecutionConfig::new(2)
    }

    mod icc_validation_tests {
        use super::*;

        #[test]
        fn test_minimal_profile_is_valid() {
            assert!(validate_icc_profile(&minimal_icc()));
        }

        #[test]
        fn test_too_small() {
            assert!(!validate_icc_profile(&[0u8; 64]));
        }

        #[test]
        fn test_size_mismatch() {
            let mut icc = minimal_icc();
            icc.push(0);
            assert!(!validate_icc_profile(&icc));
        }

        #[test]
        fn test_invalid_version() {
            let mut icc = minimal_icc();
            icc[8] = 42;
            assert!(!validate_icc_profile(&icc));
        }

        #[test]
        fn test_non_ascii_signature() {
            let mut icc = minimal_icc();
            icc[13] = 0xFF;
            assert!(!validate_icc_profile(&icc));
        }
    }

    mod icc_extraction_tests {
        use super::*;

        #[test]
        fn test_png_pass_through() {
            let icc = minimal_icc();
            let bytes = encode(
                &sample(4, 4),
                &OutputFormat::Png { compression: PngCompression::Fast },
                Some(icc.as_slice()),
            )
            .unwrap();
            assert_eq!(extract_icc_profile(&bytes), Some(icc));
        }

        #[test]
        fn test_jpeg_pass_through() {
            let icc = minimal_icc();
            let bytes = encode(&sample(4, 4), &OutputFormat::Jpeg { quality: 80 }, Some(icc.as_slice())).unwrap();
            assert_eq!(extract_icc_profile(&bytes), Some(icc));
        }

        #[test]
        fn test_no_profile() {
            let bytes = encode(&sample(4, 4), &OutputFormat::Jpeg { quality: 80 }, None).unwrap();
            assert_eq!(extract_icc_profile(&bytes), None);
        }

        #[test]
        fn test_invalid_profile_is_ignored() {
            let png = encode(&sample(2, 2), &OutputFormat::Png { compression: PngCompression::Fast }, None)
                .unwrap();
            let tagged = embed_icc_png(png, &[1u8; 200]).unwrap();
            assert_eq!(extract_icc_profile(&tagged), None);
        }

        #[test]
        fn test_non_image_and_empty() {
            assert_eq!(extract_icc_profile(b"this is not an image at all"), None);
            assert_eq!(extract_icc_profile(&[]), None);
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_save_and_open_png() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("out.png");
            let src = sample(5, 3);
            save(&src, &path, None, None).unwrap();
            assert_eq!(open(&path, &DecodeOptions::default(), &cfg()).unwrap(), src);
        }

        #[test]
        fn test_save_explicit_format_ignores_extension() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("out.bin");
            save(&sample(2, 2), &path, Some(&OutputFormat::Bmp), None).unwrap();
            let bytes = read_file(&path).unwrap();
            assert_eq!(&bytes[..2], b"BM");
        }

        #[test]
        fn test_save_unknown_extension() {
            let dir = tempdir().unwrap();
            let err = save(&sample(2, 2), dir.path().join("out.xyz"), None, None).unwrap_err();
            assert!(matches!(err, ImagingError::UnsupportedFormat { .. }));
        }

        #[test]
        fn test_open_missing_file() {
            let dir = tempdir().unwrap();
            let err = open(dir.path().join("missing.png"), &DecodeOptions::default(), &cfg()).unwrap_err();
            assert!(matches!(err, ImagingError::FileNotFound { .. }));
        }

        #[test]
        fn test_save_into_missing_directory() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("nope").join("out.png");
            let err = save(&sample(2, 2), &path, None, None).unwrap_err();
            assert!(matches!(err, ImagingError::FileWriteFailed { .. }));
        }

        #[test]
        fn test_source_load() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("raw.bin");
            std::fs::write(&path, b"abc").unwrap();
            let source = Source::Path(path.clone());
            assert_eq!(source.as_path(), Some(path.as_path()));
            assert_eq!(source.as_bytes(), None);
            assert_eq!(source.load().unwrap().as_slice(), b"abc");

            let mem = Source::Memory(Arc::new(vec![1, 2, 3]));
            assert_eq!(mem.as_bytes(), Some(&[1u8, 2, 3][..]));
        }
    }
}
