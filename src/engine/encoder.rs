// src/engine/encoder.rs
//
// Encode boundary: PixelBuffer -> JPEG/PNG/GIF/TIFF/BMP through the image
// crate, with ICC profiles re-embedded into JPEG and PNG containers.

use crate::engine::buffer::{PixelBuffer, CHANNELS};
use crate::engine::MAX_DIMENSION;
use crate::error::ImagingError;
use crate::ops::{OutputFormat, PngCompression};
use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use img_parts::{jpeg::Jpeg, png::Png, Bytes, ImageICC};
use std::ffi::OsStr;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

// Always ImagingError, so encode failures keep their CodecError category.
type EncoderResult<T> = std::result::Result<T, ImagingError>;

/// Containers the encode boundary can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Jpeg,
    Png,
    Gif,
    Tiff,
    Bmp,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(OsStr::to_str)
            .and_then(Self::from_extension)
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Tiff => Some(Self::Tiff),
            ImageFormat::Bmp => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }

    /// Only JPEG and PNG outputs carry an embedded ICC profile.
    pub fn supports_icc(self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

/// Encode `buf` as `format`, embedding `icc` when the container supports it.
pub fn encode(buf: &PixelBuffer, format: &OutputFormat, icc: Option<&[u8]>) -> EncoderResult<Vec<u8>> {
    let container = format.format();
    let (w, h) = buf.dimensions();
    if w == 0 || h == 0 {
        return Err(ImagingError::encode_failed(
            container.name(),
            "image has zero width or height",
        ));
    }
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(ImagingError::dimension_exceeds_limit(w.max(h), MAX_DIMENSION));
    }

    let encoded = match format {
        OutputFormat::Jpeg { quality } => encode_jpeg(buf, *quality)?,
        OutputFormat::Png { compression } => encode_png(buf, *compression)?,
        OutputFormat::Gif => encode_gif(buf)?,
        OutputFormat::Tiff => encode_tiff(buf)?,
        OutputFormat::Bmp => encode_bmp(buf)?,
    };

    let out = match (icc, container) {
        (Some(icc), Format::Jpeg) => embed_icc_jpeg(encoded, icc)?,
        (Some(icc), Format::Png) => embed_icc_png(encoded, icc)?,
        (Some(_), other) => {
            debug!(target: "pixelflow::encode", format = other.name(), "ICC profile dropped");
            encoded
        }
        (None, _) => encoded,
    };
    debug!(
        target: "pixelflow::encode",
        format = container.name(),
        width = w,
        height = h,
        bytes = out.len(),
        "encoded"
    );
    Ok(out)
}

fn codec_error(format: Format) -> impl Fn(image::ImageError) -> ImagingError {
    move |e| ImagingError::encode_failed(format.name(), e.to_string())
}

fn rgb_bytes(buf: &PixelBuffer) -> Vec<u8> {
    let (w, h) = buf.dimensions();
    let mut rgb = Vec::with_capacity(w as usize * h as usize * 3);
    for y in 0..h {
        for px in buf.row(y).chunks_exact(CHANNELS) {
            rgb.extend_from_slice(&px[..3]);
        }
    }
    rgb
}

/// JPEG has no alpha channel; straight alpha means dropping it keeps colors.
pub fn encode_jpeg(buf: &PixelBuffer, quality: u8) -> EncoderResult<Vec<u8>> {
    if !buf.is_opaque() {
        warn!(target: "pixelflow::encode", "JPEG output drops the alpha channel");
    }
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(&rgb_bytes(buf), buf.width(), buf.height(), ExtendedColorType::Rgb8)
        .map_err(codec_error(Format::Jpeg))?;
    Ok(out)
}

/// Opaque images are written as RGB.
pub fn encode_png(buf: &PixelBuffer, compression: PngCompression) -> EncoderResult<Vec<u8>> {
    let compression = match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    };
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive);
    let result = if buf.is_opaque() {
        encoder.write_image(&rgb_bytes(buf), buf.width(), buf.height(), ExtendedColorType::Rgb8)
    } else {
        encoder.write_image(&buf.to_packed(), buf.width(), buf.height(), ExtendedColorType::Rgba8)
    };
    result.map_err(codec_error(Format::Png))?;
    Ok(out)
}

pub fn encode_gif(buf: &PixelBuffer) -> EncoderResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .encode(&buf.to_packed(), buf.width(), buf.height(), ExtendedColorType::Rgba8)
            .map_err(codec_error(Format::Gif))?;
    }
    Ok(out)
}

pub fn encode_tiff(buf: &PixelBuffer) -> EncoderResult<Vec<u8>> {
    let mut out = Vec::new();
    TiffEncoder::new(Cursor::new(&mut out))
        .write_image(&buf.to_packed(), buf.width(), buf.height(), ExtendedColorType::Rgba8)
        .map_err(codec_error(Format::Tiff))?;
    Ok(out)
}

pub fn encode_bmp(buf: &PixelBuffer) -> EncoderResult<Vec<u8>> {
    let mut out = Vec::new();
    BmpEncoder::new(&mut out)
        .write_image(&buf.to_packed(), buf.width(), buf.height(), ExtendedColorType::Rgba8)
        .map_err(codec_error(Format::Bmp))?;
    Ok(out)
}

/// Embed ICC profile into JPEG using img-parts (APP2 segments)
pub fn embed_icc_jpeg(jpeg_data: Vec<u8>, icc: &[u8]) -> EncoderResult<Vec<u8>> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_data))
        .map_err(|e| ImagingError::decode_failed(format!("failed to parse JPEG for ICC: {e}")))?;

    jpeg.set_icc_profile(Some(Bytes::copy_from_slice(icc)));

    let mut output = Vec::new();
    jpeg.encoder().write_to(&mut output).map_err(|e| {
        ImagingError::encode_failed("jpeg", format!("failed to write JPEG with ICC: {e}"))
    })?;
    Ok(output)
}

/// Embed ICC profile into PNG using img-parts (iCCP chunk)
pub fn embed_icc_png(png_data: Vec<u8>, icc: &[u8]) -> EncoderResult<Vec<u8>> {
    let mut png = Png::from_bytes(Bytes::from(png_data))
        .map_err(|e| ImagingError::decode_failed(format!("failed to parse PNG for ICC: {e}")))?;

    png.set_icc_profile(Some(Bytes::copy_from_slice(icc)));

    let mut output = Vec::new();
    png.encoder().write_to(&mut output).map_err(|e| {
        ImagingError::encode_failed("png", format!("failed to write PNG with ICC: {e}"))
    })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decoder::{decode, detect_format};
    use crate::engine::pool::ExecutionConfig;

    fn gradient(w: u32, h: u32, alpha: u8) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, [(x * 30) as u8, (y * 30) as u8, 90, alpha]);
            }
        }
        buf
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_from_extension() {
            assert_eq!(Format::from_extension("JPG"), Some(Format::Jpeg));
            assert_eq!(Format::from_extension("tif"), Some(Format::Tiff));
            assert_eq!(Format::from_extension("webp"), None);
        }

        #[test]
        fn test_from_path() {
            assert_eq!(Format::from_path("out/photo.jpeg"), Some(Format::Jpeg));
            assert_eq!(Format::from_path("noext"), None);
        }

        #[test]
        fn test_supports_icc() {
            assert!(Format::Png.supports_icc());
            assert!(!Format::Gif.supports_icc());
        }
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn test_png_round_trip_is_lossless() {
            let src = gradient(7, 5, 140);
            let bytes = encode(&src, &OutputFormat::Png { compression: PngCompression::Fast }, None).unwrap();
            assert_eq!(decode(&bytes, &ExecutionConfig::new(2)).unwrap(), src);
        }

        #[test]
        fn test_opaque_png_is_rgb() {
            let bytes = encode_png(&gradient(4, 4, 255), PngCompression::Default).unwrap();
            let img = image::load_from_memory(&bytes).unwrap();
            assert_eq!(img.color(), image::ColorType::Rgb8);
        }

        #[test]
        fn test_jpeg_keeps_dimensions() {
            let bytes = encode(&gradient(9, 6, 255), &OutputFormat::Jpeg { quality: 90 }, None).unwrap();
            assert_eq!(detect_format(&bytes), Some(ImageFormat::Jpeg));
            let decoded = decode(&bytes, &ExecutionConfig::new(1)).unwrap();
            assert_eq!(decoded.dimensions(), (9, 6));
            assert!(decoded.is_opaque());
        }

        #[test]
        fn test_other_containers() {
            let src = gradient(3, 3, 255);
            for (format, expected) in [
                (OutputFormat::Gif, ImageFormat::Gif),
                (OutputFormat::Tiff, ImageFormat::Tiff),
                (OutputFormat::Bmp, ImageFormat::Bmp),
            ] {
                let bytes = encode(&src, &format, None).unwrap();
                assert_eq!(detect_format(&bytes), Some(expected));
            }
        }

        #[test]
        fn test_bmp_round_trip_is_lossless() {
            let src = gradient(5, 3, 255);
            let bytes = encode(&src, &OutputFormat::Bmp, None).unwrap();
            assert_eq!(decode(&bytes, &ExecutionConfig::new(1)).unwrap(), src);
        }

        #[test]
        fn test_empty_buffer_fails() {
            let err = encode(&PixelBuffer::default(), &OutputFormat::Bmp, None).unwrap_err();
            assert!(matches!(err, ImagingError::EncodeFailed { .. }));
        }
    }
}
