// src/engine/orientation.rs
//
// EXIF orientation: a forward-only parser over raw JPEG bytes and the
// remap that undoes the camera's storage orientation.
//
// The parser never fails. Anything it cannot follow (not a JPEG, no
// APP1/Exif segment, truncated data, bogus values) is `Unspecified`.

use crate::engine::buffer::PixelBuffer;
use crate::engine::pool::ExecutionConfig;
use crate::engine::resample::materialize;
use crate::engine::scanner::PixelSource;
use crate::engine::transform;
use std::io::{self, Read};

const MARKER_SOI: u16 = 0xFFD8;
const MARKER_APP1: u16 = 0xFFE1;
const EXIF_HEADER: u32 = 0x4578_6966; // "Exif"
const BYTE_ORDER_BE: u16 = 0x4D4D; // "MM"
const BYTE_ORDER_LE: u16 = 0x4949; // "II"
const TAG_ORIENTATION: u16 = 0x0112;
/// IFD0 offsets are measured from the TIFF header, which we have already
/// consumed 8 bytes of.
const TIFF_HEADER_LEN: u32 = 8;

/// EXIF orientation flag. Rotation names are counter-clockwise: they
/// describe the rotation that brings the stored pixels upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Missing or unreadable flag.
    #[default]
    Unspecified,
    Normal,
    FlipH,
    Rotate180,
    FlipV,
    Transpose,
    Rotate270,
    Transverse,
    Rotate90,
}

impl Orientation {
    /// Map an EXIF value; anything outside 1..=8 is `Unspecified`.
    pub fn from_exif(value: u16) -> Self {
        match value {
            1 => Self::Normal,
            2 => Self::FlipH,
            3 => Self::Rotate180,
            4 => Self::FlipV,
            5 => Self::Transpose,
            6 => Self::Rotate270,
            7 => Self::Transverse,
            8 => Self::Rotate90,
            _ => Self::Unspecified,
        }
    }

    /// EXIF value, `None` for `Unspecified`.
    pub fn exif_value(self) -> Option<u16> {
        Some(match self {
            Self::Unspecified => return None,
            Self::Normal => 1,
            Self::FlipH => 2,
            Self::Rotate180 => 3,
            Self::FlipV => 4,
            Self::Transpose => 5,
            Self::Rotate270 => 6,
            Self::Transverse => 7,
            Self::Rotate90 => 8,
        })
    }

    /// True for the orientations that exchange width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate270 | Self::Transverse | Self::Rotate90
        )
    }

    /// Upright dimensions for stored dimensions.
    pub fn display_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    pub fn is_identity(self) -> bool {
        matches!(self, Self::Unspecified | Self::Normal)
    }
}

#[derive(Clone, Copy)]
enum ByteOrder {
    Big,
    Little,
}

fn read_u16<R: Read>(r: &mut R, order: ByteOrder) -> io::Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(match order {
        ByteOrder::Big => u16::from_be_bytes(b),
        ByteOrder::Little => u16::from_le_bytes(b),
    })
}

fn read_u32<R: Read>(r: &mut R, order: ByteOrder) -> io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(match order {
        ByteOrder::Big => u32::from_be_bytes(b),
        ByteOrder::Little => u32::from_le_bytes(b),
    })
}

fn skip<R: Read>(r: &mut R, n: u64) -> io::Result<()> {
    let copied = io::copy(&mut r.by_ref().take(n), &mut io::sink())?;
    if copied < n {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// `Ok(None)` means "well-formed so far, but no orientation here".
fn parse<R: Read>(r: &mut R) -> io::Result<Option<u16>> {
    if read_u16(r, ByteOrder::Big)? != MARKER_SOI {
        return Ok(None);
    }

    loop {
        let marker = read_u16(r, ByteOrder::Big)?;
        let size = read_u16(r, ByteOrder::Big)?;
        if marker >> 8 != 0xFF {
            return Ok(None);
        }
        if marker == MARKER_APP1 {
            break;
        }
        if size < 2 {
            return Ok(None);
        }
        skip(r, u64::from(size - 2))?;
    }

    if read_u32(r, ByteOrder::Big)? != EXIF_HEADER {
        return Ok(None);
    }
    skip(r, 2)?;

    let order = match read_u16(r, ByteOrder::Big)? {
        BYTE_ORDER_BE => ByteOrder::Big,
        BYTE_ORDER_LE => ByteOrder::Little,
        _ => return Ok(None),
    };
    // TIFF magic (42).
    skip(r, 2)?;

    let offset = read_u32(r, order)?;
    if offset < TIFF_HEADER_LEN {
        return Ok(None);
    }
    skip(r, u64::from(offset - TIFF_HEADER_LEN))?;

    let count = read_u16(r, order)?;
    for _ in 0..count {
        let tag = read_u16(r, order)?;
        if tag != TAG_ORIENTATION {
            skip(r, 10)?;
            continue;
        }
        // type (2) + count (4)
        skip(r, 6)?;
        let value = read_u16(r, order)?;
        return Ok((1..=8).contains(&value).then_some(value));
    }
    Ok(None)
}

/// Read the EXIF orientation from the start of a JPEG stream.
pub fn read_orientation<R: Read>(mut reader: R) -> Orientation {
    match parse(&mut reader) {
        Ok(Some(value)) => Orientation::from_exif(value),
        _ => Orientation::Unspecified,
    }
}

/// [`read_orientation`] over an in-memory buffer.
pub fn orientation_from_bytes(bytes: &[u8]) -> Orientation {
    read_orientation(bytes)
}

/// Remap `src` so it displays upright given its stored orientation.
pub fn apply_orientation<S: PixelSource + ?Sized>(
    src: &S,
    orientation: Orientation,
    config: &ExecutionConfig,
) -> PixelBuffer {
    match orientation {
        Orientation::Unspecified | Orientation::Normal => materialize(src, config).into_owned(),
        Orientation::FlipH => transform::flip_h(src, config),
        Orientation::FlipV => transform::flip_v(src, config),
        Orientation::Rotate90 => transform::rotate90(src, config),
        Orientation::Rotate180 => transform::rotate180(src, config),
        Orientation::Rotate270 => transform::rotate270(src, config),
        Orientation::Transpose => transform::transpose(src, config),
        Orientation::Transverse => transform::transverse(src, config),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal JPEG prefix: SOI, an APP0 segment, then an APP1/Exif
    /// segment whose IFD0 holds a filler tag and the orientation tag.
    pub(crate) fn jpeg_with_orientation(value: u16, little_endian: bool) -> Vec<u8> {
        let u16b = |v: u16| if little_endian { v.to_le_bytes() } else { v.to_be_bytes() };
        let u32b = |v: u32| if little_endian { v.to_le_bytes() } else { v.to_be_bytes() };

        let mut tiff = Vec::new();
        tiff.extend_from_slice(if little_endian { b"II" } else { b"MM" });
        tiff.extend_from_slice(&u16b(42));
        tiff.extend_from_slice(&u32b(8));
        tiff.extend_from_slice(&u16b(2));
        // ImageWidth, LONG
        tiff.extend_from_slice(&u16b(0x0100));
        tiff.extend_from_slice(&u16b(4));
        tiff.extend_from_slice(&u32b(1));
        tiff.extend_from_slice(&u32b(640));
        // Orientation, SHORT
        tiff.extend_from_slice(&u16b(TAG_ORIENTATION));
        tiff.extend_from_slice(&u16b(3));
        tiff.extend_from_slice(&u32b(1));
        tiff.extend_from_slice(&u16b(value));
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&u32b(0));

        let mut out = vec![0xFF, 0xD8];
        out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        out.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend_from_slice(&tiff);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    mod parser_tests {
        use super::*;

        #[test]
        fn reads_every_value_in_both_byte_orders() {
            for v in 1..=8 {
                for le in [false, true] {
                    let bytes = jpeg_with_orientation(v, le);
                    assert_eq!(orientation_from_bytes(&bytes), Orientation::from_exif(v));
                }
            }
        }

        #[test]
        fn six_means_rotate_270() {
            let bytes = jpeg_with_orientation(6, false);
            assert_eq!(orientation_from_bytes(&bytes), Orientation::Rotate270);
        }

        #[test]
        fn out_of_range_value_is_unspecified() {
            assert_eq!(
                orientation_from_bytes(&jpeg_with_orientation(9, false)),
                Orientation::Unspecified
            );
            assert_eq!(
                orientation_from_bytes(&jpeg_with_orientation(0, true)),
                Orientation::Unspecified
            );
        }

        #[test]
        fn garbage_is_unspecified() {
            assert_eq!(orientation_from_bytes(&[]), Orientation::Unspecified);
            assert_eq!(
                orientation_from_bytes(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
                Orientation::Unspecified
            );
            assert_eq!(orientation_from_bytes(&[0xFF, 0xD8, 0xFF]), Orientation::Unspecified);
        }

        #[test]
        fn every_truncation_is_unspecified() {
            let bytes = jpeg_with_orientation(3, false);
            let full = orientation_from_bytes(&bytes);
            assert_eq!(full, Orientation::Rotate180);
            // Pad, next-IFD offset and EOI follow the value: 8 bytes.
            let value_end = bytes.len() - 8;
            for cut in 0..value_end {
                assert_eq!(
                    orientation_from_bytes(&bytes[..cut]),
                    Orientation::Unspecified,
                    "cut at {cut}"
                );
            }
        }

        #[test]
        fn segment_with_bad_marker_stops_the_scan() {
            let mut bytes = jpeg_with_orientation(6, false);
            bytes[2] = 0x00;
            assert_eq!(orientation_from_bytes(&bytes), Orientation::Unspecified);
        }

        #[test]
        fn missing_exif_header_is_unspecified() {
            let mut bytes = jpeg_with_orientation(6, false);
            let app1 = 2 + 18;
            bytes[app1 + 4] = b'X';
            assert_eq!(orientation_from_bytes(&bytes), Orientation::Unspecified);
        }

        #[test]
        fn reads_from_any_reader() {
            let bytes = jpeg_with_orientation(8, true);
            let cursor = std::io::Cursor::new(bytes);
            assert_eq!(read_orientation(cursor), Orientation::Rotate90);
        }
    }

    mod enum_tests {
        use super::*;

        #[test]
        fn exif_values_round_trip() {
            for v in 1..=8u16 {
                assert_eq!(Orientation::from_exif(v).exif_value(), Some(v));
            }
            assert_eq!(Orientation::Unspecified.exif_value(), None);
        }

        #[test]
        fn display_dimensions_swap_for_quarter_turns() {
            assert_eq!(Orientation::Rotate270.display_dimensions(4, 3), (3, 4));
            assert_eq!(Orientation::FlipV.display_dimensions(4, 3), (4, 3));
            assert!(Orientation::Unspecified.is_identity());
        }
    }

    #[test]
    fn apply_orientation_restores_upright_image() {
        let mut upright = PixelBuffer::new(3, 2);
        upright.put_pixel(0, 0, [255, 0, 0, 255]);
        let config = ExecutionConfig::single_threaded();
        // A camera held sideways stores the image rotated 90 degrees clockwise.
        let stored = transform::rotate270(&upright, &config);
        let fixed = apply_orientation(&stored, Orientation::Rotate90, &config);
        assert_eq!(fixed, upright);
        assert_eq!(
            apply_orientation(&upright, Orientation::Unspecified, &config),
            upright
        );
    }
}
