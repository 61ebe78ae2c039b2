#![no_main]

//! Fuzz target for every output encoder, with and without an ICC profile.

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use pixelflow::{encode, OutputFormat, PixelBuffer, PngCompression};

#[derive(Arbitrary, Debug)]
struct EncodeSeed {
    format: u8,
    quality: u8,
    width: u8,
    height: u8,
    with_icc: bool,
}

fn build_image(data: &[u8], width: u8, height: u8) -> PixelBuffer {
    // Max 128x128 keeps each run cheap.
    let w = (width as u32 % 128).max(1);
    let h = (height as u32 % 128).max(1);
    let pixels = (0..(w * h * 4) as usize)
        .map(|i| data.get(i % data.len().max(1)).copied().unwrap_or(128))
        .collect();
    PixelBuffer::from_raw(w, h, pixels).unwrap_or_else(|_| PixelBuffer::new(1, 1))
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seed: EncodeSeed = match EncodeSeed::arbitrary(&mut unstructured) {
        Ok(s) => s,
        Err(_) => return,
    };

    let img = build_image(data, seed.width, seed.height);
    let format = match seed.format % 5 {
        0 => OutputFormat::Jpeg {
            quality: seed.quality.clamp(1, 100),
        },
        1 => OutputFormat::Png {
            compression: PngCompression::Fast,
        },
        2 => OutputFormat::Gif,
        3 => OutputFormat::Tiff,
        _ => OutputFormat::Bmp,
    };
    let icc = seed.with_icc.then_some(data);
    let _ = encode(&img, &format, icc);
});
