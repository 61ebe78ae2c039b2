#![no_main]

//! Fuzz target for ICC profile extraction and validation.
//! Exercises the JPEG and PNG container paths.

use libfuzzer_sys::fuzz_target;
use pixelflow::engine::extract_icc_profile;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let _ = extract_icc_profile(data);

    let mut jpeg_data = vec![0xFF, 0xD8];
    jpeg_data.extend_from_slice(data);
    let _ = extract_icc_profile(&jpeg_data);

    let mut png_data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png_data.extend_from_slice(data);
    let _ = extract_icc_profile(&png_data);
});
