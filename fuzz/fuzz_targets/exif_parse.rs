#![no_main]

//! Fuzz target for the EXIF orientation parser.
//! Must never panic; unreadable input maps to `Unspecified`.

use libfuzzer_sys::fuzz_target;
use pixelflow::{orientation_from_bytes, read_orientation};

fuzz_target!(|data: &[u8]| {
    let a = orientation_from_bytes(data);
    let b = read_orientation(data);
    assert_eq!(a, b);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(data);
    let _ = orientation_from_bytes(&jpeg);
});
