#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use pixelflow::engine::apply_ops;
use pixelflow::{Anchor, ExecutionConfig, Kernel, Operation, PixelBuffer};
use std::borrow::Cow;

#[derive(Arbitrary, Debug)]
struct OperationSeed {
    kind: u8,
    a: i32,
    b: i32,
    c: i32,
    d: i32,
}

fn build_image(data: &[u8]) -> PixelBuffer {
    let config = ExecutionConfig::new(2);
    if let Ok(img) = pixelflow::decode(data, &config) {
        if img.width() <= 256 && img.height() <= 256 {
            return img;
        }
    }

    let width = data.first().copied().unwrap_or(0) as u32 % 64 + 1;
    let height = data.get(1).copied().unwrap_or(0) as u32 % 64 + 1;
    let pixels = (0..(width * height * 4) as usize)
        .map(|i| data.get(i % data.len()).copied().unwrap_or(0))
        .collect();
    PixelBuffer::from_raw(width, height, pixels).unwrap_or_else(|_| PixelBuffer::new(1, 1))
}

fn kernel(seed: i32) -> Kernel {
    let names: Vec<&str> = Kernel::names().collect();
    names[seed.unsigned_abs() as usize % names.len()]
        .parse()
        .unwrap_or_default()
}

fn seeds_to_ops(seeds: Vec<OperationSeed>) -> Vec<Operation> {
    seeds
        .into_iter()
        .take(8)
        .map(|seed| match seed.kind % 12 {
            0 => Operation::Resize {
                width: Some(seed.a.clamp(0, 512) as u32),
                height: Some(seed.b.clamp(0, 512) as u32),
                kernel: kernel(seed.c),
            },
            1 => Operation::Crop {
                x: seed.a.max(0) as u32,
                y: seed.b.max(0) as u32,
                width: seed.c.max(0) as u32,
                height: seed.d.max(0) as u32,
            },
            2 => Operation::Rotate { degrees: seed.a },
            3 => Operation::RotateAngle {
                degrees: seed.a as f64 / 7.0,
                background: [0, 0, 0, 0],
            },
            4 => Operation::FlipH,
            5 => Operation::Transverse,
            6 => Operation::Blur {
                sigma: seed.a.clamp(-10, 80) as f64 / 10.0,
            },
            7 => Operation::Sharpen {
                sigma: seed.a.clamp(-10, 80) as f64 / 10.0,
            },
            8 => Operation::Brightness {
                percentage: seed.a.clamp(-200, 200) as f64,
            },
            9 => Operation::Hue {
                degrees: seed.b as f64,
            },
            10 => Operation::Fill {
                width: seed.a.clamp(0, 256) as u32,
                height: seed.b.clamp(0, 256) as u32,
                anchor: Anchor::BottomRight,
                kernel: kernel(seed.c),
            },
            _ => Operation::Convolve3x3 {
                kernel: [seed.a as f64, 1.0, -1.0, 0.0, seed.b as f64, 0.0, -1.0, 1.0, seed.c as f64],
                options: Default::default(),
            },
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seeds: Vec<OperationSeed> = match Vec::arbitrary(&mut unstructured) {
        Ok(v) => v,
        Err(_) => return,
    };

    let ops = seeds_to_ops(seeds);
    let img = build_image(data);
    // Invalid operations return errors; only panics matter here.
    let _ = apply_ops(Cow::Owned(img), &ops, &ExecutionConfig::new(3));
});
