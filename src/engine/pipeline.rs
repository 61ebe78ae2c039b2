// src/engine/pipeline.rs
//
// Pipeline operations: validation, optimize_ops, apply_ops

use crate::engine::adjust::{
    adjust_brightness, adjust_contrast, adjust_gamma, adjust_hue, adjust_saturation,
    adjust_sigmoid, grayscale, invert,
};
use crate::engine::blur::{blur, sharpen};
use crate::engine::buffer::{PixelBuffer, Rect};
use crate::engine::compose::{crop, crop_anchor, overlay, overlay_center};
use crate::engine::convolve::{convolve3x3, convolve5x5};
use crate::engine::orientation::apply_orientation;
use crate::engine::pool::ExecutionConfig;
use crate::engine::resample::{fill, fit, resize, target_dimensions};
use crate::engine::transform::{
    flip_h, flip_v, rotate, rotate180, rotate270, rotate90, transpose, transverse,
};
use crate::error::ImagingError;
use crate::ops::Operation;
use std::borrow::Cow;
use tracing::{debug, trace};

// Always ImagingError, so pipeline errors keep their UserError category.
type PipelineResult<T> = std::result::Result<T, ImagingError>;

/// Resolve optional resize dimensions against the current size. A missing
/// dimension follows the aspect ratio; both missing keeps the size.
pub fn calc_resize_dimensions(
    orig_width: u32,
    orig_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    match (width, height) {
        (None, None) => (orig_width, orig_height),
        (w, h) => target_dimensions(orig_width, orig_height, w.unwrap_or(0), h.unwrap_or(0)),
    }
}

fn finite(name: &'static str, value: f64) -> PipelineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ImagingError::invalid_argument(name, value.to_string(), "must be finite"))
    }
}

fn percentage(name: &'static str, value: f64) -> PipelineResult<()> {
    finite(name, value)?;
    if !(-100.0..=100.0).contains(&value) {
        return Err(ImagingError::invalid_argument(
            name,
            value.to_string(),
            "must be between -100 and 100",
        ));
    }
    Ok(())
}

/// Check the parameters of a single operation. Bounds that depend on the
/// image size are checked when the operation runs.
pub fn validate_op(op: &Operation) -> PipelineResult<()> {
    match op {
        Operation::Resize {
            width,
            height,
            kernel,
        } => {
            if (width.is_none() && height.is_none()) || *width == Some(0) || *height == Some(0) {
                return Err(ImagingError::invalid_resize_dimensions(*width, *height));
            }
            kernel.validate()?;
        }
        Operation::Fit {
            max_width: w,
            max_height: h,
            kernel,
        }
        | Operation::Fill {
            width: w,
            height: h,
            kernel,
            ..
        } => {
            if *w == 0 || *h == 0 {
                return Err(ImagingError::invalid_resize_dimensions(Some(*w), Some(*h)));
            }
            kernel.validate()?;
        }
        Operation::Crop { width, height, .. } | Operation::CropAnchor { width, height, .. } => {
            if *width == 0 || *height == 0 {
                return Err(ImagingError::invalid_crop_dimensions(*width, *height));
            }
        }
        Operation::Rotate { degrees } => {
            if degrees % 90 != 0 {
                return Err(ImagingError::invalid_rotation_angle(*degrees));
            }
        }
        Operation::RotateAngle { degrees, .. } => finite("degrees", *degrees)?,
        Operation::Blur { sigma } | Operation::Sharpen { sigma } => {
            finite("sigma", *sigma)?;
            if *sigma < 0.0 {
                return Err(ImagingError::invalid_argument(
                    "sigma",
                    sigma.to_string(),
                    "must not be negative",
                ));
            }
        }
        Operation::Brightness { percentage: p } => percentage("brightness", *p)?,
        Operation::Contrast { percentage: p } => percentage("contrast", *p)?,
        Operation::Saturation { percentage: p } => percentage("saturation", *p)?,
        Operation::Hue { degrees } => finite("hue", *degrees)?,
        Operation::Gamma { gamma } => {
            finite("gamma", *gamma)?;
            if *gamma <= 0.0 {
                return Err(ImagingError::invalid_argument(
                    "gamma",
                    gamma.to_string(),
                    "must be positive",
                ));
            }
        }
        Operation::Sigmoid { midpoint, factor } => {
            finite("factor", *factor)?;
            finite("midpoint", *midpoint)?;
            if !(0.0..=1.0).contains(midpoint) {
                return Err(ImagingError::invalid_argument(
                    "midpoint",
                    midpoint.to_string(),
                    "must be between 0 and 1",
                ));
            }
        }
        Operation::Convolve3x3 { kernel, .. } => {
            kernel.iter().try_for_each(|&k| finite("kernel", k))?
        }
        Operation::Convolve5x5 { kernel, .. } => {
            kernel.iter().try_for_each(|&k| finite("kernel", k))?
        }
        Operation::Overlay { opacity, .. } => finite("opacity", *opacity)?,
        Operation::FlipH
        | Operation::FlipV
        | Operation::Transpose
        | Operation::Transverse
        | Operation::Orient { .. }
        | Operation::Grayscale
        | Operation::Invert => {}
    }
    Ok(())
}

pub fn validate_ops(ops: &[Operation]) -> PipelineResult<()> {
    ops.iter().try_for_each(validate_op)
}

/// True when `op` leaves every pixel unchanged.
fn is_identity(op: &Operation) -> bool {
    match op {
        Operation::Rotate { degrees } => degrees % 360 == 0,
        Operation::RotateAngle { degrees, .. } => degrees % 360.0 == 0.0,
        Operation::Blur { sigma } | Operation::Sharpen { sigma } => *sigma <= 0.0,
        Operation::Brightness { percentage }
        | Operation::Contrast { percentage }
        | Operation::Saturation { percentage } => *percentage == 0.0,
        Operation::Hue { degrees } => degrees % 360.0 == 0.0,
        Operation::Gamma { gamma } => *gamma == 1.0,
        Operation::Sigmoid { factor, .. } => *factor == 0.0,
        Operation::Orient { orientation } => orientation.is_identity(),
        Operation::Overlay { opacity, .. } => *opacity <= 0.0,
        _ => false,
    }
}

/// Rewrite a validated op list into a cheaper equivalent:
/// - identity operations are dropped
/// - consecutive right-angle rotations are folded into one
/// - adjacent self-inverse pairs (two FlipH, two FlipV, two Transpose,
///   two Transverse) cancel
/// - a resize followed by a resize to explicit dimensions keeps only the
///   second
pub fn optimize_ops(ops: &[Operation]) -> Vec<Operation> {
    let mut optimized: Vec<Operation> = Vec::with_capacity(ops.len());

    for op in ops.iter().filter(|op| !is_identity(op)) {
        match (optimized.last(), op) {
            (Some(Operation::Rotate { degrees: a }), Operation::Rotate { degrees: b }) => {
                let folded = (a + b).rem_euclid(360);
                optimized.pop();
                if folded != 0 {
                    optimized.push(Operation::Rotate { degrees: folded });
                }
            }
            (Some(Operation::FlipH), Operation::FlipH)
            | (Some(Operation::FlipV), Operation::FlipV)
            | (Some(Operation::Transpose), Operation::Transpose)
            | (Some(Operation::Transverse), Operation::Transverse) => {
                optimized.pop();
            }
            (
                Some(Operation::Resize { .. }),
                Operation::Resize {
                    width: Some(_),
                    height: Some(_),
                    ..
                },
            ) => {
                optimized.pop();
                optimized.push(op.clone());
            }
            _ => optimized.push(op.clone()),
        }
    }

    if optimized.len() != ops.len() {
        debug!(
            target: "pixelflow::pipeline",
            before = ops.len(),
            after = optimized.len(),
            "optimized operations"
        );
    }
    optimized
}

/// Run one validated operation.
pub fn apply_op(
    img: &PixelBuffer,
    op: &Operation,
    config: &ExecutionConfig,
) -> PipelineResult<PixelBuffer> {
    let (w, h) = img.dimensions();
    trace!(target: "pixelflow::pipeline", op = op.name(), width = w, height = h, "apply");

    let out = match op {
        Operation::Resize {
            width,
            height,
            kernel,
        } => {
            let (tw, th) = calc_resize_dimensions(w, h, *width, *height);
            resize(img, tw, th, kernel, config)
        }
        Operation::Fit {
            max_width,
            max_height,
            kernel,
        } => fit(img, *max_width, *max_height, kernel, config),
        Operation::Fill {
            width,
            height,
            anchor,
            kernel,
        } => fill(img, *width, *height, *anchor, kernel, config),
        Operation::Crop {
            x,
            y,
            width,
            height,
        } => {
            let fits = x.checked_add(*width).is_some_and(|r| r <= w)
                && y.checked_add(*height).is_some_and(|b| b <= h);
            if !fits {
                return Err(ImagingError::invalid_crop_bounds(*x, *y, *width, *height, w, h));
            }
            crop(img, Rect::from_xywh(*x as i32, *y as i32, *width, *height), config)
        }
        Operation::CropAnchor {
            width,
            height,
            anchor,
        } => {
            if *width > w || *height > h {
                return Err(ImagingError::invalid_crop_bounds(0, 0, *width, *height, w, h));
            }
            crop_anchor(img, *width, *height, *anchor, config)
        }
        Operation::Rotate { degrees } => match degrees.rem_euclid(360) {
            90 => rotate90(img, config),
            180 => rotate180(img, config),
            270 => rotate270(img, config),
            0 => img.clone(),
            _ => return Err(ImagingError::invalid_rotation_angle(*degrees)),
        },
        Operation::RotateAngle {
            degrees,
            background,
        } => rotate(img, *degrees, *background, config),
        Operation::FlipH => flip_h(img, config),
        Operation::FlipV => flip_v(img, config),
        Operation::Transpose => transpose(img, config),
        Operation::Transverse => transverse(img, config),
        Operation::Orient { orientation } => apply_orientation(img, *orientation, config),
        Operation::Blur { sigma } => blur(img, *sigma, config),
        Operation::Sharpen { sigma } => sharpen(img, *sigma, config),
        Operation::Brightness { percentage } => adjust_brightness(img, *percentage, config),
        Operation::Contrast { percentage } => adjust_contrast(img, *percentage, config),
        Operation::Gamma { gamma } => adjust_gamma(img, *gamma, config),
        Operation::Saturation { percentage } => adjust_saturation(img, *percentage, config),
        Operation::Hue { degrees } => adjust_hue(img, *degrees, config),
        Operation::Sigmoid { midpoint, factor } => adjust_sigmoid(img, *midpoint, *factor, config),
        Operation::Grayscale => grayscale(img, config),
        Operation::Invert => invert(img, config),
        Operation::Convolve3x3 { kernel, options } => convolve3x3(img, *kernel, options, config),
        Operation::Convolve5x5 { kernel, options } => convolve5x5(img, *kernel, options, config),
        Operation::Overlay {
            image,
            position: Some(pos),
            opacity,
        } => overlay(img, &**image, *pos, *opacity, config),
        Operation::Overlay {
            image,
            position: None,
            opacity,
        } => overlay_center(img, &**image, *opacity, config),
    };
    Ok(out)
}

/// Apply all queued operations.
///
/// The list is validated, then optimized, then run front to back. With
/// nothing left to do the input comes back as-is: a borrowed image stays
/// borrowed and no pixels are copied.
pub fn apply_ops<'a>(
    img: Cow<'a, PixelBuffer>,
    ops: &[Operation],
    config: &ExecutionConfig,
) -> PipelineResult<Cow<'a, PixelBuffer>> {
    validate_ops(ops)?;
    let ops = optimize_ops(ops);
    if ops.is_empty() {
        return Ok(img);
    }

    let mut current = apply_op(&img, &ops[0], config)?;
    for op in &ops[1..] {
        current = apply_op(&current, op, config)?;
    }
    Ok(Cow::Owned(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compose::Anchor;
    use crate::engine::kernels::Kernel;
    use crate::engine::orientation::Orientation;
    use std::sync::Arc;

    fn cfg() -> ExecutionConfig {
        ExecutionConfig::new(3)
    }

    fn numbered(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, [(y * w + x) as u8, x as u8, y as u8, 255]);
            }
        }
        buf
    }

    fn run(img: &PixelBuffer, ops: &[Operation]) -> PipelineResult<PixelBuffer> {
        apply_ops(Cow::Borrowed(img), ops, &cfg()).map(Cow::into_owned)
    }

    mod resize_calc_tests {
        use super::*;

        #[test]
        fn test_both_dimensions_specified() {
            assert_eq!(calc_resize_dimensions(1000, 800, Some(500), Some(300)), (500, 300));
        }

        #[test]
        fn test_width_only_maintains_aspect_ratio() {
            assert_eq!(calc_resize_dimensions(1000, 800, Some(500), None), (500, 400));
        }

        #[test]
        fn test_height_only_maintains_aspect_ratio() {
            assert_eq!(calc_resize_dimensions(1000, 800, None, Some(400)), (500, 400));
        }

        #[test]
        fn test_none_returns_original() {
            assert_eq!(calc_resize_dimensions(1000, 800, None, None), (1000, 800));
        }

        #[test]
        fn test_rounding_behavior() {
            assert_eq!(calc_resize_dimensions(3, 2, Some(2), None), (2, 1));
            assert_eq!(calc_resize_dimensions(1000, 1, Some(10), None), (10, 1));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_resize_without_dimensions() {
            let err = validate_op(&Operation::Resize {
                width: None,
                height: None,
                kernel: Kernel::default(),
            })
            .unwrap_err();
            assert!(matches!(err, ImagingError::InvalidResizeDimensions { .. }));
        }

        #[test]
        fn test_zero_crop() {
            let err = validate_op(&Operation::Crop {
                x: 0,
                y: 0,
                width: 0,
                height: 5,
            })
            .unwrap_err();
            assert!(matches!(err, ImagingError::InvalidCropDimensions { .. }));
        }

        #[test]
        fn test_odd_rotation() {
            let err = validate_op(&Operation::Rotate { degrees: 45 }).unwrap_err();
            assert!(matches!(err, ImagingError::InvalidRotationAngle { degrees: 45 }));
            assert!(validate_op(&Operation::Rotate { degrees: -270 }).is_ok());
        }

        #[test]
        fn test_non_finite_arguments() {
            for op in [
                Operation::Blur { sigma: f64::NAN },
                Operation::Gamma { gamma: 0.0 },
                Operation::Brightness { percentage: 150.0 },
                Operation::Sigmoid {
                    midpoint: 2.0,
                    factor: 3.0,
                },
                Operation::RotateAngle {
                    degrees: f64::INFINITY,
                    background: [0; 4],
                },
            ] {
                let err = validate_op(&op).unwrap_err();
                assert!(matches!(err, ImagingError::InvalidArgument { .. }), "{op:?}");
            }
        }

        #[test]
        fn test_hand_built_kernel_rejected() {
            let bad = Kernel::Gaussian { sigma: -1.0 };
            for op in [
                Operation::Resize {
                    width: Some(4),
                    height: None,
                    kernel: bad,
                },
                Operation::Fit {
                    max_width: 4,
                    max_height: 4,
                    kernel: bad,
                },
                Operation::Fill {
                    width: 4,
                    height: 4,
                    anchor: Anchor::Center,
                    kernel: bad,
                },
            ] {
                let err = run(&numbered(8, 8), &[op.clone()]).unwrap_err();
                assert!(matches!(err, ImagingError::InvalidArgument { .. }), "{op:?}");
            }
        }

        #[test]
        fn test_crop_out_of_bounds_at_run_time() {
            let img = numbered(4, 4);
            let err = run(
                &img,
                &[Operation::Crop {
                    x: 2,
                    y: 0,
                    width: 3,
                    height: 1,
                }],
            )
            .unwrap_err();
            assert!(matches!(err, ImagingError::InvalidCropBounds { .. }));
        }

        #[test]
        fn test_crop_bounds_follow_earlier_resize() {
            let img = numbered(8, 8);
            let ops = [
                Operation::Resize {
                    width: Some(4),
                    height: None,
                    kernel: Kernel::Box,
                },
                Operation::Crop {
                    x: 0,
                    y: 0,
                    width: 5,
                    height: 5,
                },
            ];
            assert!(matches!(
                run(&img, &ops),
                Err(ImagingError::InvalidCropBounds { img_width: 4, .. })
            ));
        }
    }

    mod optimize_tests {
        use super::*;

        #[test]
        fn test_rotations_fold() {
            let ops = [
                Operation::Rotate { degrees: 90 },
                Operation::Rotate { degrees: 180 },
            ];
            assert_eq!(optimize_ops(&ops), vec![Operation::Rotate { degrees: 270 }]);
        }

        #[test]
        fn test_full_turn_disappears() {
            let ops = [
                Operation::Rotate { degrees: 90 },
                Operation::Rotate { degrees: 270 },
                Operation::Grayscale,
            ];
            assert_eq!(optimize_ops(&ops), vec![Operation::Grayscale]);
        }

        #[test]
        fn test_flip_pairs_cancel() {
            let ops = [
                Operation::FlipH,
                Operation::FlipV,
                Operation::FlipV,
                Operation::FlipH,
                Operation::Invert,
            ];
            assert_eq!(optimize_ops(&ops), vec![Operation::Invert]);
        }

        #[test]
        fn test_identities_dropped() {
            let ops = [
                Operation::Blur { sigma: 0.0 },
                Operation::Brightness { percentage: 0.0 },
                Operation::Gamma { gamma: 1.0 },
                Operation::Hue { degrees: 720.0 },
                Operation::Orient {
                    orientation: Orientation::Normal,
                },
                Operation::Rotate { degrees: 360 },
            ];
            assert!(optimize_ops(&ops).is_empty());
        }

        #[test]
        fn test_resize_superseded_by_explicit_resize() {
            let last = Operation::Resize {
                width: Some(10),
                height: Some(10),
                kernel: Kernel::default(),
            };
            let ops = [
                Operation::Resize {
                    width: Some(50),
                    height: None,
                    kernel: Kernel::default(),
                },
                last.clone(),
            ];
            assert_eq!(optimize_ops(&ops), vec![last]);
        }

        #[test]
        fn test_optimized_and_plain_agree() {
            let img = numbered(5, 3);
            let ops = [
                Operation::Rotate { degrees: 90 },
                Operation::FlipH,
                Operation::FlipH,
                Operation::Rotate { degrees: 90 },
                Operation::Transpose,
            ];
            let mut plain = img.clone();
            for op in &ops {
                plain = apply_op(&plain, op, &cfg()).unwrap();
            }
            assert_eq!(run(&img, &ops).unwrap(), plain);
        }
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn test_no_ops_borrows() {
            let img = numbered(2, 2);
            let out = apply_ops(Cow::Borrowed(&img), &[], &cfg()).unwrap();
            assert!(matches!(out, Cow::Borrowed(_)));
        }

        #[test]
        fn test_identity_only_borrows() {
            let img = numbered(2, 2);
            let out = apply_ops(Cow::Borrowed(&img), &[Operation::Sharpen { sigma: 0.0 }], &cfg())
                .unwrap();
            assert!(matches!(out, Cow::Borrowed(_)));
        }

        #[test]
        fn test_chain() {
            let img = numbered(6, 4);
            let out = run(
                &img,
                &[
                    Operation::Crop {
                        x: 1,
                        y: 1,
                        width: 4,
                        height: 2,
                    },
                    Operation::Rotate { degrees: 90 },
                    Operation::Fill {
                        width: 1,
                        height: 2,
                        anchor: Anchor::Center,
                        kernel: Kernel::Nearest,
                    },
                ],
            )
            .unwrap();
            assert_eq!(out.dimensions(), (1, 2));
        }

        #[test]
        fn test_overlay_centered() {
            let bg = PixelBuffer::filled(3, 3, [0, 0, 0, 255]);
            let fg = Arc::new(PixelBuffer::filled(1, 1, [255, 255, 255, 255]));
            let out = run(
                &bg,
                &[Operation::Overlay {
                    image: fg,
                    position: None,
                    opacity: 1.0,
                }],
            )
            .unwrap();
            assert_eq!(out.pixel(1, 1), [255, 255, 255, 255]);
            assert_eq!(out.pixel(0, 0), [0, 0, 0, 255]);
        }

        #[test]
        fn test_crop_anchor_too_large() {
            let img = numbered(3, 3);
            let err = run(
                &img,
                &[Operation::CropAnchor {
                    width: 4,
                    height: 1,
                    anchor: Anchor::TopLeft,
                }],
            )
            .unwrap_err();
            assert!(matches!(err, ImagingError::InvalidCropBounds { .. }));
        }
    }
}
