// src/engine/kernels.rs
//
// Kernel library for the resampling engine.
//
// A kernel is a pure function of distance: `weight(d)` is maximal at 0
// and reaches 0 at `support()`. Weights are normalized by the resample
// plan, so kernels don't need to integrate to exactly 1.

use crate::error::ImagingError;
use std::f64::consts::PI;
use std::str::FromStr;

/// Window applied to `sinc` by [`Kernel::WindowedSinc`].
///
/// Each window is evaluated at `t = d / support`, `t` in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Lanczos,
    Hann,
    Hamming,
    Blackman,
    Bartlett,
    Welch,
    Cosine,
}

impl Window {
    fn eval(self, t: f64) -> f64 {
        match self {
            Self::Lanczos => sinc(t),
            Self::Hann => 0.5 + 0.5 * (PI * t).cos(),
            Self::Hamming => 0.54 + 0.46 * (PI * t).cos(),
            Self::Blackman => 0.42 + 0.5 * (PI * t).cos() + 0.08 * (2.0 * PI * t).cos(),
            Self::Bartlett => 1.0 - t.abs(),
            Self::Welch => 1.0 - t * t,
            Self::Cosine => (PI * t / 2.0).cos(),
        }
    }
}

/// Default support for windowed-sinc kernels.
pub const SINC_SUPPORT: f64 = 3.0;

/// Largest support [`Kernel::validate`] accepts.
pub const MAX_SUPPORT: f64 = 64.0;

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    /// Point sampling. Resize takes a dedicated path for it.
    Nearest,
    Box,
    Linear,
    /// BC-spline family (Mitchell-Netravali parameterization).
    Cubic { b: f64, c: f64 },
    Gaussian { sigma: f64 },
    WindowedSinc { window: Window, support: f64 },
}

impl Kernel {
    pub const HERMITE: Kernel = Kernel::Cubic { b: 0.0, c: 0.0 };
    pub const MITCHELL_NETRAVALI: Kernel = Kernel::Cubic {
        b: 1.0 / 3.0,
        c: 1.0 / 3.0,
    };
    pub const CATMULL_ROM: Kernel = Kernel::Cubic { b: 0.0, c: 0.5 };
    pub const BSPLINE: Kernel = Kernel::Cubic { b: 1.0, c: 0.0 };
    pub const GAUSSIAN: Kernel = Kernel::Gaussian { sigma: 0.5 };
    pub const LANCZOS: Kernel = Kernel::windowed(Window::Lanczos);

    /// Windowed sinc with the default support.
    pub const fn windowed(window: Window) -> Kernel {
        Kernel::WindowedSinc {
            window,
            support: SINC_SUPPORT,
        }
    }

    /// Half-width of the non-zero region.
    pub fn support(&self) -> f64 {
        match *self {
            Self::Nearest | Self::Box => 0.5,
            Self::Linear => 1.0,
            Self::Cubic { .. } => 2.0,
            Self::Gaussian { sigma } => 4.0 * sigma,
            Self::WindowedSinc { support, .. } => support,
        }
    }

    /// Weight at signed distance `d`; zero outside the support.
    pub fn weight(&self, d: f64) -> f64 {
        let x = d.abs();
        match *self {
            Self::Nearest => {
                if x < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Box => {
                if x <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Linear => {
                if x < 1.0 {
                    1.0 - x
                } else {
                    0.0
                }
            }
            Self::Cubic { b, c } => bc_spline(x, b, c),
            Self::Gaussian { sigma } => {
                if x < 4.0 * sigma {
                    (-(x * x) / (2.0 * sigma * sigma)).exp()
                } else {
                    0.0
                }
            }
            Self::WindowedSinc { window, support } => {
                if x < support {
                    sinc(x) * window.eval(x / support)
                } else {
                    0.0
                }
            }
        }
    }

    /// Canonical lowercase name, when the kernel has one.
    pub fn name(&self) -> Option<&'static str> {
        NAMED.iter().find(|(_, k)| k == self).map(|(n, _)| *n)
    }

    /// Every name `from_str` accepts.
    pub fn names() -> impl Iterator<Item = &'static str> {
        NAMED.iter().map(|(n, _)| *n)
    }

    /// Check hand-built parameters: every field finite and the support in
    /// `(0, MAX_SUPPORT]`. Named kernels always pass.
    pub fn validate(&self) -> Result<(), ImagingError> {
        let finite = match *self {
            Self::Cubic { b, c } => b.is_finite() && c.is_finite(),
            _ => true,
        };
        let support = self.support();
        if finite && support > 0.0 && support <= MAX_SUPPORT {
            return Ok(());
        }
        Err(ImagingError::invalid_argument(
            "kernel",
            format!("{self:?}"),
            format!("parameters must be finite with support in (0, {MAX_SUPPORT}]"),
        ))
    }
}

const NAMED: [(&str, Kernel); 15] = [
    ("nearest", Kernel::Nearest),
    ("box", Kernel::Box),
    ("linear", Kernel::Linear),
    ("hermite", Kernel::HERMITE),
    ("mitchellnetravali", Kernel::MITCHELL_NETRAVALI),
    ("catmullrom", Kernel::CATMULL_ROM),
    ("bspline", Kernel::BSPLINE),
    ("gaussian", Kernel::GAUSSIAN),
    ("lanczos", Kernel::LANCZOS),
    ("hann", Kernel::windowed(Window::Hann)),
    ("hamming", Kernel::windowed(Window::Hamming)),
    ("blackman", Kernel::windowed(Window::Blackman)),
    ("bartlett", Kernel::windowed(Window::Bartlett)),
    ("welch", Kernel::windowed(Window::Welch)),
    ("cosine", Kernel::windowed(Window::Cosine)),
];

impl FromStr for Kernel {
    type Err = ImagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        NAMED
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, k)| *k)
            .ok_or_else(|| ImagingError::unknown_kernel(s.to_string()))
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::LANCZOS
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

fn bc_spline(x: f64, b: f64, c: f64) -> f64 {
    if x < 1.0 {
        ((12.0 - 9.0 * b - 6.0 * c) * x * x * x + (-18.0 + 12.0 * b + 6.0 * c) * x * x + (6.0 - 2.0 * b))
            / 6.0
    } else if x < 2.0 {
        ((-b - 6.0 * c) * x * x * x + (6.0 * b + 30.0 * c) * x * x + (-12.0 * b - 48.0 * c) * x
            + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}
