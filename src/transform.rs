//! Clarke and Park transformations (along with their inverses).
//!
//! Clarke uses the equal-amplitude convention, so a balanced set of phase
//! quantities with peak `A` maps to a stationary vector of magnitude `A`.

use num_complex::Complex32;
use num_traits::Float;

pub const SQRT_3: f32 = 1.732_050_8;
const TWO_THIRDS: f32 = 2. / 3.;

/// Three-phase quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Abc {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl Abc {
    pub const fn new(a: f32, b: f32, c: f32) -> Self {
        Self { a, b, c }
    }

    /// Largest absolute phase value.
    pub fn peak(&self) -> f32 {
        self.a.abs().max(self.b.abs()).max(self.c.abs())
    }
}

/// Two-axis stationary (α, β) vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlphaBeta {
    pub alpha: f32,
    pub beta: f32,
}

impl AlphaBeta {
    pub const ZERO: Self = Self::new(0., 0.);

    pub const fn new(alpha: f32, beta: f32) -> Self {
        Self { alpha, beta }
    }

    pub fn magnitude(&self) -> f32 {
        self.alpha.hypot(self.beta)
    }
}

/// Two-axis rotating (d, q) vector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dq {
    pub d: f32,
    pub q: f32,
}

impl Dq {
    pub const ZERO: Self = Self::new(0., 0.);

    pub const fn new(d: f32, q: f32) -> Self {
        Self { d, q }
    }

    pub fn magnitude(&self) -> f32 {
        self.d.hypot(self.q)
    }
}

impl From<AlphaBeta> for Complex32 {
    fn from(v: AlphaBeta) -> Self {
        Complex32::new(v.alpha, v.beta)
    }
}

impl From<Complex32> for AlphaBeta {
    fn from(v: Complex32) -> Self {
        AlphaBeta::new(v.re, v.im)
    }
}

impl From<Dq> for Complex32 {
    fn from(v: Dq) -> Self {
        Complex32::new(v.d, v.q)
    }
}

impl From<Complex32> for Dq {
    fn from(v: Complex32) -> Self {
        Dq::new(v.re, v.im)
    }
}

/// Clarke transform (abc -> αβ).
pub fn clarke(abc: Abc) -> AlphaBeta {
    AlphaBeta {
        alpha: TWO_THIRDS * (abc.a - 0.5 * abc.b - 0.5 * abc.c),
        beta: TWO_THIRDS * (0.5 * SQRT_3 * abc.b - 0.5 * SQRT_3 * abc.c),
    }
}

/// Inverse Clarke transform (αβ -> abc).
pub fn inverse_clarke(ab: AlphaBeta) -> Abc {
    Abc {
        a: ab.alpha,
        b: -0.5 * ab.alpha + 0.5 * SQRT_3 * ab.beta,
        c: -0.5 * ab.alpha - 0.5 * SQRT_3 * ab.beta,
    }
}

/// Park transform (αβ -> dq) onto a frame at angle `theta`.
pub fn park(ab: AlphaBeta, theta: f32) -> Dq {
    (Complex32::from(ab) * Complex32::cis(-theta)).into()
}

/// Inverse Park transform (dq -> αβ) from a frame at angle `theta`.
pub fn inverse_park(dq: Dq, theta: f32) -> AlphaBeta {
    (Complex32::from(dq) * Complex32::cis(theta)).into()
}
