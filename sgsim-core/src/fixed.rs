//! Fixed-point arithmetic for deterministic combat math.
//!
//! Initiative scores and damage settlement must replay bit-for-bit from a
//! command log, so battle formulas never touch `f32`/`f64`. Every value is an
//! `i64` scaled by [`Fixed::SCALE`]; products and quotients widen to `i128`.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

/// Fixed-point value with scale 10000 (1.0 → 10000, 0.25 → 2500).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Fixed(pub i64);

impl Fixed {
    /// Scale factor: 10000 = 1.0
    pub const SCALE: i64 = 10000;

    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(10000);
    pub const HALF: Fixed = Fixed(5000);

    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Fixed(raw)
    }

    /// Create from integer (e.g., 5 → 50_000)
    #[inline]
    pub const fn from_int(v: i64) -> Self {
        Fixed(v * Self::SCALE)
    }

    /// Exact `numerator / denominator` without an intermediate `Fixed` division.
    ///
    /// Returns ZERO when `denominator` is zero.
    #[inline]
    pub fn from_ratio(numerator: i64, denominator: i64) -> Self {
        if denominator == 0 {
            return Fixed::ZERO;
        }
        Fixed((numerator as i128 * Self::SCALE as i128 / denominator as i128) as i64)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Truncate toward zero.
    #[inline]
    pub const fn to_int(self) -> i64 {
        self.0 / Self::SCALE
    }

    /// Round to the nearest integer, halves away from zero.
    #[inline]
    pub const fn round_to_int(self) -> i64 {
        let half = Self::SCALE / 2;
        if self.0 >= 0 {
            (self.0 + half) / Self::SCALE
        } else {
            (self.0 - half) / Self::SCALE
        }
    }

    /// Display only. Never feed the result back into sim logic.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    #[inline]
    pub fn min(self, other: Fixed) -> Fixed {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn max(self, other: Fixed) -> Fixed {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    #[inline]
    pub fn clamp(self, lo: Fixed, hi: Fixed) -> Fixed {
        self.max(lo).min(hi)
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Fixed {
    type Output = Fixed;
    #[inline]
    fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0 + other.0)
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, other: Fixed) {
        self.0 += other.0;
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline]
    fn sub(self, other: Fixed) -> Fixed {
        Fixed(self.0 - other.0)
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, other: Fixed) {
        self.0 -= other.0;
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    #[inline]
    fn mul(self, other: Fixed) -> Fixed {
        Fixed((self.0 as i128 * other.0 as i128 / Fixed::SCALE as i128) as i64)
    }
}

impl Div for Fixed {
    type Output = Fixed;
    #[inline]
    fn div(self, other: Fixed) -> Fixed {
        if other.0 == 0 {
            return Fixed::ZERO;
        }
        Fixed((self.0 as i128 * Fixed::SCALE as i128 / other.0 as i128) as i64)
    }
}

impl std::fmt::Debug for Fixed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fixed({} = {})", self.0, self.to_f64())
    }
}

impl std::fmt::Display for Fixed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.to_f64())
    }
}
