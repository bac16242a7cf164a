// Copyright (c) Interval Domain Contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

//! The target float format a `FloatBV` type carries (`exp_bits`,
//! `frac_bits`), and the correctly-directed rounding primitives the domain
//! uses to widen a bound outward when it crosses between float widths
//! (§4.1, §9 "Float widening").

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FloatFormatError {
    #[error("a float format needs at least 1 fraction bit, got {0}")]
    ZeroFracBits(u32),
    #[error("frac_bits {0} exceeds binary64's own mantissa width (52); widening to it would not be sound")]
    FracBitsTooWide(u32),
}

/// `(exp_bits, frac_bits)` of an IEEE-754-like binary float format. Values
/// are stored and manipulated internally as `f64` (binary64); this type
/// exists so that widening a bound can account for a *narrower* target
/// format without pretending the internal `f64` storage has that format's
/// precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloatFormat {
    pub exp_bits: u32,
    pub frac_bits: u32,
}

impl FloatFormat {
    /// IEEE-754 binary64 (`f64` itself): 11 exponent bits, 52 fraction bits.
    pub const BINARY64: FloatFormat = FloatFormat {
        exp_bits: 11,
        frac_bits: 52,
    };

    /// IEEE-754 binary32 (`f32`): 8 exponent bits, 23 fraction bits.
    pub const BINARY32: FloatFormat = FloatFormat {
        exp_bits: 8,
        frac_bits: 23,
    };

    pub fn new(exp_bits: u32, frac_bits: u32) -> Result<Self, FloatFormatError> {
        if frac_bits == 0 {
            return Err(FloatFormatError::ZeroFracBits(frac_bits));
        }
        if frac_bits > FloatFormat::BINARY64.frac_bits {
            return Err(FloatFormatError::FracBitsTooWide(frac_bits));
        }
        Ok(FloatFormat {
            exp_bits,
            frac_bits,
        })
    }

    /// At binary64 (the internal storage precision), this is exactly the
    /// adjacent representable `f64` and is computed with the standard
    /// bump-the-bit-pattern trick. For a narrower target format, the ULP at
    /// `value`'s magnitude in that format is coarser than `f64`'s own ULP;
    /// the result is still a sound enclosing bound (it moves at least as far
    /// as the true next-representable value of the narrower format would),
    /// just not always the tightest one.
    pub fn next_up(&self, value: f64) -> f64 {
        if value == 0.0 {
            return self.smallest_positive_subnormal_equivalent();
        }
        if self.frac_bits == FloatFormat::BINARY64.frac_bits {
            return next_f64_up(value);
        }
        value + self.ulp_at(value)
    }

    /// Symmetric: the previous representable value, moving toward `-∞`.
    pub fn next_down(&self, value: f64) -> f64 {
        if value == 0.0 {
            return -self.smallest_positive_subnormal_equivalent();
        }
        if self.frac_bits == FloatFormat::BINARY64.frac_bits {
            return next_f64_down(value);
        }
        value - self.ulp_at(value)
    }

    /// Unit in the last place of `self`'s format at the magnitude of
    /// `value`: `2^(exponent(value) - frac_bits)`.
    fn ulp_at(&self, value: f64) -> f64 {
        let exponent = value.abs().log2().floor();
        2f64.powf(exponent - f64::from(self.frac_bits))
    }

    fn smallest_positive_subnormal_equivalent(&self) -> f64 {
        2f64.powi(-(self.frac_bits as i32))
    }
}

fn next_f64_up(value: f64) -> f64 {
    debug_assert!(value.is_finite());
    let bits = value.to_bits();
    let next_bits = if value >= 0.0 { bits + 1 } else { bits - 1 };
    f64::from_bits(next_bits)
}

fn next_f64_down(value: f64) -> f64 {
    debug_assert!(value.is_finite());
    let bits = value.to_bits();
    let next_bits = if value > 0.0 { bits - 1 } else { bits + 1 };
    f64::from_bits(next_bits)
}
