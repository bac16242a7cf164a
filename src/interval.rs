// Copyright (c) Interval Domain Contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

//! Numeric interval primitives (§3.2, §4.1): an integer interval over
//! arbitrary-precision bounds and a real interval over `f64` bounds, each
//! with the lattice operations and one-sided tightenings the environment
//! (`crate::environment`) builds transfer functions out of.

use log_derive::logfn_inputs;
use rug::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::float_format::FloatFormat;

/// `(lower_set, lower, upper_set, upper)` collapsed into `Option` bounds:
/// `None` on a side means that side is unconstrained (`-∞`/`+∞`). Bottom is
/// represented structurally, the same way the original does: both bounds set
/// with `lower > upper`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IntInterval {
    lower: Option<Integer>,
    upper: Option<Integer>,
}

impl fmt::Display for IntInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return f.write_str("[bottom]");
        }
        match (&self.lower, &self.upper) {
            (None, None) => f.write_str("[..]"),
            (Some(l), None) => write!(f, "[{l}..]"),
            (None, Some(u)) => write!(f, "[..{u}]"),
            (Some(l), Some(u)) => write!(f, "[{l}..{u}]"),
        }
    }
}

impl IntInterval {
    pub fn top() -> Self {
        IntInterval {
            lower: None,
            upper: None,
        }
    }

    pub fn bottom() -> Self {
        IntInterval {
            lower: Some(Integer::from(1)),
            upper: Some(Integer::from(0)),
        }
    }

    pub fn singleton(value: Integer) -> Self {
        IntInterval {
            lower: Some(value.clone()),
            upper: Some(value),
        }
    }

    pub fn bounded(lower: Integer, upper: Integer) -> Self {
        IntInterval {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    #[logfn_inputs(Trace)]
    pub fn is_bottom(&self) -> bool {
        matches!((&self.lower, &self.upper), (Some(l), Some(u)) if l > u)
    }

    pub fn is_top(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    pub fn is_singleton(&self) -> bool {
        matches!((&self.lower, &self.upper), (Some(l), Some(u)) if l == u)
    }

    pub fn lower(&self) -> Option<&Integer> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Integer> {
        self.upper.as_ref()
    }

    /// Intersects the upper bound with `c`: `upper <- min(upper, c)`.
    #[logfn_inputs(Trace)]
    pub fn make_le_than(&mut self, c: Integer) {
        self.upper = Some(match self.upper.take() {
            Some(u) => u.min(c),
            None => c,
        });
    }

    /// Intersects the lower bound with `c`: `lower <- max(lower, c)`.
    #[logfn_inputs(Trace)]
    pub fn make_ge_than(&mut self, c: Integer) {
        self.lower = Some(match self.lower.take() {
            Some(l) => l.max(c),
            None => c,
        });
    }

    /// Component-wise weakening: a bound survives only if present on both
    /// sides, and the looser of the two is kept.
    #[logfn_inputs(Trace)]
    pub fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let lower = match (&self.lower, &other.lower) {
            (Some(a), Some(b)) => Some(a.clone().min(b.clone())),
            _ => None,
        };
        let upper = match (&self.upper, &other.upper) {
            (Some(a), Some(b)) => Some(a.clone().max(b.clone())),
            _ => None,
        };
        IntInterval { lower, upper }
    }

    /// Implements the transfer for `a <= b`: strengthens both operands in
    /// place and preserves soundness of that constraint. May drive either
    /// (or both) to bottom.
    #[logfn_inputs(Trace)]
    pub fn contract_interval_le(a: &mut IntInterval, b: &mut IntInterval) {
        if let Some(b_upper) = b.upper.clone() {
            a.make_le_than(b_upper);
        }
        if let Some(a_lower) = a.lower.clone() {
            b.make_ge_than(a_lower);
        }
    }
}

/// The real-valued twin of `IntInterval`. Bounds are `f64`; the widening
/// operators round a value outward to the nearest representable neighbour of
/// a possibly-different (possibly narrower) float format, so a bound
/// computed at one precision remains a sound enclosure when re-emitted at
/// another (§4.1, §4.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RealInterval {
    lower: Option<f64>,
    upper: Option<f64>,
}

impl PartialEq for RealInterval {
    fn eq(&self, other: &Self) -> bool {
        fn eq_bound(a: Option<f64>, b: Option<f64>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(x), Some(y)) => x.to_bits() == y.to_bits(),
                _ => false,
            }
        }
        eq_bound(self.lower, other.lower) && eq_bound(self.upper, other.upper)
    }
}

impl fmt::Display for RealInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return f.write_str("[bottom]");
        }
        match (self.lower, self.upper) {
            (None, None) => f.write_str("[..]"),
            (Some(l), None) => write!(f, "[{l}..]"),
            (None, Some(u)) => write!(f, "[..{u}]"),
            (Some(l), Some(u)) => write!(f, "[{l}..{u}]"),
        }
    }
}

impl RealInterval {
    pub fn top() -> Self {
        RealInterval {
            lower: None,
            upper: None,
        }
    }

    /// Bottom is a bound pair that can never order correctly: `NaN` compares
    /// false against everything, including itself, so `lower > upper` is
    /// unusable here; instead bottom is its own explicit state.
    pub fn bottom() -> Self {
        RealInterval {
            lower: Some(f64::NAN),
            upper: Some(f64::NAN),
        }
    }

    pub fn singleton(value: f64) -> Self {
        RealInterval {
            lower: Some(value),
            upper: Some(value),
        }
    }

    pub fn bounded(lower: f64, upper: f64) -> Self {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Self::bottom();
        }
        RealInterval {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    pub fn is_bottom(&self) -> bool {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) => l.is_nan() || u.is_nan() || l > u,
            _ => false,
        }
    }

    pub fn is_top(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    pub fn lower(&self) -> Option<f64> {
        self.lower
    }

    pub fn upper(&self) -> Option<f64> {
        self.upper
    }

    #[logfn_inputs(Trace)]
    pub fn make_le_than(&mut self, c: f64) {
        if self.is_bottom() {
            return;
        }
        self.upper = Some(match self.upper {
            Some(u) => u.min(c),
            None => c,
        });
        if matches!(self.lower, Some(l) if l > self.upper.unwrap()) {
            *self = Self::bottom();
        }
    }

    #[logfn_inputs(Trace)]
    pub fn make_ge_than(&mut self, c: f64) {
        if self.is_bottom() {
            return;
        }
        self.lower = Some(match self.lower {
            Some(l) => l.max(c),
            None => c,
        });
        if matches!(self.upper, Some(u) if u < self.lower.unwrap()) {
            *self = Self::bottom();
        }
    }

    #[logfn_inputs(Trace)]
    pub fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let lower = match (self.lower, other.lower) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        let upper = match (self.upper, other.upper) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        RealInterval { lower, upper }
    }

    #[logfn_inputs(Trace)]
    pub fn contract_interval_le(a: &mut RealInterval, b: &mut RealInterval) {
        if let Some(b_upper) = b.upper {
            a.make_le_than(b_upper);
        }
        if let Some(a_lower) = a.lower {
            b.make_ge_than(a_lower);
        }
    }

    /// Rounds `value` to the nearest representable value of `format` that is
    /// `>= value`, i.e. away from `value` in the `+∞` direction. Used when a
    /// strict `<` comparison against a float constant is turned into a
    /// non-strict one, and when emitting an upper bound (§4.1, §4.2). `NaN`
    /// and infinities are returned unchanged: they are sentinels, not values
    /// to nudge, and the caller is expected to treat them as havoc-preserving
    /// rather than tightening (§8 Boundaries).
    pub fn increment_toward_plus_infinity(value: f64, format: FloatFormat) -> f64 {
        if !value.is_finite() {
            return value;
        }
        format.next_up(value)
    }

    /// Symmetric: rounds toward `-∞`.
    pub fn decrement_toward_minus_infinity(value: f64, format: FloatFormat) -> f64 {
        if !value.is_finite() {
            return value;
        }
        format.next_down(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_le_than_tightens_upper_bound() {
        crate::init_test_logging();
        let mut i = IntInterval::bounded(Integer::from(-2), Integer::from(10));
        i.make_le_than(Integer::from(6));
        assert_eq!(i, IntInterval::bounded(Integer::from(-2), Integer::from(6)));
    }

    #[test]
    fn tightening_past_bounds_yields_bottom() {
        let mut i = IntInterval::bounded(Integer::from(0), Integer::from(10));
        i.make_ge_than(Integer::from(20));
        assert!(i.is_bottom());
    }

    #[test]
    fn join_weakens_to_the_outer_bounds() {
        let a = IntInterval::bounded(Integer::from(0), Integer::from(3));
        let b = IntInterval::bounded(Integer::from(5), Integer::from(7));
        assert_eq!(
            a.join(&b),
            IntInterval::bounded(Integer::from(0), Integer::from(7))
        );
    }

    #[test]
    fn join_top_absorbs() {
        let a = IntInterval::bounded(Integer::from(0), Integer::from(3));
        assert_eq!(a.join(&IntInterval::top()), IntInterval::top());
    }

    #[test]
    fn contract_interval_le_strengthens_both_sides() {
        let mut a = IntInterval::bounded(Integer::from(0), Integer::from(10));
        let mut b = IntInterval::bounded(Integer::from(3), Integer::from(7));
        IntInterval::contract_interval_le(&mut a, &mut b);
        assert_eq!(a, IntInterval::bounded(Integer::from(0), Integer::from(7)));
        assert_eq!(b, IntInterval::bounded(Integer::from(3), Integer::from(7)));
    }

    #[test]
    fn contract_interval_le_can_produce_bottom() {
        let mut a = IntInterval::bounded(Integer::from(10), Integer::from(20));
        let mut b = IntInterval::bounded(Integer::from(0), Integer::from(5));
        IntInterval::contract_interval_le(&mut a, &mut b);
        assert!(a.is_bottom() || b.is_bottom());
    }

    #[test]
    fn real_bottom_is_never_equal_to_itself_via_nan_but_is_flagged_bottom() {
        let bot = RealInterval::bottom();
        assert!(bot.is_bottom());
    }

    #[test]
    fn real_join_weakens() {
        let a = RealInterval::bounded(0.0, 1.5);
        let b = RealInterval::bounded(1.0, 3.0);
        assert_eq!(a.join(&b), RealInterval::bounded(0.0, 3.0));
    }

    #[test]
    fn increment_toward_plus_infinity_moves_up_at_binary64() {
        let fmt = FloatFormat::BINARY64;
        let next = RealInterval::increment_toward_plus_infinity(1.0, fmt);
        assert!(next > 1.0);
    }

    #[test]
    fn increment_preserves_infinite_and_nan_sentinels() {
        let fmt = FloatFormat::BINARY64;
        assert_eq!(
            RealInterval::increment_toward_plus_infinity(f64::INFINITY, fmt),
            f64::INFINITY
        );
        assert!(RealInterval::increment_toward_plus_infinity(f64::NAN, fmt).is_nan());
    }
}
