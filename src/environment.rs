// Copyright (c) Interval Domain Contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

//! The interval environment (§3.3, §4.2): the lattice element the
//! fixed-point engine actually carries around one CFG node/edge at a time.

use log_derive::logfn_inputs;
use rpds::HashTrieMap;
use std::fmt;

use crate::config::AnalysisConfig;
use crate::expr::{
    c_implicit_typecast_arithmetic, conjunction, eq, false_expr, from_float, from_integer, le,
    true_expr, Expr, Id, Namespace, Type,
};
use crate::interval::{IntInterval, RealInterval};
use std::rc::Rc;

type IntMap = HashTrieMap<Id, IntInterval>;
type RealMap = HashTrieMap<Id, RealInterval>;

/// `(bottom, int_map, real_map)`. Cloning is cheap (the two maps are
/// persistent/structurally-shared), which is what makes "one environment per
/// CFG edge, cloned on branch" affordable (§3.3).
#[derive(Clone, Debug)]
pub struct Environment {
    bottom: bool,
    int_map: IntMap,
    real_map: RealMap,
    config: AnalysisConfig,
}

impl Environment {
    pub fn top() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        Environment {
            bottom: false,
            int_map: IntMap::new(),
            real_map: RealMap::new(),
            config,
        }
    }

    #[logfn_inputs(Trace)]
    pub fn make_top(&mut self) {
        self.bottom = false;
        self.int_map = IntMap::new();
        self.real_map = RealMap::new();
    }

    #[logfn_inputs(Trace)]
    pub fn make_bottom(&mut self) {
        self.bottom = true;
        self.int_map = IntMap::new();
        self.real_map = RealMap::new();
    }

    #[logfn_inputs(Trace)]
    pub fn is_bottom(&self) -> bool {
        self.bottom
            || self.int_map.values().any(|i| i.is_bottom())
            || self.real_map.values().any(|i| i.is_bottom())
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Current knowledge about an integer-typed variable; top if untracked.
    pub fn int_interval(&self, id: &Id) -> IntInterval {
        self.int_map.get(id).cloned().unwrap_or_else(IntInterval::top)
    }

    /// Current knowledge about a float-typed variable; top if untracked.
    pub fn real_interval(&self, id: &Id) -> RealInterval {
        self.real_map
            .get(id)
            .cloned()
            .unwrap_or_else(RealInterval::top)
    }

    pub(crate) fn set_int_interval(&mut self, id: Id, interval: IntInterval) {
        if interval.is_top() {
            self.int_map.remove_mut(&id);
        } else {
            self.int_map.insert_mut(id, interval);
        }
    }

    pub(crate) fn set_real_interval(&mut self, id: Id, interval: RealInterval) {
        if interval.is_top() {
            self.real_map.remove_mut(&id);
        } else {
            self.real_map.insert_mut(id, interval);
        }
    }

    pub(crate) fn remove_int(&mut self, id: &Id) {
        self.int_map.remove_mut(id);
    }

    pub(crate) fn remove_real(&mut self, id: &Id) {
        self.real_map.remove_mut(id);
    }

    /// Variable-wise intersected union: a variable present in both maps
    /// keeps the join of its two intervals; a variable present only in
    /// `self` was top in `other` and is dropped (top-absence convention,
    /// §3.3). Returns true iff `self` changed.
    #[logfn_inputs(Trace)]
    pub fn join(&mut self, other: &Environment) -> bool {
        if other.bottom {
            return false;
        }
        if self.bottom {
            *self = other.clone();
            return true;
        }

        let mut changed = false;

        let mut new_int_map = IntMap::new();
        for (id, interval) in self.int_map.iter() {
            if let Some(other_interval) = other.int_map.get(id) {
                let joined = interval.join(other_interval);
                if &joined != interval {
                    changed = true;
                }
                if !joined.is_top() {
                    new_int_map.insert_mut(id.clone(), joined);
                }
            } else {
                changed = true; // was present only in self: it was top in other
            }
        }
        self.int_map = new_int_map;

        let mut new_real_map = RealMap::new();
        for (id, interval) in self.real_map.iter() {
            if let Some(other_interval) = other.real_map.get(id) {
                let joined = interval.join(other_interval);
                if joined != *interval {
                    changed = true;
                }
                if !joined.is_top() {
                    new_real_map.insert_mut(id.clone(), joined);
                }
            } else {
                changed = true;
            }
        }
        self.real_map = new_real_map;

        changed
    }

    /// Returns an IR boolean expression encoding current knowledge about
    /// `sym` (§4.2).
    pub fn make_expression(&self, id: &Id, ty: Type, ns: &Namespace) -> Rc<Expr> {
        if self.is_bottom() {
            return false_expr();
        }
        match ty {
            Type::BitVector { .. } => self.make_int_expression(id, ty, ns),
            Type::FloatBv { .. } => self.make_float_expression(id, ty, ns),
            Type::Bool => true_expr(),
        }
    }

    fn make_int_expression(&self, id: &Id, ty: Type, ns: &Namespace) -> Rc<Expr> {
        let Some(interval) = self.int_map.get(id) else {
            return true_expr();
        };
        if interval.is_top() {
            return true_expr();
        }
        if interval.is_bottom() {
            return false_expr();
        }

        let symbol = Rc::new(Expr::Symbol { id: id.clone(), ty });

        if interval.is_singleton() {
            let value = from_integer(interval.upper().unwrap().clone(), ty);
            let (sym, value) = c_implicit_typecast_arithmetic(symbol, value, ns);
            return eq(sym, value);
        }

        let mut conjuncts = Vec::new();
        if let Some(upper) = interval.upper() {
            let value = from_integer(upper.clone(), ty);
            let (sym, value) = c_implicit_typecast_arithmetic(symbol.clone(), value, ns);
            conjuncts.push(le(sym, value));
        }
        if let Some(lower) = interval.lower() {
            let value = from_integer(lower.clone(), ty);
            let (sym, value) = c_implicit_typecast_arithmetic(symbol, value, ns);
            conjuncts.push(le(value, sym));
        }
        conjunction(conjuncts)
    }

    fn make_float_expression(&self, id: &Id, ty: Type, ns: &Namespace) -> Rc<Expr> {
        let Some(interval) = self.real_map.get(id) else {
            return true_expr();
        };
        if interval.is_top() {
            return true_expr();
        }
        if interval.is_bottom() {
            return false_expr();
        }

        let format = ty
            .float_format()
            .map(|(e, f)| crate::float_format::FloatFormat {
                exp_bits: e,
                frac_bits: f,
            })
            .unwrap_or(self.config.default_float_format);
        let symbol = Rc::new(Expr::Symbol { id: id.clone(), ty });

        let mut conjuncts = Vec::new();
        if let Some(upper) = interval.upper() {
            let widened = RealInterval::increment_toward_plus_infinity(upper, format);
            let value = from_float(widened, ty);
            let (sym, value) = c_implicit_typecast_arithmetic(symbol.clone(), value, ns);
            conjuncts.push(le(sym, value));
        }
        if let Some(lower) = interval.lower() {
            let widened = RealInterval::decrement_toward_minus_infinity(lower, format);
            let value = from_float(widened, ty);
            let (sym, value) = c_implicit_typecast_arithmetic(symbol, value, ns);
            conjuncts.push(le(value, sym));
        }
        conjunction(conjuncts)
    }

    /// One line per tracked, non-top variable, in the form
    /// `[lbound <= ] name [ <= ubound]`; a single `BOTTOM` line if bottom.
    pub fn output<W: std::io::Write>(&self, out: &mut W) -> std::io::Result<()> {
        if self.is_bottom() {
            return writeln!(out, "BOTTOM");
        }
        let mut int_entries: Vec<_> = self.int_map.iter().collect();
        int_entries.sort_by_key(|(id, _)| id.as_str().to_owned());
        for (id, interval) in int_entries {
            if interval.is_top() {
                continue;
            }
            write_bound_line(out, id, interval.lower().map(|v| v.to_string()), interval.upper().map(|v| v.to_string()))?;
        }
        let mut real_entries: Vec<_> = self.real_map.iter().collect();
        real_entries.sort_by_key(|(id, _)| id.as_str().to_owned());
        for (id, interval) in real_entries {
            if interval.is_top() {
                continue;
            }
            write_bound_line(out, id, interval.lower().map(|v| v.to_string()), interval.upper().map(|v| v.to_string()))?;
        }
        Ok(())
    }
}

fn write_bound_line<W: std::io::Write>(
    out: &mut W,
    id: &Id,
    lower: Option<String>,
    upper: Option<String>,
) -> std::io::Result<()> {
    if let Some(l) = &lower {
        write!(out, "{l} <= ")?;
    }
    write!(out, "{id}")?;
    if let Some(u) = &upper {
        write!(out, " <= {u}")?;
    }
    writeln!(out)
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.output(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Equality ignores the `config` (a policy knob, not lattice state) and
/// treats "absent" and an explicitly-stored top interval as equivalent,
/// since `join` can leave a freshly-joined-to-top interval in the map rather
/// than eagerly purging it before the caller sees it mid-computation.
impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        if self.is_bottom() != other.is_bottom() {
            return false;
        }
        if self.is_bottom() {
            return true;
        }
        effective_map_eq(&self.int_map, &other.int_map)
            && effective_real_map_eq(&self.real_map, &other.real_map)
    }
}

fn effective_map_eq(a: &IntMap, b: &IntMap) -> bool {
    let non_top = |m: &IntMap| -> Vec<(Id, IntInterval)> {
        m.iter()
            .filter(|(_, v)| !v.is_top())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    let mut av = non_top(a);
    let mut bv = non_top(b);
    av.sort_by(|x, y| x.0.as_str().cmp(y.0.as_str()));
    bv.sort_by(|x, y| x.0.as_str().cmp(y.0.as_str()));
    av == bv
}

fn effective_real_map_eq(a: &RealMap, b: &RealMap) -> bool {
    let non_top = |m: &RealMap| -> Vec<(Id, RealInterval)> {
        m.iter()
            .filter(|(_, v)| !v.is_top())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    let mut av = non_top(a);
    let mut bv = non_top(b);
    av.sort_by(|x, y| x.0.as_str().cmp(y.0.as_str()));
    bv.sort_by(|x, y| x.0.as_str().cmp(y.0.as_str()));
    av == bv
}

impl Eq for Environment {}
