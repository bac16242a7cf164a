// Copyright (c) Interval Domain Contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

//! A minimal, self-contained stand-in for the typed IR expression algebra the
//! domain actually consumes (§3.1, §6.1). In the real toolchain this tree,
//! the namespace, and the simplifier live in a separate crate; here they are
//! given a closed, exhaustively-matchable shape so the domain can be built
//! and tested on its own.

use rug::Integer;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// An interned-ish variable handle. Cheap to clone; no ordering is required
/// by the domain, so this is a thin wrapper over a reference-counted string
/// rather than a numeric handle into a real interner.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Id(Rc<str>);

impl Id {
    pub fn new(name: impl AsRef<str>) -> Self {
        Id(Rc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

/// The two numeric theories the domain tracks, plus `Bool` for the
/// comparison/boolean-tagged nodes and the two literals.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Type {
    BitVector { width: u32, signed: bool },
    FloatBv { exp_bits: u32, frac_bits: u32 },
    Bool,
}

impl Type {
    pub fn is_bv(&self) -> bool {
        matches!(self, Type::BitVector { .. })
    }

    pub fn is_floatbv(&self) -> bool {
        matches!(self, Type::FloatBv { .. })
    }

    /// `(exp_bits, frac_bits)` of a float type, if this is one.
    pub fn float_format(&self) -> Option<(u32, u32)> {
        match self {
            Type::FloatBv {
                exp_bits,
                frac_bits,
            } => Some((*exp_bits, *frac_bits)),
            _ => None,
        }
    }
}

/// The closed expression sum type. Only the tags the domain needs to
/// specialize on are represented; everything it treats uniformly (e.g. a
/// function's other arguments) simply never appears at this level — the
/// caller constructs `Instruction::FunctionCall` directly with the subset of
/// information the domain can use (§3.1 statement-level tags).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Expr {
    Symbol {
        id: Id,
        ty: Type,
    },
    ConstantInt {
        value: Integer,
        ty: Type,
    },
    /// Stored as the raw bits of an IEEE-754 binary64, so that `NaN` and
    /// signed zero compare structurally rather than via `PartialEq` on `f64`.
    ConstantFloat {
        bits: u64,
        ty: Type,
    },
    Typecast {
        from: Rc<Expr>,
        ty: Type,
    },
    If {
        cond: Rc<Expr>,
        then_branch: Rc<Expr>,
        else_branch: Rc<Expr>,
    },
    Eq(Rc<Expr>, Rc<Expr>),
    Ne(Rc<Expr>, Rc<Expr>),
    Lt(Rc<Expr>, Rc<Expr>),
    Le(Rc<Expr>, Rc<Expr>),
    Gt(Rc<Expr>, Rc<Expr>),
    Ge(Rc<Expr>, Rc<Expr>),
    And(Vec<Rc<Expr>>),
    Or(Vec<Rc<Expr>>),
    Not(Rc<Expr>),
    True,
    False,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol { id, .. } => write!(f, "{id}"),
            Expr::ConstantInt { value, .. } => write!(f, "{value}"),
            Expr::ConstantFloat { bits, .. } => write!(f, "{}", f64::from_bits(*bits)),
            Expr::Typecast { from, ty } => write!(f, "({ty:?}){from}"),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "if {cond} then {then_branch} else {else_branch}"),
            Expr::Eq(l, r) => write!(f, "{l} = {r}"),
            Expr::Ne(l, r) => write!(f, "{l} != {r}"),
            Expr::Lt(l, r) => write!(f, "{l} < {r}"),
            Expr::Le(l, r) => write!(f, "{l} <= {r}"),
            Expr::Gt(l, r) => write!(f, "{l} > {r}"),
            Expr::Ge(l, r) => write!(f, "{l} >= {r}"),
            Expr::And(es) => write!(f, "({})", itertools::join(es, " && ")),
            Expr::Or(es) => write!(f, "({})", itertools::join(es, " || ")),
            Expr::Not(e) => write!(f, "!{e}"),
            Expr::True => write!(f, "true"),
            Expr::False => write!(f, "false"),
        }
    }
}

impl Expr {
    pub fn ty(&self) -> Type {
        match self {
            Expr::Symbol { ty, .. }
            | Expr::ConstantInt { ty, .. }
            | Expr::ConstantFloat { ty, .. }
            | Expr::Typecast { ty, .. } => *ty,
            Expr::If { then_branch, .. } => then_branch.ty(),
            Expr::Eq(..)
            | Expr::Ne(..)
            | Expr::Lt(..)
            | Expr::Le(..)
            | Expr::Gt(..)
            | Expr::Ge(..)
            | Expr::And(..)
            | Expr::Or(..)
            | Expr::Not(..)
            | Expr::True
            | Expr::False => Type::Bool,
        }
    }

    /// Unwraps transparent `Typecast` nodes, the way `havoc_rec`/`assume_rec`
    /// see through casts to find the symbol or constant underneath.
    pub fn strip_typecast(self: &Rc<Expr>) -> &Rc<Expr> {
        let mut e = self;
        while let Expr::Typecast { from, .. } = e.as_ref() {
            e = from;
        }
        e
    }

    pub fn as_symbol(&self) -> Option<(&Id, Type)> {
        match self {
            Expr::Symbol { id, ty } => Some((id, *ty)),
            _ => None,
        }
    }

    pub fn as_constant_int(&self) -> Option<&Integer> {
        match self {
            Expr::ConstantInt { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_constant_float(&self) -> Option<f64> {
        match self {
            Expr::ConstantFloat { bits, .. } => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

/// Opaque namespace handle threaded through to casting, as in §6.1. This
/// crate's expression algebra does not need symbol-table lookups of its own
/// (every `Expr::Symbol` already carries its type), so the namespace carries
/// no state; it exists purely so the `transform`/`ai_simplify` signatures
/// match the consumed interface.
#[derive(Clone, Copy, Debug, Default)]
pub struct Namespace;

impl Namespace {
    pub fn new() -> Self {
        Namespace
    }
}

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("cannot build a typecast onto a boolean-typed operand: {0}")]
    CastOntoBool(Expr),
}

pub fn true_expr() -> Rc<Expr> {
    Rc::new(Expr::True)
}

pub fn false_expr() -> Rc<Expr> {
    Rc::new(Expr::False)
}

pub fn is_true(e: &Expr) -> bool {
    matches!(e, Expr::True)
}

pub fn is_false(e: &Expr) -> bool {
    matches!(e, Expr::False)
}

pub fn eq(lhs: Rc<Expr>, rhs: Rc<Expr>) -> Rc<Expr> {
    Rc::new(Expr::Eq(lhs, rhs))
}

pub fn le(lhs: Rc<Expr>, rhs: Rc<Expr>) -> Rc<Expr> {
    Rc::new(Expr::Le(lhs, rhs))
}

pub fn not(e: Rc<Expr>) -> Rc<Expr> {
    match e.as_ref() {
        Expr::True => false_expr(),
        Expr::False => true_expr(),
        Expr::Not(inner) => inner.clone(),
        _ => Rc::new(Expr::Not(e)),
    }
}

/// Builds a (flattened, short-circuited) conjunction: a bare `false` conjunct
/// collapses the whole thing, `true` conjuncts are dropped, and an empty or
/// all-`true` list yields `true_expr()`.
pub fn conjunction(exprs: impl IntoIterator<Item = Rc<Expr>>) -> Rc<Expr> {
    let mut flat = Vec::new();
    for e in exprs {
        match e.as_ref() {
            Expr::True => continue,
            Expr::False => return false_expr(),
            Expr::And(inner) => flat.extend(inner.iter().cloned()),
            _ => flat.push(e),
        }
    }
    match flat.len() {
        0 => true_expr(),
        1 => flat.into_iter().next().unwrap(),
        _ => Rc::new(Expr::And(flat)),
    }
}

pub fn from_integer(value: Integer, ty: Type) -> Rc<Expr> {
    Rc::new(Expr::ConstantInt { value, ty })
}

pub fn from_float(value: f64, ty: Type) -> Rc<Expr> {
    Rc::new(Expr::ConstantFloat {
        bits: value.to_bits(),
        ty,
    })
}

/// Builds a `Typecast` node, rejecting the ill-formed case of casting a
/// boolean-typed operand to a numeric type (a source-language `bool as i32`
/// would go through an explicit comparison-to-int lowering upstream, never
/// through this constructor).
pub fn typecast(from: Rc<Expr>, ty: Type) -> Result<Rc<Expr>, ExprError> {
    if from.ty() == Type::Bool {
        return Err(ExprError::CastOntoBool((*from).clone()));
    }
    Ok(Rc::new(Expr::Typecast { from, ty }))
}

/// Inserts the implicit casts a source-language arithmetic operator would
/// apply between its two operands before comparing or combining them:
/// widen the narrower bit-vector to the wider one's width (same
/// signedness), or promote a bit-vector operand to the float type when one
/// side is already floating point. Operands that already agree in type are
/// returned unchanged. Mirrors the original `c_implicit_typecast_arithmetic`
/// policy used when emitting constraints back into the IR (§6.1).
pub fn c_implicit_typecast_arithmetic(
    lhs: Rc<Expr>,
    rhs: Rc<Expr>,
    _ns: &Namespace,
) -> (Rc<Expr>, Rc<Expr>) {
    let (lty, rty) = (lhs.ty(), rhs.ty());
    if lty == rty {
        return (lhs, rhs);
    }
    match (lty, rty) {
        (Type::FloatBv { .. }, Type::BitVector { .. }) => {
            (lhs, Rc::new(Expr::Typecast { from: rhs, ty: lty }))
        }
        (Type::BitVector { .. }, Type::FloatBv { .. }) => {
            (Rc::new(Expr::Typecast { from: lhs, ty: rty }), rhs)
        }
        (
            Type::BitVector {
                width: lw,
                signed: ls,
            },
            Type::BitVector { width: rw, .. },
        ) => {
            if lw >= rw {
                (lhs, Rc::new(Expr::Typecast { from: rhs, ty: lty }))
            } else {
                let wide = Type::BitVector {
                    width: rw,
                    signed: ls,
                };
                (Rc::new(Expr::Typecast { from: lhs, ty: wide }), rhs)
            }
        }
        _ => (lhs, rhs),
    }
}

/// A pure, terminating normalizer the domain invokes on guards before
/// analyzing them (§6.1). Real IR simplifiers do vastly more; this one does
/// constant folding of comparisons between two literals, double-negation
/// elimination, and flattening of nested `And`/`Or` — enough that
/// `ai_simplify`'s "already literally true" check and the `assume` entry
/// point see a normal form.
pub fn simplify(e: &Rc<Expr>) -> Rc<Expr> {
    match e.as_ref() {
        Expr::Not(inner) => {
            let inner = simplify(inner);
            not(inner)
        }
        Expr::And(parts) => conjunction(parts.iter().map(simplify)),
        Expr::Or(parts) => {
            let parts: Vec<_> = parts.iter().map(simplify).collect();
            if parts.iter().any(|p| is_true(p)) {
                return true_expr();
            }
            let flat: Vec<_> = parts.into_iter().filter(|p| !is_false(p)).collect();
            match flat.len() {
                0 => false_expr(),
                1 => flat.into_iter().next().unwrap(),
                _ => Rc::new(Expr::Or(flat)),
            }
        }
        Expr::Eq(l, r) => fold_int_comparison(l, r, |a, b| a == b).unwrap_or_else(|| {
            Rc::new(Expr::Eq(simplify(l), simplify(r)))
        }),
        Expr::Ne(l, r) => fold_int_comparison(l, r, |a, b| a != b).unwrap_or_else(|| {
            Rc::new(Expr::Ne(simplify(l), simplify(r)))
        }),
        Expr::Lt(l, r) => fold_int_comparison(l, r, |a, b| a < b).unwrap_or_else(|| {
            Rc::new(Expr::Lt(simplify(l), simplify(r)))
        }),
        Expr::Le(l, r) => fold_int_comparison(l, r, |a, b| a <= b).unwrap_or_else(|| {
            Rc::new(Expr::Le(simplify(l), simplify(r)))
        }),
        Expr::Gt(l, r) => fold_int_comparison(l, r, |a, b| a > b).unwrap_or_else(|| {
            Rc::new(Expr::Gt(simplify(l), simplify(r)))
        }),
        Expr::Ge(l, r) => fold_int_comparison(l, r, |a, b| a >= b).unwrap_or_else(|| {
            Rc::new(Expr::Ge(simplify(l), simplify(r)))
        }),
        _ => e.clone(),
    }
}

fn fold_int_comparison(
    lhs: &Rc<Expr>,
    rhs: &Rc<Expr>,
    op: impl Fn(&Integer, &Integer) -> bool,
) -> Option<Rc<Expr>> {
    let l = lhs.as_constant_int()?;
    let r = rhs.as_constant_int()?;
    Some(if op(l, r) { true_expr() } else { false_expr() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv32() -> Type {
        Type::BitVector {
            width: 32,
            signed: true,
        }
    }

    #[test]
    fn conjunction_drops_true_and_collapses_on_false() {
        crate::init_test_logging();
        let x = Rc::new(Expr::Symbol {
            id: Id::new("x"),
            ty: Type::Bool,
        });
        let c = conjunction(vec![true_expr(), x.clone(), true_expr()]);
        assert_eq!(c, x);

        let c = conjunction(vec![x, false_expr()]);
        assert!(is_false(&c));
    }

    #[test]
    fn double_negation_cancels() {
        let x = Rc::new(Expr::Symbol {
            id: Id::new("x"),
            ty: Type::Bool,
        });
        assert_eq!(not(not(x.clone())), x);
    }

    #[test]
    fn simplify_folds_constant_comparison() {
        let a = from_integer(Integer::from(3), bv32());
        let b = from_integer(Integer::from(5), bv32());
        let folded = simplify(&Rc::new(Expr::Lt(a, b)));
        assert!(is_true(&folded));
    }

    #[test]
    fn simplify_flattens_nested_conjunctions() {
        let x = Rc::new(Expr::Symbol {
            id: Id::new("x"),
            ty: Type::Bool,
        });
        let y = Rc::new(Expr::Symbol {
            id: Id::new("y"),
            ty: Type::Bool,
        });
        let nested = Rc::new(Expr::And(vec![
            Rc::new(Expr::And(vec![x.clone(), y.clone()])),
            true_expr(),
        ]));
        let flat = simplify(&nested);
        match flat.as_ref() {
            Expr::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected a flattened conjunction, got {other:?}"),
        }
    }

    #[test]
    fn typecast_rejects_bool_operand() {
        let b = Rc::new(Expr::Symbol {
            id: Id::new("flag"),
            ty: Type::Bool,
        });
        assert!(typecast(b, bv32()).is_err());
    }

    #[test]
    fn implicit_cast_widens_narrower_bitvector() {
        let narrow = Type::BitVector {
            width: 8,
            signed: true,
        };
        let wide = Type::BitVector {
            width: 32,
            signed: true,
        };
        let lhs = Rc::new(Expr::Symbol {
            id: Id::new("a"),
            ty: wide,
        });
        let rhs = Rc::new(Expr::Symbol {
            id: Id::new("b"),
            ty: narrow,
        });
        let (l, r) = c_implicit_typecast_arithmetic(lhs, rhs, &Namespace::new());
        assert_eq!(l.ty(), wide);
        assert_eq!(r.ty(), wide);
    }
}
