// Copyright (c) Interval Domain Contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

//! The transfer function and guard interpreter (§4.3): `transform` over CFG
//! instructions, `assume` over arbitrary boolean expressions, and the
//! `ai_simplify` oracle the engine uses to rewrite guards to `true`.

use log_derive::logfn_inputs;
use std::rc::Rc;

use crate::environment::Environment;
use crate::expr::{self, Expr, Id, Namespace, Type};
use crate::float_format::FloatFormat;
use crate::interval::{IntInterval, RealInterval};

/// A CFG node identity. The engine owns the real graph; this crate only
/// needs enough of it to dispatch `Goto` (§4.3.1).
pub type NodeId = u32;

/// The statement-level tags reachable from a CFG instruction body (§3.1)
/// that the domain dispatches on, plus a catch-all for everything else.
#[derive(Clone, Debug)]
pub enum Instruction {
    Decl {
        id: Id,
        ty: Type,
    },
    Assign {
        target: Rc<Expr>,
        source: Rc<Expr>,
    },
    Goto {
        guard: Rc<Expr>,
        true_target: NodeId,
    },
    Assume {
        guard: Rc<Expr>,
    },
    FunctionCall {
        ret: Option<Rc<Expr>>,
    },
    Other,
}

/// The minimal CFG node shape `transform` needs: its instruction, and the
/// node that follows it in program order (the "next"/fall-through successor
/// the `Goto` dispatch compares against).
#[derive(Clone, Debug)]
pub struct CfgNode {
    pub id: NodeId,
    pub instruction: Instruction,
    pub fallthrough: NodeId,
}

/// Dispatches on the kind of `from` and mutates `env` in place (§4.3.1).
#[logfn_inputs(Trace)]
pub fn transform(env: &mut Environment, from: &CfgNode, to: NodeId, ns: &Namespace) {
    match &from.instruction {
        Instruction::Decl { id, ty } => {
            let symbol = Rc::new(Expr::Symbol {
                id: id.clone(),
                ty: *ty,
            });
            havoc_rec(&symbol, env);
        }
        Instruction::Assign { target, source } => {
            havoc_rec(target, env);
            // Raw structural strengthening (assume_rec), not the simplifying
            // `assume` entry point: the original `assign` transfer bypasses
            // the simplifier, relying only on havoc-then-equate.
            let eq = Rc::new(Expr::Eq(target.clone(), source.clone()));
            assume_rec(&eq, false, env, ns);
        }
        Instruction::Goto { guard, true_target } => {
            let next = from.fallthrough;
            if *true_target == next {
                // A skip: the guard adds no information on either edge.
            } else if to == next {
                assume(&expr::not(guard.clone()), env, ns);
            } else {
                assume(guard, env, ns);
            }
        }
        Instruction::Assume { guard } => assume(guard, env, ns),
        Instruction::FunctionCall { ret } => {
            if let Some(ret) = ret {
                havoc_rec(ret, env);
            }
        }
        Instruction::Other => {}
    }
}

/// Resets every reachable symbol leaf of integer or float type to top
/// (§4.3.2). Both branches of an `If` are descended; `Typecast` is
/// transparent; any other shape is logged and left untouched (sound — no
/// tightening was claimed for it).
#[logfn_inputs(Trace)]
pub fn havoc_rec(e: &Rc<Expr>, env: &mut Environment) {
    match e.as_ref() {
        Expr::If {
            then_branch,
            else_branch,
            ..
        } => {
            havoc_rec(then_branch, env);
            havoc_rec(else_branch, env);
        }
        Expr::Symbol { id, ty } => match ty {
            Type::BitVector { .. } => env.remove_int(id),
            Type::FloatBv { .. } => {
                if env.config().track_floats {
                    env.remove_real(id);
                }
            }
            Type::Bool => {}
        },
        Expr::Typecast { from, .. } => havoc_rec(from, env),
        other => log::debug!("[havoc_rec] missing support for expression shape: {other:?}"),
    }
}

/// Simplifies `cond` and descends with positive polarity (§4.3.3).
#[logfn_inputs(Trace)]
pub fn assume(cond: &Rc<Expr>, env: &mut Environment, ns: &Namespace) {
    let simplified = expr::simplify(cond);
    assume_rec(&simplified, false, env, ns);
}

/// Replaces a comparison by its complement (`Lt<->Ge`, `Le<->Gt`, `Eq<->Ne`);
/// only ever called on comparison shapes.
fn complement(cond: &Rc<Expr>) -> Rc<Expr> {
    match cond.as_ref() {
        Expr::Eq(l, r) => Rc::new(Expr::Ne(l.clone(), r.clone())),
        Expr::Ne(l, r) => Rc::new(Expr::Eq(l.clone(), r.clone())),
        Expr::Lt(l, r) => Rc::new(Expr::Ge(l.clone(), r.clone())),
        Expr::Le(l, r) => Rc::new(Expr::Gt(l.clone(), r.clone())),
        Expr::Gt(l, r) => Rc::new(Expr::Le(l.clone(), r.clone())),
        Expr::Ge(l, r) => Rc::new(Expr::Lt(l.clone(), r.clone())),
        other => other.clone().into(),
    }
}

fn assume_rec(cond: &Rc<Expr>, negation: bool, env: &mut Environment, ns: &Namespace) {
    match cond.as_ref() {
        Expr::Eq(..) | Expr::Ne(..) | Expr::Lt(..) | Expr::Le(..) | Expr::Gt(..) | Expr::Ge(..) => {
            let effective = if negation { complement(cond) } else { cond.clone() };
            assume_comparison(&effective, env, ns);
        }
        Expr::Not(inner) => assume_rec(inner, !negation, env, ns),
        Expr::And(parts) => {
            if !negation {
                for p in parts {
                    assume_rec(p, false, env, ns);
                }
            }
            // Under negation, would require disjunctive reasoning: no-op.
        }
        Expr::Or(parts) => {
            if negation {
                for p in parts {
                    assume_rec(p, true, env, ns);
                }
            }
            // Positive polarity: no-op, symmetric with `And`.
        }
        Expr::True => {
            // Negated `true` is an unsatisfiable assumption; positive is
            // trivially satisfied either way, so only act on negation.
            if negation {
                env.make_bottom();
            }
        }
        Expr::False => {
            if !negation {
                env.make_bottom();
            }
        }
        other => log::debug!("[assume_rec] missing support for expression shape: {other:?}"),
    }
}

fn assume_comparison(cond: &Rc<Expr>, env: &mut Environment, ns: &Namespace) {
    match cond.as_ref() {
        Expr::Eq(l, r) => {
            assume_le(l, r, false, env, ns);
            assume_le(r, l, false, env, ns);
        }
        Expr::Ne(..) => {
            // The domain does not split disjunctively.
        }
        Expr::Ge(l, r) => assume_le(r, l, false, env, ns),
        Expr::Gt(l, r) => assume_le(r, l, true, env, ns),
        Expr::Lt(l, r) => assume_le(l, r, true, env, ns),
        Expr::Le(l, r) => assume_le(l, r, false, env, ns),
        _ => unreachable!("assume_comparison called on a non-comparison"),
    }
}

fn float_format_of(ty: Type, env: &Environment) -> FloatFormat {
    ty.float_format()
        .and_then(|(e, f)| FloatFormat::new(e, f).ok())
        .unwrap_or(env.config().default_float_format)
}

/// Canonical `x <= y` (and, when `strict`, `x < y`), dispatched on the shape
/// of its typecast-unwrapped sides (§4.3.3's table).
fn assume_le(lhs: &Rc<Expr>, rhs: &Rc<Expr>, strict: bool, env: &mut Environment, ns: &Namespace) {
    let lhs = lhs.strip_typecast().clone();
    let rhs = rhs.strip_typecast().clone();
    let _ = ns; // threaded through for parity with the consumed interface

    match (lhs.as_ref(), rhs.as_ref()) {
        (
            Expr::Symbol {
                id,
                ty: Type::BitVector { .. },
            },
            Expr::ConstantInt { value, .. },
        ) => {
            let mut c = value.clone();
            if strict {
                c -= 1;
            }
            let mut interval = env.int_interval(id);
            interval.make_le_than(c);
            let bottom = interval.is_bottom();
            env.set_int_interval(id.clone(), interval);
            if bottom {
                env.make_bottom();
            }
        }
        (
            Expr::ConstantInt { value, .. },
            Expr::Symbol {
                id,
                ty: Type::BitVector { .. },
            },
        ) => {
            let mut c = value.clone();
            if strict {
                c += 1;
            }
            let mut interval = env.int_interval(id);
            interval.make_ge_than(c);
            let bottom = interval.is_bottom();
            env.set_int_interval(id.clone(), interval);
            if bottom {
                env.make_bottom();
            }
        }
        (
            Expr::Symbol {
                id,
                ty: ty @ Type::FloatBv { .. },
            },
            Expr::ConstantFloat { .. },
        ) if env.config().track_floats => {
            let c = rhs.as_constant_float().unwrap();
            if c.is_nan() {
                log::debug!("[assume_le] NaN constant against {id}, treating as havoc-preserving");
                return;
            }
            let format = float_format_of(*ty, env);
            let c = if strict {
                RealInterval::decrement_toward_minus_infinity(c, format)
            } else {
                c
            };
            let mut interval = env.real_interval(id);
            interval.make_le_than(c);
            let bottom = interval.is_bottom();
            env.set_real_interval(id.clone(), interval);
            if bottom {
                env.make_bottom();
            }
        }
        (
            Expr::ConstantFloat { .. },
            Expr::Symbol {
                id,
                ty: ty @ Type::FloatBv { .. },
            },
        ) if env.config().track_floats => {
            let c = lhs.as_constant_float().unwrap();
            if c.is_nan() {
                log::debug!("[assume_le] NaN constant against {id}, treating as havoc-preserving");
                return;
            }
            let format = float_format_of(*ty, env);
            let c = if strict {
                RealInterval::increment_toward_plus_infinity(c, format)
            } else {
                c
            };
            let mut interval = env.real_interval(id);
            interval.make_ge_than(c);
            let bottom = interval.is_bottom();
            env.set_real_interval(id.clone(), interval);
            if bottom {
                env.make_bottom();
            }
        }
        (
            Expr::Symbol {
                id: lid,
                ty: Type::BitVector { .. },
            },
            Expr::Symbol {
                id: rid,
                ty: Type::BitVector { .. },
            },
        ) => {
            let mut a = env.int_interval(lid);
            let mut b = env.int_interval(rid);
            IntInterval::contract_interval_le(&mut a, &mut b);
            let bottom = a.is_bottom() || b.is_bottom();
            env.set_int_interval(lid.clone(), a);
            env.set_int_interval(rid.clone(), b);
            if bottom {
                env.make_bottom();
            }
        }
        (
            Expr::Symbol {
                id: lid,
                ty: Type::FloatBv { .. },
            },
            Expr::Symbol {
                id: rid,
                ty: Type::FloatBv { .. },
            },
        ) if env.config().track_floats => {
            let mut a = env.real_interval(lid);
            let mut b = env.real_interval(rid);
            RealInterval::contract_interval_le(&mut a, &mut b);
            let bottom = a.is_bottom() || b.is_bottom();
            env.set_real_interval(lid.clone(), a);
            env.set_real_interval(rid.clone(), b);
            if bottom {
                env.make_bottom();
            }
        }
        _ => {
            log::debug!("[assume_le] mixed or unsupported theory for {lhs} <= {rhs}, left as future work");
        }
    }
}

/// The engine's oracle for rewriting a guard to `true` (§4.3.4). Returns
/// `true` iff `cond` is left unchanged.
#[logfn_inputs(Trace)]
pub fn ai_simplify(cond: &mut Rc<Expr>, env: &Environment, ns: &Namespace) -> bool {
    let proved = match cond.as_ref() {
        Expr::And(_) => {
            let mut a = Environment::with_config(*env.config());
            a.make_top();
            assume(cond, &mut a, ns);
            !a.join(env)
        }
        Expr::Symbol { .. } => false, // left unchanged; see open question in the module doc
        _ => {
            let mut d = env.clone();
            let negated = expr::not(cond.clone());
            assume(&negated, &mut d, ns);
            d.is_bottom()
        }
    };

    if proved {
        let already_true = expr::is_true(cond);
        *cond = expr::true_expr();
        already_true
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use rug::Integer;

    fn bv32() -> Type {
        Type::BitVector {
            width: 32,
            signed: true,
        }
    }

    fn sym(name: &str) -> Rc<Expr> {
        Rc::new(Expr::Symbol {
            id: Id::new(name),
            ty: bv32(),
        })
    }

    fn int(n: i64) -> Rc<Expr> {
        expr::from_integer(Integer::from(n), bv32())
    }

    fn ns() -> Namespace {
        Namespace::new()
    }

    #[test]
    fn guarded_assignment_scenario() {
        crate::init_test_logging();
        let mut env = Environment::top();
        let x = sym("x");

        assume(&Rc::new(Expr::Ge(x.clone(), int(0))), &mut env, &ns());
        assume(&Rc::new(Expr::Le(x.clone(), int(10))), &mut env, &ns());
        assert_eq!(env.int_interval(&Id::new("x")), IntInterval::bounded(Integer::from(0), Integer::from(10)));

        assume(&Rc::new(Expr::Ge(x, int(20))), &mut env, &ns());
        assert!(env.is_bottom());
    }

    #[test]
    fn branch_split_scenario() {
        let x = sym("x");
        let guard = Rc::new(Expr::Lt(x.clone(), int(5)));

        let node = CfgNode {
            id: 0,
            instruction: Instruction::Goto {
                guard: guard.clone(),
                true_target: 1,
            },
            fallthrough: 2,
        };

        let mut not_taken = Environment::top();
        transform(&mut not_taken, &node, 2, &ns());
        assert_eq!(
            not_taken.int_interval(&Id::new("x")).upper(),
            Some(&Integer::from(4))
        );

        let mut taken = Environment::top();
        transform(&mut taken, &node, 1, &ns());
        assert_eq!(
            taken.int_interval(&Id::new("x")).lower(),
            Some(&Integer::from(5))
        );
    }

    #[test]
    fn havoc_on_decl_scenario() {
        let mut env = Environment::top();
        assume(&Rc::new(Expr::Eq(sym("y"), int(2))), &mut env, &ns());
        assert!(env.int_interval(&Id::new("y")).is_singleton());

        let node = CfgNode {
            id: 0,
            instruction: Instruction::Decl {
                id: Id::new("y"),
                ty: bv32(),
            },
            fallthrough: 1,
        };
        transform(&mut env, &node, 1, &ns());
        assert!(env.int_interval(&Id::new("y")).is_top());
    }

    #[test]
    fn symbol_symbol_contraction_scenario() {
        let mut env = Environment::top();
        assume(&Rc::new(Expr::Ge(sym("a"), int(0))), &mut env, &ns());
        assume(&Rc::new(Expr::Le(sym("a"), int(10))), &mut env, &ns());
        assume(&Rc::new(Expr::Ge(sym("b"), int(3))), &mut env, &ns());
        assume(&Rc::new(Expr::Le(sym("b"), int(7))), &mut env, &ns());

        assume(&Rc::new(Expr::Le(sym("a"), sym("b"))), &mut env, &ns());

        assert_eq!(
            env.int_interval(&Id::new("a")),
            IntInterval::bounded(Integer::from(0), Integer::from(7))
        );
        assert_eq!(
            env.int_interval(&Id::new("b")),
            IntInterval::bounded(Integer::from(3), Integer::from(7))
        );
    }

    #[test]
    fn ai_simplify_rewrites_provable_guards_only() {
        let mut env = Environment::top();
        assume(&Rc::new(Expr::Ge(sym("x"), int(0))), &mut env, &ns());
        assume(&Rc::new(Expr::Le(sym("x"), int(3))), &mut env, &ns());

        let mut provable = Rc::new(Expr::Lt(sym("x"), int(5)));
        let unchanged = ai_simplify(&mut provable, &env, &ns());
        assert!(!unchanged);
        assert!(expr::is_true(&provable));

        let mut not_provable = Rc::new(Expr::Lt(sym("x"), int(2)));
        let unchanged = ai_simplify(&mut not_provable, &env, &ns());
        assert!(unchanged);
        assert!(!expr::is_true(&not_provable));
    }

    #[test]
    fn assign_havocs_target_before_equating_so_self_reference_is_sound() {
        let mut env = Environment::top();
        assume(&Rc::new(Expr::Ge(sym("x"), int(0))), &mut env, &ns());
        assume(&Rc::new(Expr::Le(sym("x"), int(3))), &mut env, &ns());

        // x := x + 1 is not representable by this domain's linear-free
        // algebra, so the source expression degrades to an opaque symbol;
        // what matters is that havocking first means the stale `x` bound is
        // gone rather than spuriously retained.
        let node = CfgNode {
            id: 0,
            instruction: Instruction::Assign {
                target: sym("x"),
                source: sym("unrelated"),
            },
            fallthrough: 1,
        };
        transform(&mut env, &node, 1, &ns());
        assert!(env.int_interval(&Id::new("x")).is_top() || env.int_interval(&Id::new("x")).is_bottom());
    }

    #[test]
    fn function_call_havocs_only_the_return_binding() {
        let mut env = Environment::top();
        assume(&Rc::new(Expr::Eq(sym("x"), int(4))), &mut env, &ns());

        let node = CfgNode {
            id: 0,
            instruction: Instruction::FunctionCall {
                ret: Some(sym("x")),
            },
            fallthrough: 1,
        };
        transform(&mut env, &node, 1, &ns());
        assert!(env.int_interval(&Id::new("x")).is_top());
    }

    #[test]
    fn float_nan_constant_does_not_tighten() {
        let config = AnalysisConfig::default();
        let mut env = Environment::with_config(config);
        let float_ty = Type::FloatBv {
            exp_bits: 11,
            frac_bits: 52,
        };
        let f = Rc::new(Expr::Symbol {
            id: Id::new("f"),
            ty: float_ty,
        });
        let nan = expr::from_float(f64::NAN, float_ty);
        assume(&Rc::new(Expr::Le(f.clone(), nan)), &mut env, &ns());
        // NaN is a sentinel, not a bound to fold in: it must not report a
        // spurious inconsistency for an otherwise-untouched variable.
        assert!(env.real_interval(&Id::new("f")).is_top() || !env.is_bottom());
    }
}
