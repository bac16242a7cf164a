// Copyright (c) Interval Domain Contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

//! An interval abstract-interpretation domain for a typed control-flow IR.
//!
//! The domain maintains, at each program point, an over-approximation of
//! reachable concrete states as a mapping from variable identifiers to
//! numeric intervals — one theory for bit-vector integers, one for
//! floating-point. A fixed-point engine drives [`transfer::transform`] and
//! [`Environment::join`] across a CFG, and calls [`transfer::ai_simplify`]
//! to rewrite guards it has proven always hold.
//!
//! Module map:
//! - [`expr`] — the consumed IR expression algebra (a closed stand-in; see
//!   its module docs).
//! - [`interval`] — the integer and real interval primitives (§3.2, §4.1).
//! - [`float_format`] — correctly-directed rounding for the real interval's
//!   cross-precision widening.
//! - [`environment`] — the lattice element ([`Environment`]) built from the
//!   two interval maps.
//! - [`transfer`] — the transfer function, guard interpreter, and
//!   `ai_simplify` oracle.
//! - [`config`] — engine-level policy knobs.

pub mod config;
pub mod environment;
pub mod expr;
pub mod float_format;
pub mod interval;
pub mod transfer;

pub use config::AnalysisConfig;
pub use environment::Environment;
pub use expr::{Expr, Id, Namespace, Type};
pub use float_format::FloatFormat;
pub use interval::{IntInterval, RealInterval};
pub use transfer::{ai_simplify, assume, havoc_rec, transform, CfgNode, Instruction, NodeId};

/// Brings up `env_logger` for a test binary; safe to call from more than one
/// test since a second `try_init` just fails quietly. Tests that want to see
/// the `#[logfn_inputs(Trace)]`/`log::debug!` traces from the domain call
/// this first (§10 Test tooling).
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
