//! Helpers shared between [`super::Encoder`] and [`super::ConstEncoder`]:
//! cardinality constraints and model-value readback. Split out because both
//! encoders need the exact same "how many of these bools are true" and
//! "what concrete value did the model pick" logic (spec.md §4.4 shares the
//! per-sample wiring style of §4.1, just over a fixed skeleton).

use z3::ast::{Ast, Bool, Dynamic, BV};
use z3::{Context, Model};

use crate::ty::Ty;
use crate::value::BvVal;

/// `AtMost(bools, k)`: at most `k` of `bools` are true. The original's
/// `AtMost(...)` pseudo-boolean primitive is re-expressed here as a
/// bit-vector population count compared against `k`, since it needs no
/// solver-specific cardinality theory and composes with every backend.
pub fn at_most<'ctx>(ctx: &'ctx Context, bools: &[Bool<'ctx>], k: u32) -> Bool<'ctx> {
    let width = (bools.len() as u32).max(1) + 1;
    let zero = BV::from_i64(ctx, 0, width);
    let one = BV::from_i64(ctx, 1, width);
    let sum = bools.iter().fold(zero.clone(), |acc, b| acc.bvadd(&b.ite(&one, &zero)));
    sum.bvule(&BV::from_i64(ctx, k as i64, width))
}

/// Dumps `solver`'s current assertions to `<prefix>_<tag>.smt2`, mirroring
/// the original's `write_smt2` closure in `synth_n.py` (`output_prefix`
/// option, spec.md §6). A write-only debugging side effect; failures are
/// logged rather than propagated, since a missing/unwritable dump directory
/// should never abort a synthesis run.
pub fn dump_smt2(solver: &z3::Solver, output_prefix: Option<&str>, tag: &str) {
    let Some(prefix) = output_prefix else { return };
    let filename = format!("{prefix}_{tag}.smt2");
    if let Err(e) = std::fs::write(&filename, solver.to_smt2()) {
        crate::warn!("could not write SMT dump to {filename}: {e}");
    }
}

/// Reads a model-evaluated term back into a concrete [`BvVal`], given the
/// type it was allocated at. Used by `reconstruct`'s constant readback.
pub fn dynamic_from_model(val: &Dynamic, ty: Ty) -> BvVal {
    match ty {
        Ty::Bool => BvVal::Bool(val.as_bool().and_then(|b| b.as_bool()).expect("bool const_val had no model value")),
        Ty::BitVec(w) => {
            let bv = val.as_bv().expect("bitvec const_val was not a bit-vector term");
            BvVal::bv(w, bv.as_u64().expect("bitvec const_val had no model value"))
        }
    }
}
