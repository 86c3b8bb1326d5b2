//! Bit-width downscaler/lifter (spec.md §4.5/§4.6): given `(spec, Ω)` at the
//! original width, rewrite both down to a smaller width so a short synthesis
//! attempt is cheaper, then lift a skeleton found at the smaller width back
//! up to the original width so its constants can be re-solved by
//! [`crate::encoder::ConstEncoder`]. Grounded in
//! `examples/original_source/synth_constants_cegis_stage.py`'s `synth(...)`
//! downsize path (`transform_to_bitwidth`/`transform_to_bw_func`); those two
//! helpers were themselves filtered out of the retrieved sources, so the
//! rewrite below is built directly on the `rewrite_width` hooks already
//! present on [`crate::ty::Ty`], [`crate::value::BvVal`], and
//! [`crate::op::Op`] rather than ported line-for-line.

use std::sync::Arc;

use crate::error::Result;
use crate::op::{Op, OpLibrary};
use crate::program::{Insn, Operand, Prg};
use crate::spec::Spec;
use crate::ty::Ty;
use crate::value::BvVal;

/// Rewrites every operator in `ops` to `new_width`, preserving each
/// operator's `max_uses` cap. Fails with `DownscaleUnsupported` (bubbled from
/// whichever operator can't be re-emitted) if any member of Ω opts out.
pub fn downscale_ops(ops: &OpLibrary, new_width: u32) -> Result<OpLibrary> {
    let mut lib = OpLibrary::new();
    for (op, max_uses) in ops.iter() {
        lib.insert(op.rewrite_width(new_width)?, max_uses);
    }
    Ok(lib)
}

/// Rewrites `spec` to `new_width` via its own `rewrite_width` hook.
pub fn downscale_spec(spec: &Arc<dyn Spec>, new_width: u32) -> Result<Arc<dyn Spec>> {
    spec.rewrite_width(new_width)
}

/// The first bit-vector width mentioned by `spec`'s signature, used as the
/// "original width" to lift a downscaled skeleton back up to. A spec mixing
/// several distinct original widths is outside this crate's scope (every
/// S1-S6/hackdel-style scenario is uniform-width).
pub fn original_width(spec: &Arc<dyn Spec>) -> Option<u32> {
    spec.in_types().iter().chain(spec.out_types()).find_map(Ty::width)
}

fn placeholder(ty: Ty) -> BvVal {
    match ty {
        Ty::Bool => BvVal::Bool(false),
        Ty::BitVec(w) => BvVal::bv(w, 0),
    }
}

/// Re-emits a skeleton's operators (and hence its result/operand types) at
/// `new_width`, keeping the instruction graph — operator names, arities,
/// operand line references — identical. This is the "lift" half of §4.6: a
/// skeleton found at a reduced width is rebuilt at the original width so
/// [`crate::encoder::ConstEncoder`] can re-solve its constants there; the
/// same function also serves as the "downscale" half when called in the
/// other direction, since `Op::rewrite_width` doesn't care which way the
/// width moves. Constant operand *values* are not meaningful here — only
/// their presence as `Operand::Const` matters to `ConstEncoder`, which treats
/// every constant slot as unknown regardless of its placeholder payload — so
/// they're re-emitted as zero/false at the new operand type.
pub fn rewrite_skeleton_width(prg: &Prg, new_width: u32) -> Result<Prg> {
    let out_types: Vec<Ty> = prg.out_types.iter().map(|t| t.rewrite_width(new_width)).collect();

    let mut insns = Vec::with_capacity(prg.insns.len());
    for insn in &prg.insns {
        let new_op = insn.op.rewrite_width(new_width)?;
        let operands = insn
            .operands
            .iter()
            .enumerate()
            .map(|(j, opnd)| match opnd {
                Operand::Const(_) => Operand::Const(placeholder(new_op.in_types()[j])),
                Operand::Line(l) => Operand::Line(*l),
            })
            .collect();
        insns.push(Insn { op: new_op, operands });
    }

    let in_types: Vec<Ty> = prg.in_types.iter().map(|t| t.rewrite_width(new_width)).collect();
    let outputs = prg
        .outputs
        .iter()
        .enumerate()
        .map(|(j, opnd)| match opnd {
            Operand::Const(_) => Operand::Const(placeholder(out_types[j])),
            Operand::Line(l) => Operand::Line(*l),
        })
        .collect();

    Ok(Prg::new(in_types, out_types, insns, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitops::{And, Sub};
    use crate::config::PruningOptions;

    fn turn_off_rightmost(width: u32) -> Prg {
        Prg::new(
            vec![Ty::BitVec(width)],
            vec![Ty::BitVec(width)],
            vec![
                Insn { op: Arc::new(Sub::new(width)), operands: vec![Operand::Line(0), Operand::Const(BvVal::bv(width, 1))] },
                Insn { op: Arc::new(And::new(width)), operands: vec![Operand::Line(0), Operand::Line(1)] },
            ],
            vec![Operand::Line(2)],
        )
    }

    #[test]
    fn downscale_ops_rewrites_every_member() {
        let mut lib = OpLibrary::new();
        lib.insert(Arc::new(And::new(8)), Some(1));
        lib.insert(Arc::new(Sub::new(8)), None);
        let narrowed = downscale_ops(&lib, 4).unwrap();
        assert_eq!(narrowed.len(), 2);
        for (op, _) in narrowed.iter() {
            assert_eq!(op.out_type(), Ty::BitVec(4));
        }
    }

    #[test]
    fn rewrite_skeleton_width_preserves_structure_and_changes_types() {
        let prg = turn_off_rightmost(8);
        let narrowed = rewrite_skeleton_width(&prg, 4).unwrap();
        assert_eq!(narrowed.in_types, vec![Ty::BitVec(4)]);
        assert_eq!(narrowed.out_types, vec![Ty::BitVec(4)]);
        assert_eq!(narrowed.insns.len(), prg.insns.len());
        assert_eq!(narrowed.insns[0].op.name(), "sub");
        assert_eq!(narrowed.insns[0].operands[0], Operand::Line(0));
        assert!(narrowed.insns[0].operands[1].is_const());
        assert_eq!(narrowed.outputs, prg.outputs);
    }

    #[test]
    fn lift_round_trips_back_to_the_original_width() {
        let prg = turn_off_rightmost(8);
        let narrowed = rewrite_skeleton_width(&prg, 4).unwrap();
        let lifted = rewrite_skeleton_width(&narrowed, 8).unwrap();
        assert_eq!(lifted.in_types, prg.in_types);
        assert_eq!(lifted.out_types, prg.out_types);
        assert!(lifted.validate(&OpLibrary::new().with(Arc::new(Sub::new(8)), None).with(Arc::new(And::new(8)), None), &PruningOptions::default()).is_ok());
    }
}
