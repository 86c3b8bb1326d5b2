use std::fmt;
use std::sync::Arc;

use joinery::JoinableIterator;

use crate::config::PruningOptions;
use crate::error::{Result, SynthError};
use crate::op::{Op, OpLibrary};
use crate::ty::Ty;
use crate::value::BvVal;

/// An operand reference (spec.md §3): either a constant payload or a
/// back-reference to an earlier line in the global numbering.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Const(BvVal),
    Line(usize),
}

impl Operand {
    pub fn is_const(&self) -> bool {
        matches!(self, Operand::Const(_))
    }
}

#[derive(Debug, Clone)]
pub struct Insn {
    pub op: Arc<dyn Op>,
    pub operands: Vec<Operand>,
}

/// A straight-line program: `n_inputs` input pseudo-lines, `insns.len()`
/// operator lines, then one output line. All operand references use the
/// global line numbering of spec.md §3.
#[derive(Debug, Clone)]
pub struct Prg {
    pub n_inputs: usize,
    pub in_types: Vec<Ty>,
    pub out_types: Vec<Ty>,
    pub insns: Vec<Insn>,
    pub outputs: Vec<Operand>,
}

impl Prg {
    pub fn new(in_types: Vec<Ty>, out_types: Vec<Ty>, insns: Vec<Insn>, outputs: Vec<Operand>) -> Self {
        Self { n_inputs: in_types.len(), in_types, out_types, insns, outputs }
    }

    pub fn out_insn_line(&self) -> usize {
        self.n_inputs + self.insns.len()
    }

    /// The result type of a global line number: an input line, an operator
    /// line, or (not meaningful on its own) the output line.
    pub fn line_type(&self, line: usize) -> Ty {
        if line < self.n_inputs {
            self.in_types[line]
        } else {
            self.insns[line - self.n_inputs].op.out_type()
        }
    }

    fn operand_type(&self, operand: &Operand, expected: Ty) -> Ty {
        match operand {
            Operand::Const(v) => v.ty(),
            Operand::Line(l) => {
                let _ = expected;
                self.line_type(*l)
            }
        }
    }

    /// Checks the §3 invariants: acyclicity, arity consistency, well-typing,
    /// and (if supplied) the max-const / const-set discipline.
    pub fn validate(&self, ops: &OpLibrary, opts: &PruningOptions) -> Result<()> {
        for (i, insn) in self.insns.iter().enumerate() {
            let line = self.n_inputs + i;
            if insn.operands.len() != insn.op.arity() {
                return Err(SynthError::MalformedInput(format!(
                    "line {line}: operator `{}` expects arity {} but got {} operands",
                    insn.op.name(),
                    insn.op.arity(),
                    insn.operands.len()
                )));
            }
            for (opnd, expected_ty) in insn.operands.iter().zip(insn.op.in_types()) {
                if let Operand::Line(l) = opnd {
                    if *l >= line {
                        return Err(SynthError::MalformedInput(format!(
                            "line {line}: operand references line {l}, which is not strictly earlier"
                        )));
                    }
                }
                let actual = self.operand_type(opnd, *expected_ty);
                if actual != *expected_ty {
                    return Err(SynthError::MalformedInput(format!(
                        "line {line}: operand type {actual:?} does not match expected {expected_ty:?}"
                    )));
                }
            }
            if ops.find_by_name(insn.op.name()).is_none() && insn.op.name() != "id" {
                return Err(SynthError::MalformedInput(format!(
                    "line {line}: operator `{}` is not a member of the supplied library",
                    insn.op.name()
                )));
            }
        }

        if self.outputs.len() != self.out_types.len() {
            return Err(SynthError::MalformedInput(format!(
                "expected {} outputs, got {}",
                self.out_types.len(),
                self.outputs.len()
            )));
        }
        for (opnd, expected_ty) in self.outputs.iter().zip(&self.out_types) {
            if let Operand::Line(l) = opnd {
                if *l >= self.out_insn_line() {
                    return Err(SynthError::MalformedInput(
                        "output operand references a non-earlier line".into(),
                    ));
                }
            }
            let actual = self.operand_type(opnd, *expected_ty);
            if actual != *expected_ty {
                return Err(SynthError::MalformedInput(format!(
                    "output type {actual:?} does not match expected {expected_ty:?}"
                )));
            }
        }

        if let Some(max_const) = opts.max_const {
            let count = self.insns.iter().flat_map(|i| i.operands.iter()).filter(|o| o.is_const()).count();
            if count as u32 > max_const {
                return Err(SynthError::MalformedInput(format!(
                    "program uses {count} constant operands, exceeding max_const={max_const}"
                )));
            }
        }

        if let Some(const_set) = &opts.const_set {
            for insn in &self.insns {
                for opnd in &insn.operands {
                    if let Operand::Const(v) = opnd {
                        if let Some(i) = v.as_u64() {
                            if !const_set.contains(&(i as i64)) {
                                return Err(SynthError::MalformedInput(format!(
                                    "constant {i} is not a member of const_set"
                                )));
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns true iff, for `opt_no_dead_code`, every operator line's
    /// result is referenced by some later non-constant operand (spec.md §4.1,
    /// tested as property 3 of §8).
    pub fn is_dead_code_free(&self) -> bool {
        let total_lines = self.out_insn_line() + 1;
        let mut used = vec![false; total_lines];
        let mut mark = |o: &Operand| {
            if let Operand::Line(l) = o {
                used[*l] = true;
            }
        };
        for insn in &self.insns {
            insn.operands.iter().for_each(&mut mark);
        }
        self.outputs.iter().for_each(&mut mark);
        (self.n_inputs..self.out_insn_line()).all(|l| used[l])
    }

    /// Evaluates the program on a concrete input tuple (spec.md §6: "used
    /// for self-verification and testing").
    pub fn eval(&self, inputs: &[BvVal]) -> Vec<BvVal> {
        assert_eq!(inputs.len(), self.n_inputs);
        let mut results: Vec<BvVal> = inputs.to_vec();
        for insn in &self.insns {
            let args: Vec<BvVal> = insn
                .operands
                .iter()
                .map(|o| match o {
                    Operand::Const(v) => *v,
                    Operand::Line(l) => results[*l],
                })
                .collect();
            results.push(insn.op.eval(&args));
        }
        self.outputs
            .iter()
            .map(|o| match o {
                Operand::Const(v) => *v,
                Operand::Line(l) => results[*l],
            })
            .collect()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(v) => write!(f, "{v}"),
            Operand::Line(l) => write!(f, "%{l}"),
        }
    }
}

impl fmt::Display for Prg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.n_inputs {
            writeln!(f, "%{i} = input  ; {:?}", self.in_types[i])?;
        }
        for (i, insn) in self.insns.iter().enumerate() {
            let line = self.n_inputs + i;
            writeln!(f, "%{line} = {} {}", insn.op.name(), insn.operands.iter().join_with(" "))?;
        }
        writeln!(f, "return {}", self.outputs.iter().join_with(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitops::{And, Sub};

    fn turn_off_rightmost() -> Prg {
        let w = 8;
        Prg::new(
            vec![Ty::BitVec(w)],
            vec![Ty::BitVec(w)],
            vec![
                Insn { op: Arc::new(Sub::new(w)), operands: vec![Operand::Line(0), Operand::Const(BvVal::bv(w, 1))] },
                Insn { op: Arc::new(And::new(w)), operands: vec![Operand::Line(0), Operand::Line(1)] },
            ],
            vec![Operand::Line(2)],
        )
    }

    #[test]
    fn eval_matches_the_spec_it_implements() {
        let prg = turn_off_rightmost();
        for x in 0u64..256 {
            let out = prg.eval(&[BvVal::bv(8, x)]);
            assert_eq!(out[0].as_u64().unwrap(), x & x.wrapping_sub(1) & 0xFF);
        }
    }

    #[test]
    fn validate_rejects_forward_reference() {
        let w = 8;
        let mut prg = turn_off_rightmost();
        prg.insns[0].operands[0] = Operand::Line(2);
        let lib: OpLibrary = vec![Arc::new(And::new(w)) as Arc<dyn Op>, Arc::new(Sub::new(w))];
        let opts = PruningOptions::default();
        assert!(prg.validate(&lib, &opts).is_err());
    }

    #[test]
    fn is_dead_code_free_detects_unused_line() {
        let w = 8;
        let mut prg = turn_off_rightmost();
        prg.insns.push(Insn { op: Arc::new(And::new(w)), operands: vec![Operand::Line(0), Operand::Line(0)] });
        assert!(!prg.is_dead_code_free());
    }
}
