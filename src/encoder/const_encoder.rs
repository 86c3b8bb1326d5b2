//! Constant resynthesis over a fixed skeleton (spec.md §4.4): given a program
//! whose operator choices and operand wiring are already fixed, find values
//! for its constant operands that make it satisfy `spec`. Grounded in
//! `examples/original_source/synth_constants_cegis_stage.py`'s
//! `SynthConstants` class: it keeps the same `res`/`const_val` variable
//! families as `SynthN`, but drops every structural choice variable
//! (`op`, `opnd`, `is_const`) since the skeleton already fixes them.
//!
//! The file exposes both strategies `synth_constants_cegis_stage.py` offers
//! as alternatives on its `downsize` path: [`ConstMode::Cegis`] re-runs the
//! counterexample loop (`write_constraints` + `add_constr_io_sample_prg` /
//! `add_constr_io_spec_prg`, called once per sample) over the fixed skeleton;
//! [`ConstMode::Forall`] solves a single `forall inputs. exists results.
//! constraints` query instead (`synth_with_new_spec`).

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use z3::ast::{exists_const, forall_const, Ast, Bool, Dynamic};
use z3::{Context, Model, Params, SatResult, Solver};

use crate::config::SolverConfig;
use crate::error::{Result, SynthError};
use crate::op::Term;
use crate::program::{Insn, Operand, Prg};
use crate::spec::Spec;
use crate::ty::Ty;
use crate::value::BvVal;

use super::shared::{dump_smt2, dynamic_from_model};
use super::symbols::SymbolTable;

/// Which constant-resynthesis strategy to run (spec.md §4.4 Open Question 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstMode {
    /// Re-run the counterexample loop over the fixed skeleton: each
    /// `register_sample`/`check` round only has to pick `const_val`s.
    Cegis,
    /// A single `forall inputs. exists results. constraints` query, solved
    /// once with no counterexample loop.
    Forall,
}

/// The per-instance wiring of a skeleton: the constraints tying each line's
/// result to its operator's instantiation, the existentially-quantifiable
/// result variables (only meaningful for [`ConstMode::Forall`]), the input
/// variables, and the output terms. Built fresh for every CEGIS sample and
/// once for the ∀∃ query; `const_val` terms are shared across all of them.
struct Wiring<'ctx> {
    constraints: Vec<Bool<'ctx>>,
    result_vars: Vec<Dynamic<'ctx>>,
    inputs: Vec<Dynamic<'ctx>>,
    outputs: Vec<Term<'ctx>>,
}

pub struct ConstEncoder<'ctx> {
    ctx: &'ctx Context,
    spec: Arc<dyn Spec>,
    skeleton: Prg,
    mode: ConstMode,
    symbols: SymbolTable<'ctx>,
    solver: Solver<'ctx>,
    goal: RefCell<Vec<Bool<'ctx>>>,
    reset_solver: bool,
    n_samples: Cell<usize>,
    output_prefix: Option<String>,
}

impl<'ctx> ConstEncoder<'ctx> {
    pub fn new(ctx: &'ctx Context, spec: Arc<dyn Spec>, skeleton: Prg, mode: ConstMode, solver_cfg: &SolverConfig) -> Result<Self> {
        if skeleton.in_types.as_slice() != spec.in_types() || skeleton.out_types.as_slice() != spec.out_types() {
            return Err(SynthError::MalformedInput("skeleton signature does not match spec".into()));
        }

        let solver = match &solver_cfg.theory {
            Some(logic) => Solver::new_for_logic(ctx, logic),
            None => Solver::new(ctx),
        };
        if let Some(timeout) = solver_cfg.timeout() {
            let mut params = Params::new(ctx);
            params.set_u32("timeout", timeout.as_millis() as u32);
            solver.set_params(&params);
        }

        Ok(Self {
            ctx,
            spec,
            skeleton,
            mode,
            symbols: SymbolTable::new(ctx),
            solver,
            goal: RefCell::new(Vec::new()),
            reset_solver: solver_cfg.reset_solver,
            n_samples: Cell::new(0),
            output_prefix: solver_cfg.output_prefix.clone(),
        })
    }

    pub fn mode(&self) -> ConstMode {
        self.mode
    }

    fn assert(&self, phi: Bool<'ctx>) {
        if !self.reset_solver {
            self.solver.assert(&phi);
        }
        self.goal.borrow_mut().push(phi);
    }

    fn var_const_val(&self, line: usize, opnd: usize, ty: Ty) -> Dynamic<'ctx> {
        // Always tagged `fa`: constants are shared structure, not per-sample
        // (`get_const_var` in the original hardcodes the same tag).
        self.symbols.get_dynamic(&format!("insn_{line}_opnd_{opnd}_{ty}_const_val"), ty)
    }

    fn var_line_res(&self, line: usize, ty: Ty, tag: &str) -> Dynamic<'ctx> {
        self.symbols.get_dynamic(&format!("insn_{line}_res_{ty}_{tag}"), ty)
    }

    /// Builds the wiring for one instance of the skeleton, tagged `tag`
    /// (a sample index for CEGIS mode, `"fa"` for the ∀∃ query).
    fn wire_instance(&self, tag: &str) -> Wiring<'ctx> {
        let inputs: Vec<Dynamic<'ctx>> =
            self.skeleton.in_types.iter().enumerate().map(|(i, ty)| self.var_line_res(i, *ty, tag)).collect();

        let mut line_vals: Vec<Term<'ctx>> = inputs.clone();
        let mut constraints = Vec::new();
        let mut result_vars = Vec::new();

        for (k, insn) in self.skeleton.insns.iter().enumerate() {
            let line = self.skeleton.n_inputs + k;
            let operand_terms: Vec<Term<'ctx>> = insn
                .operands
                .iter()
                .enumerate()
                .map(|(j, opnd)| match opnd {
                    Operand::Const(_) => self.var_const_val(line, j, insn.op.in_types()[j]),
                    Operand::Line(l) => line_vals[*l].clone(),
                })
                .collect();

            let res = self.var_line_res(line, insn.op.out_type(), tag);
            result_vars.push(res.clone());
            let (precond, body) = insn.op.instantiate(self.ctx, &[res.clone()], &operand_terms);
            constraints.push(Bool::and(self.ctx, &[&precond, &body]));
            line_vals.push(res);
        }

        let out_insn = self.skeleton.out_insn_line();
        let outputs: Vec<Term<'ctx>> = self
            .skeleton
            .outputs
            .iter()
            .enumerate()
            .map(|(j, opnd)| match opnd {
                Operand::Const(_) => self.var_const_val(out_insn, j, self.skeleton.out_types[j]),
                Operand::Line(l) => line_vals[*l].clone(),
            })
            .collect();

        Wiring { constraints, result_vars, inputs, outputs }
    }

    fn reconstruct_from_model(&self, model: &Model<'ctx>) -> Result<Prg> {
        let resolve = |line: usize, j: usize, opnd: &Operand, ty: Ty| -> Result<Operand> {
            match opnd {
                Operand::Const(_) => {
                    let cv = self.var_const_val(line, j, ty);
                    let val = model
                        .eval(&cv, true)
                        .ok_or_else(|| SynthError::MalformedInput(format!("no model value for const at line {line}, operand {j}")))?;
                    Ok(Operand::Const(dynamic_from_model(&val, ty)))
                }
                Operand::Line(l) => Ok(Operand::Line(*l)),
            }
        };

        let mut insns = Vec::with_capacity(self.skeleton.insns.len());
        for (k, insn) in self.skeleton.insns.iter().enumerate() {
            let line = self.skeleton.n_inputs + k;
            let mut operands = Vec::with_capacity(insn.operands.len());
            for (j, opnd) in insn.operands.iter().enumerate() {
                operands.push(resolve(line, j, opnd, insn.op.in_types()[j])?);
            }
            insns.push(Insn { op: insn.op.clone(), operands });
        }

        let out_insn = self.skeleton.out_insn_line();
        let mut outputs = Vec::with_capacity(self.skeleton.outputs.len());
        for (j, opnd) in self.skeleton.outputs.iter().enumerate() {
            outputs.push(resolve(out_insn, j, opnd, self.skeleton.out_types[j])?);
        }

        Ok(Prg::new(self.skeleton.in_types.clone(), self.skeleton.out_types.clone(), insns, outputs))
    }

    // ---- ConstMode::Cegis ----

    /// Extends the formula with one counterexample sample. Only meaningful
    /// in [`ConstMode::Cegis`].
    pub fn register_sample(&self, sample: &[BvVal]) {
        let instance = self.n_samples.get();
        let tag = instance.to_string();
        let wiring = self.wire_instance(&tag);
        for c in wiring.constraints {
            self.assert(c);
        }
        for (inp, val) in sample.iter().enumerate() {
            self.assert(wiring.inputs[inp]._eq(&val.to_term(self.ctx)));
        }
        if self.spec.is_deterministic() && self.spec.is_total() {
            let out_vals = self.spec.eval(sample);
            for (term, val) in wiring.outputs.iter().zip(&out_vals) {
                self.assert(term._eq(&val.to_term(self.ctx)));
            }
        } else {
            let ins: Vec<Term<'ctx>> = sample.iter().map(|v| v.to_term(self.ctx)).collect();
            let (precond, body) = self.spec.instantiate(self.ctx, &wiring.outputs, &ins);
            self.assert(precond.implies(&body));
        }
        self.n_samples.set(instance + 1);
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples.get()
    }

    pub fn check(&self) -> super::CheckResult {
        if self.reset_solver {
            self.solver.reset();
            for phi in self.goal.borrow().iter() {
                self.solver.assert(phi);
            }
        }
        dump_smt2(&self.solver, self.output_prefix.as_deref(), &format!("const_{}", self.n_samples.get()));
        match self.solver.check() {
            SatResult::Sat => super::CheckResult::Sat,
            SatResult::Unsat => super::CheckResult::Unsat,
            SatResult::Unknown => super::CheckResult::Unknown,
        }
    }

    /// Reconstructs the skeleton with its constants filled in from the last
    /// satisfying model. Must only be called after `check()` returned `Sat`.
    pub fn reconstruct(&self) -> Result<Prg> {
        let model = self.solver.get_model().ok_or_else(|| SynthError::MalformedInput("no model available".into()))?;
        self.reconstruct_from_model(&model)
    }

    // ---- ConstMode::Forall ----

    /// Solves the single `forall inputs. exists results. constraints` query.
    /// `Ok(None)` means the skeleton cannot be made correct by any choice of
    /// constants; `Ok(Some(prg))` is the skeleton with constants resolved.
    pub fn solve_forall(&self) -> Result<Option<Prg>> {
        let wiring = self.wire_instance("fa");
        let (precond, phi) = self.spec.instantiate(self.ctx, &wiring.outputs, &wiring.inputs);

        let mut parts: Vec<Bool<'ctx>> = wiring.constraints;
        parts.push(precond.implies(&phi));
        let refs: Vec<&Bool<'ctx>> = parts.iter().collect();
        let inner = Bool::and(self.ctx, &refs);

        let exists_refs: Vec<&dyn Ast<'ctx>> = wiring.result_vars.iter().map(|v| v as &dyn Ast<'ctx>).collect();
        let quantified = if exists_refs.is_empty() { inner } else { exists_const(self.ctx, &exists_refs, &[], &inner) };

        let forall_refs: Vec<&dyn Ast<'ctx>> = wiring.inputs.iter().map(|v| v as &dyn Ast<'ctx>).collect();
        let formula = if forall_refs.is_empty() { quantified } else { forall_const(self.ctx, &forall_refs, &[], &quantified) };

        let solver = Solver::new(self.ctx);
        solver.assert(&formula);
        dump_smt2(&solver, self.output_prefix.as_deref(), "forall");
        match solver.check() {
            SatResult::Sat => {
                let model = solver.get_model().ok_or_else(|| SynthError::MalformedInput("no model available".into()))?;
                Ok(Some(self.reconstruct_from_model(&model)?))
            }
            SatResult::Unsat => Ok(None),
            SatResult::Unknown => Err(SynthError::MalformedInput("solver returned unknown for the \u{2200}\u{2203} constant query".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitops::Sub;
    use crate::op::Op;
    use crate::spec::FnSpec;
    use z3::Config;

    fn skeleton_minus_one(width: u32) -> Prg {
        Prg::new(
            vec![Ty::BitVec(width)],
            vec![Ty::BitVec(width)],
            vec![Insn { op: Arc::new(Sub::new(width)), operands: vec![Operand::Line(0), Operand::Const(BvVal::bv(width, 0))] }],
            vec![Operand::Line(1)],
        )
    }

    fn decrement_spec(width: u32) -> FnSpec {
        FnSpec::new(
            "decrement",
            vec![Ty::BitVec(width)],
            vec![Ty::BitVec(width)],
            move |ins| vec![BvVal::bv(width, ins[0].as_u64().unwrap().wrapping_sub(1))],
            move |ctx, outs, ins| {
                let x = ins[0].as_bv().unwrap();
                let one = z3::ast::BV::from_i64(ctx, 1, width);
                (Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&x.bvsub(&one)))
            },
        )
    }

    #[test]
    fn cegis_mode_resolves_the_constant_to_one() {
        let width = 8;
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let spec: Arc<dyn Spec> = Arc::new(decrement_spec(width));
        let enc = ConstEncoder::new(&ctx, spec.clone(), skeleton_minus_one(width), ConstMode::Cegis, &SolverConfig::new()).unwrap();
        for sample in spec.sample_n(6) {
            enc.register_sample(&sample);
        }
        assert_eq!(enc.check(), super::super::CheckResult::Sat);
        let prg = enc.reconstruct().unwrap();
        for x in 0u64..256 {
            let out = prg.eval(&[BvVal::bv(width, x)]);
            assert_eq!(out[0].as_u64().unwrap(), x.wrapping_sub(1) & 0xFF);
        }
    }

    #[test]
    fn forall_mode_resolves_the_constant_to_one() {
        let width = 8;
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let spec: Arc<dyn Spec> = Arc::new(decrement_spec(width));
        let enc = ConstEncoder::new(&ctx, spec, skeleton_minus_one(width), ConstMode::Forall, &SolverConfig::new()).unwrap();
        let prg = enc.solve_forall().unwrap().expect("a satisfying constant exists");
        for x in 0u64..256 {
            let out = prg.eval(&[BvVal::bv(width, x)]);
            assert_eq!(out[0].as_u64().unwrap(), x.wrapping_sub(1) & 0xFF);
        }
    }
}
