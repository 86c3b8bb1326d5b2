//! The symbolic encoder (spec.md §4.1): turns "does there exist a program of
//! length `L` over `Ω` satisfying `spec`?" into an SMT formula. Grounded in
//! `examples/original_source/synth_n.py`'s `SynthN` class; the variable
//! schema, naming convention, and constraint groups below track that file
//! method-for-method (`add_constr_wfp`, `add_constr_ty`, `add_constr_opt`,
//! `synth_with_new_samples`), translated from z3py's implicit-context style
//! into explicit `&'ctx Context` threading.

pub mod enumsort;
mod shared;
pub mod symbols;

mod const_encoder;

pub use const_encoder::{ConstEncoder, ConstMode};

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ahash::AHashSet;
use z3::ast::{Ast, Bool, Dynamic, BV};
use z3::{Context, Model, Params, SatResult, Solver};

use crate::bitops::Id;
use crate::config::{PruningOptions, SolverConfig};
use crate::error::{Result, SynthError};
use crate::op::{MaxUses, Op, OpLibrary, Term};
use crate::program::{Insn, Operand, Prg};
use crate::spec::Spec;
use crate::ty::Ty;
use crate::value::BvVal;

use self::enumsort::{bits_for, EnumSort};
use self::shared::{at_most, dump_smt2, dynamic_from_model};
use self::symbols::SymbolTable;

/// Re-exported so [`crate::cegis`]'s verification query can read a model
/// value back into a [`BvVal`] without duplicating this logic.
pub(crate) use self::shared::dynamic_from_model as read_model_value;

/// Outcome of [`Encoder::check`] (spec.md §4.1: `Sat(model) | Unsat | Unknown`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Sat,
    Unsat,
    Unknown,
}

/// The symbolic encoder for one fixed program length `L`. Owns its own
/// symbol table and solver; per spec.md §5, term translation in and out of
/// this context is the caller's responsibility (`BvVal::to_term`,
/// `reconstruct`'s model readback).
pub struct Encoder<'ctx> {
    ctx: &'ctx Context,
    spec: Arc<dyn Spec>,
    /// `Ω` plus one synthetic `id` operator per distinct type (spec.md §4.3).
    /// The original appends a single `id` typed to the first spec output;
    /// this crate's `Spec` supports multiple, differently-typed outputs, so
    /// it generalizes to one `id` per type actually in play (documented in
    /// DESIGN.md).
    ops: Vec<Arc<dyn Op>>,
    op_freq: Vec<MaxUses>,
    id_indices: Vec<usize>,
    tys: Vec<Ty>,
    n_inputs: usize,
    n_outputs: usize,
    out_insn: usize,
    length: usize,
    arities: Vec<usize>,
    op_enum: EnumSort,
    ty_enum: EnumSort,
    ln_width: u32,
    symbols: SymbolTable<'ctx>,
    solver: Solver<'ctx>,
    goal: RefCell<Vec<Bool<'ctx>>>,
    reset_solver: bool,
    n_samples: Cell<usize>,
    output_prefix: Option<String>,
}

impl<'ctx> Encoder<'ctx> {
    pub fn new(
        ctx: &'ctx Context,
        spec: Arc<dyn Spec>,
        ops: &OpLibrary,
        n_insns: usize,
        solver_cfg: &SolverConfig,
        pruning: PruningOptions,
    ) -> Result<Self> {
        let mut names = AHashSet::new();
        for (op, _) in ops.iter() {
            if !names.insert(op.name().to_string()) {
                return Err(SynthError::MalformedInput(format!("duplicate operator name `{}` in Ω", op.name())));
            }
        }
        if spec.in_types().is_empty() && spec.out_types().is_empty() {
            return Err(SynthError::MalformedInput("spec has neither inputs nor outputs".into()));
        }

        let mut all_ops: Vec<Arc<dyn Op>> = ops.iter().map(|(op, _)| op.clone()).collect();
        let mut op_freq: Vec<MaxUses> = ops.iter().map(|(_, m)| m).collect();

        let mut id_tys: Vec<Ty> = Vec::new();
        for ty in ops.all_types().into_iter().chain(spec.in_types().iter().copied()).chain(spec.out_types().iter().copied()) {
            if !id_tys.contains(&ty) {
                id_tys.push(ty);
            }
        }
        let mut id_indices = Vec::new();
        for ty in id_tys {
            id_indices.push(all_ops.len());
            all_ops.push(Arc::new(Id::new(ty)));
            op_freq.push(None);
        }

        let n_inputs = spec.in_types().len();
        let n_outputs = spec.out_types().len();
        let out_insn = n_inputs + n_insns;
        let length = out_insn + 1;
        let max_arity = all_ops.iter().map(|op| op.arity()).max().unwrap_or(0);

        let mut arities = vec![0usize; n_inputs];
        arities.extend(std::iter::repeat(max_arity).take(n_insns));
        arities.push(n_outputs);

        let mut tys: Vec<Ty> = Vec::new();
        for op in &all_ops {
            for ty in op.in_types() {
                if !tys.contains(ty) {
                    tys.push(*ty);
                }
            }
            if !tys.contains(&op.out_type()) {
                tys.push(op.out_type());
            }
        }
        for ty in spec.in_types().iter().chain(spec.out_types()) {
            if !tys.contains(ty) {
                tys.push(*ty);
            }
        }

        let op_enum = EnumSort::new(all_ops.len());
        let ty_enum = EnumSort::new(tys.len());
        let ln_width = bits_for(length.max(1));

        let solver = match &solver_cfg.theory {
            Some(logic) => Solver::new_for_logic(ctx, logic),
            None => Solver::new(ctx),
        };
        if let Some(timeout) = solver_cfg.timeout() {
            let mut params = Params::new(ctx);
            params.set_u32("timeout", timeout.as_millis() as u32);
            solver.set_params(&params);
        }

        let enc = Self {
            ctx,
            spec,
            ops: all_ops,
            op_freq,
            id_indices,
            tys,
            n_inputs,
            n_outputs,
            out_insn,
            length,
            arities,
            op_enum,
            ty_enum,
            ln_width,
            symbols: SymbolTable::new(ctx),
            solver,
            goal: RefCell::new(Vec::new()),
            reset_solver: solver_cfg.reset_solver,
            n_samples: Cell::new(0),
            output_prefix: solver_cfg.output_prefix.clone(),
        };

        enc.add_constr_wfp(&pruning);
        enc.add_constr_ty();
        enc.add_constr_opt(&pruning);
        Ok(enc)
    }

    fn assert(&self, phi: Bool<'ctx>) {
        if !self.reset_solver {
            self.solver.assert(&phi);
        }
        self.goal.borrow_mut().push(phi);
    }

    fn ty_index(&self, ty: Ty) -> usize {
        self.tys.iter().position(|t| *t == ty).expect("type not registered with encoder")
    }

    fn op_index(&self, idx: usize) -> &Arc<dyn Op> {
        &self.ops[idx]
    }

    // ---- symbolic variable accessors (spec.md §4.1's table) ----

    fn var_insn_op(&self, insn: usize) -> BV<'ctx> {
        self.symbols.get_bv(&format!("insn_{insn}_op"), self.op_enum.width())
    }

    fn var_insn_opnd(&self, insn: usize, opnd: usize) -> BV<'ctx> {
        self.symbols.get_bv(&format!("insn_{insn}_opnd_{opnd}"), self.ln_width)
    }

    fn var_insn_opnds(&self, insn: usize) -> Vec<BV<'ctx>> {
        (0..self.arities[insn]).map(|j| self.var_insn_opnd(insn, j)).collect()
    }

    fn var_insn_opnd_is_const(&self, insn: usize, opnd: usize) -> Bool<'ctx> {
        self.symbols.get_bool(&format!("insn_{insn}_opnd_{opnd}_is_const"))
    }

    fn var_insn_opnds_is_const(&self, insn: usize) -> Vec<Bool<'ctx>> {
        (0..self.arities[insn]).map(|j| self.var_insn_opnd_is_const(insn, j)).collect()
    }

    fn var_insn_opnd_const_val(&self, insn: usize, opnd: usize, ty: Ty) -> Dynamic<'ctx> {
        self.symbols.get_dynamic(&format!("insn_{insn}_opnd_{opnd}_{ty}_const_val"), ty)
    }

    fn var_insn_opnd_type(&self, insn: usize, opnd: usize) -> BV<'ctx> {
        self.symbols.get_bv(&format!("insn_{insn}_opnd_type_{opnd}"), self.ty_enum.width())
    }

    fn var_insn_res_type(&self, insn: usize) -> BV<'ctx> {
        self.symbols.get_bv(&format!("insn_{insn}_res_type"), self.ty_enum.width())
    }

    fn var_insn_res(&self, insn: usize, ty: Ty, sample: usize) -> Dynamic<'ctx> {
        self.symbols.get_dynamic(&format!("insn_{insn}_res_{ty}_{sample}"), ty)
    }

    fn var_insn_opnd_val(&self, insn: usize, opnd: usize, ty: Ty, sample: usize) -> Dynamic<'ctx> {
        self.symbols.get_dynamic(&format!("insn_{insn}_opnd_{opnd}_{ty}_{sample}"), ty)
    }

    fn var_input_res(&self, insn: usize, sample: usize) -> Dynamic<'ctx> {
        self.var_insn_res(insn, self.spec.in_types()[insn], sample)
    }

    fn var_outs_val(&self, sample: usize) -> Vec<Dynamic<'ctx>> {
        self.spec.out_types().iter().enumerate().map(|(j, ty)| self.var_insn_opnd_val(self.out_insn, j, *ty, sample)).collect()
    }

    // ---- structural (well-formedness) constraints: spec.md §4.1 ----

    fn add_constr_wfp(&self, pruning: &PruningOptions) {
        let length_bv = |n: usize| BV::from_i64(self.ctx, n as i64, self.ln_width);

        for insn in 0..self.length {
            for v in self.var_insn_opnds(insn) {
                self.assert(v.bvult(&length_bv(insn)));
            }
        }

        for insn in self.n_inputs..self.out_insn {
            self.assert(self.op_enum.range_constraint(self.ctx, &self.var_insn_op(insn)));
            let opnds = self.var_insn_opnds(insn);
            for (idx, op) in self.ops.iter().enumerate() {
                if op.arity() == 0 {
                    continue;
                }
                let op_id = self.op_enum.const_of(self.ctx, idx);
                let op_var = self.var_insn_op(insn);
                for opnd in &opnds[op.arity()..] {
                    self.assert(op_var._eq(&op_id).implies(&opnd._eq(&opnds[op.arity() - 1])));
                }
            }
        }

        if let Some(max_const) = pruning.max_const {
            let all_is_const: Vec<Bool<'ctx>> =
                (self.n_inputs..self.out_insn).flat_map(|insn| self.var_insn_opnds_is_const(insn)).collect();
            if !all_is_const.is_empty() {
                self.assert(at_most(self.ctx, &all_is_const, max_const));
            }
        }

        if let Some(const_set) = &pruning.const_set {
            let member_at = |w: u32, m: i64| BvVal::bv(w, m as u64).to_term(self.ctx);
            for insn in self.n_inputs..self.out_insn {
                for op in self.ops.iter() {
                    for (j, ty) in op.in_types().iter().enumerate() {
                        if let Ty::BitVec(w) = ty {
                            let cv = self.var_insn_opnd_const_val(insn, j, *ty);
                            let options: Vec<Bool<'ctx>> = const_set.iter().map(|m| cv._eq(&member_at(*w, *m))).collect();
                            let refs: Vec<&Bool<'ctx>> = options.iter().collect();
                            self.assert(Bool::or(self.ctx, &refs));
                        }
                    }
                }
            }
            for (j, ty) in self.spec.out_types().iter().enumerate() {
                if let Ty::BitVec(w) = ty {
                    let cv = self.var_insn_opnd_const_val(self.out_insn, j, *ty);
                    let options: Vec<Bool<'ctx>> = const_set.iter().map(|m| cv._eq(&member_at(*w, *m))).collect();
                    let refs: Vec<&Bool<'ctx>> = options.iter().collect();
                    self.assert(Bool::or(self.ctx, &refs));
                }
            }
        }

        for (idx, freq) in self.op_freq.iter().enumerate() {
            if let Some(cap) = freq {
                let op_id = self.op_enum.const_of(self.ctx, idx);
                let uses: Vec<Bool<'ctx>> = (self.n_inputs..self.out_insn).map(|insn| self.var_insn_op(insn)._eq(&op_id)).collect();
                self.assert(at_most(self.ctx, &uses, *cap));
            }
        }
    }

    // ---- typing constraints: spec.md §4.1 ----

    fn add_constr_ty(&self) {
        if self.ty_enum.len() <= 1 {
            return;
        }

        for insn in self.n_inputs..self.out_insn {
            let op_var = self.var_insn_op(insn);
            for (idx, op) in self.ops.iter().enumerate() {
                let op_id = self.op_enum.const_of(self.ctx, idx);
                let cond = op_var._eq(&op_id);
                let out_ty_id = self.ty_enum.const_of(self.ctx, self.ty_index(op.out_type()));
                self.assert(cond.implies(&self.var_insn_res_type(insn)._eq(&out_ty_id)));
                for (j, opty) in op.in_types().iter().enumerate() {
                    let ty_id = self.ty_enum.const_of(self.ctx, self.ty_index(*opty));
                    self.assert(cond.implies(&self.var_insn_opnd_type(insn, j)._eq(&ty_id)));
                }
            }
        }

        for (inp, ty) in self.spec.in_types().iter().enumerate() {
            let ty_id = self.ty_enum.const_of(self.ctx, self.ty_index(*ty));
            self.assert(self.var_insn_res_type(inp)._eq(&ty_id));
        }

        for (j, ty) in self.spec.out_types().iter().enumerate() {
            let ty_id = self.ty_enum.const_of(self.ctx, self.ty_index(*ty));
            self.assert(self.var_insn_opnd_type(self.out_insn, j)._eq(&ty_id));
        }

        for insn in self.n_inputs..self.length {
            let opnds = self.var_insn_opnds(insn);
            let is_const = self.var_insn_opnds_is_const(insn);
            for other in 0..insn {
                let other_bv = BV::from_i64(self.ctx, other as i64, self.ln_width);
                for (j, opnd) in opnds.iter().enumerate() {
                    let ty_var = self.var_insn_opnd_type(insn, j);
                    let res_ty = self.var_insn_res_type(other);
                    let wired = is_const[j].not().implies(&opnd._eq(&other_bv).implies(&ty_var._eq(&res_ty)));
                    self.assert(wired);
                }
            }
            self.assert(self.ty_enum.range_constraint(self.ctx, &self.var_insn_res_type(insn)));
        }
    }

    // ---- search-pruning constraints: spec.md §4.1 ----

    fn opnd_set(&self, insn: usize) -> BV<'ctx> {
        let ext = self.length as u32 - self.ln_width;
        let mut res = BV::from_i64(self.ctx, 0, self.length as u32);
        let one = BV::from_i64(self.ctx, 1, self.length as u32);
        for opnd in self.var_insn_opnds(insn) {
            let widened = opnd.zero_ext(ext);
            res = res.bvor(&one.bvshl(&widened));
        }
        res
    }

    fn add_constr_opt(&self, pruning: &PruningOptions) {
        if pruning.opt_insn_order {
            for insn in self.n_inputs..self.out_insn.saturating_sub(1) {
                self.assert(self.opnd_set(insn).bvule(&self.opnd_set(insn + 1)));
            }
        }

        for insn in self.n_inputs..self.out_insn {
            let op_var = self.var_insn_op(insn);
            let opnds = self.var_insn_opnds(insn);
            let is_const = self.var_insn_opnds_is_const(insn);

            for (idx, op) in self.ops.iter().enumerate() {
                let op_id = self.op_enum.const_of(self.ctx, idx);
                let cond = op_var._eq(&op_id);

                if pruning.opt_commutative && op.is_commutative() && op.arity() >= 2 {
                    let chain: Vec<Bool<'ctx>> =
                        (0..op.arity() - 1).map(|k| opnds[k].bvule(&opnds[k + 1])).collect();
                    let refs: Vec<&Bool<'ctx>> = chain.iter().collect();
                    self.assert(cond.implies(&Bool::and(self.ctx, &refs)));
                }

                if pruning.opt_const && op.arity() > 0 {
                    let vars = &is_const[..op.arity()];
                    if op.arity() == 2 && op.is_commutative() {
                        self.assert(cond.implies(&vars[0].not()));
                    } else if op.name() != "id" {
                        let refs: Vec<&Bool<'ctx>> = vars.iter().collect();
                        self.assert(cond.implies(&Bool::and(self.ctx, &refs).not()));
                    }
                }
            }

            if pruning.opt_no_cse {
                for other in self.n_inputs..insn {
                    let other_opnds = self.var_insn_opnds(other);
                    let un_eq: Vec<Bool<'ctx>> = opnds.iter().zip(&other_opnds).map(|(p, q)| p._eq(q).not()).collect();
                    if !un_eq.is_empty() {
                        let refs: Vec<&Bool<'ctx>> = un_eq.iter().collect();
                        self.assert(op_var._eq(&self.var_insn_op(other)).implies(&Bool::or(self.ctx, &refs)));
                    }
                }
            }
        }

        if pruning.opt_no_dead_code {
            for prod in self.n_inputs..self.length {
                let prod_bv = BV::from_i64(self.ctx, prod as i64, self.ln_width);
                let mut uses = Vec::new();
                for cons in prod + 1..self.length {
                    let is_const = self.var_insn_opnds_is_const(cons);
                    let opnds = self.var_insn_opnds(cons);
                    for (c, v) in is_const.iter().zip(&opnds) {
                        uses.push(Bool::and(self.ctx, &[&v._eq(&prod_bv), &c.not()]));
                    }
                }
                if !uses.is_empty() {
                    let refs: Vec<&Bool<'ctx>> = uses.iter().collect();
                    self.assert(Bool::or(self.ctx, &refs));
                }
            }
        }

        // id-tail: once a line is any `id` variant, every later operator line is too.
        let is_id = |insn: usize| -> Bool<'ctx> {
            let op_var = self.var_insn_op(insn);
            let opts: Vec<Bool<'ctx>> =
                self.id_indices.iter().map(|&idx| op_var._eq(&self.op_enum.const_of(self.ctx, idx))).collect();
            let refs: Vec<&Bool<'ctx>> = opts.iter().collect();
            Bool::or(self.ctx, &refs)
        };
        for insn in self.n_inputs..self.out_insn {
            let later: Vec<Bool<'ctx>> = (insn + 1..self.out_insn).map(is_id).collect();
            if !later.is_empty() {
                let refs: Vec<&Bool<'ctx>> = later.iter().collect();
                self.assert(is_id(insn).implies(&Bool::and(self.ctx, &refs)));
            }
        }

        // constant-id-first: an `id` line with a constant operand may have no earlier `id` line.
        for insn in self.n_inputs..self.out_insn {
            let is_const = self.var_insn_opnds_is_const(insn);
            if is_const.is_empty() {
                continue;
            }
            let has_const: Vec<&Bool<'ctx>> = is_const.iter().collect();
            let cond = Bool::and(self.ctx, &[&is_id(insn), &Bool::or(self.ctx, &has_const)]);
            let earlier: Vec<Bool<'ctx>> = (self.n_inputs..insn).map(|f| is_id(f).not()).collect();
            if !earlier.is_empty() {
                let refs: Vec<&Bool<'ctx>> = earlier.iter().collect();
                self.assert(cond.implies(&Bool::and(self.ctx, &refs)));
            }
        }
    }

    // ---- per-sample (counterexample) constraints: spec.md §4.1 ----

    fn connect_operand(&self, insn: usize, opnd: usize, ty: Ty, sample: usize) {
        let v = self.var_insn_opnd_val(insn, opnd, ty, sample);
        let c = self.var_insn_opnd_is_const(insn, opnd);
        let cv = self.var_insn_opnd_const_val(insn, opnd, ty);
        self.assert(c.implies(&v._eq(&cv)));
        let l = self.var_insn_opnd(insn, opnd);
        for other in 0..insn {
            let r = self.var_insn_res(other, ty, sample);
            let other_bv = BV::from_i64(self.ctx, other as i64, self.ln_width);
            self.assert(c.not().implies(&l._eq(&other_bv).implies(&v._eq(&r))));
        }
    }

    fn add_constr_instance(&self, sample: usize) {
        for insn in self.n_inputs..self.out_insn {
            let op_var = self.var_insn_op(insn);
            for (idx, op) in self.ops.iter().enumerate() {
                let op_id = self.op_enum.const_of(self.ctx, idx);
                let res = self.var_insn_res(insn, op.out_type(), sample);
                let opnds: Vec<Term<'ctx>> =
                    op.in_types().iter().enumerate().map(|(j, ty)| self.var_insn_opnd_val(insn, j, *ty, sample)).collect();
                let (precond, body) = op.instantiate(self.ctx, &[res], &opnds);
                self.assert(op_var._eq(&op_id).implies(&Bool::and(self.ctx, &[&precond, &body])));
            }

            let mut seen: AHashSet<(usize, Ty)> = AHashSet::new();
            for op in &self.ops {
                for (j, ty) in op.in_types().iter().enumerate() {
                    if seen.insert((j, *ty)) {
                        self.connect_operand(insn, j, *ty, sample);
                    }
                }
            }
        }

        for (j, ty) in self.spec.out_types().iter().enumerate() {
            self.connect_operand(self.out_insn, j, *ty, sample);
        }
    }

    fn add_constr_io_sample(&self, sample: usize, inputs: &[BvVal], outputs: &[BvVal]) {
        for (inp, val) in inputs.iter().enumerate() {
            self.assert(self.var_input_res(inp, sample)._eq(&val.to_term(self.ctx)));
        }
        for (out, val) in self.var_outs_val(sample).into_iter().zip(outputs) {
            self.assert(out._eq(&val.to_term(self.ctx)));
        }
    }

    fn add_constr_io_spec(&self, sample: usize, inputs: &[BvVal]) {
        for (inp, val) in inputs.iter().enumerate() {
            self.assert(val.to_term(self.ctx)._eq(&self.var_input_res(inp, sample)));
        }
        let outs = self.var_outs_val(sample);
        let ins: Vec<Term<'ctx>> = inputs.iter().map(|v| v.to_term(self.ctx)).collect();
        let (precond, body) = self.spec.instantiate(self.ctx, &outs, &ins);
        self.assert(precond.implies(&body));
    }

    /// Extends the synthesis formula with one counterexample input tuple
    /// (spec.md §4.1: `register_sample`). Samples are never retracted
    /// (spec.md §5's monotone-tightening ordering guarantee).
    pub fn register_sample(&self, sample: &[BvVal]) {
        let instance = self.n_samples.get();
        self.add_constr_instance(instance);
        if self.spec.is_deterministic() && self.spec.is_total() {
            let out_vals = self.spec.eval(sample);
            self.add_constr_io_sample(instance, sample, &out_vals);
        } else {
            self.add_constr_io_spec(instance, sample);
        }
        self.n_samples.set(instance + 1);
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples.get()
    }

    /// `check() -> Sat(model) | Unsat | Unknown` (spec.md §4.1).
    pub fn check(&self) -> CheckResult {
        if self.reset_solver {
            self.solver.reset();
            for phi in self.goal.borrow().iter() {
                self.solver.assert(phi);
            }
        }
        dump_smt2(&self.solver, self.output_prefix.as_deref(), &format!("synth_{}_{}", self.length - self.n_inputs - 1, self.n_samples.get()));
        match self.solver.check() {
            SatResult::Sat => CheckResult::Sat,
            SatResult::Unsat => CheckResult::Unsat,
            SatResult::Unknown => CheckResult::Unknown,
        }
    }

    /// Reconstructs a `Prg` from the last satisfying model (spec.md §4.1).
    /// Must only be called after `check()` returned `CheckResult::Sat`.
    pub fn reconstruct(&self) -> Result<Prg> {
        let model = self.solver.get_model().ok_or_else(|| SynthError::MalformedInput("no model available".into()))?;

        let prep_opnds = |insn: usize, in_types: &[Ty], model: &Model<'ctx>| -> Vec<Operand> {
            in_types
                .iter()
                .enumerate()
                .map(|(j, ty)| {
                    let is_const = model
                        .eval(&self.var_insn_opnd_is_const(insn, j), true)
                        .and_then(|b| b.as_bool())
                        .unwrap_or(false);
                    if is_const {
                        let cv = self.var_insn_opnd_const_val(insn, j, *ty);
                        let val = model.eval(&cv, true).expect("const_val must have a model value");
                        Operand::Const(dynamic_from_model(&val, *ty))
                    } else {
                        let l = self.var_insn_opnd(insn, j);
                        let line = model.eval(&l, true).and_then(|v| v.as_u64()).expect("opnd must have a model value");
                        Operand::Line(line as usize)
                    }
                })
                .collect()
        };

        let mut insns = Vec::with_capacity(self.out_insn - self.n_inputs);
        for insn in self.n_inputs..self.out_insn {
            let op_var = self.var_insn_op(insn);
            let idx = model
                .eval(&op_var, true)
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .ok_or_else(|| SynthError::MalformedInput(format!("no operator choice for line {insn}")))?;
            let op = self.op_index(idx).clone();
            let operands = prep_opnds(insn, op.in_types(), &model);
            insns.push(Insn { op, operands });
        }

        let outputs = prep_opnds(self.out_insn, self.spec.out_types(), &model);

        Ok(Prg::new(self.spec.in_types().to_vec(), self.spec.out_types().to_vec(), insns, outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitops::{And, Sub};
    use crate::spec::FnSpec;
    use z3::ast::Ast as _;
    use z3::Config;

    fn turn_off_rightmost_spec(width: u32) -> FnSpec {
        FnSpec::new(
            "turn_off_rightmost",
            vec![Ty::BitVec(width)],
            vec![Ty::BitVec(width)],
            move |ins| {
                let x = ins[0].as_u64().unwrap();
                vec![BvVal::bv(width, x & x.wrapping_sub(1))]
            },
            move |ctx, outs, ins| {
                let x = ins[0].as_bv().unwrap();
                let one = z3::ast::BV::from_i64(ctx, 1, width);
                let rhs = x.bvand(&x.bvsub(&one));
                (Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
            },
        )
    }

    #[test]
    fn finds_a_program_for_turn_off_rightmost_bit() {
        let width = 8;
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let spec: Arc<dyn Spec> = Arc::new(turn_off_rightmost_spec(width));
        let mut lib = OpLibrary::new();
        lib.insert(Arc::new(And::new(width)), Some(1));
        lib.insert(Arc::new(Sub::new(width)), Some(1));
        let pruning = PruningOptions { max_const: Some(1), ..PruningOptions::default() };
        let solver_cfg = SolverConfig::new();

        let encoder = Encoder::new(&ctx, spec.clone(), &lib, 2, &solver_cfg, pruning).unwrap();
        for sample in spec.sample_n(4) {
            encoder.register_sample(&sample);
        }
        assert_eq!(encoder.check(), CheckResult::Sat);
        let prg = encoder.reconstruct().unwrap();
        for x in 0u64..256 {
            let out = prg.eval(&[BvVal::bv(width, x)]);
            assert_eq!(out[0].as_u64().unwrap(), x & x.wrapping_sub(1));
        }
    }

    #[test]
    fn reports_unsat_when_operator_set_cannot_express_spec() {
        let width = 8;
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let spec: Arc<dyn Spec> = Arc::new(turn_off_rightmost_spec(width));
        let mut lib = OpLibrary::new();
        lib.insert(Arc::new(crate::bitops::Or::new(width)), Some(1));
        let solver_cfg = SolverConfig::new();

        let encoder = Encoder::new(&ctx, spec.clone(), &lib, 2, &solver_cfg, PruningOptions::default()).unwrap();
        for sample in spec.sample_n(8) {
            encoder.register_sample(&sample);
        }
        assert_eq!(encoder.check(), CheckResult::Unsat);
    }
}
