use std::sync::Arc;

use rand::Rng;
use z3::ast::Bool;

use crate::error::SynthError;
use crate::op::Term;
use crate::ty::Ty;
use crate::value::BvVal;

/// Same shape as [`crate::op::Op`], plus determinism/totality flags and a
/// sampler (spec.md §3). Unlike an `Op`, a spec may have several outputs.
pub trait Spec: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn in_types(&self) -> &[Ty];
    fn out_types(&self) -> &[Ty];

    fn is_deterministic(&self) -> bool {
        true
    }

    fn is_total(&self) -> bool {
        true
    }

    /// Builds `(precondition, body)` over fresh output/input term handles.
    fn instantiate<'ctx>(
        &self,
        ctx: &'ctx z3::Context,
        outs: &[Term<'ctx>],
        ins: &[Term<'ctx>],
    ) -> (Bool<'ctx>, Bool<'ctx>);

    /// Concrete evaluation. Only ever called by the encoder when
    /// `is_deterministic() && is_total()` (spec.md §4.1's sample-output
    /// constraint); specs that are neither may panic here.
    fn eval(&self, ins: &[BvVal]) -> Vec<BvVal>;

    /// Draws `n` concrete input tuples from the spec's domain. The core only
    /// requires that repeated calls are non-degenerate (spec.md §3).
    fn sample_n(&self, n: usize) -> Vec<Vec<BvVal>>;

    /// Re-emits this spec at a different bit-vector width, for the
    /// downscaler (§4.6). Specs built by hand (as opposed to `FnSpec`'s
    /// width-family builder) have no generic way to reconstruct their own
    /// closures at a new width, so the default reports the spec as not
    /// downscalable and the outer loop falls back to the original width.
    fn rewrite_width(&self, _new_width: u32) -> Result<Arc<dyn Spec>, SynthError> {
        Err(SynthError::DownscaleUnsupported(format!("spec `{}` does not support width rewriting", self.name())))
    }
}

type SymFn = Box<dyn for<'ctx> Fn(&'ctx z3::Context, &[Term<'ctx>], &[Term<'ctx>]) -> (Bool<'ctx>, Bool<'ctx>) + Send + Sync>;
type EvalFn = Box<dyn Fn(&[BvVal]) -> Vec<BvVal> + Send + Sync>;
type WidthFamily = dyn Fn(u32) -> FnSpec + Send + Sync;

/// Adapts a Rust closure pair — one concrete, one symbolic — into a
/// deterministic/total `Spec`. This is the common case exercised by every
/// S1-S6 scenario in spec.md §8: the spec author writes the SMT relation by
/// hand (mirroring the original Python benchmarks' `Spec(phi=...)`) and a
/// plain function for fast concrete sampling/self-verification.
pub struct FnSpec {
    name: String,
    in_types: Vec<Ty>,
    out_types: Vec<Ty>,
    eval_fn: EvalFn,
    sym_fn: SymFn,
    deterministic: bool,
    total: bool,
    /// Rebuilds this same spec at an arbitrary width, if the caller supplied
    /// one. Only `FnSpec::with_width_family` sets this.
    width_family: Option<Arc<WidthFamily>>,
}

impl std::fmt::Debug for FnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSpec")
            .field("name", &self.name)
            .field("in_types", &self.in_types)
            .field("out_types", &self.out_types)
            .finish()
    }
}

impl FnSpec {
    pub fn new(
        name: impl Into<String>,
        in_types: Vec<Ty>,
        out_types: Vec<Ty>,
        eval_fn: impl Fn(&[BvVal]) -> Vec<BvVal> + Send + Sync + 'static,
        sym_fn: impl for<'ctx> Fn(&'ctx z3::Context, &[Term<'ctx>], &[Term<'ctx>]) -> (Bool<'ctx>, Bool<'ctx>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            in_types,
            out_types,
            eval_fn: Box::new(eval_fn),
            sym_fn: Box::new(sym_fn),
            deterministic: true,
            total: true,
            width_family: None,
        }
    }

    pub fn partial(mut self, deterministic: bool, total: bool) -> Self {
        self.deterministic = deterministic;
        self.total = total;
        self
    }

    /// Registers a constructor able to rebuild this spec at any width, so the
    /// downscaler (§4.6) can call `rewrite_width` on it. `family(w)` must
    /// build the same spec as this one, just at width `w`.
    pub fn with_width_family(mut self, family: impl Fn(u32) -> FnSpec + Send + Sync + 'static) -> Self {
        self.width_family = Some(Arc::new(family));
        self
    }
}

impl Spec for FnSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_types(&self) -> &[Ty] {
        &self.in_types
    }

    fn out_types(&self) -> &[Ty] {
        &self.out_types
    }

    fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    fn is_total(&self) -> bool {
        self.total
    }

    fn instantiate<'ctx>(
        &self,
        ctx: &'ctx z3::Context,
        outs: &[Term<'ctx>],
        ins: &[Term<'ctx>],
    ) -> (Bool<'ctx>, Bool<'ctx>) {
        (self.sym_fn)(ctx, outs, ins)
    }

    fn eval(&self, ins: &[BvVal]) -> Vec<BvVal> {
        (self.eval_fn)(ins)
    }

    fn sample_n(&self, n: usize) -> Vec<Vec<BvVal>> {
        let mut rng = rand::thread_rng();
        (0..n)
            .map(|_| {
                self.in_types
                    .iter()
                    .map(|ty| match ty {
                        Ty::Bool => BvVal::Bool(rng.gen()),
                        Ty::BitVec(w) => BvVal::bv(*w, rng.gen::<u64>()),
                    })
                    .collect()
            })
            .collect()
    }

    fn rewrite_width(&self, new_width: u32) -> Result<Arc<dyn Spec>, SynthError> {
        match &self.width_family {
            Some(family) => Ok(Arc::new(family(new_width))),
            None => Err(SynthError::DownscaleUnsupported(format!("spec `{}` has no width family registered", self.name))),
        }
    }
}
