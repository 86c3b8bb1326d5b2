use std::sync::Arc;

use itertools::Itertools;
use z3::ast::{Bool, Dynamic};

use crate::error::SynthError;
use crate::ty::Ty;
use crate::value::BvVal;

/// A term handle inside some encoder's term universe. The encoder never
/// hands out raw `z3::ast::BV`/`Bool` directly to operator impls — everything
/// is boxed as `Dynamic` and downcast on use, since an operator's operand
/// types are only known once the caller picks `in_types`.
pub type Term<'ctx> = Dynamic<'ctx>;

/// A typed logical relation pluggable into the synthesizer: `and`, `add`,
/// `ashr`, ... Implementors describe their own SMT semantics via
/// `instantiate` and their concrete semantics via `eval`, so that the same
/// `Op` value drives both symbolic encoding (§4.1) and `Prg::eval`
/// self-verification (§6).
pub trait Op: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
    fn in_types(&self) -> &[Ty];
    fn out_type(&self) -> Ty;

    fn arity(&self) -> usize {
        self.in_types().len()
    }

    fn is_commutative(&self) -> bool {
        false
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn is_total(&self) -> bool {
        true
    }

    /// Builds `(precondition, body)` over the given output/input term
    /// handles, both already allocated in `ctx` at this operator's types.
    fn instantiate<'ctx>(
        &self,
        ctx: &'ctx z3::Context,
        outs: &[Term<'ctx>],
        ins: &[Term<'ctx>],
    ) -> (Bool<'ctx>, Bool<'ctx>);

    /// Concrete evaluation, used by `Prg::eval` and by deterministic/total
    /// specs to compute sample outputs without going through the solver.
    fn eval(&self, ins: &[BvVal]) -> BvVal;

    /// Re-emits this operator at a different bit-vector width, for the
    /// downscaler (§4.6). Operators with no width parameter (e.g. a
    /// bool-valued comparison is still width-parameterized over its
    /// operands) must override this; the default reports the operator as
    /// not downscalable, which makes the outer loop fall back to the
    /// original width.
    fn rewrite_width(&self, _new_width: u32) -> Result<Arc<dyn Op>, SynthError> {
        Err(SynthError::DownscaleUnsupported(format!(
            "operator `{}` does not support width rewriting",
            self.name()
        )))
    }
}

/// `max_uses = None` is the spec's sentinel ∞ ("unrestricted").
pub type MaxUses = Option<u32>;

/// The operator library Ω: a mapping `Op -> max_uses`. Constructing from a
/// plain `Vec<Arc<dyn Op>>` is equivalent to `{op: ∞}` for every op, per
/// spec.md §3.
#[derive(Clone, Default)]
pub struct OpLibrary {
    entries: Vec<(Arc<dyn Op>, MaxUses)>,
}

impl OpLibrary {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, op: Arc<dyn Op>, max_uses: MaxUses) {
        self.entries.push((op, max_uses));
    }

    pub fn with(mut self, op: Arc<dyn Op>, max_uses: MaxUses) -> Self {
        self.insert(op, max_uses);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<dyn Op>, MaxUses)> {
        self.entries.iter().map(|(op, m)| (op, *m))
    }

    pub fn max_arity(&self) -> usize {
        self.entries.iter().map(|(op, _)| op.arity()).max().unwrap_or(0)
    }

    /// All distinct `Ty`s mentioned by any operator's input or output types,
    /// used to size the per-type constant-value symbol families (§4.1).
    pub fn all_types(&self) -> Vec<Ty> {
        self.entries
            .iter()
            .flat_map(|(op, _)| op.in_types().iter().copied().chain(std::iter::once(op.out_type())))
            .unique()
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<dyn Op>> {
        self.entries.iter().find(|(op, _)| op.name() == name).map(|(op, _)| op)
    }
}

impl From<Vec<Arc<dyn Op>>> for OpLibrary {
    fn from(ops: Vec<Arc<dyn Op>>) -> Self {
        let entries = ops.into_iter().map(|op| (op, None)).collect();
        Self { entries }
    }
}

impl FromIterator<Arc<dyn Op>> for OpLibrary {
    fn from_iter<T: IntoIterator<Item = Arc<dyn Op>>>(iter: T) -> Self {
        Self { entries: iter.into_iter().map(|op| (op, None)).collect() }
    }
}
