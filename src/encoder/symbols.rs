use std::cell::RefCell;

use ahash::AHashMap;
use z3::ast::{Ast, Bool, Dynamic, BV};
use z3::Context;

use crate::ty::Ty;

/// Memoized symbolic-variable allocator. spec.md §9 requires that "the same
/// `(ty, name, sample)` triple always returns the same term"; this is the
/// `@lru_cache def get_var` of the original, reified as an explicit cache
/// rather than a decorator.
pub struct SymbolTable<'ctx> {
    ctx: &'ctx Context,
    vars: RefCell<AHashMap<String, Dynamic<'ctx>>>,
}

impl<'ctx> SymbolTable<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self { ctx, vars: RefCell::new(AHashMap::new()) }
    }

    pub fn get_bv(&self, name: &str, width: u32) -> BV<'ctx> {
        let mut vars = self.vars.borrow_mut();
        if let Some(v) = vars.get(name) {
            return v.as_bv().expect("symbol re-requested at a different sort");
        }
        let v = BV::new_const(self.ctx, name, width);
        vars.insert(name.to_string(), Dynamic::from_ast(&v));
        v
    }

    pub fn get_bool(&self, name: &str) -> Bool<'ctx> {
        let mut vars = self.vars.borrow_mut();
        if let Some(v) = vars.get(name) {
            return v.as_bool().expect("symbol re-requested at a different sort");
        }
        let v = Bool::new_const(self.ctx, name);
        vars.insert(name.to_string(), Dynamic::from_ast(&v));
        v
    }

    pub fn get_dynamic(&self, name: &str, ty: Ty) -> Dynamic<'ctx> {
        match ty {
            Ty::Bool => Dynamic::from_ast(&self.get_bool(name)),
            Ty::BitVec(w) => Dynamic::from_ast(&self.get_bv(name, w)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::Config;

    #[test]
    fn same_name_returns_the_same_term() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let table = SymbolTable::new(&ctx);
        let a = table.get_bv("x", 8);
        let b = table.get_bv("x", 8);
        assert_eq!(a, b);
    }
}
