use z3::ast::{Ast, Bool, BV};
use z3::{Context, Model};

/// A finite "enum" sort realized as a range-limited bit-vector (spec.md §9:
/// "Implementers may either use the solver's native finite enum sort or a
/// small bit-vector with a range-limit constraint; both are acceptable").
/// `item_to_cons`/`cons_to_item` (§9's single required abstraction) collapse
/// here to plain index arithmetic, so the rest of the encoder never has to
/// know which underlying sort is in play.
#[derive(Debug, Clone, Copy)]
pub struct EnumSort {
    width: u32,
    len: usize,
}

pub(crate) fn bits_for(n: usize) -> u32 {
    if n <= 1 {
        1
    } else {
        (usize::BITS - (n - 1).leading_zeros()).max(1)
    }
}

impl EnumSort {
    pub fn new(len: usize) -> Self {
        Self { width: bits_for(len.max(1)), len }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn var<'ctx>(&self, ctx: &'ctx Context, name: &str) -> BV<'ctx> {
        BV::new_const(ctx, name, self.width)
    }

    pub fn const_of<'ctx>(&self, ctx: &'ctx Context, index: usize) -> BV<'ctx> {
        BV::from_i64(ctx, index as i64, self.width)
    }

    /// `ULT(var, len)`: a no-op for a native datatype enum sort, required
    /// here because a bit-vector of `width` bits can represent more values
    /// than `len` items.
    pub fn range_constraint<'ctx>(&self, ctx: &'ctx Context, var: &BV<'ctx>) -> Bool<'ctx> {
        var.bvult(&BV::from_i64(ctx, self.len as i64, self.width))
    }

    pub fn index_from_model(&self, model: &Model, var: &BV) -> Option<usize> {
        model.eval(var, true).and_then(|v| v.as_u64()).map(|v| v as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_grows_with_len() {
        assert_eq!(EnumSort::new(1).width(), 1);
        assert_eq!(EnumSort::new(2).width(), 1);
        assert_eq!(EnumSort::new(3).width(), 2);
        assert_eq!(EnumSort::new(16).width(), 4);
        assert_eq!(EnumSort::new(17).width(), 5);
    }
}
