//! The bit-vector operator library. spec.md treats the operator catalog as
//! an external collaborator ("the bit-vector operator library... referenced
//! only by interface"); this module is the concrete one the benchmark
//! harness and the test suite actually use, grounded in
//! `examples/original_source/hackdel.py`'s `Bv` operator set (`add_`,
//! `sub_`, `and_`, `or_`, `xor_`, `neg_`, `not_`, `ashr_`, `lshr_`, `shl_`,
//! `ult_`, `uge_`, `slt_`, `sge_`) plus `mul` for the parity scenario (S5).

use std::sync::Arc;

use z3::ast::{Ast, Bool, BV};

use crate::error::SynthError;
use crate::op::{Op, Term};
use crate::ty::Ty;
use crate::value::BvVal;

fn as_bv<'ctx>(t: &Term<'ctx>) -> BV<'ctx> {
    t.as_bv().expect("operand was not a bit-vector term")
}

fn as_bool<'ctx>(t: &Term<'ctx>) -> Bool<'ctx> {
    t.as_bool().expect("operand was not a boolean term")
}

fn total<'ctx>(ctx: &'ctx z3::Context) -> Bool<'ctx> {
    Bool::from_bool(ctx, true)
}

fn to_signed(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

macro_rules! binary_bv_op {
    ($name:ident, $opname:literal, $z3method:ident, $eval:expr, $commutative:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            width: u32,
            in_types: [Ty; 2],
        }

        impl $name {
            pub fn new(width: u32) -> Self {
                Self { width, in_types: [Ty::BitVec(width), Ty::BitVec(width)] }
            }
        }

        impl Op for $name {
            fn name(&self) -> &str {
                $opname
            }
            fn in_types(&self) -> &[Ty] {
                &self.in_types
            }
            fn out_type(&self) -> Ty {
                Ty::BitVec(self.width)
            }
            fn is_commutative(&self) -> bool {
                $commutative
            }
            fn instantiate<'ctx>(
                &self,
                ctx: &'ctx z3::Context,
                outs: &[Term<'ctx>],
                ins: &[Term<'ctx>],
            ) -> (Bool<'ctx>, Bool<'ctx>) {
                let a = as_bv(&ins[0]);
                let b = as_bv(&ins[1]);
                let res = a.$z3method(&b);
                (total(ctx), as_bv(&outs[0])._eq(&res))
            }
            fn eval(&self, ins: &[BvVal]) -> BvVal {
                let a = ins[0].as_u64().unwrap();
                let b = ins[1].as_u64().unwrap();
                let f: fn(u64, u64, u32) -> u64 = $eval;
                BvVal::bv(self.width, f(a, b, self.width))
            }
            fn rewrite_width(&self, new_width: u32) -> Result<Arc<dyn Op>, SynthError> {
                Ok(Arc::new(Self::new(new_width)))
            }
        }
    };
}

binary_bv_op!(And, "and", bvand, |a, b, _| a & b, true);
binary_bv_op!(Or, "or", bvor, |a, b, _| a | b, true);
binary_bv_op!(Xor, "xor", bvxor, |a, b, _| a ^ b, true);
binary_bv_op!(Add, "add", bvadd, |a, b, w| a.wrapping_add(b) & mask(w), true);
binary_bv_op!(Sub, "sub", bvsub, |a, b, w| a.wrapping_sub(b) & mask(w), false);
binary_bv_op!(Mul, "mul", bvmul, |a, b, w| a.wrapping_mul(b) & mask(w), true);
binary_bv_op!(Shl, "shl", bvshl, |a, b, w| if b >= w as u64 { 0 } else { (a << b) & mask(w) }, false);
binary_bv_op!(Lshr, "lshr", bvlshr, |a, b, w| if b >= w as u64 { 0 } else { a >> b }, false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ashr {
    width: u32,
    in_types: [Ty; 2],
}

impl Ashr {
    pub fn new(width: u32) -> Self {
        Self { width, in_types: [Ty::BitVec(width), Ty::BitVec(width)] }
    }
}

impl Op for Ashr {
    fn name(&self) -> &str {
        "ashr"
    }
    fn in_types(&self) -> &[Ty] {
        &self.in_types
    }
    fn out_type(&self) -> Ty {
        Ty::BitVec(self.width)
    }
    fn instantiate<'ctx>(
        &self,
        ctx: &'ctx z3::Context,
        outs: &[Term<'ctx>],
        ins: &[Term<'ctx>],
    ) -> (Bool<'ctx>, Bool<'ctx>) {
        let a = as_bv(&ins[0]);
        let b = as_bv(&ins[1]);
        (total(ctx), as_bv(&outs[0])._eq(&a.bvashr(&b)))
    }
    fn eval(&self, ins: &[BvVal]) -> BvVal {
        let a = to_signed(ins[0].as_u64().unwrap(), self.width);
        let b = ins[1].as_u64().unwrap();
        let shifted = if b as u32 >= self.width { if a < 0 { -1 } else { 0 } } else { a >> b };
        BvVal::bv(self.width, shifted as u64)
    }
    fn rewrite_width(&self, new_width: u32) -> Result<Arc<dyn Op>, SynthError> {
        Ok(Arc::new(Self::new(new_width)))
    }
}

macro_rules! unary_bv_op {
    ($name:ident, $opname:literal, $z3method:ident, $eval:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            width: u32,
            in_types: [Ty; 1],
        }

        impl $name {
            pub fn new(width: u32) -> Self {
                Self { width, in_types: [Ty::BitVec(width)] }
            }
        }

        impl Op for $name {
            fn name(&self) -> &str {
                $opname
            }
            fn in_types(&self) -> &[Ty] {
                &self.in_types
            }
            fn out_type(&self) -> Ty {
                Ty::BitVec(self.width)
            }
            fn instantiate<'ctx>(
                &self,
                ctx: &'ctx z3::Context,
                outs: &[Term<'ctx>],
                ins: &[Term<'ctx>],
            ) -> (Bool<'ctx>, Bool<'ctx>) {
                let a = as_bv(&ins[0]);
                let res = a.$z3method();
                (total(ctx), as_bv(&outs[0])._eq(&res))
            }
            fn eval(&self, ins: &[BvVal]) -> BvVal {
                let a = ins[0].as_u64().unwrap();
                let f: fn(u64, u32) -> u64 = $eval;
                BvVal::bv(self.width, f(a, self.width))
            }
            fn rewrite_width(&self, new_width: u32) -> Result<Arc<dyn Op>, SynthError> {
                Ok(Arc::new(Self::new(new_width)))
            }
        }
    };
}

unary_bv_op!(Neg, "neg", bvneg, |a, w| (0u64.wrapping_sub(a)) & mask(w));
unary_bv_op!(Not, "not", bvnot, |a, w| (!a) & mask(w));

macro_rules! compare_bv_op {
    ($name:ident, $opname:literal, $z3method:ident, $eval:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            width: u32,
            in_types: [Ty; 2],
        }

        impl $name {
            pub fn new(width: u32) -> Self {
                Self { width, in_types: [Ty::BitVec(width), Ty::BitVec(width)] }
            }
        }

        impl Op for $name {
            fn name(&self) -> &str {
                $opname
            }
            fn in_types(&self) -> &[Ty] {
                &self.in_types
            }
            fn out_type(&self) -> Ty {
                Ty::Bool
            }
            fn instantiate<'ctx>(
                &self,
                ctx: &'ctx z3::Context,
                outs: &[Term<'ctx>],
                ins: &[Term<'ctx>],
            ) -> (Bool<'ctx>, Bool<'ctx>) {
                let a = as_bv(&ins[0]);
                let b = as_bv(&ins[1]);
                let res = a.$z3method(&b);
                (total(ctx), as_bool(&outs[0])._eq(&res))
            }
            fn eval(&self, ins: &[BvVal]) -> BvVal {
                let a = ins[0].as_u64().unwrap();
                let b = ins[1].as_u64().unwrap();
                let f: fn(u64, u64, u32) -> bool = $eval;
                BvVal::Bool(f(a, b, self.width))
            }
            fn rewrite_width(&self, new_width: u32) -> Result<Arc<dyn Op>, SynthError> {
                Ok(Arc::new(Self::new(new_width)))
            }
        }
    };
}

compare_bv_op!(Ult, "ult", bvult, |a, b, _| a < b);
compare_bv_op!(Uge, "uge", bvuge, |a, b, _| a >= b);
compare_bv_op!(Slt, "slt", bvslt, |a, b, w| to_signed(a, w) < to_signed(b, w));
compare_bv_op!(Sge, "sge", bvsge, |a, b, w| to_signed(a, w) >= to_signed(b, w));

/// The synthetic identity operator silently appended to Ω by the encoder
/// (spec.md §4.3), never exposed to callers' own `Ω`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id {
    ty: Ty,
}

impl Id {
    pub fn new(ty: Ty) -> Self {
        Self { ty }
    }
}

impl Op for Id {
    fn name(&self) -> &str {
        "id"
    }
    fn in_types(&self) -> &[Ty] {
        std::slice::from_ref(&self.ty)
    }
    fn out_type(&self) -> Ty {
        self.ty
    }
    fn instantiate<'ctx>(
        &self,
        ctx: &'ctx z3::Context,
        outs: &[Term<'ctx>],
        ins: &[Term<'ctx>],
    ) -> (Bool<'ctx>, Bool<'ctx>) {
        (total(ctx), outs[0]._eq(&ins[0]))
    }
    fn eval(&self, ins: &[BvVal]) -> BvVal {
        ins[0]
    }
    fn rewrite_width(&self, new_width: u32) -> Result<Arc<dyn Op>, SynthError> {
        Ok(Arc::new(Self::new(self.ty.rewrite_width(new_width))))
    }
}
