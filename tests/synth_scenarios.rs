//! End-to-end scenarios S1-S6 plus the width/type supplements, grounded in
//! `examples/original_source/hackdel.py`'s benchmark table. Each S1-S5 case
//! asserts a program is found, that it agrees with the spec on every input
//! in its domain (width 8 is small enough to enumerate exhaustively rather
//! than sample), and that it stays within the operator budget it was given.
//! S6 asserts the opposite: a budget too thin to express the spec reports
//! no program within a bounded number of CEGIS rounds.

use std::sync::Arc;

use bv_cegis::bitops::{And, Ashr, Lshr, Mul, Or, Sub, Xor};
use bv_cegis::config::PruningOptions;
use bv_cegis::op::{Op, OpLibrary};
use bv_cegis::spec::FnSpec;
use bv_cegis::{synth, BvVal, Spec, SynthOptions, Ty};

const WIDTH: u32 = 8;

fn to_signed(value: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

fn spec_over(
    name: &'static str,
    eval: impl Fn(u64) -> u64 + Send + Sync + 'static,
    sym: impl for<'ctx> Fn(
            &'ctx z3::Context,
            &[bv_cegis::op::Term<'ctx>],
            &[bv_cegis::op::Term<'ctx>],
        ) -> (z3::ast::Bool<'ctx>, z3::ast::Bool<'ctx>)
        + Send
        + Sync
        + 'static,
) -> Arc<dyn Spec> {
    Arc::new(FnSpec::new(
        name,
        vec![Ty::BitVec(WIDTH)],
        vec![Ty::BitVec(WIDTH)],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::bv(WIDTH, eval(x))]
        },
        sym,
    ))
}

fn assert_matches_on_all_inputs(spec: &dyn Spec, prg: &bv_cegis::Prg) {
    for x in 0u64..(1 << WIDTH) {
        let input = [BvVal::bv(WIDTH, x)];
        let expected = spec.eval(&input);
        let actual = prg.eval(&input);
        assert_eq!(actual, expected, "mismatch at x={x}");
    }
}

/// S1: `f(x) = x & (x-1)`, `{and:1, sub:1}`, `max_const=1`.
#[test]
fn s1_turn_off_rightmost_bit() {
    use z3::ast::Ast;
    let spec = spec_over(
        "turn_off_rightmost",
        |x| x & x.wrapping_sub(1),
        |ctx, outs, ins| {
            let x = ins[0].as_bv().unwrap();
            let one = z3::ast::BV::from_i64(ctx, 1, WIDTH);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&x.bvand(&x.bvsub(&one))))
        },
    );

    let ops: OpLibrary = vec![Arc::new(And::new(WIDTH)) as Arc<dyn Op>, Arc::new(Sub::new(WIDTH))].into();
    let opts = SynthOptions { pruning: PruningOptions { max_const: Some(1), ..Default::default() }, ..Default::default() };

    let (prg, stats) = synth(spec.clone(), ops, 1..=3, 6, opts).unwrap();
    let prg = prg.expect("S1 is expressible in {and, sub} at length 2");
    assert!(stats.found());
    assert_matches_on_all_inputs(spec.as_ref(), &prg);
    assert!(prg.insns.len() <= 2);
}

/// S2: `f(x) = x & -x`, `{and:1, sub:1}`, `max_const=1`.
#[test]
fn s2_isolate_rightmost_bit() {
    use z3::ast::Ast;
    let spec = spec_over(
        "isolate_rightmost",
        |x| x & 0u64.wrapping_sub(x),
        |ctx, outs, ins| {
            let x = ins[0].as_bv().unwrap();
            let zero = z3::ast::BV::from_i64(ctx, 0, WIDTH);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&x.bvand(&zero.bvsub(&x))))
        },
    );

    let ops: OpLibrary = vec![Arc::new(And::new(WIDTH)) as Arc<dyn Op>, Arc::new(Sub::new(WIDTH))].into();
    let opts = SynthOptions { pruning: PruningOptions { max_const: Some(1), ..Default::default() }, ..Default::default() };

    let (prg, stats) = synth(spec.clone(), ops, 1..=3, 6, opts).unwrap();
    let prg = prg.expect("S2 is expressible in {and, sub} at length 2");
    assert!(stats.found());
    assert_matches_on_all_inputs(spec.as_ref(), &prg);
}

/// S3: `f(x) = x ^ (x-1)`, `{xor:1, sub:1}`, `max_const=1`.
#[test]
fn s3_xor_with_predecessor() {
    use z3::ast::Ast;
    let spec = spec_over(
        "xor_predecessor",
        |x| x ^ x.wrapping_sub(1),
        |ctx, outs, ins| {
            let x = ins[0].as_bv().unwrap();
            let one = z3::ast::BV::from_i64(ctx, 1, WIDTH);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&x.bvxor(&x.bvsub(&one))))
        },
    );

    let ops: OpLibrary = vec![Arc::new(Xor::new(WIDTH)) as Arc<dyn Op>, Arc::new(Sub::new(WIDTH))].into();
    let opts = SynthOptions { pruning: PruningOptions { max_const: Some(1), ..Default::default() }, ..Default::default() };

    let (prg, stats) = synth(spec.clone(), ops, 1..=3, 6, opts).unwrap();
    let prg = prg.expect("S3 is expressible in {xor, sub} at length 2");
    assert!(stats.found());
    assert_matches_on_all_inputs(spec.as_ref(), &prg);
}

/// S4: `f(x) = |x|` at width 8, `{xor:1, sub:1, ashr:1}`, `max_const=1`.
#[test]
fn s4_absolute_value() {
    use z3::ast::Ast;
    let spec = spec_over(
        "abs_value",
        |x| {
            let signed = to_signed(x, WIDTH);
            signed.unsigned_abs() as u64
        },
        |ctx, outs, ins| {
            let x = ins[0].as_bv().unwrap();
            let shift = z3::ast::BV::from_i64(ctx, (WIDTH - 1) as i64, WIDTH);
            let s = x.bvashr(&shift);
            let rhs = x.bvxor(&s).bvsub(&s);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    );

    let ops: OpLibrary = vec![
        Arc::new(Xor::new(WIDTH)) as Arc<dyn Op>,
        Arc::new(Sub::new(WIDTH)),
        Arc::new(Ashr::new(WIDTH)),
    ]
    .into();
    let opts = SynthOptions { pruning: PruningOptions { max_const: Some(1), ..Default::default() }, ..Default::default() };

    let (prg, stats) = synth(spec.clone(), ops, 1..=3, 8, opts).unwrap();
    let prg = prg.expect("S4 is expressible in {xor, sub, ashr} at length 2");
    assert!(stats.found());
    assert_matches_on_all_inputs(spec.as_ref(), &prg);
}

/// S5: parity `f(x) = popcount(x) & 1` at width 8, a 4-instruction folding
/// chain over `{mul:1, xor:2, and:2, lshr:3}`, `max_const=5`, verified
/// against the full 8-bit truth table.
#[test]
fn s5_parity() {
    use z3::ast::Ast;
    let spec = spec_over(
        "parity",
        |x| (x.count_ones() & 1) as u64,
        |ctx, outs, ins| {
            let x = ins[0].as_bv().unwrap();
            let mut acc = x.clone();
            let mut shift = 1u32;
            while shift < WIDTH {
                let sh = z3::ast::BV::from_i64(ctx, shift as i64, WIDTH);
                acc = acc.bvxor(&x.bvlshr(&sh));
                shift *= 2;
            }
            let one = z3::ast::BV::from_i64(ctx, 1, WIDTH);
            let rhs = acc.bvand(&one);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    );

    let ops: OpLibrary = vec![
        Arc::new(Mul::new(WIDTH)) as Arc<dyn Op>,
        Arc::new(Xor::new(WIDTH)),
        Arc::new(And::new(WIDTH)),
        Arc::new(Lshr::new(WIDTH)),
    ]
    .into();
    let opts = SynthOptions { pruning: PruningOptions { max_const: Some(5), ..Default::default() }, ..Default::default() };

    let (prg, stats) = synth(spec.clone(), ops, 1..=4, 16, opts).unwrap();
    let prg = prg.expect("parity is expressible within a 4-instruction folding chain");
    assert!(stats.found());
    assert_matches_on_all_inputs(spec.as_ref(), &prg);
    assert!(prg.insns.len() <= 4);
}

/// S6: turn-off-rightmost-bit restricted to `{or:1}` alone has no
/// realization — `synth` must report `None` within a bounded number of
/// CEGIS rounds rather than looping forever.
#[test]
fn s6_unsatisfiable_operator_budget_reports_none() {
    use z3::ast::Ast;
    let spec = spec_over(
        "turn_off_rightmost",
        |x| x & x.wrapping_sub(1),
        |ctx, outs, ins| {
            let x = ins[0].as_bv().unwrap();
            let one = z3::ast::BV::from_i64(ctx, 1, WIDTH);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&x.bvand(&x.bvsub(&one))))
        },
    );

    let ops: OpLibrary = vec![Arc::new(Or::new(WIDTH)) as Arc<dyn Op>].into();
    let opts = SynthOptions { cegis_iter_limit: 64, ..Default::default() };

    let (prg, stats) = synth(spec, ops, 1..=2, 8, opts).unwrap();
    assert!(prg.is_none());
    assert!(!stats.found());
}

/// `is_power_of_two`: `f(x) = x != 0 && (x & (x-1)) == 0`, a `Bool`-output
/// scenario exercising the `Ty::Bool` path end to end over `{and:1, sub:1,
/// ult:1}` — equality is expressed as `masked < 1`, since the library has
/// no direct equality operator (spec.md's examples are all `BitVec`-typed;
/// the original exercises `Bool` outputs too via `ult_`/`slt_`-style
/// comparisons, so this crate's type system is tested on both).
#[test]
fn is_power_of_two_bool_output() {
    use bv_cegis::bitops::Ult;
    use z3::ast::Ast;

    let spec: Arc<dyn Spec> = Arc::new(FnSpec::new(
        "is_power_of_two",
        vec![Ty::BitVec(WIDTH)],
        vec![Ty::Bool],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::Bool(x != 0 && (x & x.wrapping_sub(1)) == 0)]
        },
        move |ctx, outs, ins| {
            let x = ins[0].as_bv().unwrap();
            let zero = z3::ast::BV::from_i64(ctx, 0, WIDTH);
            let one = z3::ast::BV::from_i64(ctx, 1, WIDTH);
            let masked = x.bvand(&x.bvsub(&one));
            let rhs = masked.bvult(&one).and(&[&x._eq(&zero).not()]);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bool().unwrap()._eq(&rhs))
        },
    ));

    let ops: OpLibrary = vec![Arc::new(And::new(WIDTH)) as Arc<dyn Op>, Arc::new(Sub::new(WIDTH)), Arc::new(Ult::new(WIDTH))].into();
    let opts = SynthOptions { pruning: PruningOptions { max_const: Some(1), ..Default::default() }, ..Default::default() };

    let (prg, stats) = synth(spec.clone(), ops, 1..=4, 16, opts).unwrap();
    let prg = prg.expect("is_power_of_two is expressible in {and, sub, ult}");
    assert!(stats.found());
    for x in 0u64..(1 << WIDTH) {
        let input = [BvVal::bv(WIDTH, x)];
        assert_eq!(prg.eval(&input), spec.eval(&input), "mismatch at x={x}");
    }
}
