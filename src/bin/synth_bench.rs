//! `synth-bench`: a small CLI harness exercising the library against a
//! catalog of Hacker's-Delight-style bit-vector puzzles (spec.md §1's "the
//! benchmark harness... referenced only by interface"). Grounded in the
//! teacher's `main.rs` `Cli` struct/`clap::Parser` usage and in
//! `examples/original_source/hackdel.py`'s `BvBench` puzzle list — a subset
//! of it expressible with this crate's current operator set
//! (`src/bitops.rs`); puzzles needing operators this crate doesn't ship
//! (`udiv`, a boolean-to-bitvec cast) are left out rather than guessed at,
//! and recorded as excluded in `DESIGN.md`.

use std::process::ExitCode;
use std::sync::Arc;

use bv_cegis::bitops::{Add, And, Ashr, Neg, Or, Sub, Ult, Xor};
use bv_cegis::config::{PruningOptions, SolverConfig};
use bv_cegis::op::OpLibrary;
use bv_cegis::spec::FnSpec;
use bv_cegis::{log, synth, BvVal, Spec, SynthOptions, Ty};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "synth-bench")]
struct Cli {
    /// Which puzzle to run; see `--list` for the catalog.
    #[arg(long)]
    puzzle: Option<String>,
    #[arg(long)]
    list: bool,
    #[arg(long, default_value_t = 8)]
    width: u32,
    #[arg(long)]
    max_const: Option<u32>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    downsize: bool,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[arg(long)]
    output_prefix: Option<String>,
    #[arg(long, default_value_t = 6)]
    max_length: usize,
}

struct Puzzle {
    name: &'static str,
    describe: &'static str,
    build: fn(u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>),
}

fn turn_off_rightmost(width: u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>) {
    let spec = FnSpec::new(
        "turn_off_rightmost",
        vec![Ty::BitVec(width)],
        vec![Ty::BitVec(width)],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::bv(width, x & x.wrapping_sub(1))]
        },
        move |ctx, outs, ins| {
            use z3::ast::Ast;
            let x = ins[0].as_bv().unwrap();
            let one = z3::ast::BV::from_i64(ctx, 1, width);
            let rhs = x.bvand(&x.bvsub(&one));
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    )
    .with_width_family(turn_off_rightmost);
    let ops = OpLibrary::new().with(Arc::new(And::new(width)), Some(1)).with(Arc::new(Sub::new(width)), Some(1));
    (Arc::new(spec), ops, Some(1))
}

fn isolate_rightmost_one(width: u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>) {
    let spec = FnSpec::new(
        "isolate_rightmost_one",
        vec![Ty::BitVec(width)],
        vec![Ty::BitVec(width)],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::bv(width, x & 0u64.wrapping_sub(x))]
        },
        move |ctx, outs, ins| {
            use z3::ast::Ast;
            let x = ins[0].as_bv().unwrap();
            let rhs = x.bvand(&x.bvneg());
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    )
    .with_width_family(isolate_rightmost_one);
    let ops = OpLibrary::new().with(Arc::new(And::new(width)), Some(1)).with(Arc::new(Neg::new(width)), Some(1));
    (Arc::new(spec), ops, None)
}

fn mask_trailing_ones(width: u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>) {
    let spec = FnSpec::new(
        "mask_trailing_ones",
        vec![Ty::BitVec(width)],
        vec![Ty::BitVec(width)],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::bv(width, x ^ x.wrapping_sub(1))]
        },
        move |ctx, outs, ins| {
            use z3::ast::Ast;
            let x = ins[0].as_bv().unwrap();
            let one = z3::ast::BV::from_i64(ctx, 1, width);
            let rhs = x.bvxor(&x.bvsub(&one));
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    )
    .with_width_family(mask_trailing_ones);
    let ops = OpLibrary::new().with(Arc::new(Xor::new(width)), Some(1)).with(Arc::new(Sub::new(width)), Some(1));
    (Arc::new(spec), ops, Some(1))
}

fn right_propagate_rightmost_one(width: u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>) {
    let spec = FnSpec::new(
        "right_propagate_rightmost_one",
        vec![Ty::BitVec(width)],
        vec![Ty::BitVec(width)],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::bv(width, x | x.wrapping_sub(1))]
        },
        move |ctx, outs, ins| {
            use z3::ast::Ast;
            let x = ins[0].as_bv().unwrap();
            let one = z3::ast::BV::from_i64(ctx, 1, width);
            let rhs = x.bvor(&x.bvsub(&one));
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    )
    .with_width_family(right_propagate_rightmost_one);
    let ops = OpLibrary::new().with(Arc::new(Or::new(width)), Some(1)).with(Arc::new(Sub::new(width)), Some(1));
    (Arc::new(spec), ops, Some(1))
}

fn turn_on_rightmost_zero(width: u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>) {
    let spec = FnSpec::new(
        "turn_on_rightmost_zero",
        vec![Ty::BitVec(width)],
        vec![Ty::BitVec(width)],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::bv(width, x | x.wrapping_add(1))]
        },
        move |ctx, outs, ins| {
            use z3::ast::Ast;
            let x = ins[0].as_bv().unwrap();
            let one = z3::ast::BV::from_i64(ctx, 1, width);
            let rhs = x.bvor(&x.bvadd(&one));
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    )
    .with_width_family(turn_on_rightmost_zero);
    let ops = OpLibrary::new().with(Arc::new(Or::new(width)), Some(1)).with(Arc::new(Add::new(width)), Some(1));
    (Arc::new(spec), ops, Some(1))
}

fn abs_value(width: u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>) {
    let spec = FnSpec::new(
        "abs_value",
        vec![Ty::BitVec(width)],
        vec![Ty::BitVec(width)],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            let signed = BvVal::bv(width, x).is_negative();
            let abs = if signed { 0u64.wrapping_sub(x) } else { x };
            vec![BvVal::bv(width, abs)]
        },
        move |ctx, outs, ins| {
            use z3::ast::Ast;
            let x = ins[0].as_bv().unwrap();
            let shift = z3::ast::BV::from_i64(ctx, (width - 1) as i64, width);
            let y = x.bvashr(&shift);
            let rhs = x.bvxor(&y).bvsub(&y);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
        },
    )
    .with_width_family(abs_value);
    let ops = OpLibrary::new()
        .with(Arc::new(Xor::new(width)), Some(1))
        .with(Arc::new(Sub::new(width)), Some(1))
        .with(Arc::new(Ashr::new(width)), Some(1));
    (Arc::new(spec), ops, Some(1))
}

fn is_power_of_two(width: u32) -> (Arc<dyn Spec>, OpLibrary, Option<u32>) {
    let spec = FnSpec::new(
        "is_power_of_two",
        vec![Ty::BitVec(width)],
        vec![Ty::Bool],
        move |ins| {
            let x = ins[0].as_u64().unwrap();
            vec![BvVal::Bool(x != 0 && (x & x.wrapping_sub(1)) == 0)]
        },
        move |ctx, outs, ins| {
            use z3::ast::Ast;
            let x = ins[0].as_bv().unwrap();
            let zero = z3::ast::BV::from_i64(ctx, 0, width);
            let one = z3::ast::BV::from_i64(ctx, 1, width);
            let masked = x.bvand(&x.bvsub(&one));
            let rhs = masked.bvult(&one).and(&[&x._eq(&zero).not()]);
            (z3::ast::Bool::from_bool(ctx, true), outs[0].as_bool().unwrap()._eq(&rhs))
        },
    )
    .with_width_family(is_power_of_two);
    let ops = OpLibrary::new().with(Arc::new(And::new(width)), Some(1)).with(Arc::new(Sub::new(width)), Some(1)).with(Arc::new(Ult::new(width)), Some(1));
    (Arc::new(spec), ops, Some(1))
}

const PUZZLES: &[Puzzle] = &[
    Puzzle { name: "turn-off-rightmost", describe: "x & (x - 1)", build: turn_off_rightmost },
    Puzzle { name: "isolate-rightmost-one", describe: "x & (-x)", build: isolate_rightmost_one },
    Puzzle { name: "mask-trailing-ones", describe: "x ^ (x - 1)", build: mask_trailing_ones },
    Puzzle { name: "right-propagate-rightmost-one", describe: "x | (x - 1)", build: right_propagate_rightmost_one },
    Puzzle { name: "turn-on-rightmost-zero", describe: "x | (x + 1)", build: turn_on_rightmost_zero },
    Puzzle { name: "abs-value", describe: "(x ^ (x >>s (w-1))) - (x >>s (w-1))", build: abs_value },
    Puzzle { name: "is-power-of-two", describe: "x != 0 && (x & (x - 1)) == 0", build: is_power_of_two },
];

fn main() -> ExitCode {
    let args = Cli::parse();
    log::set_log_level(args.verbose + 2);

    if args.list || args.puzzle.is_none() {
        println!("available puzzles:");
        for p in PUZZLES {
            println!("  {:<32} {}", p.name, p.describe);
        }
        return ExitCode::SUCCESS;
    }

    let name = args.puzzle.unwrap();
    let Some(puzzle) = PUZZLES.iter().find(|p| p.name == name) else {
        eprintln!("unknown puzzle `{name}`, pass --list to see the catalog");
        return ExitCode::FAILURE;
    };

    let (spec, ops, default_max_const) = (puzzle.build)(args.width);
    let mut pruning = PruningOptions::default();
    pruning.max_const = args.max_const.or(default_max_const);

    let mut solver = SolverConfig::new();
    solver.timeout_ms = args.timeout_ms;
    solver.output_prefix = args.output_prefix.clone();

    let opts = SynthOptions { pruning, solver, downsize: args.downsize, ..SynthOptions::default() };

    match synth(spec, ops, 1..=args.max_length, 4, opts) {
        Ok((Some(prg), stats)) => {
            println!("{prg}");
            println!("; found after {} iteration(s), {} sample(s) total", stats.iterations.len(), stats.total_samples());
            ExitCode::SUCCESS
        }
        Ok((None, stats)) => {
            println!("; no program found up to length {} ({} iteration(s) tried)", args.max_length, stats.iterations.len());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
