//! The outer `synth()` entry point (spec.md §4.5): loops over candidate
//! program lengths, runs CEGIS at each, and — when requested — first tries a
//! cheaper downscaled search before falling back to the original width.
//! Grounded in `examples/original_source/synth_constants_cegis_stage.py`'s
//! module-level `run_synth`/`synth` functions: `run_synth`'s per-length loop
//! maps onto [`run_length_loop`] below, and `synth`'s `downsize` branch (try
//! each width in a hardcoded `[4]`, lift on success, otherwise fall through)
//! maps onto [`synth`]'s `opts.downsize` path.

use std::sync::Arc;
use std::time::Instant;

use z3::{Config, Context};

use crate::cegis::{run_cegis, run_const_cegis, CegisOutcome};
use crate::config::{PruningOptions, SolverConfig};
use crate::downscale::{downscale_ops, downscale_spec, original_width, rewrite_skeleton_width};
use crate::encoder::{ConstEncoder, ConstMode, Encoder};
use crate::error::Result;
use crate::op::OpLibrary;
use crate::program::Prg;
use crate::spec::Spec;
use crate::stats::{IterationOutcome, IterationStats, Stats};

/// Every knob `synth()` takes beyond `(spec, ops, iter_range, n_samples)`
/// (spec.md §6's options table), bundled the way the teacher's CLI bundles
/// its own `Cli`/config structs.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub pruning: PruningOptions,
    pub solver: SolverConfig,
    /// Try a reduced-width search first, lifting constants back to the
    /// original width on success (§4.5/§4.6), before falling back to a
    /// full-width search.
    pub downsize: bool,
    /// Widths to try, in order, when `downsize` is set. Resolves spec.md §9
    /// Open Question 3: defaults to the original's hardcoded `[4]`.
    pub downsize_widths: Vec<u32>,
    /// Safety bound on CEGIS counterexample rounds per length (see
    /// `cegis::run`'s doc comment); the original relies on the solver's own
    /// timeout instead of an explicit round cap.
    pub cegis_iter_limit: usize,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            pruning: PruningOptions::default(),
            solver: SolverConfig::default(),
            downsize: false,
            downsize_widths: vec![4],
            cegis_iter_limit: 10_000,
        }
    }
}

fn outcome_of(outcome: &CegisOutcome) -> IterationOutcome {
    match outcome {
        CegisOutcome::Found(_) => IterationOutcome::Found,
        CegisOutcome::Exhausted => IterationOutcome::Exhausted,
        CegisOutcome::Unknown => IterationOutcome::Unknown,
    }
}

/// The plain per-length loop (`run_synth` in the original): build an encoder
/// for each length in turn, run CEGIS, stop at the first hit.
fn run_length_loop(
    spec: &Arc<dyn Spec>,
    ops: &OpLibrary,
    lengths: &[usize],
    n_samples: usize,
    opts: &SynthOptions,
    stats: &mut Stats,
) -> Result<Option<Prg>> {
    for &n_insns in lengths {
        let started = Instant::now();
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let encoder = Encoder::new(&ctx, spec.clone(), ops, n_insns, &opts.solver, opts.pruning.clone())?;

        crate::info!("synthesizing at length {n_insns}");
        let (outcome, run_stats) = run_cegis(spec, &encoder, spec.sample_n(n_samples.max(1)), opts.cegis_iter_limit)?;
        stats.push(IterationStats {
            n_insns,
            cegis_rounds: run_stats.rounds,
            samples_used: run_stats.samples,
            elapsed: started.elapsed(),
            outcome: outcome_of(&outcome),
        });

        if let CegisOutcome::Found(prg) = outcome {
            crate::info!("found a program of length {n_insns}");
            return Ok(Some(prg));
        }
    }
    Ok(None)
}

/// One downscaled attempt: search at `small_width`, then lift any hit back to
/// the original width and re-solve its constants there via `ConstEncoder`
/// (`ConstMode::Cegis`, matching the original's `use_cegis=True` default
/// path). Returns `Ok(None)` — not an error — for every "this width doesn't
/// help" outcome, mirroring the original's `continue` on a failed transform
/// or a failed lift.
fn try_downsize(
    spec: &Arc<dyn Spec>,
    ops: &OpLibrary,
    small_width: u32,
    lengths: &[usize],
    n_samples: usize,
    opts: &SynthOptions,
    stats: &mut Stats,
) -> Result<Option<Prg>> {
    let small_spec = match downscale_spec(spec, small_width) {
        Ok(s) => s,
        Err(_) => return Ok(None),
    };
    let small_ops = match downscale_ops(ops, small_width) {
        Ok(o) => o,
        Err(_) => return Ok(None),
    };

    let small_prg = match run_length_loop(&small_spec, &small_ops, lengths, n_samples, opts, stats)? {
        Some(prg) => prg,
        None => return Ok(None),
    };

    let Some(orig_width) = original_width(spec) else { return Ok(None) };
    let skeleton = match rewrite_skeleton_width(&small_prg, orig_width) {
        Ok(prg) => prg,
        Err(_) => return Ok(None),
    };

    let started = Instant::now();
    let cfg = Config::new();
    let ctx = Context::new(&cfg);
    let const_enc = ConstEncoder::new(&ctx, spec.clone(), skeleton, ConstMode::Cegis, &opts.solver)?;
    let (outcome, run_stats) = run_const_cegis(spec, &const_enc, spec.sample_n(n_samples.max(1)), opts.cegis_iter_limit)?;
    stats.push(IterationStats {
        n_insns: small_prg.insns.len(),
        cegis_rounds: run_stats.rounds,
        samples_used: run_stats.samples,
        elapsed: started.elapsed(),
        outcome: outcome_of(&outcome),
    });

    match outcome {
        CegisOutcome::Found(prg) => {
            crate::info!("lifted a downscaled program from width {small_width} to {orig_width}");
            Ok(Some(prg))
        }
        _ => {
            crate::warn!("found a program at width {small_width} but could not lift its constants to width {orig_width}");
            Ok(None)
        }
    }
}

/// Synthesizes a program implementing `spec` over operator library `ops`,
/// trying each length in `iter_range` in turn (spec.md §4.5). Returns the
/// found program (if any) alongside per-length [`Stats`]. Structural errors —
/// a malformed `(spec, ops)` pairing, a context mismatch — bubble as
/// `Err`; "no program exists at any tried length" and "the solver couldn't
/// decide" are not errors, they're `Ok((None, stats))` with the reason
/// recorded in `stats` (spec.md §7's propagation policy).
pub fn synth(
    spec: Arc<dyn Spec>,
    ops: OpLibrary,
    iter_range: impl IntoIterator<Item = usize>,
    n_samples: usize,
    opts: SynthOptions,
) -> Result<(Option<Prg>, Stats)> {
    let lengths: Vec<usize> = iter_range.into_iter().collect();
    let mut stats = Stats::default();

    if opts.downsize {
        for &width in &opts.downsize_widths {
            if let Some(prg) = try_downsize(&spec, &ops, width, &lengths, n_samples, &opts, &mut stats)? {
                return Ok((Some(prg), stats));
            }
        }
    }

    let prg = run_length_loop(&spec, &ops, &lengths, n_samples, &opts, &mut stats)?;
    Ok((prg, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitops::{And, Sub};
    use crate::ty::Ty;
    use crate::value::BvVal;
    use z3::ast::{Ast, Bool as Z3Bool, BV};

    fn turn_off_rightmost_spec(width: u32) -> crate::spec::FnSpec {
        crate::spec::FnSpec::new(
            "turn_off_rightmost",
            vec![Ty::BitVec(width)],
            vec![Ty::BitVec(width)],
            move |ins| {
                let x = ins[0].as_u64().unwrap();
                vec![BvVal::bv(width, x & x.wrapping_sub(1))]
            },
            move |ctx, outs, ins| {
                let x = ins[0].as_bv().unwrap();
                let one = BV::from_i64(ctx, 1, width);
                let rhs = x.bvand(&x.bvsub(&one));
                (Z3Bool::from_bool(ctx, true), outs[0].as_bv().unwrap()._eq(&rhs))
            },
        )
        .with_width_family(turn_off_rightmost_spec)
    }

    #[test]
    fn synth_finds_a_program_at_the_first_sufficient_length() {
        let width = 8;
        let spec: Arc<dyn Spec> = Arc::new(turn_off_rightmost_spec(width));
        let ops: OpLibrary = vec![Arc::new(And::new(width)) as Arc<dyn crate::op::Op>, Arc::new(Sub::new(width))].into();
        let opts = SynthOptions { pruning: PruningOptions { max_const: Some(1), ..PruningOptions::default() }, ..SynthOptions::default() };

        let (prg, stats) = synth(spec, ops, 1..=3, 4, opts).unwrap();
        let prg = prg.expect("a 2-instruction program exists");
        for x in 0u64..256 {
            let out = prg.eval(&[BvVal::bv(width, x)]);
            assert_eq!(out[0].as_u64().unwrap(), x & x.wrapping_sub(1));
        }
        assert!(stats.found());
    }

    #[test]
    fn synth_returns_none_when_no_length_in_range_suffices() {
        let width = 8;
        let spec: Arc<dyn Spec> = Arc::new(turn_off_rightmost_spec(width));
        let ops: OpLibrary = vec![Arc::new(crate::bitops::Or::new(width)) as Arc<dyn crate::op::Op>].into();

        let (prg, stats) = synth(spec, ops, 1..=2, 6, SynthOptions::default()).unwrap();
        assert!(prg.is_none());
        assert!(!stats.found());
    }

    #[test]
    fn synth_with_downsize_lifts_a_program_to_the_original_width() {
        let width = 8;
        let spec: Arc<dyn Spec> = Arc::new(turn_off_rightmost_spec(width));
        let ops: OpLibrary = vec![Arc::new(And::new(width)) as Arc<dyn crate::op::Op>, Arc::new(Sub::new(width))].into();
        let opts = SynthOptions {
            pruning: PruningOptions { max_const: Some(1), ..PruningOptions::default() },
            downsize: true,
            downsize_widths: vec![4],
            ..SynthOptions::default()
        };

        let (prg, _) = synth(spec, ops, 1..=3, 4, opts).unwrap();
        let prg = prg.expect("downscaled search should find and lift a program");
        for x in 0u64..256 {
            let out = prg.eval(&[BvVal::bv(width, x)]);
            assert_eq!(out[0].as_u64().unwrap(), x & x.wrapping_sub(1));
        }
    }
}
