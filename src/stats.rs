//! Per-run statistics (spec.md §4.5/§6): one record per program length tried,
//! plus the run total. Grounded in `synth_constants_cegis_stage.py`'s
//! `all_stats += [(n_insns, cegis_stats)]` accumulation; the original just
//! threads opaque per-call dicts through, this crate gives that shape a name.

use std::time::Duration;

use derive_more::Display;

/// What a single CEGIS run at a fixed length concluded with.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    #[display(fmt = "found")]
    Found,
    #[display(fmt = "exhausted")]
    Exhausted,
    #[display(fmt = "unknown")]
    Unknown,
}

/// Statistics for one program-length attempt (spec.md §4.5's per-length
/// loop iteration).
#[derive(Debug, Clone)]
pub struct IterationStats {
    pub n_insns: usize,
    pub cegis_rounds: usize,
    pub samples_used: usize,
    pub elapsed: Duration,
    pub outcome: IterationOutcome,
}

/// The statistics `synth()` returns alongside its (optional) program:
/// one [`IterationStats`] per length attempted, across every downscale
/// width tried before falling back to the original width.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub iterations: Vec<IterationStats>,
    pub total_elapsed: Duration,
}

impl Stats {
    pub fn push(&mut self, iteration: IterationStats) {
        self.total_elapsed += iteration.elapsed;
        self.iterations.push(iteration);
    }

    pub fn found(&self) -> bool {
        self.iterations.last().map(|i| i.outcome == IterationOutcome::Found).unwrap_or(false)
    }

    pub fn total_samples(&self) -> usize {
        self.iterations.iter().map(|i| i.samples_used).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_accumulates_total_elapsed() {
        let mut stats = Stats::default();
        stats.push(IterationStats {
            n_insns: 1,
            cegis_rounds: 2,
            samples_used: 4,
            elapsed: Duration::from_millis(10),
            outcome: IterationOutcome::Exhausted,
        });
        stats.push(IterationStats {
            n_insns: 2,
            cegis_rounds: 1,
            samples_used: 3,
            elapsed: Duration::from_millis(5),
            outcome: IterationOutcome::Found,
        });
        assert_eq!(stats.total_elapsed, Duration::from_millis(15));
        assert_eq!(stats.total_samples(), 7);
        assert!(stats.found());
    }

    #[test]
    fn found_is_false_when_last_iteration_was_not_a_hit() {
        let mut stats = Stats::default();
        stats.push(IterationStats {
            n_insns: 1,
            cegis_rounds: 0,
            samples_used: 0,
            elapsed: Duration::ZERO,
            outcome: IterationOutcome::Exhausted,
        });
        assert!(!stats.found());
    }
}
