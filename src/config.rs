//! Reified "global options" for the encoder and solver.
//!
//! spec.md §9 calls out that the source's global mutable state (process-wide
//! SMT options) should be reified as an explicit config object passed into the
//! encoder rather than read from ambient state. `SolverConfig` is that object;
//! it can be built by hand, merged from a TOML file via `figment` (the
//! teacher's config crate), or overridden field-by-field from CLI flags.

use std::time::Duration;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/// Pins the SMT solver's logical theory, e.g. `QF_FD` for finite-domain
/// tactics. `None` lets the solver pick (the original's `Tactic('psmt')`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SolverConfig {
    pub theory: Option<String>,
    #[serde(default)]
    pub reset_solver: bool,
    pub timeout_ms: Option<u64>,
    pub output_prefix: Option<String>,
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Loads a config from a TOML file, falling back to defaults for any
    /// field the file omits.
    pub fn from_toml_file(path: &str) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| SynthError::MalformedInput(format!("bad solver config {path}: {e}")))
    }
}

/// Search-space pruning toggles from spec.md §4.1 / §6. Every field defaults
/// to `true` except `max_const`/`const_set`, matching the options table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningOptions {
    pub max_const: Option<u32>,
    #[serde(default)]
    pub const_set: Option<Vec<i64>>,
    pub opt_no_dead_code: bool,
    pub opt_no_cse: bool,
    pub opt_const: bool,
    pub opt_commutative: bool,
    pub opt_insn_order: bool,
}

impl Default for PruningOptions {
    fn default() -> Self {
        Self {
            max_const: None,
            const_set: None,
            opt_no_dead_code: true,
            opt_no_cse: true,
            opt_const: true,
            opt_commutative: true,
            opt_insn_order: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_pruning() {
        let opts = PruningOptions::default();
        assert!(opts.opt_no_dead_code);
        assert!(opts.opt_no_cse);
        assert!(opts.opt_const);
        assert!(opts.opt_commutative);
        assert!(opts.opt_insn_order);
        assert!(opts.max_const.is_none());
    }

    #[test]
    fn solver_config_default_has_no_timeout() {
        assert_eq!(SolverConfig::default().timeout(), None);
    }
}
