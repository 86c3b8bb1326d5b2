#![allow(clippy::too_many_arguments)]

pub mod log;
pub mod error;
pub mod config;
pub mod ty;
pub mod value;
pub mod op;
pub mod bitops;
pub mod spec;
pub mod program;
pub mod encoder;
pub mod cegis;
pub mod downscale;
pub mod stats;
pub mod synth;

pub use error::SynthError;
pub use op::{Op, OpLibrary};
pub use program::{Insn, Operand, Prg};
pub use spec::{FnSpec, Spec};
pub use stats::{IterationStats, Stats};
pub use synth::{synth, SynthOptions};
pub use ty::Ty;
pub use value::BvVal;
