use derive_more::Display;

/// Fatal errors the core recognizes (spec.md §7). `NoProgram` and
/// `SolverUnknown` are deliberately absent here: they are not errors, they are
/// represented in the `(Option<Prg>, Stats)` return value of [`crate::synth`].
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[display(fmt = "malformed input: {}", _0)]
    MalformedInput(String),
    #[display(fmt = "context mismatch: {}", _0)]
    ContextMismatch(String),
    #[display(fmt = "downscale unsupported: {}", _0)]
    DownscaleUnsupported(String),
}

impl std::error::Error for SynthError {}

pub type Result<T> = std::result::Result<T, SynthError>;
