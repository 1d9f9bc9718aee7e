use std::io;

use crate::args::LossName;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building a vocabulary or training a model.
///
/// Everything here is fatal for the operation that returned it. Recoverable
/// data problems (bad feature-map lines, untagged tokens while sampling) are
/// logged and skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No word survived the `min_count` cut.
    #[error("empty vocabulary; check the input file or try a smaller --min-count value")]
    EmptyVocabulary,

    /// A radical-tagged token has no separator.
    #[error("token {token:?} has no {separator:?} separator between word and radical")]
    MissingSeparator { token: String, separator: char },

    /// Only negative sampling is implemented.
    #[error("loss {0} is not supported; use --loss ns")]
    UnsupportedLoss(LossName),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot allocate a {rows}x{cols} matrix")]
    OutOfMemory { rows: usize, cols: usize },

    #[error("training worker {0} panicked")]
    WorkerPanicked(usize),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("model serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}
