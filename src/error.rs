//! Error types for tempered-mcmc.

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by sampler configuration and output writers.
///
/// Configuration errors abort a run before any sampling occurs. Writer
/// errors are reported by the run loop and sampling continues.
#[derive(Error, Debug)]
pub enum Error {
    /// Neither a likelihood nor a negative log-likelihood was set.
    #[error("no target function specified")]
    NoTargetFunction,

    /// The parameter configuration contains no parameters.
    #[error("empty parameter configuration")]
    EmptyParameterConfig,

    /// A parameter's lower limit exceeds its upper limit.
    #[error("parameter '{name}' has a higher lower limit ({lower}) than its upper limit ({upper})")]
    InvalidLimits {
        /// Parameter name
        name: String,
        /// Declared lower limit
        lower: f64,
        /// Declared upper limit
        upper: f64,
    },

    /// A parameter's start value lies outside its declared limits.
    #[error("start value ({start}) of parameter '{name}' is not inside its limits")]
    StartValueOutsideLimits {
        /// Parameter name
        name: String,
        /// Declared start value
        start: f64,
    },

    /// An output writer failed on the filesystem.
    #[error("writer I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An output writer failed while encoding a record.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
