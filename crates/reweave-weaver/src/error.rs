//! Weave pass errors

use thiserror::Error;

/// Result alias for weave operations
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Fatal weave errors
///
/// Per-site problems (structural mismatches, ineligible properties) are
/// not errors; they go through the diagnostics sink and the pass
/// continues. These variants abort the whole pass.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// A required helper symbol is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The rewrite engine observed state the scanner should have ruled out
    #[error("Internal weave failure in {method}: {message}")]
    Internal {
        /// Fully qualified method name
        method: String,
        /// What went wrong
        message: String,
    },
}
