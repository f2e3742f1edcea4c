// Error taxonomy shared by the whole tree

use thiserror::Error;

/// Result type for all tree operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors raised by tree construction, mutation and persistence
///
/// All variants are raised synchronously at the point of violation and
/// propagate uncaught to the caller. The only tolerated condition that is
/// not an error is an unmatched XML element on load.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Malformed construction input (reserved characters in an id,
    /// duplicate or empty choice lists, misbehaving item factories)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Text could not be parsed into the parameter's value type
    #[error("cannot parse '{text}' as {target}")]
    InvalidFormat { text: String, target: &'static str },

    /// Syntactically valid value or index outside the allowed domain
    /// (unknown choice value, undo/redo past the end of the log,
    /// index past the end of a dynamic list)
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A parameter was mutated from within its own change notification
    #[error("parameter '{0}' may not be changed from within its own change notification")]
    IllegalReentry(String),

    /// Structural mismatch between two trees detected while cloning,
    /// or a corrupted undo entry
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Malformed XML document
    #[error("xml error: {0}")]
    Xml(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TreeError {
    pub(crate) fn invalid_format(text: &str, target: &'static str) -> Self {
        TreeError::InvalidFormat {
            text: text.to_string(),
            target,
        }
    }
}
