//! Error types for quota operations.

use thiserror::Error;

use crate::quota::LabelType;

/// Main error type for memquota operations.
///
/// Running out of capacity is not an error: it shows up as a zero or partial
/// grant from the allocation calls.
#[derive(Error, Debug)]
pub enum QuotaError {
    /// A request asked for a negative number of units
    #[error("negative quota amount {0} received")]
    InvalidAmount(i64),

    /// A label value does not match the type declared by the quota definition
    #[error("label '{label}' expects a {expected} value, got {actual}")]
    LabelType {
        label: String,
        expected: LabelType,
        actual: LabelType,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine was constructed outside an async runtime
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for memquota operations.
pub type Result<T> = std::result::Result<T, QuotaError>;
