//! Validation error types.

use thiserror::Error;

/// Validation errors for layer and shape types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A layer field that must be positive was zero.
    #[error("layer field `{field}` must be positive, got 0")]
    NonPositiveField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A tensor dimension was zero.
    #[error("tensor dimension `{dim}` must be positive in shape {shape}")]
    NonPositiveDimension {
        /// Name of the offending dimension.
        dim: &'static str,
        /// The full shape, formatted.
        shape: String,
    },
}
