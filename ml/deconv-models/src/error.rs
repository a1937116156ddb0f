//! Error types for deconv-models crate.

use deconv_types::ValidationError;
use thiserror::Error;

/// Errors that can occur while building, materializing or running a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Input shape is incompatible with the layer or its weights.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape or constraint.
        expected: String,
        /// Actual shape.
        actual: String,
    },

    /// The model has no weights yet.
    #[error("model is not materialized; call `materialize` before running it")]
    NotMaterialized,

    /// The model already has weights.
    #[error("model is already materialized for input {0}")]
    AlreadyMaterialized(String),

    /// Invalid layer configuration.
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// Execution context cannot be honored.
    #[error("backend initialization failed: {0}")]
    BackendInit(String),

    /// Tensor data could not be read back from the backend.
    #[error("tensor data error: {0}")]
    TensorData(String),
}

impl ModelError {
    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an already-materialized error.
    #[must_use]
    pub fn already_materialized(input: impl Into<String>) -> Self {
        Self::AlreadyMaterialized(input.into())
    }

    /// Creates an invalid config error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Creates a backend initialization error.
    #[must_use]
    pub fn backend_init(reason: impl Into<String>) -> Self {
        Self::BackendInit(reason.into())
    }

    /// Creates a tensor data error.
    #[must_use]
    pub fn tensor_data(reason: impl Into<String>) -> Self {
        Self::TensorData(reason.into())
    }
}

impl From<ValidationError> for ModelError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Result type for deconv-models operations.
pub type Result<T> = std::result::Result<T, ModelError>;
