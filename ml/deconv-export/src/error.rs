//! Error types for deconv-export crate.

use deconv_models::ModelError;
use thiserror::Error;

/// Errors that can occur while converting, writing or reading artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The model cannot be represented in the portable format.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(String),

    /// Encoding the graph failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Decoding an artifact failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Artifact does not start with the expected magic bytes.
    #[error("invalid artifact magic: {0:?}")]
    InvalidMagic([u8; 4]),

    /// Artifact version is not supported.
    #[error("unsupported artifact version: {0}")]
    UnsupportedVersion(u32),

    /// Two buffers that must align have different lengths.
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Left-hand length.
        left: usize,
        /// Right-hand length.
        right: usize,
    },

    /// Error raised by the model itself.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ExportError {
    /// Creates a conversion error.
    #[must_use]
    pub fn conversion(reason: impl Into<String>) -> Self {
        Self::Conversion(reason.into())
    }

    /// Creates an IO error.
    #[must_use]
    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io(reason.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization(reason.into())
    }

    /// Creates a deserialization error.
    #[must_use]
    pub fn deserialization(reason: impl Into<String>) -> Self {
        Self::Deserialization(reason.into())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for deconv-export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
