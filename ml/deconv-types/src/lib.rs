//! Layer and shape types for the transposed-convolution export pipeline.
//!
//! This crate is pure data. It describes *what* layer to build and *which*
//! tensor shapes flow through it; the numeric work lives in `deconv-models`
//! and the file format in `deconv-export`.
//!
//! # Types
//!
//! - [`LayerConfiguration`] - Declarative description of one transposed
//!   convolution (filters, kernel, stride, padding, dilation, initializers)
//! - [`Padding`] - `Same` or `Valid` border policy
//! - [`Initializer`] - Weight/bias initialization method identifier
//! - [`TensorShape`] - Channel-last `(batch, height, width, channels)` shape
//!
//! # Example
//!
//! ```
//! use deconv_types::{LayerConfiguration, Padding, TensorShape};
//!
//! let config = LayerConfiguration::new(32, (5, 3), (2, 1), Padding::Same);
//! let input = TensorShape::new(1, 9, 6, 45);
//!
//! assert_eq!(config.output_shape_for(input), TensorShape::new(1, 18, 6, 32));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod layer;
mod shape;

pub use error::ValidationError;
pub use layer::{effective_kernel, full_extent, Initializer, LayerConfiguration, Padding};
pub use shape::TensorShape;

/// Result type for validation in this crate.
pub type Result<T> = std::result::Result<T, ValidationError>;
