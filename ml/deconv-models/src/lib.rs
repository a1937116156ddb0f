//! Burn transposed-convolution model for the export pipeline.
//!
//! # Lifecycle
//!
//! - [`DeconvModel::build`] wraps a [`LayerConfiguration`](deconv_types::LayerConfiguration)
//! - [`DeconvModel::materialize`] draws the weights once, explicitly
//! - [`DeconvModel::forward`] runs channel-last tensors through the layer
//! - [`probe`] does materialize + one synthetic pass and reports the shape
//!
//! # Execution Context
//!
//! [`ExecutionContext`] carries GPU visibility and the
//! initialization seed. It is passed to every call that needs it; nothing is
//! read from process-wide state.
//!
//! # Backend Support
//!
//! Models are generic over Burn backends. The pipeline runs on
//! [`CpuBackend`] (`burn-ndarray`).
//!
//! # Example
//!
//! ```
//! use deconv_models::{probe, CpuBackend, CpuDevice, DeconvModel, ExecutionContext};
//! use deconv_types::{LayerConfiguration, Padding, TensorShape};
//!
//! let config = LayerConfiguration::new(32, (5, 3), (2, 1), Padding::Valid);
//! let mut model = DeconvModel::<CpuBackend>::build(config).unwrap();
//!
//! let report = probe(
//!     &mut model,
//!     TensorShape::new(1, 9, 6, 45),
//!     &ExecutionContext::cpu_only(),
//!     &CpuDevice::default(),
//! )
//! .unwrap();
//! assert_eq!(report.observed, TensorShape::new(1, 21, 8, 32));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod backend;
mod deconv;
mod error;
pub mod init;
mod probe;

pub use backend::{CpuBackend, CpuDevice, ExecutionContext};
pub use deconv::{DeconvModel, DeconvWeights};
pub use error::{ModelError, Result};
pub use probe::{probe, uniform_input, ProbeReport};

