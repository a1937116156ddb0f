//! Portable, optionally quantized export of transposed-convolution models.
//!
//! # Pipeline
//!
//! - [`convert`] turns a materialized [`DeconvModel`](deconv_models::DeconvModel)
//!   into a [`PortableGraph`], quantizing the filter per [`OptimizationPolicy`]
//! - [`encode_graph`] / [`decode_artifact`] handle the binary container
//! - [`Exporter`] converts and writes in one step
//! - [`ArtifactRunner`] loads a file back and runs it
//! - [`diff_values`] / [`diff_tensors`] summarize output differences
//!
//! # Quantization
//!
//! The default policy stores the filter as symmetric int8 with one scale per
//! output filter. Bias stays f32.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod artifact;
mod compare;
mod error;
mod exporter;
mod graph;
mod quantize;
mod runner;

pub use artifact::{
    decode_artifact, decode_artifact_reader, encode_graph, encode_graph_writer, is_artifact_bytes,
    is_artifact_file, load_artifact, ArtifactHeader, ExportArtifact, ARTIFACT_HEADER_SIZE,
    ARTIFACT_MAGIC, ARTIFACT_VERSION, FLAG_QUANTIZED,
};
pub use compare::{diff_tensors, diff_values, DiffStats};
pub use error::{ExportError, Result};
pub use exporter::Exporter;
pub use graph::{convert, GraphOp, OptimizationPolicy, PortableGraph, TensorSpec, WeightTensor};
pub use quantize::QuantizedTensor;
pub use runner::ArtifactRunner;

