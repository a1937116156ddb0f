//! Synthetic forward pass that materializes a model and reports its output shape.

use burn::prelude::Backend;
use burn::tensor::{Distribution, Tensor};
use deconv_types::TensorShape;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::ExecutionContext;
use crate::deconv::DeconvModel;
use crate::error::{ModelError, Result};

/// Outcome of a shape probe.
///
/// # Example
///
/// ```
/// use deconv_models::ProbeReport;
/// use deconv_types::TensorShape;
///
/// let report = ProbeReport {
///     input: TensorShape::new(1, 9, 6, 45),
///     observed: TensorShape::new(1, 18, 6, 32),
///     expected: TensorShape::new(1, 18, 6, 32),
/// };
/// assert!(report.is_consistent());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Shape fed to the model.
    pub input: TensorShape,
    /// Shape the model actually produced.
    pub observed: TensorShape,
    /// Shape predicted by the layer configuration.
    pub expected: TensorShape,
}

impl ProbeReport {
    /// Returns `true` if the observed shape equals the analytic one.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.observed == self.expected
    }

    /// Turns an inconsistent report into an error.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if the observed shape differs
    /// from the analytic shape.
    pub fn ensure_consistent(&self) -> Result<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(ModelError::shape_mismatch(
                self.expected.to_string(),
                self.observed.to_string(),
            ))
        }
    }
}

/// Tensor of `shape` with independent draws from `[0, 1)`.
#[must_use]
pub fn uniform_input<B: Backend>(shape: TensorShape, device: &B::Device) -> Tensor<B, 4> {
    Tensor::random(shape.dims(), Distribution::Default, device)
}

/// Runs one synthetic pass through `model` with a uniform `[0, 1)` input.
///
/// Materializes the model first when it has no weights yet. The input values
/// are never inspected; only the resulting shape is recorded.
///
/// # Errors
///
/// Propagates materialization and forward errors, most notably
/// [`ModelError::ShapeMismatch`].
pub fn probe<B: Backend>(
    model: &mut DeconvModel<B>,
    shape: TensorShape,
    ctx: &ExecutionContext,
    device: &B::Device,
) -> Result<ProbeReport> {
    if !model.is_materialized() {
        model.materialize(shape, ctx, device)?;
    }

    let output = model.forward(uniform_input(shape, device))?;
    let report = ProbeReport {
        input: shape,
        observed: TensorShape::from(output.dims()),
        expected: model.output_shape_for(shape),
    };

    info!(
        input = %report.input,
        observed = %report.observed,
        consistent = report.is_consistent(),
        "probed output shape"
    );
    Ok(report)
}
