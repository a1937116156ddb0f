//! Portable graph representation and conversion from a materialized model.

use burn::prelude::Backend;
use deconv_models::DeconvModel;
use deconv_types::{LayerConfiguration, TensorShape};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::quantize::QuantizedTensor;

/// Kernel axis holding the filters (`[in, filters, kh, kw]`).
const FILTER_AXIS: usize = 1;

/// Post-training optimization applied during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationPolicy {
    /// Keep every weight in f32.
    None,
    /// Dynamic-range quantization: int8 filter with per-filter scales,
    /// bias kept in f32.
    #[default]
    Default,
}

impl OptimizationPolicy {
    /// Returns `true` if the policy quantizes weights.
    #[must_use]
    pub const fn quantizes(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Returns the policy name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for OptimizationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Weight storage inside a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightTensor {
    /// Full-precision values.
    Float {
        /// Tensor shape.
        shape: Vec<usize>,
        /// Row-major values.
        values: Vec<f32>,
    },
    /// Int8 codes with per-channel scales.
    Int8(QuantizedTensor),
}

impl WeightTensor {
    /// Tensor shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Float { shape, .. } => shape,
            Self::Int8(q) => &q.shape,
        }
    }

    /// Returns `true` for int8 storage.
    #[must_use]
    pub const fn is_quantized(&self) -> bool {
        matches!(self, Self::Int8(_))
    }

    /// Checks that the stored values fill the shape.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Deserialization`] for inconsistent storage.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Float { shape, values } => {
                let expected = shape.iter().product::<usize>();
                if values.len() == expected {
                    Ok(())
                } else {
                    Err(ExportError::deserialization(format!(
                        "{} values do not fill shape {shape:?}",
                        values.len()
                    )))
                }
            }
            Self::Int8(q) => q.validate(),
        }
    }

    /// Float values, dequantizing if needed.
    ///
    /// # Errors
    ///
    /// See [`WeightTensor::validate`].
    pub fn to_f32(&self) -> Result<Vec<f32>> {
        match self {
            Self::Float { values, .. } => {
                self.validate()?;
                Ok(values.clone())
            }
            Self::Int8(q) => q.dequantize(),
        }
    }
}

/// A named tensor at the graph boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Tensor name.
    pub name: String,
    /// Channel-last shape.
    pub shape: TensorShape,
}

/// One operation of the portable graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphOp {
    /// Transposed 2-D convolution over channel-last tensors.
    TransposeConv2d {
        /// Layer hyper-parameters.
        layer: LayerConfiguration,
        /// Filter `[in, filters, kh, kw]`.
        filter: WeightTensor,
        /// Per-filter bias.
        bias: Option<Vec<f32>>,
    },
}

/// Self-contained description of an exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableGraph {
    /// Graph input.
    pub input: TensorSpec,
    /// Graph output.
    pub output: TensorSpec,
    /// Operations in execution order.
    pub ops: Vec<GraphOp>,
    /// Optimization applied when the graph was produced.
    pub policy: OptimizationPolicy,
}

impl PortableGraph {
    /// Returns `true` if any weight is stored as int8.
    #[must_use]
    pub fn is_quantized(&self) -> bool {
        self.ops.iter().any(|op| match op {
            GraphOp::TransposeConv2d { filter, .. } => filter.is_quantized(),
        })
    }

    /// Checks every op against its layer: filter storage, filter shape
    /// `[in, filters, kh, kw]` and bias length.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Deserialization`] on the first inconsistency.
    pub fn validate(&self) -> Result<()> {
        for op in &self.ops {
            match op {
                GraphOp::TransposeConv2d {
                    layer,
                    filter,
                    bias,
                } => {
                    filter.validate()?;
                    let expected = layer.kernel_shape(self.input.shape.channels);
                    if filter.shape() != expected.as_slice() {
                        return Err(ExportError::deserialization(format!(
                            "filter shape {:?} does not match layer {expected:?}",
                            filter.shape()
                        )));
                    }
                    if let Some(bias) = bias {
                        if bias.len() != layer.filter_count {
                            return Err(ExportError::deserialization(format!(
                                "bias has {} values for {} filters",
                                bias.len(),
                                layer.filter_count
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The first transposed-convolution op.
    #[must_use]
    pub fn transpose_conv(&self) -> Option<(&LayerConfiguration, &WeightTensor, Option<&[f32]>)> {
        self.ops.iter().find_map(|op| match op {
            GraphOp::TransposeConv2d {
                layer,
                filter,
                bias,
            } => Some((layer, filter, bias.as_deref())),
        })
    }
}

/// Converts a materialized model into a [`PortableGraph`].
///
/// # Errors
///
/// Returns [`ExportError::Conversion`] if the model has no weights, combines
/// stride and dilation on an axis, or holds non-finite weights.
pub fn convert<B: Backend>(
    model: &DeconvModel<B>,
    policy: OptimizationPolicy,
) -> Result<PortableGraph> {
    let weights = model.weights().ok_or_else(|| {
        ExportError::conversion("model has no weights; probe or materialize it before export")
    })?;
    let layer = *model.config();

    if layer.has_stride_dilation_conflict() {
        return Err(ExportError::conversion(format!(
            "transposed convolution with stride {:?} and dilation {:?} has no portable form",
            layer.stride, layer.dilation
        )));
    }

    let kernel_values = weights.kernel_values()?;
    let bias = weights.bias_values()?;
    let all_finite = kernel_values
        .iter()
        .chain(bias.iter().flatten())
        .all(|v| v.is_finite());
    if !all_finite {
        return Err(ExportError::conversion("weights contain NaN or infinite values"));
    }

    let kernel_shape = weights.kernel_dims().to_vec();
    let filter = if policy.quantizes() {
        WeightTensor::Int8(QuantizedTensor::quantize(
            &kernel_values,
            &kernel_shape,
            FILTER_AXIS,
        )?)
    } else {
        WeightTensor::Float {
            shape: kernel_shape,
            values: kernel_values,
        }
    };

    let input_shape = weights.input_shape();
    let graph = PortableGraph {
        input: TensorSpec {
            name: "input".to_string(),
            shape: input_shape,
        },
        output: TensorSpec {
            name: "output".to_string(),
            shape: model.output_shape_for(input_shape),
        },
        ops: vec![GraphOp::TransposeConv2d {
            layer,
            filter,
            bias,
        }],
        policy,
    };

    debug!(
        input = %graph.input.shape,
        output = %graph.output.shape,
        policy = %policy,
        "converted model to portable graph"
    );
    Ok(graph)
}
