//! Transposed-convolution layer configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::shape::TensorShape;

/// Border policy of a transposed convolution.
///
/// # Example
///
/// ```
/// use deconv_types::Padding;
///
/// // Same keeps `in * stride`; Valid keeps the full kernel overlap.
/// assert_eq!(Padding::Same.output_extent(9, 5, 2, 1), 18);
/// assert_eq!(Padding::Valid.output_extent(9, 5, 2, 1), 21);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    /// Output extent is exactly `input * stride`.
    Same,
    /// No implicit border; output covers every position a kernel tap reaches.
    Valid,
}

impl Padding {
    /// Returns the padding name as used in model files and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Valid => "valid",
        }
    }

    /// Output extent of one spatial axis.
    ///
    /// `kernel` is the undilated kernel size; the effective size is
    /// `(kernel - 1) * dilation + 1`.
    #[must_use]
    pub const fn output_extent(
        &self,
        input: usize,
        kernel: usize,
        stride: usize,
        dilation: usize,
    ) -> usize {
        match self {
            Self::Same => input * stride,
            Self::Valid => {
                let effective = effective_kernel(kernel, dilation);
                input * stride + effective.saturating_sub(stride)
            }
        }
    }

    /// Number of rows/columns cropped from the leading edge of the full
    /// (unpadded) transposed convolution to reach [`Self::output_extent`].
    ///
    /// Zero when the full result is not longer than the target.
    #[must_use]
    pub const fn leading_crop(
        &self,
        input: usize,
        kernel: usize,
        stride: usize,
        dilation: usize,
    ) -> usize {
        let full = full_extent(input, kernel, stride, dilation);
        let target = self.output_extent(input, kernel, stride, dilation);
        full.saturating_sub(target) / 2
    }
}

impl std::fmt::Display for Padding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Extent of a kernel after dilation.
#[must_use]
pub const fn effective_kernel(kernel: usize, dilation: usize) -> usize {
    kernel.saturating_sub(1) * dilation + 1
}

/// Extent of a transposed convolution with no cropping at all.
#[must_use]
pub const fn full_extent(input: usize, kernel: usize, stride: usize, dilation: usize) -> usize {
    input.saturating_sub(1) * stride + effective_kernel(kernel, dilation)
}

/// Initialization method for weights or bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    /// Truncated normal scaled by `sqrt(2 / fan_in)`.
    HeNormal,
    /// Uniform in `[-limit, limit]`, `limit = sqrt(6 / (fan_in + fan_out))`.
    #[default]
    GlorotUniform,
    /// All zeros.
    Zeros,
    /// All ones.
    Ones,
}

impl Initializer {
    /// Returns the initializer identifier.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HeNormal => "he_normal",
            Self::GlorotUniform => "glorot_uniform",
            Self::Zeros => "zeros",
            Self::Ones => "ones",
        }
    }
}

impl std::fmt::Display for Initializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Declarative description of one transposed 2-D convolution.
///
/// Built once and never mutated; the `with_*` methods consume and return a
/// new value.
///
/// # Example
///
/// ```
/// use deconv_types::{Initializer, LayerConfiguration, Padding};
///
/// let config = LayerConfiguration::new(32, (5, 3), (2, 1), Padding::Valid)
///     .with_weight_initializer(Initializer::HeNormal);
///
/// assert_eq!(config.dilation, (1, 1));
/// assert!(config.use_bias);
/// assert_eq!(config.bias_initializer, Initializer::Zeros);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerConfiguration {
    /// Number of output channels.
    pub filter_count: usize,

    /// Kernel size as `(height, width)`.
    pub kernel: (usize, usize),

    /// Stride as `(height, width)`.
    pub stride: (usize, usize),

    /// Border policy.
    pub padding: Padding,

    /// Dilation as `(height, width)`.
    pub dilation: (usize, usize),

    /// Whether a per-filter bias is added.
    pub use_bias: bool,

    /// Kernel initializer.
    pub weight_initializer: Initializer,

    /// Bias initializer.
    pub bias_initializer: Initializer,
}

impl LayerConfiguration {
    /// Creates a configuration with unit dilation, bias enabled, the default
    /// weight initializer and a zero bias.
    #[must_use]
    pub const fn new(
        filter_count: usize,
        kernel: (usize, usize),
        stride: (usize, usize),
        padding: Padding,
    ) -> Self {
        Self {
            filter_count,
            kernel,
            stride,
            padding,
            dilation: (1, 1),
            use_bias: true,
            weight_initializer: Initializer::GlorotUniform,
            bias_initializer: Initializer::Zeros,
        }
    }

    /// Sets the dilation.
    #[must_use]
    pub const fn with_dilation(mut self, dilation: (usize, usize)) -> Self {
        self.dilation = dilation;
        self
    }

    /// Enables or disables the bias term.
    #[must_use]
    pub const fn with_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    /// Sets the kernel initializer.
    #[must_use]
    pub const fn with_weight_initializer(mut self, initializer: Initializer) -> Self {
        self.weight_initializer = initializer;
        self
    }

    /// Sets the bias initializer.
    #[must_use]
    pub const fn with_bias_initializer(mut self, initializer: Initializer) -> Self {
        self.bias_initializer = initializer;
        self
    }

    /// Checks that every count, size, stride and dilation is positive.
    ///
    /// Combinations that only fail against a concrete input (or that the
    /// backend rejects) are not checked here.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonPositiveField`] for the first zero field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("filter_count", self.filter_count),
            ("kernel_height", self.kernel.0),
            ("kernel_width", self.kernel.1),
            ("stride_height", self.stride.0),
            ("stride_width", self.stride.1),
            ("dilation_height", self.dilation.0),
            ("dilation_width", self.dilation.1),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::NonPositiveField { field });
            }
        }
        Ok(())
    }

    /// Returns `true` if an axis combines a stride above one with a dilation
    /// above one, which transposed convolution does not support.
    #[must_use]
    pub const fn has_stride_dilation_conflict(&self) -> bool {
        (self.stride.0 > 1 && self.dilation.0 > 1) || (self.stride.1 > 1 && self.dilation.1 > 1)
    }

    /// Kernel tensor shape `[in_channels, filters, kernel_h, kernel_w]` for a
    /// given input channel count.
    #[must_use]
    pub const fn kernel_shape(&self, in_channels: usize) -> [usize; 4] {
        [in_channels, self.filter_count, self.kernel.0, self.kernel.1]
    }

    /// Output height and width for a given input height and width.
    #[must_use]
    pub const fn output_spatial(&self, height: usize, width: usize) -> (usize, usize) {
        (
            self.padding
                .output_extent(height, self.kernel.0, self.stride.0, self.dilation.0),
            self.padding
                .output_extent(width, self.kernel.1, self.stride.1, self.dilation.1),
        )
    }

    /// Analytic output shape for an input shape.
    ///
    /// Batch is unchanged and channels become [`Self::filter_count`].
    #[must_use]
    pub const fn output_shape_for(&self, input: TensorShape) -> TensorShape {
        let (height, width) = self.output_spatial(input.height, input.width);
        TensorShape::new(input.batch, height, width, self.filter_count)
    }
}
