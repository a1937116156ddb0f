//! The fixed set of exported model variants.

use deconv_types::{Initializer, LayerConfiguration, Padding, TensorShape};

/// Filters in every exported layer.
pub const FILTERS: usize = 32;

/// Kernel `(height, width)` of every exported layer.
pub const KERNEL: (usize, usize) = (5, 3);

/// Stride `(height, width)` of every exported layer.
pub const STRIDE: (usize, usize) = (2, 1);

/// One model to build and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportVariant {
    /// Output file name under the asset root.
    pub name: &'static str,
    /// Padding mode.
    pub padding: Padding,
    /// Probe input shape.
    pub input: TensorShape,
    /// Output shape the consuming app relies on.
    pub expected_output: TensorShape,
}

impl ExportVariant {
    /// Layer configuration for this variant.
    #[must_use]
    pub const fn layer(&self) -> LayerConfiguration {
        LayerConfiguration::new(FILTERS, KERNEL, STRIDE, self.padding)
            .with_weight_initializer(Initializer::HeNormal)
            .with_bias_initializer(Initializer::Zeros)
    }
}

/// Variants in export order.
pub const VARIANTS: [ExportVariant; 4] = [
    ExportVariant {
        name: "model_01.tflite",
        padding: Padding::Same,
        input: TensorShape::new(1, 9, 6, 45),
        expected_output: TensorShape::new(1, 18, 6, 32),
    },
    ExportVariant {
        name: "model_02.tflite",
        padding: Padding::Valid,
        input: TensorShape::new(1, 9, 6, 45),
        expected_output: TensorShape::new(1, 21, 8, 32),
    },
    ExportVariant {
        name: "model_03.tflite",
        padding: Padding::Same,
        input: TensorShape::new(1, 10, 6, 45),
        expected_output: TensorShape::new(1, 20, 6, 32),
    },
    ExportVariant {
        name: "model_04.tflite",
        padding: Padding::Valid,
        input: TensorShape::new(1, 10, 6, 45),
        expected_output: TensorShape::new(1, 23, 8, 32),
    },
];
