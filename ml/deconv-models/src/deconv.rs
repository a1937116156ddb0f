//! Transposed 2-D convolution model.

use burn::prelude::Backend;
use burn::tensor::module::conv_transpose2d;
use burn::tensor::ops::ConvTransposeOptions;
use burn::tensor::{Tensor, TensorData};
use deconv_types::{LayerConfiguration, TensorShape};
use tracing::debug;

use crate::backend::ExecutionContext;
use crate::error::{ModelError, Result};
use crate::init::{self, Fans};

/// Materialized weight state of a [`DeconvModel`].
///
/// The kernel uses the backend layout `[in_channels, filters, kernel_h, kernel_w]`.
#[derive(Debug, Clone)]
pub struct DeconvWeights<B: Backend> {
    kernel: Tensor<B, 4>,
    bias: Option<Tensor<B, 1>>,
    input_shape: TensorShape,
}

impl<B: Backend> DeconvWeights<B> {
    /// Kernel tensor `[in_channels, filters, kernel_h, kernel_w]`.
    #[must_use]
    pub const fn kernel(&self) -> &Tensor<B, 4> {
        &self.kernel
    }

    /// Bias tensor `[filters]`, if the layer has one.
    #[must_use]
    pub const fn bias(&self) -> Option<&Tensor<B, 1>> {
        self.bias.as_ref()
    }

    /// Input shape the weights were materialized for.
    #[must_use]
    pub const fn input_shape(&self) -> TensorShape {
        self.input_shape
    }

    /// Number of input channels the kernel accepts.
    #[must_use]
    pub fn in_channels(&self) -> usize {
        self.kernel.dims()[0]
    }

    /// Kernel dimensions `[in_channels, filters, kernel_h, kernel_w]`.
    #[must_use]
    pub fn kernel_dims(&self) -> [usize; 4] {
        self.kernel.dims()
    }

    /// Copies the kernel values out of the backend, row-major.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::TensorData`] if the backend data cannot be read
    /// as `f32`.
    pub fn kernel_values(&self) -> Result<Vec<f32>> {
        tensor_values(self.kernel.clone())
    }

    /// Copies the bias values out of the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::TensorData`] if the backend data cannot be read
    /// as `f32`.
    pub fn bias_values(&self) -> Result<Option<Vec<f32>>> {
        self.bias.clone().map(tensor_values).transpose()
    }
}

/// A transposed 2-D convolution over channel-last tensors.
///
/// Lifecycle:
/// 1. [`DeconvModel::build`] wraps a configuration; no weights exist.
/// 2. [`DeconvModel::materialize`] draws the weights once for a concrete
///    input shape.
/// 3. [`DeconvModel::forward`] runs as often as needed; weights never change.
///
/// # Example
///
/// ```
/// use burn::tensor::Tensor;
/// use deconv_models::{CpuBackend, CpuDevice, DeconvModel, ExecutionContext};
/// use deconv_types::{LayerConfiguration, Padding, TensorShape};
///
/// let config = LayerConfiguration::new(4, (3, 3), (2, 2), Padding::Same);
/// let ctx = ExecutionContext::cpu_only().with_seed(1);
/// let device = CpuDevice::default();
///
/// let mut model = DeconvModel::<CpuBackend>::build(config).unwrap();
/// model.materialize(TensorShape::new(1, 3, 3, 2), &ctx, &device).unwrap();
///
/// let input = Tensor::<CpuBackend, 4>::ones([1, 3, 3, 2], &device);
/// let output = model.forward(input).unwrap();
/// assert_eq!(output.dims(), [1, 6, 6, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct DeconvModel<B: Backend> {
    config: LayerConfiguration,
    weights: Option<DeconvWeights<B>>,
}

impl<B: Backend> DeconvModel<B> {
    /// Wraps a configuration into an unmaterialized model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if a count, size, stride or
    /// dilation is zero.
    pub fn build(config: LayerConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            weights: None,
        })
    }

    /// Rebuilds a materialized model from stored weight values.
    ///
    /// `kernel` is row-major `[in_channels, filters, kernel_h, kernel_w]`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if the configuration is invalid
    /// or the value counts do not match the configuration and input shape.
    pub fn from_weights(
        config: LayerConfiguration,
        input_shape: TensorShape,
        kernel: Vec<f32>,
        bias: Option<Vec<f32>>,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate()?;
        input_shape.validate()?;

        let kernel_shape = config.kernel_shape(input_shape.channels);
        let expected = kernel_shape.iter().product::<usize>();
        if kernel.len() != expected {
            return Err(ModelError::invalid_config(format!(
                "kernel has {} values, expected {expected} for {kernel_shape:?}",
                kernel.len()
            )));
        }
        if bias.is_some() != config.use_bias {
            return Err(ModelError::invalid_config(format!(
                "bias presence ({}) does not match use_bias ({})",
                bias.is_some(),
                config.use_bias
            )));
        }
        if let Some(values) = &bias {
            if values.len() != config.filter_count {
                return Err(ModelError::invalid_config(format!(
                    "bias has {} values, expected {}",
                    values.len(),
                    config.filter_count
                )));
            }
        }

        let kernel = Tensor::from_data(TensorData::new(kernel, kernel_shape), device);
        let bias = bias.map(|values| {
            let len = values.len();
            Tensor::from_data(TensorData::new(values, [len]), device)
        });

        Ok(Self {
            config,
            weights: Some(DeconvWeights {
                kernel,
                bias,
                input_shape,
            }),
        })
    }

    /// Returns the layer configuration.
    #[must_use]
    pub const fn config(&self) -> &LayerConfiguration {
        &self.config
    }

    /// Returns `true` once weights exist.
    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        self.weights.is_some()
    }

    /// Returns the weights, if materialized.
    #[must_use]
    pub const fn weights(&self) -> Option<&DeconvWeights<B>> {
        self.weights.as_ref()
    }

    /// Allocates and initializes the weights for `input_shape`.
    ///
    /// This is the only way weights come into existence for a built model;
    /// calling it twice is an error rather than a silent re-draw.
    ///
    /// # Errors
    ///
    /// - [`ModelError::BackendInit`] if the context has GPUs visible
    /// - [`ModelError::AlreadyMaterialized`] on a second call
    /// - [`ModelError::ShapeMismatch`] if a dimension of `input_shape` is zero
    pub fn materialize(
        &mut self,
        input_shape: TensorShape,
        ctx: &ExecutionContext,
        device: &B::Device,
    ) -> Result<()> {
        ctx.check()?;
        if let Some(weights) = &self.weights {
            return Err(ModelError::already_materialized(
                weights.input_shape.to_string(),
            ));
        }
        input_shape
            .validate()
            .map_err(|e| ModelError::shape_mismatch("all dimensions > 0", e.to_string()))?;

        let mut rng = ctx.rng();
        let kernel_shape = self.config.kernel_shape(input_shape.channels);
        let kernel_values = init::sample(
            self.config.weight_initializer,
            kernel_shape.iter().product(),
            Fans::for_transposed_kernel(kernel_shape),
            &mut rng,
        )?;
        let kernel = Tensor::from_data(TensorData::new(kernel_values, kernel_shape), device);

        let bias = if self.config.use_bias {
            let filters = self.config.filter_count;
            let values = init::sample(
                self.config.bias_initializer,
                filters,
                Fans::for_vector(filters),
                &mut rng,
            )?;
            Some(Tensor::from_data(TensorData::new(values, [filters]), device))
        } else {
            None
        };

        debug!(
            input = %input_shape,
            kernel = ?kernel_shape,
            weight_init = %self.config.weight_initializer,
            bias_init = %self.config.bias_initializer,
            seeded = ctx.seed.is_some(),
            "materialized transposed convolution weights"
        );

        self.weights = Some(DeconvWeights {
            kernel,
            bias,
            input_shape,
        });
        Ok(())
    }

    /// Analytic output shape for `input`, without running the model.
    #[must_use]
    pub const fn output_shape_for(&self, input: TensorShape) -> TensorShape {
        self.config.output_shape_for(input)
    }

    /// Runs one pass over a channel-last `[batch, height, width, channels]`
    /// input and returns a channel-last output.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NotMaterialized`] before [`Self::materialize`]
    /// - [`ModelError::ShapeMismatch`] if a dimension is zero, the channel
    ///   count differs from the kernel, or an axis combines stride and
    ///   dilation above one
    pub fn forward(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        let weights = self.weights.as_ref().ok_or(ModelError::NotMaterialized)?;
        let shape = TensorShape::from(input.dims());
        self.check_input(weights, shape)?;

        let config = &self.config;
        let options = ConvTransposeOptions::new(
            [config.stride.0, config.stride.1],
            [0, 0],
            [0, 0],
            [config.dilation.0, config.dilation.1],
            1,
        );

        // Full-extent result in NCHW, cropped or extended to the padding policy.
        let x = input.permute([0, 3, 1, 2]);
        let full = conv_transpose2d(x, weights.kernel.clone(), None, options);

        let expected = self.output_shape_for(shape);
        let crop_h = config
            .padding
            .leading_crop(shape.height, config.kernel.0, config.stride.0, config.dilation.0);
        let crop_w = config
            .padding
            .leading_crop(shape.width, config.kernel.1, config.stride.1, config.dilation.1);
        let fitted = fit_axis(full, 2, crop_h, expected.height);
        let fitted = fit_axis(fitted, 3, crop_w, expected.width);

        let mut output = fitted.permute([0, 2, 3, 1]);
        if let Some(bias) = &weights.bias {
            output = output + bias.clone().reshape([1, 1, 1, config.filter_count]);
        }

        let observed = TensorShape::from(output.dims());
        if observed != expected {
            return Err(ModelError::shape_mismatch(
                expected.to_string(),
                observed.to_string(),
            ));
        }
        Ok(output)
    }

    fn check_input(&self, weights: &DeconvWeights<B>, shape: TensorShape) -> Result<()> {
        shape
            .validate()
            .map_err(|e| ModelError::shape_mismatch("all dimensions > 0", e.to_string()))?;

        let in_channels = weights.in_channels();
        if shape.channels != in_channels {
            return Err(ModelError::shape_mismatch(
                format!("{in_channels} input channels"),
                shape.to_string(),
            ));
        }

        if self.config.has_stride_dilation_conflict() {
            return Err(ModelError::shape_mismatch(
                format!(
                    "stride {:?} with unit dilation on strided axes",
                    self.config.stride
                ),
                format!("dilation {:?} for input {shape}", self.config.dilation),
            ));
        }
        Ok(())
    }
}

/// Crops `axis` to `target` starting at `crop`, or zero-extends its trailing
/// edge when the full extent is shorter than `target`.
fn fit_axis<B: Backend>(x: Tensor<B, 4>, axis: usize, crop: usize, target: usize) -> Tensor<B, 4> {
    let dims = x.dims();
    let full = dims[axis];
    if full == target {
        return x;
    }
    if full > target {
        let mut ranges = dims.map(|d| 0..d);
        ranges[axis] = crop..crop + target;
        return x.slice(ranges);
    }
    let mut pad = dims;
    pad[axis] = target - full;
    let zeros = Tensor::zeros(pad, &x.device());
    Tensor::cat(vec![x, zeros], axis)
}

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ModelError::tensor_data(format!("{e:?}")))
}
