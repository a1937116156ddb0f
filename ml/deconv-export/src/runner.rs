//! Runs exported artifacts on a Burn backend.

use std::path::Path;

use burn::prelude::{Backend, Tensor};
use deconv_models::DeconvModel;
use deconv_types::TensorShape;
use tracing::debug;

use crate::artifact::load_artifact;
use crate::error::{ExportError, Result};
use crate::graph::PortableGraph;

/// Executes a [`PortableGraph`] with dequantized weights.
#[derive(Debug, Clone)]
pub struct ArtifactRunner<B: Backend> {
    graph: PortableGraph,
    model: DeconvModel<B>,
}

impl<B: Backend> ArtifactRunner<B> {
    /// Rebuilds an executable model from a graph.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Conversion`] if the graph holds no transposed
    /// convolution, [`ExportError::Deserialization`] for inconsistent weight
    /// storage, or a model error if the weights do not fit the layer.
    pub fn from_graph(graph: PortableGraph, device: &B::Device) -> Result<Self> {
        let (layer, filter, bias) = graph
            .transpose_conv()
            .ok_or_else(|| ExportError::conversion("graph has no transposed convolution"))?;

        let model = DeconvModel::from_weights(
            *layer,
            graph.input.shape,
            filter.to_f32()?,
            bias.map(<[f32]>::to_vec),
            device,
        )?;

        Ok(Self { graph, model })
    }

    /// Loads and rebuilds an artifact file.
    ///
    /// # Errors
    ///
    /// See [`load_artifact`] and [`ArtifactRunner::from_graph`].
    pub fn load(path: impl AsRef<Path>, device: &B::Device) -> Result<Self> {
        let path = path.as_ref();
        let graph = load_artifact(path)?;
        debug!(path = %path.display(), quantized = graph.is_quantized(), "loaded artifact");
        Self::from_graph(graph, device)
    }

    /// The loaded graph.
    #[must_use]
    pub const fn graph(&self) -> &PortableGraph {
        &self.graph
    }

    /// Declared input shape.
    #[must_use]
    pub const fn input_shape(&self) -> TensorShape {
        self.graph.input.shape
    }

    /// Declared output shape.
    #[must_use]
    pub const fn output_shape(&self) -> TensorShape {
        self.graph.output.shape
    }

    /// Runs one channel-last input through the graph.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Model`] if the input does not match the graph
    /// input shape.
    pub fn run(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        let dims = input.dims();
        if TensorShape::from(dims) != self.input_shape() {
            return Err(deconv_models::ModelError::shape_mismatch(
                self.input_shape().to_string(),
                format!("{dims:?}"),
            )
            .into());
        }
        Ok(self.model.forward(input)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::graph::{convert, OptimizationPolicy};
    use approx::assert_relative_eq;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;
    use deconv_types::{LayerConfiguration, Padding};

    type TestBackend = NdArray<f32>;

    fn model() -> DeconvModel<TestBackend> {
        let config = LayerConfiguration::new(1, (1, 2), (1, 2), Padding::Valid);
        DeconvModel::from_weights(
            config,
            TensorShape::new(1, 1, 2, 1),
            vec![1.0, 2.0],
            Some(vec![0.5]),
            &Default::default(),
        ).unwrap()
    }

    fn input() -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(vec![1.0_f32, 3.0], [1, 1, 2, 1]), &Default::default())
    }

    #[test]
    fn float_graph_matches_model() {
        let graph = convert(&model(), OptimizationPolicy::None).unwrap();
        let runner = ArtifactRunner::<TestBackend>::from_graph(graph, &Default::default()).unwrap();
        assert_eq!(runner.output_shape(), TensorShape::new(1, 1, 4, 1));

        let output = runner.run(input()).unwrap();
        let values = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(values.len(), 4);
        for (got, want) in values.iter().zip([1.5, 2.5, 3.5, 6.5]) {
            assert_relative_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn quantized_graph_runs() {
        let graph =
            convert(&model(), OptimizationPolicy::Default).unwrap();
        let runner = ArtifactRunner::<TestBackend>::from_graph(graph, &Default::default()).unwrap();
        assert!(runner.graph().is_quantized());

        let values = runner
            .run(input()).unwrap()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(values.len(), 4);
        // Weights 1.0 and 2.0 share a scale of 2/127.
        for (got, want) in values.iter().zip([1.5, 2.5, 3.5, 6.5]) {
            assert_relative_eq!(*got, want, epsilon = 0.05);
        }
    }

    #[test]
    fn run_rejects_wrong_shape() {
        let graph = convert(&model(), OptimizationPolicy::None).unwrap();
        let runner = ArtifactRunner::<TestBackend>::from_graph(graph, &Default::default()).unwrap();
        let wrong = Tensor::<TestBackend, 4>::zeros([1, 2, 2, 1], &Default::default());
        assert!(matches!(runner.run(wrong), Err(ExportError::Model(_))));
    }

    #[test]
    fn empty_graph_rejected() {
        let mut graph =
            convert(&model(), OptimizationPolicy::None).unwrap();
        graph.ops.clear();
        let result = ArtifactRunner::<TestBackend>::from_graph(graph, &Default::default());
        assert!(matches!(result, Err(ExportError::Conversion(_))));
    }
}
