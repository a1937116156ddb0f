//! Model-to-file export.

use std::path::Path;

use burn::prelude::Backend;
use deconv_models::DeconvModel;
use tracing::info;

use crate::artifact::{encode_graph, ExportArtifact};
use crate::error::Result;
use crate::graph::{convert, OptimizationPolicy, PortableGraph};

/// Converts materialized models and writes them as artifacts.
///
/// # Example
///
/// ```no_run
/// use deconv_export::{Exporter, OptimizationPolicy};
/// use deconv_models::{probe, CpuBackend, CpuDevice, DeconvModel, ExecutionContext};
/// use deconv_types::{LayerConfiguration, Padding, TensorShape};
///
/// let config = LayerConfiguration::new(32, (5, 3), (2, 1), Padding::Same);
/// let mut model = DeconvModel::<CpuBackend>::build(config).unwrap();
/// probe(
///     &mut model,
///     TensorShape::new(1, 9, 6, 45),
///     &ExecutionContext::cpu_only(),
///     &CpuDevice::default(),
/// )
/// .unwrap();
///
/// let exporter = Exporter::new(OptimizationPolicy::Default);
/// exporter.export(&model, "assets/model_01.tflite").unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exporter {
    policy: OptimizationPolicy,
}

impl Exporter {
    /// Creates an exporter with the given policy.
    #[must_use]
    pub const fn new(policy: OptimizationPolicy) -> Self {
        Self { policy }
    }

    /// Returns the optimization policy.
    #[must_use]
    pub const fn policy(&self) -> OptimizationPolicy {
        self.policy
    }

    /// Converts a model without writing anything.
    ///
    /// # Errors
    ///
    /// See [`convert`].
    pub fn convert<B: Backend>(&self, model: &DeconvModel<B>) -> Result<PortableGraph> {
        convert(model, self.policy)
    }

    /// Converts a model and writes it to `path`, creating parent directories
    /// and replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns a conversion error for unmaterialized or unrepresentable
    /// models, or an IO error if the file cannot be written. Nothing is
    /// written when conversion fails.
    pub fn export<B: Backend>(
        &self,
        model: &DeconvModel<B>,
        path: impl AsRef<Path>,
    ) -> Result<ExportArtifact> {
        let path = path.as_ref();
        let graph = self.convert(model)?;
        let artifact = ExportArtifact::new(path, encode_graph(&graph)?);
        artifact.write()?;

        info!(
            path = %path.display(),
            bytes = artifact.len(),
            policy = %self.policy,
            "exported model"
        );
        Ok(artifact)
    }
}
