//! CPU backend aliases and the execution context handed to every model call.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// CPU backend used by the export pipeline.
pub type CpuBackend = burn_ndarray::NdArray<f32>;

/// Device type of [`CpuBackend`].
pub type CpuDevice = burn_ndarray::NdArrayDevice;

/// Execution settings passed explicitly to the builder, probe and exporter.
///
/// Replaces process-wide device toggles: whether GPUs are visible is a plain
/// value owned by the caller. Models always run on [`CpuBackend`], so a
/// context only passes [`check`](Self::check) with GPUs hidden.
///
/// # Example
///
/// ```
/// use deconv_models::ExecutionContext;
///
/// let ctx = ExecutionContext::cpu_only().with_seed(7);
/// assert!(!ctx.gpu_visible);
/// assert!(ctx.check().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Whether GPU devices may be used at all.
    pub gpu_visible: bool,

    /// Seed for weight initialization. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::cpu_only()
    }
}

impl ExecutionContext {
    /// CPU-only context with GPUs hidden.
    #[must_use]
    pub const fn cpu_only() -> Self {
        Self {
            gpu_visible: false,
            seed: None,
        }
    }

    /// Sets the initialization seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Makes GPU devices visible or hidden.
    #[must_use]
    pub const fn with_gpu_visible(mut self, visible: bool) -> Self {
        self.gpu_visible = visible;
        self
    }

    /// Checks that the context describes CPU-only execution.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::BackendInit`] if GPU devices are visible.
    pub fn check(&self) -> Result<()> {
        if self.gpu_visible {
            return Err(ModelError::backend_init(
                "GPU devices must be hidden for CPU-only execution",
            ));
        }
        Ok(())
    }

    /// Creates the random generator used for weight initialization.
    #[must_use]
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn context_cpu_only() {
        let ctx = ExecutionContext::cpu_only();
        assert_eq!(ctx, ExecutionContext::default());
        assert!(!ctx.gpu_visible);
        assert_eq!(ctx.seed, None);
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn context_rejects_visible_gpu() {
        let ctx = ExecutionContext::cpu_only().with_gpu_visible(true);
        assert!(matches!(ctx.check(), Err(ModelError::BackendInit(_))));

        let ctx = ctx.with_gpu_visible(false);
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn context_seeded_rng_is_repeatable() {
        let ctx = ExecutionContext::cpu_only().with_seed(42);
        let a: u64 = ctx.rng().gen();
        let b: u64 = ctx.rng().gen();
        assert_eq!(a, b);
    }

    #[test]
    fn context_serialization() {
        let ctx = ExecutionContext::cpu_only().with_seed(3);
        let json = serde_json::to_string(&ctx).unwrap();
        let parsed: ExecutionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ctx);
    }
}
