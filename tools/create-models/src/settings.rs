//! Run settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use deconv_export::OptimizationPolicy;
use serde::{Deserialize, Serialize};

/// Default output directory, relative to the working directory.
pub const DEFAULT_ASSET_ROOT: &str = "../app/src/main/assets";

/// Settings for one export run.
///
/// Every field has a default, so a settings file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Directory receiving the model files.
    pub asset_root: PathBuf,

    /// Seed for weight initialization (`None` = entropy).
    pub seed: Option<u64>,

    /// Optimization applied on export.
    pub policy: OptimizationPolicy,

    /// Reload each artifact and compare it with the in-memory model.
    pub verify: bool,

    /// Comparison runs per model when verifying.
    pub verify_runs: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
            seed: None,
            policy: OptimizationPolicy::Default,
            verify: false,
            verify_runs: 3,
        }
    }
}

impl ExportSettings {
    /// Reads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse settings {}", path.display()))
    }

    /// Sets the asset root.
    #[must_use]
    pub fn with_asset_root(mut self, asset_root: impl Into<PathBuf>) -> Self {
        self.asset_root = asset_root.into();
        self
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the optimization policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: OptimizationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enables or disables verification.
    #[must_use]
    pub const fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Output path for a model file.
    #[must_use]
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.asset_root.join(name)
    }
}
