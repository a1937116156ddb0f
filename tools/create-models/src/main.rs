//! Builds the transposed-convolution model variants and exports them as
//! quantized asset files for the mobile app.
//!
//! # Usage
//!
//! - `create-models` - export all four models into `../app/src/main/assets`
//! - `create-models --asset-root <dir>` - export somewhere else
//! - `create-models --seed 42` - reproducible weights
//! - `create-models --no-quantize` - keep f32 weights
//! - `create-models --verify` - reload each file and compare with the model
//! - `create-models --config settings.json` - start from a settings file
//!
//! Set `RUST_LOG` to change log verbosity.

mod driver;
mod settings;
mod variants;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use deconv_export::OptimizationPolicy;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::settings::ExportSettings;

/// Export transposed-convolution models.
#[derive(Parser)]
#[command(name = "create-models")]
#[command(about = "Build, probe and export the deconvolution model variants", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory receiving the model files
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Seed for weight initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Store weights as f32 instead of int8
    #[arg(long)]
    no_quantize: bool,

    /// Reload each artifact and compare it with the in-memory model
    #[arg(long)]
    verify: bool,

    /// JSON settings file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Result<ExportSettings> {
        let mut settings = match &self.config {
            Some(path) => ExportSettings::from_json_file(path)?,
            None => ExportSettings::default(),
        };
        if let Some(root) = &self.asset_root {
            settings = settings.with_asset_root(root);
        }
        if let Some(seed) = self.seed {
            settings = settings.with_seed(seed);
        }
        if self.no_quantize {
            settings = settings.with_policy(OptimizationPolicy::None);
        }
        if self.verify {
            settings = settings.with_verify(true);
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings()?;

    let stdout = std::io::stdout();
    let summaries = driver::run(&settings, &mut stdout.lock())?;

    for summary in &summaries {
        info!(
            model = summary.name,
            path = %summary.path.display(),
            output = %summary.report.observed,
            bytes = summary.bytes,
            verified_runs = summary.diffs.len(),
            "exported"
        );
    }
    let total: usize = summaries.iter().map(|s| s.bytes).sum();
    info!(models = summaries.len(), bytes = total, "export complete");
    Ok(())
}
