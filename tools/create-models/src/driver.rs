//! Sequential build, probe and export of every variant.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use deconv_export::{diff_tensors, ArtifactRunner, DiffStats, Exporter};
use deconv_models::{
    probe, uniform_input, CpuBackend, CpuDevice, DeconvModel, ExecutionContext, ModelError,
    ProbeReport,
};
use tracing::{info, warn};

use crate::settings::ExportSettings;
use crate::variants::{ExportVariant, VARIANTS};

/// What one variant produced.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// File name.
    pub name: &'static str,
    /// Written path.
    pub path: PathBuf,
    /// Probe outcome.
    pub report: ProbeReport,
    /// Artifact size in bytes.
    pub bytes: usize,
    /// Per-run comparisons, empty unless verifying.
    pub diffs: Vec<DiffStats>,
}

/// Exports every variant in order, writing console lines to `out`.
///
/// Stops at the first failure; files already written stay in place.
///
/// # Errors
///
/// Fails on any build, probe, shape, export or verification error.
pub fn run<W: Write>(settings: &ExportSettings, out: &mut W) -> Result<Vec<ExportSummary>> {
    let device = CpuDevice::default();
    let exporter = Exporter::new(settings.policy);

    info!(
        asset_root = %settings.asset_root.display(),
        policy = %settings.policy,
        "exporting {} models",
        VARIANTS.len()
    );

    let mut summaries = Vec::with_capacity(VARIANTS.len());
    for (index, variant) in VARIANTS.iter().enumerate() {
        let ctx = match settings.seed {
            Some(seed) => ExecutionContext::cpu_only().with_seed(seed.wrapping_add(index as u64)),
            None => ExecutionContext::cpu_only(),
        };
        let summary = export_variant(variant, settings, &exporter, &ctx, &device, out)
            .with_context(|| format!("failed to export {}", variant.name))?;
        summaries.push(summary);
    }
    Ok(summaries)
}

fn export_variant<W: Write>(
    variant: &ExportVariant,
    settings: &ExportSettings,
    exporter: &Exporter,
    ctx: &ExecutionContext,
    device: &CpuDevice,
    out: &mut W,
) -> Result<ExportSummary> {
    let mut model = DeconvModel::<CpuBackend>::build(variant.layer())?;

    let report = probe(&mut model, variant.input, ctx, device)?;
    writeln!(out, "tests      {}", report.observed)?;
    report.ensure_consistent()?;
    if report.observed != variant.expected_output {
        return Err(ModelError::shape_mismatch(
            variant.expected_output.to_string(),
            report.observed.to_string(),
        )
        .into());
    }

    let path = settings.model_path(variant.name);
    let artifact = exporter.export(&model, &path)?;

    let diffs = if settings.verify {
        verify(variant, &model, &path, settings.verify_runs, device)?
    } else {
        Vec::new()
    };

    writeln!(out, "Done model {}", variant.name)?;
    Ok(ExportSummary {
        name: variant.name,
        path,
        report,
        bytes: artifact.len(),
        diffs,
    })
}

fn verify(
    variant: &ExportVariant,
    model: &DeconvModel<CpuBackend>,
    path: &std::path::Path,
    runs: usize,
    device: &CpuDevice,
) -> Result<Vec<DiffStats>> {
    let runner = ArtifactRunner::<CpuBackend>::load(path, device)?;

    let mut diffs = Vec::with_capacity(runs);
    for run in 1..=runs {
        let input = uniform_input::<CpuBackend>(variant.input, device);
        let reference = model.forward(input.clone())?;
        let reloaded = runner.run(input)?;
        let stats = diff_tensors(reference, reloaded)?;

        if stats.has_nans() {
            warn!(model = variant.name, run, %stats, "NaN in verification output");
        } else {
            info!(model = variant.name, run, %stats, "verified artifact");
        }
        diffs.push(stats);
    }
    Ok(diffs)
}
