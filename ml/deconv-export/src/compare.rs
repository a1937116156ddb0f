//! Element-wise output comparison.

use std::fmt;

use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Summary of the absolute difference between two outputs.
///
/// Pairs where either side is NaN are counted, not averaged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Number of compared finite pairs.
    pub count: usize,
    /// Mean absolute difference (NaN when `count` is zero).
    pub mean_abs: f32,
    /// Largest absolute difference.
    pub max_abs: f32,
    /// NaNs on the left-hand side.
    pub nans_left: usize,
    /// NaNs on the right-hand side.
    pub nans_right: usize,
}

impl DiffStats {
    /// Returns `true` if either side held a NaN.
    #[must_use]
    pub const fn has_nans(&self) -> bool {
        self.nans_left > 0 || self.nans_right > 0
    }

    /// Returns `true` if the maximum difference is at most `tolerance`
    /// and no NaNs were seen.
    #[must_use]
    pub fn within(&self, tolerance: f32) -> bool {
        !self.has_nans() && self.max_abs <= tolerance
    }
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean diff: {:>9.3e} max: {:>9.3e}",
            self.mean_abs, self.max_abs
        )?;
        if self.has_nans() {
            write!(f, " nans: {} / {}", self.nans_left, self.nans_right)?;
        }
        Ok(())
    }
}

/// Compares two value buffers element by element.
///
/// # Errors
///
/// Returns [`ExportError::LengthMismatch`] if the lengths differ.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn diff_values(left: &[f32], right: &[f32]) -> Result<DiffStats> {
    if left.len() != right.len() {
        return Err(ExportError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let mut stats = DiffStats {
        count: 0,
        mean_abs: 0.0,
        max_abs: 0.0,
        nans_left: 0,
        nans_right: 0,
    };
    let mut sum = 0.0_f64;

    for (a, b) in left.iter().zip(right) {
        if a.is_nan() {
            stats.nans_left += 1;
        }
        if b.is_nan() {
            stats.nans_right += 1;
        }
        if a.is_nan() || b.is_nan() {
            continue;
        }
        let d = (a - b).abs();
        sum += f64::from(d);
        stats.max_abs = stats.max_abs.max(d);
        stats.count += 1;
    }

    stats.mean_abs = if stats.count == 0 {
        f32::NAN
    } else {
        (sum / stats.count as f64) as f32
    };
    Ok(stats)
}

/// Compares two tensors of the same shape.
///
/// # Errors
///
/// Returns [`ExportError::LengthMismatch`] if the element counts differ, or
/// [`ExportError::Conversion`] if tensor data cannot be read back.
pub fn diff_tensors<B: Backend, const D: usize>(
    left: Tensor<B, D>,
    right: Tensor<B, D>,
) -> Result<DiffStats> {
    let left = read_values(left)?;
    let right = read_values(right)?;
    diff_values(&left, &right)
}

fn read_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ExportError::conversion(format!("{e:?}")))
}
