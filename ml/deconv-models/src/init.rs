//! Weight and bias initializers.

use deconv_types::Initializer;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ModelError, Result};

/// Truncated-normal correction: stddev of a unit normal truncated at two
/// standard deviations.
const TRUNCATED_NORMAL_STDDEV: f32 = 0.879_625_66;

/// Fan sizes used to scale variance-preserving initializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fans {
    /// Incoming connections per output unit.
    pub fan_in: usize,
    /// Outgoing connections per input unit.
    pub fan_out: usize,
}

impl Fans {
    /// Fans of a transposed-convolution kernel `[in, filters, kh, kw]`.
    ///
    /// The kernel maps filters back onto inputs, so the filter axis counts as
    /// fan-in.
    #[must_use]
    pub const fn for_transposed_kernel(shape: [usize; 4]) -> Self {
        let receptive = shape[2] * shape[3];
        Self {
            fan_in: receptive * shape[1],
            fan_out: receptive * shape[0],
        }
    }

    /// Fans of a 1-D tensor of `len` elements.
    #[must_use]
    pub const fn for_vector(len: usize) -> Self {
        Self {
            fan_in: len,
            fan_out: len,
        }
    }
}

/// Draws `count` values for `initializer`.
///
/// # Errors
///
/// Returns [`ModelError::InvalidConfig`] if a fan is zero for an initializer
/// that scales by it.
#[allow(clippy::cast_precision_loss)]
pub fn sample<R: Rng + ?Sized>(
    initializer: Initializer,
    count: usize,
    fans: Fans,
    rng: &mut R,
) -> Result<Vec<f32>> {
    match initializer {
        Initializer::Zeros => Ok(vec![0.0; count]),
        Initializer::Ones => Ok(vec![1.0; count]),
        Initializer::HeNormal => {
            if fans.fan_in == 0 {
                return Err(ModelError::invalid_config("he_normal needs fan_in > 0"));
            }
            let stddev = (2.0 / fans.fan_in as f32).sqrt() / TRUNCATED_NORMAL_STDDEV;
            truncated_normal(count, stddev, rng)
        }
        Initializer::GlorotUniform => {
            let fan_sum = fans.fan_in + fans.fan_out;
            if fan_sum == 0 {
                return Err(ModelError::invalid_config(
                    "glorot_uniform needs fan_in + fan_out > 0",
                ));
            }
            let limit = (6.0 / fan_sum as f32).sqrt();
            Ok((0..count).map(|_| rng.gen_range(-limit..=limit)).collect())
        }
    }
}

/// Normal samples rejected and redrawn outside two standard deviations.
fn truncated_normal<R: Rng + ?Sized>(count: usize, stddev: f32, rng: &mut R) -> Result<Vec<f32>> {
    let normal = Normal::new(0.0_f32, stddev)
        .map_err(|e| ModelError::invalid_config(format!("normal distribution: {e}")))?;
    let bound = 2.0 * stddev;
    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        let v = normal.sample(rng);
        if v.abs() <= bound {
            values.push(v);
        }
    }
    Ok(values)
}
