//! Symmetric per-channel int8 weight quantization.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Largest magnitude of a symmetric int8 code.
const QMAX: f32 = 127.0;

/// An int8 tensor with one scale per slice along `axis`.
///
/// `value ≈ values[i] as f32 * scales[channel(i)]`, with codes clamped to
/// `[-127, 127]` so that zero maps exactly to zero.
///
/// # Example
///
/// ```
/// use deconv_export::QuantizedTensor;
///
/// let q = QuantizedTensor::quantize(&[0.5, -1.0, 2.0, 0.0], &[2, 2], 0).unwrap();
/// assert_eq!(q.scales.len(), 2);
/// assert_eq!(q.values[1], -127);
/// assert_eq!(q.values[2], 127);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedTensor {
    /// Float tensor shape.
    pub shape: Vec<usize>,
    /// Axis the scales run along.
    pub axis: usize,
    /// One scale per index of `shape[axis]`.
    pub scales: Vec<f32>,
    /// Row-major int8 codes.
    pub values: Vec<i8>,
}

impl QuantizedTensor {
    /// Quantizes row-major `values` of `shape` per slice along `axis`.
    ///
    /// Each scale is `max|w| / 127` over its slice; an all-zero slice gets a
    /// scale of zero and zero codes.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Conversion`] if `axis` is out of range or the
    /// value count does not match `shape`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn quantize(values: &[f32], shape: &[usize], axis: usize) -> Result<Self> {
        if axis >= shape.len() {
            return Err(ExportError::conversion(format!(
                "quantization axis {axis} out of range for shape {shape:?}"
            )));
        }
        let expected = shape.iter().product::<usize>();
        if values.len() != expected {
            return Err(ExportError::conversion(format!(
                "{} values do not fill shape {shape:?}",
                values.len()
            )));
        }

        let channels = shape[axis];
        let inner = inner_size(shape, axis);

        let mut max_abs = vec![0.0_f32; channels];
        for (i, v) in values.iter().enumerate() {
            let c = (i / inner) % channels;
            max_abs[c] = max_abs[c].max(v.abs());
        }
        let scales: Vec<f32> = max_abs.iter().map(|m| m / QMAX).collect();

        let codes = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let scale = scales[(i / inner) % channels];
                if scale > 0.0 {
                    (v / scale).round().clamp(-QMAX, QMAX) as i8
                } else {
                    0
                }
            })
            .collect();

        Ok(Self {
            shape: shape.to_vec(),
            axis,
            scales,
            values: codes,
        })
    }

    /// Checks that axis, scales and codes agree with `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Deserialization`] if the axis is out of range,
    /// the scale count differs from `shape[axis]`, or the code count does not
    /// fill `shape`.
    pub fn validate(&self) -> Result<()> {
        let Some(&channels) = self.shape.get(self.axis) else {
            return Err(ExportError::deserialization(format!(
                "quantization axis {} out of range for shape {:?}",
                self.axis, self.shape
            )));
        };
        if self.scales.len() != channels {
            return Err(ExportError::deserialization(format!(
                "{} scales for {channels} channels",
                self.scales.len()
            )));
        }
        let expected = self.shape.iter().product::<usize>();
        if self.values.len() != expected {
            return Err(ExportError::deserialization(format!(
                "{} codes do not fill shape {:?}",
                self.values.len(),
                self.shape
            )));
        }
        Ok(())
    }

    /// Reconstructs the float values.
    ///
    /// # Errors
    ///
    /// See [`QuantizedTensor::validate`].
    pub fn dequantize(&self) -> Result<Vec<f32>> {
        self.validate()?;
        let channels = self.scales.len();
        let inner = inner_size(&self.shape, self.axis);
        Ok(self
            .values
            .iter()
            .enumerate()
            .map(|(i, q)| f32::from(*q) * self.scales[(i / inner) % channels])
            .collect())
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the tensor has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Elements per index of `axis` in a row-major layout.
fn inner_size(shape: &[usize], axis: usize) -> usize {
    shape.iter().skip(axis + 1).product::<usize>().max(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantize_per_channel_scales() {
        // Shape [2, 3, 1]: axis 1 has three channels interleaved across axis 0.
        let values = [1.0, -2.0, 0.5, -0.25, 4.0, 0.0];
        let q = QuantizedTensor::quantize(&values, &[2, 3, 1], 1).unwrap();

        assert_eq!(q.scales.len(), 3);
        assert_relative_eq!(q.scales[0], 1.0 / 127.0);
        assert_relative_eq!(q.scales[1], 4.0 / 127.0);
        assert_relative_eq!(q.scales[2], 0.5 / 127.0);

        // Largest magnitude in each channel lands on +-127.
        assert_eq!(q.values[0], 127);
        assert_eq!(q.values[4], 127);
        assert_eq!(q.values[2], 127);
        assert_eq!(q.values[5], 0);
    }

    #[test]
    fn dequantize_error_within_half_step() {
        let values: Vec<f32> = (0..60).map(|i| ((i * 37) % 17) as f32 / 7.0 - 1.1).collect();
        let shape = [3, 4, 5];
        let q = QuantizedTensor::quantize(&values, &shape, 1).unwrap();
        let restored = q.dequantize().unwrap();

        assert_eq!(restored.len(), values.len());
        let inner = 5;
        for (i, (a, b)) in values.iter().zip(&restored).enumerate() {
            let scale = q.scales[(i / inner) % 4];
            assert!((a - b).abs() <= scale / 2.0 + f32::EPSILON, "index {i}");
        }
    }

    #[test]
    fn zero_channel_maps_to_zero() {
        let q = QuantizedTensor::quantize(&[0.0, 0.0, 3.0, -3.0], &[2, 2], 0).unwrap();
        assert_eq!(q.scales[0], 0.0);
        assert_eq!(&q.values[..2], &[0, 0]);
        assert_eq!(q.dequantize().unwrap()[..2], [0.0, 0.0]);
        assert_eq!(&q.values[2..], &[127, -127]);
    }

    #[test]
    fn quantize_rejects_bad_axis() {
        let result = QuantizedTensor::quantize(&[1.0, 2.0], &[2], 1);
        assert!(matches!(result, Err(ExportError::Conversion(_))));
    }

    #[test]
    fn quantize_rejects_length_mismatch() {
        let result = QuantizedTensor::quantize(&[1.0, 2.0, 3.0], &[2, 2], 0);
        assert!(matches!(result, Err(ExportError::Conversion(_))));
    }

    #[test]
    fn validate_rejects_inconsistent_storage() {
        let good = QuantizedTensor::quantize(&[1.0, -2.0, 0.5, 4.0], &[2, 2], 1).unwrap();
        assert!(good.validate().is_ok());

        let mut no_scales = good.clone();
        no_scales.scales.clear();
        assert!(matches!(
            no_scales.validate(),
            Err(ExportError::Deserialization(_))
        ));
        assert!(no_scales.dequantize().is_err());

        let mut short_codes = good.clone();
        short_codes.values.pop();
        assert!(matches!(
            short_codes.dequantize(),
            Err(ExportError::Deserialization(_))
        ));

        let mut bad_axis = good;
        bad_axis.axis = 2;
        assert!(matches!(
            bad_axis.validate(),
            Err(ExportError::Deserialization(_))
        ));
    }

    #[test]
    fn len_and_empty() {
        let q = QuantizedTensor::quantize(&[1.0; 6], &[1, 6], 1).unwrap();
        assert_eq!(q.len(), 6);
        assert!(!q.is_empty());
    }
}
