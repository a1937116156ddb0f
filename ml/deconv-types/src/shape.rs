//! Channel-last tensor shapes.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A rank-4 tensor shape in `(batch, height, width, channels)` order.
///
/// The layout is fixed to channel-last. Conversion to the channel-first order
/// used by the compute backend happens inside `deconv-models`.
///
/// # Example
///
/// ```
/// use deconv_types::TensorShape;
///
/// let shape = TensorShape::new(1, 9, 6, 45);
/// assert_eq!(shape.dims(), [1, 9, 6, 45]);
/// assert_eq!(shape.num_elements(), 2430);
/// assert_eq!(shape.to_string(), "(1, 9, 6, 45)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorShape {
    /// Batch size.
    pub batch: usize,
    /// Spatial height.
    pub height: usize,
    /// Spatial width.
    pub width: usize,
    /// Channel count.
    pub channels: usize,
}

impl TensorShape {
    /// Creates a new shape.
    #[must_use]
    pub const fn new(batch: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            batch,
            height,
            width,
            channels,
        }
    }

    /// Returns the dimensions in channel-last order.
    #[must_use]
    pub const fn dims(&self) -> [usize; 4] {
        [self.batch, self.height, self.width, self.channels]
    }

    /// Total element count.
    #[must_use]
    pub const fn num_elements(&self) -> usize {
        self.batch * self.height * self.width * self.channels
    }

    /// Checks that every dimension is positive.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonPositiveDimension`] naming the first
    /// zero dimension.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let named = [
            ("batch", self.batch),
            ("height", self.height),
            ("width", self.width),
            ("channels", self.channels),
        ];
        match named.iter().find(|(_, value)| *value == 0) {
            Some((dim, _)) => Err(ValidationError::NonPositiveDimension {
                dim: *dim,
                shape: self.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for TensorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.height, self.width, self.channels
        )
    }
}

impl From<[usize; 4]> for TensorShape {
    fn from(dims: [usize; 4]) -> Self {
        Self::new(dims[0], dims[1], dims[2], dims[3])
    }
}
