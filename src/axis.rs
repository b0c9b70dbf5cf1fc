use crate::error::AxisError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slack added when mapping keys to bins so decimal rounding such as
/// `0.3 / 0.1 = 2.9999999999999996` lands in the intended bin.
pub const DEFAULT_AXIS_EPSILON: f64 = 1e-6;

/// Discretizes one continuous state dimension into equally sized cells.
///
/// The axis covers `[min, max]` with cells of width `size`. Continuous values
/// on the axis are called keys, cell positions are called indices.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "GridAxisRepr", into = "GridAxisRepr")
)]
pub struct GridAxis {
    name: String,
    min: f64,
    max: f64,
    size: f64,
    epsilon: f64,
}

impl GridAxis {
    /// Creates a new `GridAxis` named `name` covering `[min, max]` with cells of width `size`.
    pub fn new(name: impl Into<String>, min: f64, max: f64, size: f64) -> Result<Self, AxisError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AxisError::EmptyName);
        }
        if !(min < max) {
            return Err(AxisError::EmptyRange { min, max });
        }
        if !(size > 0.0) {
            return Err(AxisError::NonPositiveSize { size });
        }
        if !(min.is_finite() && max.is_finite() && ((max - min) / size).is_finite()) {
            return Err(AxisError::NonFinite { min, max, size });
        }

        Ok(Self {
            name,
            min,
            max,
            size,
            epsilon: DEFAULT_AXIS_EPSILON,
        })
    }

    /// Returns a copy using `epsilon` as the rounding slack.
    pub fn with_epsilon(mut self, epsilon: f64) -> Result<Self, AxisError> {
        if !(epsilon > 0.0 && epsilon.is_finite()) {
            return Err(AxisError::NonPositiveEpsilon { epsilon });
        }
        self.epsilon = epsilon;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Width of a single cell.
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of cells on the axis.
    pub fn bins(&self) -> usize {
        (((self.max - self.min) / self.size + self.epsilon).floor() as usize).max(1)
    }

    pub fn contains_key(&self, key: f64) -> bool {
        self.min <= key && key <= self.max
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.bins()
    }

    /// Maps `key` to the index of the cell that contains it.
    ///
    /// `max` itself belongs to the last cell.
    pub fn index_of(&self, key: f64) -> Result<usize, AxisError> {
        if !self.contains_key(key) {
            return Err(AxisError::KeyOutOfBounds {
                name: self.name.clone(),
                key,
                min: self.min,
                max: self.max,
            });
        }

        let last = self.bins() - 1;
        if key >= self.max {
            return Ok(last);
        }

        let index = ((key - self.min) / self.size + self.epsilon).floor() as usize;
        Ok(index.min(last))
    }

    /// Maps `index` to the key at the center of its cell.
    pub fn key_of(&self, index: usize) -> Result<f64, AxisError> {
        if !self.contains_index(index) {
            return Err(AxisError::IndexOutOfBounds {
                name: self.name.clone(),
                index,
                bins: self.bins(),
            });
        }

        Ok(index as f64 * self.size + self.min + self.size / 2.0)
    }
}

/// Unchecked wire form of a [`GridAxis`].
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct GridAxisRepr {
    name: String,
    min: f64,
    max: f64,
    size: f64,
    epsilon: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<GridAxisRepr> for GridAxis {
    type Error = AxisError;

    fn try_from(repr: GridAxisRepr) -> Result<Self, Self::Error> {
        GridAxis::new(repr.name, repr.min, repr.max, repr.size)?.with_epsilon(repr.epsilon)
    }
}

#[cfg(feature = "serde")]
impl From<GridAxis> for GridAxisRepr {
    fn from(axis: GridAxis) -> Self {
        Self {
            name: axis.name,
            min: axis.min,
            max: axis.max,
            size: axis.size,
            epsilon: axis.epsilon,
        }
    }
}

impl PartialEq for GridAxis {
    fn eq(&self, other: &Self) -> bool {
        // Rounding slack does not change which cells the axis describes.
        self.name == other.name
            && self.min == other.min
            && self.max == other.max
            && self.size == other.size
    }
}

impl fmt::Display for GridAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GridAxis({}, {:?}, {:?}, {:?})",
            self.name, self.min, self.max, self.size
        )
    }
}
