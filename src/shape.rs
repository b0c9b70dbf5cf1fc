use crate::error::BeliefError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Most cells a grid can hold, the mass buffer must stay addressable.
const MAX_CELLS: usize = isize::MAX as usize / std::mem::size_of::<f64>();

/// Extents of an N-dimensional grid stored in a flat row-major buffer.
///
/// The last axis varies fastest, so the cell at `[i, j]` of a `[rows, cols]`
/// grid lives at flat index `i * cols + j`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "Vec<usize>", into = "Vec<usize>")
)]
pub struct Shape {
    dims: Vec<usize>,
    strides: Vec<usize>,
    len: usize,
}

impl Shape {
    /// Creates a new `Shape` from per-axis cell counts.
    ///
    /// Fails if `dims` is empty, any extent is zero or there are too many
    /// cells to hold one `f64` each.
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self, BeliefError> {
        let dims = dims.into();
        if dims.is_empty() || dims.contains(&0) {
            return Err(BeliefError::InvalidShape { shape: dims });
        }

        let len = match dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d)) {
            Some(len) if len <= MAX_CELLS => len,
            _ => return Err(BeliefError::InvalidShape { shape: dims }),
        };

        // Every stride divides `len`, so none of these can overflow.
        let mut strides = vec![1; dims.len()];
        for axis in (0..dims.len() - 1).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }

        Ok(Self { dims, strides, len })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`, a valid shape holds at least one cell.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, coords: &[usize]) -> bool {
        coords.len() == self.ndim() && coords.iter().zip(&self.dims).all(|(c, d)| c < d)
    }

    /// Converts `coords` into a flat index.
    pub fn flat_index(&self, coords: &[usize]) -> Result<usize, BeliefError> {
        if !self.contains(coords) {
            return Err(BeliefError::IndexOutOfBounds {
                coords: coords.to_vec(),
                shape: self.dims.clone(),
            });
        }

        Ok(coords.iter().zip(&self.strides).map(|(c, s)| c * s).sum())
    }

    /// Converts a flat `index` back into coordinates.
    ///
    /// `index` must be less than [`Shape::len`].
    pub fn coords(&self, index: usize) -> Vec<usize> {
        let mut rem = index;
        self.strides
            .iter()
            .map(|stride| {
                let c = rem / stride;
                rem %= stride;
                c
            })
            .collect()
    }

    /// Iterates over every cell's coordinates in row-major order.
    pub fn iter_coords(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.len()).map(|i| self.coords(i))
    }
}

impl TryFrom<Vec<usize>> for Shape {
    type Error = BeliefError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        Shape::new(dims)
    }
}

impl From<Shape> for Vec<usize> {
    fn from(shape: Shape) -> Self {
        shape.dims
    }
}

impl AsRef<Shape> for Shape {
    fn as_ref(&self) -> &Shape {
        self
    }
}

/// Anything that can be validated into a [`Shape`].
pub trait IntoShape {
    fn into_shape(self) -> Result<Shape, BeliefError>;
}

impl IntoShape for Shape {
    fn into_shape(self) -> Result<Shape, BeliefError> {
        Ok(self)
    }
}

impl IntoShape for &Shape {
    fn into_shape(self) -> Result<Shape, BeliefError> {
        Ok(self.clone())
    }
}

impl IntoShape for Vec<usize> {
    fn into_shape(self) -> Result<Shape, BeliefError> {
        Shape::new(self)
    }
}

impl IntoShape for &[usize] {
    fn into_shape(self) -> Result<Shape, BeliefError> {
        Shape::new(self)
    }
}

impl<const N: usize> IntoShape for [usize; N] {
    fn into_shape(self) -> Result<Shape, BeliefError> {
        Shape::new(self)
    }
}
