use crate::{
    axis::GridAxis,
    belief::HistogramBelief,
    config::BeliefConfig,
    error::{AxisError, BeliefError},
    shape::Shape,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A continuous state space discretized by one [`GridAxis`] per dimension.
///
/// Axis `i` of the space is axis `i` of every belief built from it, so keys
/// are given in the same order as the belief's row-major coordinates.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "GridSpaceRepr", into = "GridSpaceRepr")
)]
pub struct GridSpace {
    axes: Vec<GridAxis>,
    shape: Shape,
}

impl GridSpace {
    /// Creates a new `GridSpace` from `axes` with pairwise distinct names.
    pub fn new(axes: impl Into<Vec<GridAxis>>) -> Result<Self, BeliefError> {
        let axes = axes.into();
        if axes.is_empty() {
            return Err(AxisError::NoAxes.into());
        }

        let mut names = HashSet::new();
        if let Some(axis) = axes.iter().find(|axis| !names.insert(axis.name())) {
            return Err(AxisError::DuplicateName {
                name: axis.name().to_string(),
            }
            .into());
        }

        let shape = Shape::new(axes.iter().map(GridAxis::bins).collect::<Vec<_>>())?;
        Ok(Self { axes, shape })
    }

    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Volume of a single cell.
    pub fn cell_volume(&self) -> f64 {
        self.axes.iter().map(GridAxis::size).product()
    }

    /// Maps one key per axis to the coordinates of the containing cell.
    pub fn index_of(&self, keys: &[f64]) -> Result<Vec<usize>, AxisError> {
        self.check_len(keys.len())?;
        self.axes
            .iter()
            .zip(keys)
            .map(|(axis, key)| axis.index_of(*key))
            .collect()
    }

    /// Maps cell coordinates to the keys at the cell's center.
    pub fn key_of(&self, coords: &[usize]) -> Result<Vec<f64>, AxisError> {
        self.check_len(coords.len())?;
        self.axes
            .iter()
            .zip(coords)
            .map(|(axis, index)| axis.key_of(*index))
            .collect()
    }

    fn check_len(&self, actual: usize) -> Result<(), AxisError> {
        match actual == self.axes.len() {
            true => Ok(()),
            false => Err(AxisError::DimensionMismatch {
                expected: self.axes.len(),
                actual,
            }),
        }
    }

    /// A uniform belief over the space.
    pub fn uniform(&self) -> Result<HistogramBelief, BeliefError> {
        HistogramBelief::uniform(&self.shape)
    }

    pub fn uniform_with_config(
        &self,
        config: BeliefConfig,
    ) -> Result<HistogramBelief, BeliefError> {
        HistogramBelief::uniform_with_config(&self.shape, config)
    }

    /// A belief over the space from a row-major prior.
    pub fn belief(&self, values: impl Into<Vec<f64>>) -> Result<HistogramBelief, BeliefError> {
        HistogramBelief::from_values(&self.shape, values)
    }

    /// Mass of the cell containing `keys`.
    pub fn mass_at(&self, belief: &HistogramBelief, keys: &[f64]) -> Result<f64, BeliefError> {
        self.check_belief(belief)?;
        belief.get(&self.index_of(keys)?)
    }

    /// Cell centers of the belief's support.
    pub fn support_keys(&self, belief: &HistogramBelief) -> Result<Vec<Vec<f64>>, BeliefError> {
        self.check_belief(belief)?;
        belief
            .support()
            .iter()
            .map(|coords| self.key_of(coords).map_err(BeliefError::from))
            .collect()
    }

    /// Expected state, in keys.
    pub fn mean(&self, belief: &HistogramBelief) -> Result<Vec<f64>, BeliefError> {
        self.check_belief(belief)?;
        Ok(belief
            .mean()?
            .iter()
            .zip(&self.axes)
            .map(|(index, axis)| axis.min() + axis.size() * (index + 0.5))
            .collect())
    }

    /// Per-axis variance of the state, in squared keys.
    pub fn variance(&self, belief: &HistogramBelief) -> Result<Vec<f64>, BeliefError> {
        self.check_belief(belief)?;
        Ok(belief
            .variance()?
            .iter()
            .zip(&self.axes)
            .map(|(var, axis)| var * axis.size().powi(2))
            .collect())
    }

    fn check_belief(&self, belief: &HistogramBelief) -> Result<(), BeliefError> {
        match belief.shape() == &self.shape {
            true => Ok(()),
            false => Err(BeliefError::ShapeMismatch {
                shape: self.shape.dims().to_vec(),
                expected: self.shape.len(),
                actual: belief.len(),
            }),
        }
    }
}

/// Wire form of a [`GridSpace`], the shape is rebuilt from the axes.
#[cfg(feature = "serde")]
#[derive(Clone, Serialize, Deserialize)]
struct GridSpaceRepr {
    axes: Vec<GridAxis>,
}

#[cfg(feature = "serde")]
impl TryFrom<GridSpaceRepr> for GridSpace {
    type Error = BeliefError;

    fn try_from(repr: GridSpaceRepr) -> Result<Self, Self::Error> {
        GridSpace::new(repr.axes)
    }
}

#[cfg(feature = "serde")]
impl From<GridSpace> for GridSpaceRepr {
    fn from(space: GridSpace) -> Self {
        Self { axes: space.axes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn space() -> GridSpace {
        GridSpace::new(vec![
            GridAxis::new("Y", 0.0, 1.0, 0.1).unwrap(),
            GridAxis::new("X", 0.0, 1.0, 0.1).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn shape_follows_axes() {
        assert_eq!(space().shape().dims(), &[10, 10]);
        assert_relative_eq!(space().cell_volume(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn duplicate_names() {
        let x = GridAxis::new("X", 0.0, 1.0, 0.1).unwrap();
        assert_eq!(
            GridSpace::new(vec![x.clone(), x]),
            Err(BeliefError::Axis(AxisError::DuplicateName { name: "X".into() }))
        );
    }

    #[test]
    fn oversized_space() {
        let fine = GridAxis::new("x", 0.0, 1e5, 1e-15).unwrap();
        assert!(matches!(
            GridSpace::new(vec![fine]),
            Err(BeliefError::InvalidShape { .. })
        ));

        let wide = GridAxis::new("x", 0.0, 1e7, 1.0).unwrap();
        let tall = GridAxis::new("y", 0.0, 1e7, 1.0).unwrap();
        let deep = GridAxis::new("z", 0.0, 1e7, 1.0).unwrap();
        assert!(matches!(
            GridSpace::new(vec![wide, tall, deep]),
            Err(BeliefError::InvalidShape { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_rebuilds_shape() {
        let space = space();
        let json = serde_json::to_string(&space).unwrap();
        assert!(!json.contains("shape"));
        assert_eq!(serde_json::from_str::<GridSpace>(&json).unwrap(), space);

        let x = r#"{"name":"X","min":0.0,"max":1.0,"size":0.1,"epsilon":1e-6}"#;
        let twice = format!(r#"{{"axes":[{x},{x}]}}"#);
        assert!(serde_json::from_str::<GridSpace>(&twice).is_err());
        assert!(serde_json::from_str::<GridSpace>(r#"{"axes":[]}"#).is_err());
    }

    #[test]
    fn no_axes() {
        assert_eq!(
            GridSpace::new(Vec::<GridAxis>::new()),
            Err(BeliefError::Axis(AxisError::NoAxes))
        );
    }

    #[test]
    fn keys_and_indices() {
        let space = space();
        assert_eq!(space.index_of(&[0.3, 0.2]), Ok(vec![3, 2]));

        let keys = space.key_of(&[3, 2]).unwrap();
        assert_relative_eq!(keys[0], 0.35, epsilon = 1e-12);
        assert_relative_eq!(keys[1], 0.25, epsilon = 1e-12);

        assert_eq!(
            space.index_of(&[0.3]),
            Err(AxisError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn support_keys_are_cell_centers() {
        let space = space();
        let mut values = vec![0.0; 100];
        values[32] = 0.5;
        let belief = space.belief(values).unwrap();

        let keys = space.support_keys(&belief).unwrap();
        assert_eq!(keys.len(), 1);
        assert_relative_eq!(keys[0][0], 0.35, epsilon = 1e-12);
        assert_relative_eq!(keys[0][1], 0.25, epsilon = 1e-12);
        assert_relative_eq!(space.mass_at(&belief, &[0.3, 0.2]).unwrap(), 1.0);
    }

    #[test]
    fn moments_in_keys() {
        let space = GridSpace::new(vec![GridAxis::new("x", -1.0, 1.0, 0.5).unwrap()]).unwrap();
        let belief = space.belief(vec![0.0, 0.5, 0.5, 0.0]).unwrap();

        assert_relative_eq!(space.mean(&belief).unwrap()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(space.variance(&belief).unwrap()[0], 0.0625, epsilon = 1e-12);
    }

    #[test]
    fn foreign_belief() {
        let belief = HistogramBelief::uniform([3]).unwrap();
        assert!(matches!(
            space().mean(&belief),
            Err(BeliefError::ShapeMismatch { .. })
        ));
    }
}
