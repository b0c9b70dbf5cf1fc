use crate::{
    config::BeliefConfig,
    error::BeliefError,
    kernel::Kernel,
    shape::{IntoShape, Shape},
};
use rand::{
    Rng,
    distr::{Distribution as _, weighted::WeightedIndex},
};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref};
use tracing::{debug, trace};

/// What happens to mass that a motion would carry off the edge of the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Boundary {
    /// Mass piles up in the edge cell it would have left through.
    #[default]
    Clamp,
    /// The grid is periodic on every axis.
    Wrap,
    /// Mass leaving the grid is discarded.
    Truncate,
}

/// A probability mass function over an N-dimensional grid of cells.
///
/// The mass lives in a flat row-major buffer that only this type can mutate.
/// Construction and [`HistogramBelief::normalize`] leave the mass summing to
/// one. The model primitives ([`apply_likelihood`](Self::apply_likelihood),
/// [`apply_transition`](Self::apply_transition),
/// [`convolve`](Self::convolve), [`shift`](Self::shift)) are the building
/// blocks for [`MotionModel`](crate::filter::MotionModel) and
/// [`SensorModel`](crate::filter::SensorModel) implementations.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "HistogramBeliefRepr")
)]
pub struct HistogramBelief {
    shape: Shape,
    values: Vec<f64>,
    config: BeliefConfig,
}

impl HistogramBelief {
    /// Creates a belief spreading mass evenly over every cell of `shape`.
    pub fn uniform(shape: impl IntoShape) -> Result<Self, BeliefError> {
        Self::uniform_with_config(shape, BeliefConfig::default())
    }

    pub fn uniform_with_config(
        shape: impl IntoShape,
        config: BeliefConfig,
    ) -> Result<Self, BeliefError> {
        config.validate()?;
        let shape = shape.into_shape()?;
        let len = shape.len();
        trace!(shape = ?shape.dims(), "created uniform belief");

        Ok(Self {
            shape,
            values: vec![1.0 / len as f64; len],
            config,
        })
    }

    /// Creates a belief from a prior given as row-major `values`.
    ///
    /// The prior does not need to be normalized, but every entry must be
    /// finite and non-negative and at least one must be positive.
    pub fn from_values(
        shape: impl IntoShape,
        values: impl Into<Vec<f64>>,
    ) -> Result<Self, BeliefError> {
        Self::from_values_with_config(shape, values, BeliefConfig::default())
    }

    pub fn from_values_with_config(
        shape: impl IntoShape,
        values: impl Into<Vec<f64>>,
        config: BeliefConfig,
    ) -> Result<Self, BeliefError> {
        let mut belief = Self::from_parts(shape.into_shape()?, values.into(), config)?;
        belief.normalize()?;
        trace!(shape = ?belief.shape.dims(), "created belief from prior");
        Ok(belief)
    }

    fn from_parts(
        shape: Shape,
        values: Vec<f64>,
        config: BeliefConfig,
    ) -> Result<Self, BeliefError> {
        config.validate()?;
        if values.len() != shape.len() {
            return Err(BeliefError::ShapeMismatch {
                shape: shape.dims().to_vec(),
                expected: shape.len(),
                actual: values.len(),
            });
        }
        check_mass(&values)?;

        Ok(Self {
            shape,
            values,
            config,
        })
    }

    /// Rescales the mass so it sums to one.
    ///
    /// Fails with [`BeliefError::ZeroMass`] and leaves the grid untouched if
    /// the total mass is not above the configured zero-mass epsilon.
    pub fn normalize(&mut self) -> Result<(), BeliefError> {
        let total = self.total();
        if !(total > self.config.zero_mass_epsilon()) {
            debug!(total, "refusing to normalize degenerate belief");
            return Err(BeliefError::ZeroMass { total });
        }

        scale_to_unit(&mut self.values, total);
        trace!(total, "normalized belief");
        Ok(())
    }

    /// Returns `true` if the mass sums to one within the configured tolerance.
    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() <= self.config.tolerance()
    }

    /// Discards the current mass in favour of the uniform distribution.
    pub fn reset_uniform(&mut self) {
        let len = self.values.len();
        self.values.fill(1.0 / len as f64);
        debug!("reset belief to uniform");
    }

    /// Checks that every cell holds finite, non-negative mass.
    pub fn validate(&self) -> Result<(), BeliefError> {
        check_mass(&self.values)
    }

    /// A read-only view of the mass.
    pub fn distribution(&self) -> DistributionView<'_> {
        DistributionView {
            shape: &self.shape,
            values: &self.values,
        }
    }

    /// A copy of the mass in row-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.clone()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn config(&self) -> &BeliefConfig {
        &self.config
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always `false`, a belief holds at least one cell.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Mass held by the cell at `coords`.
    pub fn get(&self, coords: &[usize]) -> Result<f64, BeliefError> {
        Ok(self.values[self.shape.flat_index(coords)?])
    }

    /// Sum of the mass over every cell.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Coordinates of the cell holding the most mass.
    ///
    /// Ties go to the cell that comes first in row-major order.
    pub fn most_likely_state(&self) -> Vec<usize> {
        let (index, _) = self
            .values
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &value)| {
                match value > best.1 {
                    true => (i, value),
                    false => best,
                }
            });

        self.shape.coords(index)
    }

    /// Sums out every axis except `axis`.
    pub fn marginal(&self, axis: usize) -> Result<Vec<f64>, BeliefError> {
        let ndim = self.shape.ndim();
        if axis >= ndim {
            return Err(BeliefError::AxisOutOfRange { axis, ndim });
        }

        let dim = self.shape.dims()[axis];
        let stride = self.shape.strides()[axis];
        let mut marginal = vec![0.0; dim];
        for (i, value) in self.values.iter().enumerate() {
            marginal[(i / stride) % dim] += value;
        }

        Ok(marginal)
    }

    /// Expected cell index along every axis.
    pub fn mean(&self) -> Result<Vec<f64>, BeliefError> {
        Ok(self.moments()?.into_iter().map(|(mean, _)| mean).collect())
    }

    /// Variance of the cell index along every axis.
    pub fn variance(&self) -> Result<Vec<f64>, BeliefError> {
        Ok(self.moments()?.into_iter().map(|(_, var)| var).collect())
    }

    fn moments(&self) -> Result<Vec<(f64, f64)>, BeliefError> {
        let total = self.checked_total()?;
        (0..self.shape.ndim())
            .map(|axis| {
                let marginal = self.marginal(axis)?;
                let mean = marginal
                    .iter()
                    .enumerate()
                    .map(|(k, m)| k as f64 * m)
                    .sum::<f64>()
                    / total;
                let var = marginal
                    .iter()
                    .enumerate()
                    .map(|(k, m)| (k as f64 - mean).powi(2) * m)
                    .sum::<f64>()
                    / total;
                Ok((mean, var))
            })
            .collect()
    }

    /// Shannon entropy of the belief in nats.
    pub fn entropy(&self) -> Result<f64, BeliefError> {
        let total = self.checked_total()?;
        Ok(-self
            .values
            .iter()
            .map(|value| value / total)
            .filter(|p| *p > 0.0)
            .map(|p| p * p.ln())
            .sum::<f64>())
    }

    fn checked_total(&self) -> Result<f64, BeliefError> {
        let total = self.total();
        match total > self.config.zero_mass_epsilon() {
            true => Ok(total),
            false => Err(BeliefError::ZeroMass { total }),
        }
    }

    fn in_support(&self, value: f64) -> bool {
        value > 0.0 && value >= self.config.zero_threshold()
    }

    /// Coordinates of every cell holding mass at or above the zero threshold.
    pub fn support(&self) -> Vec<Vec<usize>> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| self.in_support(**value))
            .map(|(i, _)| self.shape.coords(i))
            .collect()
    }

    /// Draws `count` cells from the support with probability proportional to their mass.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Result<Vec<Vec<usize>>, BeliefError> {
        let threshold = self.config.zero_threshold();
        let support: Vec<usize> = (0..self.values.len())
            .filter(|&i| self.in_support(self.values[i]))
            .collect();
        if support.is_empty() {
            return Err(BeliefError::EmptySupport { threshold });
        }

        let sampler = WeightedIndex::new(support.iter().map(|&i| self.values[i]))
            .map_err(|_| BeliefError::EmptySupport { threshold })?;

        Ok((0..count)
            .map(|_| self.shape.coords(support[sampler.sample(rng)]))
            .collect())
    }

    /// Weights every cell by `likelihood(coords)` and renormalizes.
    ///
    /// This is the measurement update of a histogram filter. The grid is left
    /// untouched if a weight is negative or non-finite, or if the weighting
    /// removes all mass.
    pub fn apply_likelihood<F>(&mut self, mut likelihood: F) -> Result<(), BeliefError>
    where
        F: FnMut(&[usize]) -> f64,
    {
        let weighted = self
            .values
            .iter()
            .enumerate()
            .map(|(index, mass)| {
                check_likelihood(index, likelihood(&self.shape.coords(index))).map(|w| w * mass)
            })
            .collect::<Result<Vec<f64>, _>>()?;

        self.commit_normalized(weighted)
    }

    /// Parallel version of [`HistogramBelief::apply_likelihood`].
    pub fn par_apply_likelihood<F>(&mut self, likelihood: F) -> Result<(), BeliefError>
    where
        F: Fn(&[usize]) -> f64 + Sync,
    {
        let shape = &self.shape;
        let weighted = self
            .values
            .par_iter()
            .enumerate()
            .map(|(index, mass)| {
                check_likelihood(index, likelihood(&shape.coords(index))).map(|w| w * mass)
            })
            .collect::<Result<Vec<f64>, _>>()?;

        self.commit_normalized(weighted)
    }

    fn commit_normalized(&mut self, mut values: Vec<f64>) -> Result<(), BeliefError> {
        check_mass(&values)?;
        let total: f64 = values.iter().sum();
        if !(total > self.config.zero_mass_epsilon()) {
            debug!(total, "likelihood removed all mass");
            return Err(BeliefError::ZeroMass { total });
        }

        scale_to_unit(&mut values, total);
        self.values = values;
        trace!(total, "applied likelihood");
        Ok(())
    }

    /// Applies a dense transition model.
    ///
    /// Every cell `to` receives `sum(transition(from, to) * mass(from))` over
    /// all cells `from` holding mass. The result is not normalized. Cost is
    /// quadratic in the number of cells, see [`HistogramBelief::convolve`]
    /// for shift-invariant motion.
    pub fn apply_transition<F>(&mut self, transition: F) -> Result<(), BeliefError>
    where
        F: Fn(&[usize], &[usize]) -> f64 + Sync,
    {
        let coords: Vec<Vec<usize>> = self.shape.iter_coords().collect();
        let prior = &self.values;
        let predicted = (0..prior.len())
            .into_par_iter()
            .map(|to| {
                prior
                    .iter()
                    .enumerate()
                    .filter(|(_, mass)| **mass > 0.0)
                    .try_fold(0.0, |acc, (from, mass)| {
                        let p = transition(&coords[from], &coords[to]);
                        match p.is_finite() && p >= 0.0 {
                            true => Ok(acc + p * mass),
                            false => Err(BeliefError::InvalidTransition { from, to, value: p }),
                        }
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        check_mass(&predicted)?;

        self.values = predicted;
        trace!(cells = self.values.len(), "applied transition");
        Ok(())
    }

    /// Moves mass by every offset of `kernel` with the offset's weight.
    ///
    /// The result is not normalized, with [`Boundary::Truncate`] mass can
    /// leave the grid.
    pub fn convolve(&mut self, kernel: &Kernel, boundary: Boundary) -> Result<(), BeliefError> {
        if kernel.ndim() != self.shape.ndim() {
            return Err(BeliefError::InvalidKernel {
                reason: format!(
                    "kernel has {} axes but the belief has {}",
                    kernel.ndim(),
                    self.shape.ndim()
                ),
            });
        }

        let moves: Vec<(Vec<isize>, f64)> = kernel.offsets().collect();
        self.scatter(&moves, boundary);
        trace!(?boundary, "convolved belief");
        Ok(())
    }

    /// Moves all mass by exactly `offsets` cells.
    pub fn shift(&mut self, offsets: &[isize], boundary: Boundary) -> Result<(), BeliefError> {
        if offsets.len() != self.shape.ndim() {
            return Err(BeliefError::ShapeMismatch {
                shape: self.shape.dims().to_vec(),
                expected: self.shape.ndim(),
                actual: offsets.len(),
            });
        }

        self.scatter(&[(offsets.to_vec(), 1.0)], boundary);
        trace!(?offsets, ?boundary, "shifted belief");
        Ok(())
    }

    fn scatter(&mut self, moves: &[(Vec<isize>, f64)], boundary: Boundary) {
        let dims = self.shape.dims();
        let strides = self.shape.strides();
        let mut moved = vec![0.0; self.values.len()];
        let mut target = vec![0; dims.len()];

        for (index, &mass) in self.values.iter().enumerate() {
            if mass == 0.0 {
                continue;
            }
            let source = self.shape.coords(index);

            'moves: for (offset, weight) in moves {
                for axis in 0..dims.len() {
                    let dim = dims[axis] as isize;
                    let c = source[axis] as isize + offset[axis];
                    target[axis] = match boundary {
                        Boundary::Clamp => c.clamp(0, dim - 1) as usize,
                        Boundary::Wrap => c.rem_euclid(dim) as usize,
                        Boundary::Truncate if (0..dim).contains(&c) => c as usize,
                        Boundary::Truncate => continue 'moves,
                    };
                }

                let flat: usize = target.iter().zip(strides).map(|(t, s)| t * s).sum();
                moved[flat] += mass * weight;
            }
        }

        self.values = moved;
    }

    /// Copies a 2-D belief into a matrix with one row per index of the first axis.
    ///
    /// Returns `None` unless the belief has exactly two axes.
    #[cfg(feature = "nalgebra")]
    pub fn to_matrix(&self) -> Option<nalgebra::DMatrix<f64>> {
        match self.shape.dims() {
            &[rows, cols] => Some(nalgebra::DMatrix::from_row_slice(rows, cols, &self.values)),
            _ => None,
        }
    }
}

fn check_mass(values: &[f64]) -> Result<(), BeliefError> {
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(BeliefError::NonFinite { index, value });
        }
        if value < 0.0 {
            return Err(BeliefError::NegativeMass { index, value });
        }
    }

    Ok(())
}

/// Divides finite, non-negative `values` by their `total`.
///
/// Finite cells can still sum to infinity, in which case every cell is first
/// scaled by the largest one.
fn scale_to_unit(values: &mut [f64], mut total: f64) {
    if total.is_infinite() {
        let max = values.iter().copied().fold(0.0, f64::max);
        values.iter_mut().for_each(|value| *value /= max);
        total = values.iter().sum();
    }

    values.iter_mut().for_each(|value| *value /= total);
}

fn check_likelihood(index: usize, value: f64) -> Result<f64, BeliefError> {
    match value.is_finite() && value >= 0.0 {
        true => Ok(value),
        false => Err(BeliefError::InvalidLikelihood { index, value }),
    }
}

/// Renders a 2-D belief as one line per row and any other belief on a single
/// line, three decimals per cell.
impl fmt::Display for HistogramBelief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols = match self.shape.dims() {
            &[_, cols] => cols,
            _ => self.values.len(),
        };
        for (row, chunk) in self.values.chunks(cols).enumerate() {
            if row > 0 {
                writeln!(f)?;
            }
            let cells: Vec<String> = chunk.iter().map(|value| format!("{value:.3}")).collect();
            write!(f, "{}", cells.join(" "))?;
        }

        Ok(())
    }
}

/// Unchecked wire form of a [`HistogramBelief`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct HistogramBeliefRepr {
    shape: Shape,
    values: Vec<f64>,
    config: BeliefConfig,
}

/// Deserialized mass is validated but kept as is, a belief that was saved
/// between a truncating motion and its normalization stays unnormalized.
#[cfg(feature = "serde")]
impl TryFrom<HistogramBeliefRepr> for HistogramBelief {
    type Error = BeliefError;

    fn try_from(repr: HistogramBeliefRepr) -> Result<Self, Self::Error> {
        HistogramBelief::from_parts(repr.shape, repr.values, repr.config)
    }
}

/// Borrowed, read-only view of a belief's mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistributionView<'a> {
    shape: &'a Shape,
    values: &'a [f64],
}

impl<'a> DistributionView<'a> {
    pub fn shape(&self) -> &'a Shape {
        self.shape
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn get(&self, coords: &[usize]) -> Result<f64, BeliefError> {
        Ok(self.values[self.shape.flat_index(coords)?])
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

impl Deref for DistributionView<'_> {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        self.values
    }
}
