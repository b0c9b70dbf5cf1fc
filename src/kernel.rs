use crate::{
    config::BeliefConfig,
    error::BeliefError,
    shape::{IntoShape, Shape},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A centered, stochastic noise kernel.
///
/// Every extent is odd so the kernel has a center cell. The weight at
/// coordinates `k` is the probability of moving by `k - center` cells, which
/// makes a kernel usable both as motion noise for
/// [`HistogramBelief::convolve`](crate::belief::HistogramBelief::convolve)
/// and as a blur over an observation likelihood.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "KernelRepr")
)]
pub struct Kernel {
    shape: Shape,
    weights: Vec<f64>,
}

impl Kernel {
    /// Creates a new `Kernel` from row-major `weights`.
    ///
    /// Fails unless every extent of `shape` is odd and `weights` are
    /// non-negative, finite and sum to one within the default tolerance.
    pub fn new(shape: impl IntoShape, weights: impl Into<Vec<f64>>) -> Result<Self, BeliefError> {
        Self::new_with_config(shape, weights, &BeliefConfig::default())
    }

    /// Like [`Kernel::new`], with the sum checked against `config`'s tolerance.
    pub fn new_with_config(
        shape: impl IntoShape,
        weights: impl Into<Vec<f64>>,
        config: &BeliefConfig,
    ) -> Result<Self, BeliefError> {
        config.validate()?;
        let shape = shape.into_shape()?;
        let weights = weights.into();

        if let Some(dim) = shape.dims().iter().find(|dim| *dim % 2 == 0) {
            return Err(BeliefError::InvalidKernel {
                reason: format!("extents must be odd to have a center but got {dim}"),
            });
        }
        if weights.len() != shape.len() {
            return Err(BeliefError::ShapeMismatch {
                shape: shape.dims().to_vec(),
                expected: shape.len(),
                actual: weights.len(),
            });
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(BeliefError::InvalidKernel {
                reason: format!("weights must be finite and non-negative but got {w}"),
            });
        }

        let total: f64 = weights.iter().sum();
        if !((total - 1.0).abs() <= config.tolerance()) {
            return Err(BeliefError::InvalidKernel {
                reason: format!("weights must sum to 1 but sum to {total}"),
            });
        }

        Ok(Self { shape, weights })
    }

    /// The kernel that leaves a belief unchanged.
    pub fn identity(ndim: usize) -> Result<Self, BeliefError> {
        Self::new(vec![1; ndim], vec![1.0])
    }

    /// A kernel spreading mass evenly over every cell of `shape`.
    pub fn uniform(shape: impl IntoShape) -> Result<Self, BeliefError> {
        let shape = shape.into_shape()?;
        let len = shape.len();
        Self::new(shape, vec![1.0 / len as f64; len])
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Coordinates of the center cell.
    pub fn center(&self) -> Vec<usize> {
        self.shape.dims().iter().map(|dim| dim / 2).collect()
    }

    /// Iterates over `(offset, weight)` pairs with non-zero weight.
    pub fn offsets(&self) -> impl Iterator<Item = (Vec<isize>, f64)> + '_ {
        let center = self.center();
        self.weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(move |(i, w)| {
                let offset = self
                    .shape
                    .coords(i)
                    .iter()
                    .zip(&center)
                    .map(|(k, c)| *k as isize - *c as isize)
                    .collect();
                (offset, *w)
            })
    }
}

/// Unchecked wire form of a [`Kernel`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct KernelRepr {
    shape: Shape,
    weights: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<KernelRepr> for Kernel {
    type Error = BeliefError;

    fn try_from(repr: KernelRepr) -> Result<Self, Self::Error> {
        Kernel::new(repr.shape, repr.weights)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self {
            shape: Shape::new([1, 1]).expect("1x1 is a valid shape"),
            weights: vec![1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_is_identity() {
        assert_eq!(Kernel::default(), Kernel::identity(2).unwrap());
    }

    #[test]
    fn uniform_square() {
        let kernel = Kernel::uniform([3, 3]).unwrap();
        assert_eq!(kernel.weights().len(), 9);
        assert_eq!(kernel.center(), vec![1, 1]);
    }

    #[rstest]
    #[case(vec![2, 2], vec![0.2, 0.3, 0.4, 0.2])]
    #[case(vec![3], vec![0.2, 0.3, 0.4])]
    #[case(vec![3], vec![-0.5, 1.0, 0.5])]
    #[case(vec![3], vec![f64::NAN, 1.0, 0.0])]
    fn invalid_kernel(#[case] shape: Vec<usize>, #[case] weights: Vec<f64>) {
        assert!(matches!(
            Kernel::new(shape, weights),
            Err(BeliefError::InvalidKernel { .. })
        ));
    }

    #[test]
    fn weight_count_mismatch() {
        assert!(matches!(
            Kernel::new([3], vec![1.0]),
            Err(BeliefError::ShapeMismatch { expected: 3, .. })
        ));
    }

    #[test]
    fn sum_uses_configured_tolerance() {
        let weights = vec![0.25, 0.5, 0.2501];
        assert!(Kernel::new([3], weights.clone()).is_err());

        let loose = BeliefConfig::default().with_tolerance(1e-3);
        let kernel = Kernel::new_with_config([3], weights, &loose).unwrap();
        assert_eq!(kernel.center(), vec![1]);

        let invalid = BeliefConfig::default().with_tolerance(f64::NAN);
        assert!(matches!(
            Kernel::new_with_config([1], vec![1.0], &invalid),
            Err(BeliefError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn wide_uniform_kernel_is_valid() {
        let kernel = Kernel::uniform([7, 7, 7]).unwrap();
        assert_eq!(kernel.offsets().count(), 343);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_goes_through_validation() {
        let kernel = Kernel::new([3], vec![0.25, 0.5, 0.25]).unwrap();
        let json = serde_json::to_string(&kernel).unwrap();
        assert_eq!(json, r#"{"shape":[3],"weights":[0.25,0.5,0.25]}"#);
        assert_eq!(serde_json::from_str::<Kernel>(&json).unwrap(), kernel);

        for json in [
            r#"{"shape":[2],"weights":[0.5,0.5]}"#,
            r#"{"shape":[3],"weights":[0.5,0.5]}"#,
            r#"{"shape":[3],"weights":[0.5,0.5,0.5]}"#,
        ] {
            assert!(serde_json::from_str::<Kernel>(json).is_err());
        }
    }

    #[test]
    fn offsets_skip_zero_weights() {
        let kernel = Kernel::new([3], vec![0.25, 0.75, 0.0]).unwrap();
        let offsets: Vec<_> = kernel.offsets().collect();
        assert_eq!(offsets, vec![(vec![-1], 0.25), (vec![0], 0.75)]);
    }
}
