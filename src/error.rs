use thiserror::Error;

/// Errors produced while building, normalizing or stepping a belief.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BeliefError {
    #[error(
        "shape must have at least one axis, no zero extents and an addressable cell count but got: {shape:?}"
    )]
    InvalidShape { shape: Vec<usize> },
    #[error("expected {expected} cells for shape {shape:?} but got: {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("expected non-negative mass but cell {index} holds: {value}")]
    NegativeMass { index: usize, value: f64 },
    #[error("expected finite mass but cell {index} holds: {value}")]
    NonFinite { index: usize, value: f64 },
    #[error("total mass {total} is too close to zero to normalize")]
    ZeroMass { total: f64 },
    #[error("`{hook}` is not implemented for this filter")]
    Unimplemented { hook: &'static str },
    #[error("coordinates {coords:?} are out of bounds for shape {shape:?}")]
    IndexOutOfBounds {
        coords: Vec<usize>,
        shape: Vec<usize>,
    },
    #[error("axis {axis} is out of range for a {ndim}-dimensional grid")]
    AxisOutOfRange { axis: usize, ndim: usize },
    #[error("invalid kernel: {reason}")]
    InvalidKernel { reason: String },
    #[error("likelihood for cell {index} must be finite and non-negative but got: {value}")]
    InvalidLikelihood { index: usize, value: f64 },
    #[error(
        "transition probability from {from} to {to} must be finite and non-negative but got: {value}"
    )]
    InvalidTransition { from: usize, to: usize, value: f64 },
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
    #[error("no cell holds mass above the zero threshold {threshold}")]
    EmptySupport { threshold: f64 },
    #[error(transparent)]
    Axis(#[from] AxisError),
}

/// Errors produced by [`GridAxis`](crate::axis::GridAxis) and
/// [`GridSpace`](crate::space::GridSpace).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AxisError {
    #[error("axis name cannot be empty")]
    EmptyName,
    #[error("expected min < max but got: [{min}, {max}]")]
    EmptyRange { min: f64, max: f64 },
    #[error("expected finite bounds and cell count but got: [{min}, {max}] in steps of {size}")]
    NonFinite { min: f64, max: f64, size: f64 },
    #[error("expected cell size greater than zero but got: {size}")]
    NonPositiveSize { size: f64 },
    #[error("expected epsilon greater than zero but got: {epsilon}")]
    NonPositiveEpsilon { epsilon: f64 },
    #[error("{name}-axis key {key} is out of bounds [{min}, {max}]")]
    KeyOutOfBounds {
        name: String,
        key: f64,
        min: f64,
        max: f64,
    },
    #[error("{name}-axis index {index} is out of bounds [0, {bins})")]
    IndexOutOfBounds {
        name: String,
        index: usize,
        bins: usize,
    },
    #[error("axis name `{name}` is used more than once")]
    DuplicateName { name: String },
    #[error("expected {expected} values, one per axis, but got: {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("a grid space needs at least one axis")]
    NoAxes,
}
