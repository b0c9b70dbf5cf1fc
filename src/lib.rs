// #![warn(missing_docs)]

//! Discrete Bayes Histogram Filtering
//!
//! A [`HistogramBelief`](belief::HistogramBelief) holds a probability mass
//! function over a fixed N-dimensional grid of state cells. A
//! [`HistogramFilter`](filter::HistogramFilter) drives it with a
//! user-supplied [`MotionModel`](filter::MotionModel) (predict) and
//! [`SensorModel`](filter::SensorModel) (update).
//!
//! ```
//! use bhf::prelude::*;
//!
//! struct Beacon;
//!
//! impl SensorModel for Beacon {
//!     type Measurement = usize;
//!
//!     fn update(&self, belief: &mut HistogramBelief, cell: &usize) -> Result<(), BeliefError> {
//!         belief.apply_likelihood(|c| if c[0] == *cell { 0.9 } else { 0.1 })
//!     }
//! }
//!
//! let mut filter = HistogramFilter::new(HistogramBelief::uniform([5])?).with_sensor(Beacon);
//! filter.update(&3)?;
//! assert_eq!(filter.most_likely_state(), vec![3]);
//! # Ok::<(), BeliefError>(())
//! ```

pub mod axis;
pub mod belief;
pub mod config;
#[allow(missing_docs)]
pub mod error;
pub mod filter;
pub mod kernel;
pub mod shape;
pub mod space;

pub mod prelude {
    pub use crate::{
        axis::GridAxis,
        belief::{Boundary, DistributionView, HistogramBelief},
        config::BeliefConfig,
        error::{AxisError, BeliefError},
        filter::{FnModel, HistogramFilter, MotionModel, SensorModel, Unmodelled},
        kernel::Kernel,
        shape::{IntoShape, Shape},
        space::GridSpace,
    };
}
