use crate::{
    belief::{DistributionView, HistogramBelief},
    error::BeliefError,
};
use std::marker::PhantomData;
use tracing::debug;

/// The prediction half of a histogram filter.
///
/// Implementations move mass according to `P(next | current, control)`, e.g.
/// with [`HistogramBelief::convolve`] or [`HistogramBelief::apply_transition`].
/// The belief does not need to sum to one afterwards, but every cell must
/// hold finite, non-negative mass.
pub trait MotionModel {
    type Control;

    fn predict(
        &self,
        belief: &mut HistogramBelief,
        control: &Self::Control,
    ) -> Result<(), BeliefError>;
}

/// The correction half of a histogram filter.
///
/// Implementations weight every cell by `P(measurement | cell)` and
/// renormalize, usually through [`HistogramBelief::apply_likelihood`]. A
/// measurement that no cell can explain must surface as
/// [`BeliefError::ZeroMass`].
pub trait SensorModel {
    type Measurement;

    fn update(
        &self,
        belief: &mut HistogramBelief,
        measurement: &Self::Measurement,
    ) -> Result<(), BeliefError>;
}

/// Placeholder for a hook that has not been supplied.
///
/// Both hooks fail with [`BeliefError::Unimplemented`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unmodelled;

impl MotionModel for Unmodelled {
    type Control = ();

    fn predict(&self, _: &mut HistogramBelief, _: &()) -> Result<(), BeliefError> {
        Err(BeliefError::Unimplemented { hook: "predict" })
    }
}

impl SensorModel for Unmodelled {
    type Measurement = ();

    fn update(&self, _: &mut HistogramBelief, _: &()) -> Result<(), BeliefError> {
        Err(BeliefError::Unimplemented { hook: "update" })
    }
}

/// Adapts a closure into a [`MotionModel`] or [`SensorModel`].
pub struct FnModel<F, T> {
    f: F,
    _phan: PhantomData<fn(&T)>,
}

impl<F, T> FnModel<F, T> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phan: PhantomData,
        }
    }
}

impl<F, C> MotionModel for FnModel<F, C>
where
    F: Fn(&mut HistogramBelief, &C) -> Result<(), BeliefError>,
{
    type Control = C;

    fn predict(&self, belief: &mut HistogramBelief, control: &C) -> Result<(), BeliefError> {
        (self.f)(belief, control)
    }
}

impl<F, Z> SensorModel for FnModel<F, Z>
where
    F: Fn(&mut HistogramBelief, &Z) -> Result<(), BeliefError>,
{
    type Measurement = Z;

    fn update(&self, belief: &mut HistogramBelief, measurement: &Z) -> Result<(), BeliefError> {
        (self.f)(belief, measurement)
    }
}

/// A discrete Bayes filter over a [`HistogramBelief`].
///
/// The filter owns the belief and only lends it mutably to its models. Each
/// hook runs against a working copy that replaces the belief only once the
/// hook succeeded and its output checked out, so a failed step never leaves a
/// half-updated grid behind.
#[derive(Clone, Debug)]
pub struct HistogramFilter<M = Unmodelled, S = Unmodelled> {
    belief: HistogramBelief,
    motion: M,
    sensor: S,
}

impl HistogramFilter {
    /// Creates a filter with neither hook supplied.
    pub fn new(belief: HistogramBelief) -> Self {
        Self {
            belief,
            motion: Unmodelled,
            sensor: Unmodelled,
        }
    }
}

impl<M, S> HistogramFilter<M, S> {
    /// Replaces the motion model.
    pub fn with_motion<N>(self, motion: N) -> HistogramFilter<N, S> {
        HistogramFilter {
            belief: self.belief,
            motion,
            sensor: self.sensor,
        }
    }

    /// Replaces the sensor model.
    pub fn with_sensor<T>(self, sensor: T) -> HistogramFilter<M, T> {
        HistogramFilter {
            belief: self.belief,
            motion: self.motion,
            sensor,
        }
    }

    pub fn belief(&self) -> &HistogramBelief {
        &self.belief
    }

    pub fn motion(&self) -> &M {
        &self.motion
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn distribution(&self) -> DistributionView<'_> {
        self.belief.distribution()
    }

    pub fn most_likely_state(&self) -> Vec<usize> {
        self.belief.most_likely_state()
    }

    /// Renormalizes the belief, e.g. after a run of predictions.
    pub fn normalize(&mut self) -> Result<(), BeliefError> {
        self.belief.normalize()
    }

    /// Recovers from [`BeliefError::ZeroMass`] by forgetting everything.
    pub fn reset_uniform(&mut self) {
        self.belief.reset_uniform();
    }

    pub fn into_belief(self) -> HistogramBelief {
        self.belief
    }

    /// Checks what a model left in `next` before it replaces the belief.
    ///
    /// Models may only move mass, the grid and its tolerances are fixed for
    /// the life of the filter.
    fn check_step(&self, next: &HistogramBelief) -> Result<(), BeliefError> {
        if next.shape() != self.belief.shape() {
            return Err(BeliefError::ShapeMismatch {
                shape: self.belief.shape().dims().to_vec(),
                expected: self.belief.len(),
                actual: next.len(),
            });
        }
        if next.config() != self.belief.config() {
            return Err(BeliefError::InvalidConfig {
                reason: "a model cannot replace the belief's config".to_string(),
            });
        }

        next.validate()
    }
}

impl<M: MotionModel, S> HistogramFilter<M, S> {
    /// Advances the belief by one transition under `control`.
    pub fn predict(&mut self, control: &M::Control) -> Result<(), BeliefError> {
        let mut next = self.belief.clone();
        self.motion.predict(&mut next, control)?;
        self.check_step(&next)?;

        debug!(total = next.total(), "predicted belief");
        self.belief = next;
        Ok(())
    }
}

impl<M, S: SensorModel> HistogramFilter<M, S> {
    /// Folds `measurement` into the belief, leaving it normalized.
    pub fn update(&mut self, measurement: &S::Measurement) -> Result<(), BeliefError> {
        let mut next = self.belief.clone();
        self.sensor.update(&mut next, measurement)?;
        self.check_step(&next)?;
        if !next.is_normalized() {
            next.normalize()?;
        }

        debug!(state = ?next.most_likely_state(), "updated belief");
        self.belief = next;
        Ok(())
    }
}

impl<M: MotionModel, S: SensorModel> HistogramFilter<M, S> {
    /// Runs [`predict`](Self::predict) then [`update`](Self::update).
    pub fn step(
        &mut self,
        control: &M::Control,
        measurement: &S::Measurement,
    ) -> Result<(), BeliefError> {
        self.predict(control)?;
        self.update(measurement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{belief::Boundary, config::BeliefConfig, kernel::Kernel};
    use approx::assert_relative_eq;

    fn line(values: &[f64]) -> HistogramBelief {
        HistogramBelief::from_values([values.len()], values.to_vec()).unwrap()
    }

    struct Shift;

    impl MotionModel for Shift {
        type Control = isize;

        fn predict(&self, belief: &mut HistogramBelief, step: &isize) -> Result<(), BeliefError> {
            belief.shift(&[*step], Boundary::Wrap)
        }
    }

    struct Doors([bool; 5]);

    impl SensorModel for Doors {
        type Measurement = bool;

        fn update(&self, belief: &mut HistogramBelief, door: &bool) -> Result<(), BeliefError> {
            belief.apply_likelihood(|c| match self.0[c[0]] == *door {
                true => 0.6,
                false => 0.2,
            })
        }
    }

    #[test]
    fn unmodelled_hooks_are_unimplemented() {
        let mut filter = HistogramFilter::new(HistogramBelief::uniform([3]).unwrap());
        assert_eq!(
            filter.predict(&()),
            Err(BeliefError::Unimplemented { hook: "predict" })
        );
        assert_eq!(
            filter.update(&()),
            Err(BeliefError::Unimplemented { hook: "update" })
        );
    }

    #[test]
    fn partially_modelled_filter() {
        let mut filter =
            HistogramFilter::new(HistogramBelief::uniform([5]).unwrap()).with_motion(Shift);
        assert!(filter.predict(&1).is_ok());
        assert_eq!(
            filter.update(&()),
            Err(BeliefError::Unimplemented { hook: "update" })
        );
    }

    #[test]
    fn localizes_between_doors() {
        let mut filter = HistogramFilter::new(HistogramBelief::uniform([5]).unwrap())
            .with_motion(Shift)
            .with_sensor(Doors([true, true, false, false, false]));

        filter.update(&true).unwrap();
        filter.step(&1, &true).unwrap();
        assert_eq!(filter.most_likely_state(), vec![1]);
        assert!(filter.belief().is_normalized());
    }

    #[test]
    fn overflowing_transition_is_rejected() {
        let motion = FnModel::<_, ()>::new(|belief: &mut HistogramBelief, _: &()| {
            belief.apply_transition(|from, to| match from == to {
                true => f64::MAX,
                false => 0.0,
            })?;
            belief.apply_transition(|from, to| match from == to {
                true => f64::MAX,
                false => 0.0,
            })
        });
        let mut filter =
            HistogramFilter::new(HistogramBelief::uniform([2]).unwrap()).with_motion(motion);
        assert!(matches!(
            filter.predict(&()),
            Err(BeliefError::NonFinite { .. })
        ));
        assert_relative_eq!(filter.belief().total(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn reshaping_motion_is_rejected() {
        let motion = FnModel::<_, Vec<usize>>::new(
            |belief: &mut HistogramBelief, dims: &Vec<usize>| -> Result<(), BeliefError> {
                *belief = HistogramBelief::uniform(dims.as_slice())?;
                Ok(())
            },
        );
        let mut filter = HistogramFilter::new(line(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .with_motion(motion);
        let before = filter.belief().clone();

        assert_eq!(
            filter.predict(&vec![7, 2]),
            Err(BeliefError::ShapeMismatch {
                shape: vec![6],
                expected: 6,
                actual: 14
            })
        );
        assert!(matches!(
            filter.predict(&vec![2, 3]),
            Err(BeliefError::ShapeMismatch { .. })
        ));
        assert_eq!(filter.belief(), &before);

        assert!(filter.predict(&vec![6]).is_ok());
        assert_eq!(filter.belief().shape().dims(), &[6]);
    }

    #[test]
    fn reconfiguring_sensor_is_rejected() {
        let sensor = FnModel::<_, BeliefConfig>::new(
            |belief: &mut HistogramBelief, config: &BeliefConfig| -> Result<(), BeliefError> {
                *belief = HistogramBelief::uniform_with_config(belief.shape(), *config)?;
                Ok(())
            },
        );
        let mut filter = HistogramFilter::new(line(&[1.0, 3.0])).with_sensor(sensor);

        let loose = BeliefConfig::default().with_tolerance(0.5);
        assert!(matches!(
            filter.update(&loose),
            Err(BeliefError::InvalidConfig { .. })
        ));
        assert_eq!(filter.belief().to_vec(), vec![0.25, 0.75]);

        assert!(filter.update(&BeliefConfig::default()).is_ok());
        assert_eq!(filter.belief().to_vec(), vec![0.5, 0.5]);
    }

    #[test]
    fn zero_mass_update_keeps_belief() {
        let sensor = FnModel::<_, ()>::new(|belief: &mut HistogramBelief, _: &()| {
            belief.apply_likelihood(|c| if c[0] == 0 { 1.0 } else { 0.0 })
        });
        let mut filter = HistogramFilter::new(line(&[0.0, 0.5, 0.5])).with_sensor(sensor);

        assert!(matches!(
            filter.update(&()),
            Err(BeliefError::ZeroMass { .. })
        ));
        assert_eq!(filter.belief().to_vec(), vec![0.0, 0.5, 0.5]);

        filter.reset_uniform();
        assert!(filter.update(&()).is_ok());
        assert_eq!(filter.most_likely_state(), vec![0]);
    }

    #[test]
    fn update_renormalizes_lazy_sensor() {
        let sensor = FnModel::<_, Kernel>::new(|belief: &mut HistogramBelief, kernel: &Kernel| {
            belief.convolve(kernel, Boundary::Truncate)
        });
        let mut filter = HistogramFilter::new(line(&[1.0, 0.0, 0.0])).with_sensor(sensor);
        filter
            .update(&Kernel::new([3], vec![0.5, 0.25, 0.25]).unwrap())
            .unwrap();
        assert!(filter.belief().is_normalized());
        assert_relative_eq!(filter.belief().get(&[0]).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(filter.belief().get(&[1]).unwrap(), 0.5, epsilon = 1e-12);
    }
}
