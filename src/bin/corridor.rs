use bhf::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// A robot drives around a circular corridor and senses whether it is in
// front of a door.
const DOORS: [usize; 3] = [2, 7, 15];
const SENSOR_HIT: f64 = 0.9;

struct Drive {
    noise: Kernel,
}

impl MotionModel for Drive {
    type Control = isize;

    fn predict(&self, belief: &mut HistogramBelief, cells: &isize) -> Result<(), BeliefError> {
        belief.shift(&[*cells], Boundary::Wrap)?;
        belief.convolve(&self.noise, Boundary::Wrap)
    }
}

struct DoorSensor {
    space: GridSpace,
}

impl SensorModel for DoorSensor {
    type Measurement = bool;

    fn update(&self, belief: &mut HistogramBelief, door: &bool) -> Result<(), BeliefError> {
        belief.apply_likelihood(|c| match DOORS.contains(&c[0]) == *door {
            true => SENSOR_HIT,
            false => 1.0 - SENSOR_HIT,
        })
    }
}

fn main() -> Result<(), BeliefError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let space = GridSpace::new(vec![GridAxis::new("x", 0.0, 20.0, 1.0)?])?;
    let cells = space.shape().len();
    let sensor = DoorSensor {
        space: space.clone(),
    };
    let mut filter = HistogramFilter::new(space.uniform()?)
        .with_motion(Drive {
            noise: Kernel::new([3], vec![0.1, 0.8, 0.1])?,
        })
        .with_sensor(sensor);

    let mut rng = StdRng::seed_from_u64(42);
    let mut position = 0usize;
    for step in 0..25 {
        position = (position + 1) % cells;
        let truth = DOORS.contains(&position);
        let door = match rng.random_bool(SENSOR_HIT) {
            true => truth,
            false => !truth,
        };

        if let Err(err) = filter.step(&1, &door) {
            warn!(%err, "discarding belief");
            filter.reset_uniform();
            continue;
        }

        let space = &filter.sensor().space;
        let estimate = space.key_of(&filter.most_likely_state())?;
        let mean = space.mean(filter.belief())?;
        let entropy = filter.belief().entropy()?;
        info!(step, position, door, ?estimate, ?mean, entropy, "filtered");
    }

    println!("{}", filter.belief());
    Ok(())
}
