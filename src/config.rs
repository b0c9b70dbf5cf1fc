use crate::error::BeliefError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that a belief sums to one.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Total mass at or below which normalization refuses to divide.
pub const DEFAULT_ZERO_MASS_EPSILON: f64 = 1e-9;

/// Mass below which a cell is not part of the support.
pub const DEFAULT_ZERO_THRESHOLD: f64 = 1e-5;

/// Numerical tolerances shared by a belief and everything that inspects it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "BeliefConfigRepr")
)]
pub struct BeliefConfig {
    tolerance: f64,
    zero_mass_epsilon: f64,
    zero_threshold: f64,
}

impl BeliefConfig {
    /// Returns a copy with the normalization `tolerance` replaced.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Returns a copy with the zero-mass `epsilon` replaced.
    pub fn with_zero_mass_epsilon(mut self, epsilon: f64) -> Self {
        self.zero_mass_epsilon = epsilon;
        self
    }

    /// Returns a copy with the support `threshold` replaced.
    pub fn with_zero_threshold(mut self, threshold: f64) -> Self {
        self.zero_threshold = threshold;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn zero_mass_epsilon(&self) -> f64 {
        self.zero_mass_epsilon
    }

    pub fn zero_threshold(&self) -> f64 {
        self.zero_threshold
    }

    /// Checks that every tolerance is finite and non-negative.
    pub fn validate(&self) -> Result<(), BeliefError> {
        for (name, value) in [
            ("tolerance", self.tolerance),
            ("zero_mass_epsilon", self.zero_mass_epsilon),
            ("zero_threshold", self.zero_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BeliefError::InvalidConfig {
                    reason: format!("{name} must be finite and at least zero but got {value}"),
                });
            }
        }

        Ok(())
    }
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            zero_mass_epsilon: DEFAULT_ZERO_MASS_EPSILON,
            zero_threshold: DEFAULT_ZERO_THRESHOLD,
        }
    }
}

/// Unchecked wire form of a [`BeliefConfig`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct BeliefConfigRepr {
    tolerance: f64,
    zero_mass_epsilon: f64,
    zero_threshold: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<BeliefConfigRepr> for BeliefConfig {
    type Error = BeliefError;

    fn try_from(repr: BeliefConfigRepr) -> Result<Self, Self::Error> {
        let config = BeliefConfig {
            tolerance: repr.tolerance,
            zero_mass_epsilon: repr.zero_mass_epsilon,
            zero_threshold: repr.zero_threshold,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_is_valid() {
        assert!(BeliefConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case(BeliefConfig::default().with_tolerance(-1e-3))]
    #[case(BeliefConfig::default().with_zero_mass_epsilon(f64::NAN))]
    #[case(BeliefConfig::default().with_zero_threshold(f64::INFINITY))]
    fn invalid_config(#[case] config: BeliefConfig) {
        assert!(matches!(
            config.validate(),
            Err(BeliefError::InvalidConfig { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_goes_through_validation() {
        let config = BeliefConfig::default().with_zero_threshold(1e-3);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<BeliefConfig>(&json).unwrap(), config);

        let json = r#"{"tolerance":1e-9,"zero_mass_epsilon":-1.0,"zero_threshold":1e-5}"#;
        assert!(serde_json::from_str::<BeliefConfig>(json).is_err());
    }
}
