//! Agent configuration: hyperparameters, observation bounds and hard caps

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

// =============================================================================
// Caps
// =============================================================================

/// Largest number of state coordinates fed into the Fourier basis.
/// Longer observations are truncated to their first `MAX_FOURIER_DIMENSION` entries.
pub const MAX_FOURIER_DIMENSION: usize = 6;

/// Largest supported Fourier order; higher requested orders are clamped.
pub const MAX_FOURIER_ORDER: u32 = 5;

/// Upper bound on the realized feature count, `(order+1)^dimension` is cut here.
pub const MAX_FEATURES: usize = 500;

/// Added to `high - low` when normalizing so equal bounds do not divide by zero.
pub const NORMALIZATION_EPSILON: f64 = 1e-8;

// =============================================================================
// Hyperparameters
// =============================================================================

/// Learning hyperparameters shared by every decision point of a training run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Step size (> 0)
    pub alpha: f64,

    /// Discount factor in [0, 1]
    pub gamma: f64,

    /// Exploration probability in [0, 1]
    pub epsilon: f64,

    /// Trace decay in [0, 1]
    pub lambda: f64,

    /// Fourier basis order. Clamped to `MAX_FOURIER_ORDER` at construction.
    pub fourier_order: u32,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            gamma: 0.95,
            epsilon: 0.1,
            lambda: 0.9,
            fourier_order: 3,
        }
    }
}

impl Hyperparameters {
    /// Settings used for full simulation training runs: a tiny step size,
    /// little exploration and short traces.
    pub fn training_defaults() -> Self {
        Self {
            alpha: 0.00001,
            gamma: 0.95,
            epsilon: 0.05,
            lambda: 0.1,
            fourier_order: 3,
        }
    }

    /// Apply `SIGNAL_RL_*` environment overrides on top of `self`.
    ///
    /// Recognized variables: `SIGNAL_RL_ALPHA`, `SIGNAL_RL_GAMMA`,
    /// `SIGNAL_RL_EPSILON`, `SIGNAL_RL_LAMBDA`, `SIGNAL_RL_FOURIER_ORDER`.
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = parse_env("SIGNAL_RL_ALPHA") {
            self.alpha = v;
        }
        if let Some(v) = parse_env("SIGNAL_RL_GAMMA") {
            self.gamma = v;
        }
        if let Some(v) = parse_env("SIGNAL_RL_EPSILON") {
            self.epsilon = v;
        }
        if let Some(v) = parse_env("SIGNAL_RL_LAMBDA") {
            self.lambda = v;
        }
        if let Some(v) = parse_env("SIGNAL_RL_FOURIER_ORDER") {
            self.fourier_order = v;
        }
        self
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Check the numeric ranges. The Fourier order is never an error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(ConfigError::InvalidStepSize(self.alpha));
        }
        for (name, value) in [
            ("gamma", self.gamma),
            ("epsilon", self.epsilon),
            ("lambda", self.lambda),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitInterval { name, value });
            }
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

// =============================================================================
// Observation bounds
// =============================================================================

/// Per-dimension bounds used to normalize raw observations into [0, 1].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationBounds {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl ObservationBounds {
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Self {
        Self { low, high }
    }

    /// Bounds of `[0, 1]` on every dimension, the usual box for simulator observations.
    pub fn unit(dimension: usize) -> Self {
        Self {
            low: vec![0.0; dimension],
            high: vec![1.0; dimension],
        }
    }

    pub fn len(&self) -> usize {
        self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_empty()
    }

    fn validate(&self, expected: usize) -> Result<(), ConfigError> {
        if self.low.len() != expected || self.high.len() != expected {
            return Err(ConfigError::BoundsLength {
                expected,
                low: self.low.len(),
                high: self.high.len(),
            });
        }
        for (index, (&low, &high)) in self.low.iter().zip(&self.high).enumerate() {
            // NaN fails this comparison as well
            if !(low <= high) {
                return Err(ConfigError::InvertedBounds { index, low, high });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Agent configuration
// =============================================================================

/// Everything needed to construct one agent for one decision point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Declared dimensionality of the raw observation (>= 1)
    pub state_dimension: usize,

    /// Number of discrete actions (>= 1)
    pub action_count: usize,

    pub hyperparameters: Hyperparameters,

    /// Optional normalization box, one entry per raw observation dimension
    #[serde(default)]
    pub observation_bounds: Option<ObservationBounds>,
}

impl AgentConfig {
    pub fn new(state_dimension: usize, action_count: usize, hyperparameters: Hyperparameters) -> Self {
        Self {
            state_dimension,
            action_count,
            hyperparameters,
            observation_bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: ObservationBounds) -> Self {
        self.observation_bounds = Some(bounds);
        self
    }

    /// Reject configurations no agent can be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_dimension == 0 {
            return Err(ConfigError::ZeroStateDimension);
        }
        if self.action_count == 0 {
            return Err(ConfigError::NoActions);
        }
        self.hyperparameters.validate()?;
        if let Some(bounds) = &self.observation_bounds {
            bounds.validate(self.state_dimension)?;
        }
        Ok(())
    }

    /// Number of state coordinates the basis actually uses.
    pub fn fourier_dimension(&self) -> usize {
        self.state_dimension.min(MAX_FOURIER_DIMENSION)
    }

    /// Fourier order after clamping.
    pub fn fourier_order(&self) -> u32 {
        self.hyperparameters.fourier_order.min(MAX_FOURIER_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::new(4, 2, Hyperparameters::default());
        assert_eq!(config.validate(), Ok(()));
        assert!(Hyperparameters::training_defaults().validate().is_ok());
    }

    #[test]
    fn test_zero_dimension_and_actions_rejected() {
        let config = AgentConfig::new(0, 2, Hyperparameters::default());
        assert_eq!(config.validate(), Err(ConfigError::ZeroStateDimension));

        let config = AgentConfig::new(3, 0, Hyperparameters::default());
        assert_eq!(config.validate(), Err(ConfigError::NoActions));
    }

    #[test]
    fn test_hyperparameter_ranges() {
        let mut hp = Hyperparameters::default();
        hp.alpha = 0.0;
        assert_eq!(hp.validate(), Err(ConfigError::InvalidStepSize(0.0)));

        let mut hp = Hyperparameters::default();
        hp.alpha = f64::NAN;
        assert!(matches!(hp.validate(), Err(ConfigError::InvalidStepSize(_))));

        let mut hp = Hyperparameters::default();
        hp.gamma = 1.5;
        assert_eq!(
            hp.validate(),
            Err(ConfigError::OutOfUnitInterval {
                name: "gamma",
                value: 1.5
            })
        );

        let mut hp = Hyperparameters::default();
        hp.lambda = -0.1;
        assert!(matches!(
            hp.validate(),
            Err(ConfigError::OutOfUnitInterval { name: "lambda", .. })
        ));

        // Edges of the unit interval are fine
        let hp = Hyperparameters {
            gamma: 1.0,
            epsilon: 0.0,
            lambda: 1.0,
            ..Default::default()
        };
        assert!(hp.validate().is_ok());
    }

    #[test]
    fn test_order_and_dimension_are_clamped() {
        let hp = Hyperparameters {
            fourier_order: 9,
            ..Default::default()
        };
        let config = AgentConfig::new(21, 4, hp);
        assert!(config.validate().is_ok());
        assert_eq!(config.fourier_order(), MAX_FOURIER_ORDER);
        assert_eq!(config.fourier_dimension(), MAX_FOURIER_DIMENSION);

        let config = AgentConfig::new(2, 4, Hyperparameters::default());
        assert_eq!(config.fourier_dimension(), 2);
        assert_eq!(config.fourier_order(), 3);
    }

    #[test]
    fn test_bounds_validation() {
        let config = AgentConfig::new(3, 2, Hyperparameters::default())
            .with_bounds(ObservationBounds::new(vec![0.0, 0.0], vec![1.0, 1.0]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::BoundsLength {
                expected: 3,
                low: 2,
                high: 2
            })
        );

        let config = AgentConfig::new(2, 2, Hyperparameters::default())
            .with_bounds(ObservationBounds::new(vec![0.0, 5.0], vec![1.0, 4.0]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedBounds { index: 1, .. })
        ));

        // Degenerate (low == high) bounds are allowed; normalization adds epsilon
        let config = AgentConfig::new(2, 2, Hyperparameters::default())
            .with_bounds(ObservationBounds::new(vec![3.0, 0.0], vec![3.0, 1.0]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SIGNAL_RL_EPSILON", "0.25");
        std::env::set_var("SIGNAL_RL_FOURIER_ORDER", "not-a-number");
        let hp = Hyperparameters::default().with_env_overrides();
        std::env::remove_var("SIGNAL_RL_EPSILON");
        std::env::remove_var("SIGNAL_RL_FOURIER_ORDER");

        assert_eq!(hp.epsilon, 0.25);
        assert_eq!(hp.fourier_order, Hyperparameters::default().fourier_order);
        assert_eq!(hp.alpha, Hyperparameters::default().alpha);
    }
}
