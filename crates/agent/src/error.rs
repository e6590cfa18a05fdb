//! Error types for agent construction and snapshot persistence

use thiserror::Error;

/// Rejected agent configuration.
///
/// Raised by [`AgentConfig::validate`](crate::AgentConfig::validate) and therefore by
/// every agent constructor. The caller has to fix the configuration; nothing is
/// auto-corrected apart from the documented order/dimension caps.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Observation dimensionality must be at least 1
    #[error("state_dimension must be at least 1")]
    ZeroStateDimension,

    /// The agent needs at least one discrete action
    #[error("action_count must be at least 1")]
    NoActions,

    /// Step size must be finite and strictly positive
    #[error("alpha must be finite and > 0, got {0}")]
    InvalidStepSize(f64),

    /// gamma, epsilon and lambda must lie in [0, 1]
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitInterval { name: &'static str, value: f64 },

    /// low/high bound vectors must both cover the full observation
    #[error("observation bounds must have {expected} entries, got low={low} high={high}")]
    BoundsLength {
        expected: usize,
        low: usize,
        high: usize,
    },

    /// A bound pair with low > high (or NaN)
    #[error("observation bound {index} is inverted: low={low} high={high}")]
    InvertedBounds { index: usize, low: f64, high: f64 },
}

/// Failure while writing or reading an agent snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted arrays disagree with the persisted (or hinted) hyperparameters
    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),

    /// Persisted hyperparameters do not form a valid agent configuration
    #[error("snapshot configuration rejected: {0}")]
    Config(#[from] ConfigError),
}
