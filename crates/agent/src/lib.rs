//! Linear Fourier-basis SARSA(λ) agent
//!
//! One agent per controllable decision point (e.g. one traffic signal). The crate
//! is pure computation plus a one-shot JSON snapshot format:
//! - `fourier`: bounded continuous state → cosine Fourier features
//! - `store`: per-action linear weights and eligibility traces
//! - `sarsa`: epsilon-greedy policy and the online SARSA(λ) update
//! - `snapshot`: save/load of weights, coefficients and hyperparameters

mod config;
mod error;
pub mod fourier;
mod sarsa;
mod snapshot;
mod store;

pub use config::{
    AgentConfig, Hyperparameters, ObservationBounds, MAX_FEATURES, MAX_FOURIER_DIMENSION,
    MAX_FOURIER_ORDER, NORMALIZATION_EPSILON,
};
pub use error::{ConfigError, SnapshotError};
pub use fourier::FourierBasis;
pub use sarsa::{Transition, TrueOnlineSarsaLambda};
pub use snapshot::{read_snapshot, AgentSnapshot};
pub use store::LinearQ;

/// Discrete action index (0..action_count)
pub type ActionId = usize;

/// Reward value
pub type Reward = f64;
