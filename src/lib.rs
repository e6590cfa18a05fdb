//! Fourier-basis SARSA(λ) agents for traffic-signal control
//!
//! This crate re-exports the agent and rl-env crates for convenience.

pub use signal_rl_agent::*;
pub use signal_rl_env as rl_env;
