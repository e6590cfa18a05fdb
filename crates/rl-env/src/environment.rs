//! Environment interface consumed by the trainer
//!
//! The traffic simulator itself lives outside this workspace; anything that can
//! report per-decision-point spaces, reset to a fresh episode and advance one
//! step given an action per decision point can drive training.

use std::collections::BTreeMap;

use super::{ActionId, AgentId, EnvStep, Observation, Spaces};

/// Multi-agent episodic environment
pub trait Environment {
    /// Simulator failure; propagated to the caller unchanged
    type Error: std::error::Error + Send + Sync + 'static;

    /// Observation/action spaces for every controllable decision point.
    ///
    /// Some simulators only know their decision points after the first
    /// `reset()`; the trainer calls `reset()` before querying spaces.
    fn spaces(&self) -> BTreeMap<AgentId, Spaces>;

    /// Start a fresh episode and return the initial observation per decision point.
    fn reset(&mut self) -> Result<BTreeMap<AgentId, Observation>, Self::Error>;

    /// Apply one action per decision point and advance the simulation.
    fn step(&mut self, actions: &BTreeMap<AgentId, ActionId>) -> Result<EnvStep, Self::Error>;
}
