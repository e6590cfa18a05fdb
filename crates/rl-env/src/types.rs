//! Core RL types shared by environments, agents and the trainer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use signal_rl_agent::{AgentConfig, Hyperparameters, ObservationBounds};

pub use signal_rl_agent::{ActionId, Reward};

/// Identifier of a decision point (e.g. a traffic-signal id)
pub type AgentId = String;

/// Raw observation vector for one decision point
pub type Observation = Vec<f64>;

/// Simulator metrics reported alongside a step, keyed by metric name
/// (e.g. `system_mean_waiting_time`, `system_mean_speed`).
pub type StepInfo = BTreeMap<String, f64>;

/// A value the environment reports either once for every decision point or
/// separately per decision point. Rewards and done flags come in both shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentValues<T> {
    /// The same value applies to every decision point
    Shared(T),

    /// One value per decision point
    PerAgent(BTreeMap<AgentId, T>),
}

impl<T: Copy> AgentValues<T> {
    /// Value for `id`, or `None` when a per-agent mapping lacks it.
    pub fn get(&self, id: &str) -> Option<T> {
        match self {
            AgentValues::Shared(v) => Some(*v),
            AgentValues::PerAgent(map) => map.get(id).copied(),
        }
    }
}

impl AgentValues<bool> {
    /// Episode-level termination: the shared flag, or every per-agent flag set.
    /// An empty mapping counts as done.
    pub fn all(&self) -> bool {
        match self {
            AgentValues::Shared(done) => *done,
            AgentValues::PerAgent(map) => map.values().all(|&d| d),
        }
    }
}

impl<T> From<T> for AgentValues<T> {
    fn from(value: T) -> Self {
        AgentValues::Shared(value)
    }
}

/// Result of `Environment::step`
#[derive(Clone, Debug, PartialEq)]
pub struct EnvStep {
    /// Next observation per decision point
    pub observations: BTreeMap<AgentId, Observation>,

    /// Reward for the transition just taken
    pub rewards: AgentValues<Reward>,

    /// Termination flags
    pub dones: AgentValues<bool>,

    /// Optional simulator metrics
    pub info: StepInfo,
}

/// Shape of one decision point's observations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpace {
    /// Number of coordinates in each observation
    pub dimension: usize,

    /// Per-coordinate box, when the simulator publishes one
    #[serde(default)]
    pub bounds: Option<ObservationBounds>,
}

/// Observation and action spaces of one decision point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spaces {
    pub observation: ObservationSpace,
    pub action_count: usize,
}

impl Spaces {
    pub fn new(dimension: usize, action_count: usize) -> Self {
        Self {
            observation: ObservationSpace {
                dimension,
                bounds: None,
            },
            action_count,
        }
    }

    pub fn with_bounds(mut self, bounds: ObservationBounds) -> Self {
        self.observation.bounds = Some(bounds);
        self
    }

    /// Agent configuration for these spaces. Validation happens when the agent
    /// is constructed.
    pub fn agent_config(&self, hyperparameters: Hyperparameters) -> AgentConfig {
        AgentConfig {
            state_dimension: self.observation.dimension,
            action_count: self.action_count,
            hyperparameters,
            observation_bounds: self.observation.bounds.clone(),
        }
    }
}
