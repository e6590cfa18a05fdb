//! Agent API for action selection and learning

use rand::Rng;
use signal_rl_agent::{AgentSnapshot, Transition, TrueOnlineSarsaLambda};

use super::ActionId;

/// Anything that can control one decision point: a learned linear policy,
/// a random baseline, or a fixed-time plan.
pub trait Agent {
    /// Choose an action for `observation`. May use `rng` for exploration.
    fn select_action(&mut self, observation: &[f64], rng: &mut impl Rng) -> ActionId;

    /// Learn from one transition. Non-learning agents ignore it.
    fn observe(&mut self, _transition: &Transition<'_>, _rng: &mut impl Rng) {}

    /// Called when an episode is cut off before the environment reported done.
    fn end_episode(&mut self) {}

    /// Persistable state, if the agent has any.
    fn snapshot(&self) -> Option<AgentSnapshot> {
        None
    }
}

impl Agent for TrueOnlineSarsaLambda {
    fn select_action(&mut self, observation: &[f64], rng: &mut impl Rng) -> ActionId {
        self.act(observation, rng)
    }

    fn observe(&mut self, transition: &Transition<'_>, rng: &mut impl Rng) {
        self.learn(transition, rng);
    }

    fn end_episode(&mut self) {
        self.reset_traces();
    }

    fn snapshot(&self) -> Option<AgentSnapshot> {
        Some(TrueOnlineSarsaLambda::snapshot(self))
    }
}

/// Baseline that picks uniformly among all actions
#[derive(Clone, Debug)]
pub struct RandomAgent {
    action_count: usize,
}

impl RandomAgent {
    pub fn new(action_count: usize) -> Self {
        assert!(action_count > 0, "RandomAgent needs at least one action");
        Self { action_count }
    }
}

impl Agent for RandomAgent {
    fn select_action(&mut self, _observation: &[f64], rng: &mut impl Rng) -> ActionId {
        rng.random_range(0..self.action_count)
    }
}
