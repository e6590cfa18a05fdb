//! Linear SARSA(λ) agent over a Fourier basis
//!
//! One [`TrueOnlineSarsaLambda`] instance controls one decision point. The driver
//! calls [`act`](TrueOnlineSarsaLambda::act) every timestep and
//! [`learn`](TrueOnlineSarsaLambda::learn) once the reward and next state are known.
//!
//! The update is the single-action accumulating-trace rule: only the chosen
//! action's trace and weights move, and every trace is cleared when an episode
//! ends.

use rand::Rng;
use tracing::debug;

use crate::{
    ActionId, AgentConfig, ConfigError, FourierBasis, Hyperparameters, LinearQ, Reward,
};

/// One observed transition `(s, a, r, s', done)`.
#[derive(Clone, Copy, Debug)]
pub struct Transition<'a> {
    pub state: &'a [f64],
    pub action: ActionId,
    pub reward: Reward,
    pub next_state: &'a [f64],
    pub done: bool,
}

/// Fourier-basis linear controller with eligibility traces.
#[derive(Clone, Debug)]
pub struct TrueOnlineSarsaLambda {
    /// Configuration with the Fourier order already clamped
    config: AgentConfig,
    basis: FourierBasis,
    q: LinearQ,
}

impl TrueOnlineSarsaLambda {
    /// Build a fresh agent with zero weights and zero traces.
    pub fn new(mut config: AgentConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let requested = config.hyperparameters.fourier_order;
        let order = config.fourier_order();
        if order != requested {
            debug!(requested, clamped = order, "fourier order clamped");
        }
        config.hyperparameters.fourier_order = order;

        let basis = FourierBasis::new(
            order,
            config.fourier_dimension(),
            config.observation_bounds.as_ref(),
        );
        let q = LinearQ::zeros(config.action_count, basis.feature_count());

        Ok(Self { config, basis, q })
    }

    /// Reassemble an agent from validated parts (snapshot loading).
    pub(crate) fn from_parts(config: AgentConfig, basis: FourierBasis, q: LinearQ) -> Self {
        debug_assert_eq!(basis.feature_count(), q.feature_count());
        debug_assert_eq!(config.action_count, q.action_count());
        Self { config, basis, q }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.config.hyperparameters
    }

    pub fn state_dimension(&self) -> usize {
        self.config.state_dimension
    }

    pub fn action_count(&self) -> usize {
        self.config.action_count
    }

    pub fn fourier_order(&self) -> u32 {
        self.basis.order()
    }

    pub fn fourier_dimension(&self) -> usize {
        self.basis.dimension()
    }

    pub fn feature_count(&self) -> usize {
        self.basis.feature_count()
    }

    pub fn basis(&self) -> &FourierBasis {
        &self.basis
    }

    pub fn coefficients(&self) -> &[Vec<u32>] {
        self.basis.coefficients()
    }

    /// `action_count × feature_count` weight matrix.
    pub fn weights(&self) -> &[Vec<f64>] {
        self.q.weights()
    }

    /// `action_count × feature_count` eligibility traces.
    pub fn traces(&self) -> &[Vec<f64>] {
        self.q.traces()
    }

    /// Change the exploration rate, e.g. to 0 for greedy evaluation.
    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<(), ConfigError> {
        let hp = Hyperparameters {
            epsilon,
            ..self.config.hyperparameters
        };
        hp.validate()?;
        self.config.hyperparameters = hp;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Policy
    // -------------------------------------------------------------------------

    /// Fourier features of `state`.
    pub fn encode(&self, state: &[f64]) -> Vec<f64> {
        self.basis.encode(state)
    }

    /// `Q(state, action)`.
    ///
    /// # Panics
    /// Panics on an empty state or an out-of-range action.
    pub fn q_value(&self, state: &[f64], action: ActionId) -> f64 {
        self.q.value(action, &self.encode(state))
    }

    /// Q-values of every action for `state`.
    pub fn q_values(&self, state: &[f64]) -> Vec<f64> {
        self.q.values(&self.encode(state))
    }

    /// Highest-valued action; ties go to the lowest index.
    pub fn greedy_action(&self, state: &[f64]) -> ActionId {
        first_argmax(&self.q_values(state))
    }

    /// Epsilon-greedy action selection.
    ///
    /// Draws one uniform sample to decide whether to explore, and a second one
    /// for the random action when it does.
    pub fn act(&self, state: &[f64], rng: &mut impl Rng) -> ActionId {
        if rng.random::<f64>() < self.config.hyperparameters.epsilon {
            rng.random_range(0..self.config.action_count)
        } else {
            self.greedy_action(state)
        }
    }

    // -------------------------------------------------------------------------
    // Learning
    // -------------------------------------------------------------------------

    /// Apply one SARSA(λ) update and return the TD error.
    ///
    /// On a terminal transition the bootstrap term is zero and the placeholder
    /// next action 0 is never evaluated; all traces are cleared afterwards.
    pub fn learn(&mut self, transition: &Transition<'_>, rng: &mut impl Rng) -> f64 {
        let Hyperparameters {
            alpha,
            gamma,
            lambda,
            ..
        } = self.config.hyperparameters;
        let action = transition.action;

        let features = self.encode(transition.state);
        let next_features = self.encode(transition.next_state);

        let next_action = if transition.done {
            0
        } else {
            self.act(transition.next_state, rng)
        };

        let q_current = self.q.value(action, &features);
        let q_next = if transition.done {
            0.0
        } else {
            self.q.value(next_action, &next_features)
        };
        let delta = transition.reward + gamma * q_next - q_current;

        self.q.accumulate_trace(action, gamma * lambda, &features);
        self.q.apply_trace(action, alpha * delta);

        if transition.done {
            self.q.reset_traces();
        }
        delta
    }

    /// Clear every eligibility trace (episode boundary).
    pub fn reset_traces(&mut self) {
        self.q.reset_traces();
    }
}

/// Index of the first maximum. NaN entries never win.
fn first_argmax(values: &[f64]) -> ActionId {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] || values[best].is_nan() {
            best = i;
        }
    }
    best
}
