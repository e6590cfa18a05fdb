//! Agent snapshots: save a trained agent to JSON and load it back
//!
//! Traces are never persisted; a loaded agent starts with zero traces.
//! Weights round-trip bit-identically (`serde_json` with `float_roundtrip`).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{MAX_FOURIER_DIMENSION, MAX_FOURIER_ORDER};
use crate::fourier::capped_feature_count;
use crate::{
    AgentConfig, FourierBasis, Hyperparameters, LinearQ, ObservationBounds, SnapshotError,
    TrueOnlineSarsaLambda,
};

/// Persisted form of a [`TrueOnlineSarsaLambda`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub weights: Vec<Vec<f64>>,
    pub coefficients: Vec<Vec<u32>>,
    pub feature_count: usize,
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    pub lambda: f64,
    pub fourier_order: u32,
    pub state_dimension: usize,
    pub fourier_dimension: usize,
    pub action_count: usize,

    /// Normalization box the agent was trained with, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_bounds: Option<ObservationBounds>,
}

impl AgentSnapshot {
    /// Capture everything except traces.
    pub fn from_agent(agent: &TrueOnlineSarsaLambda) -> Self {
        let hp = agent.hyperparameters();
        Self {
            weights: agent.weights().to_vec(),
            coefficients: agent.coefficients().to_vec(),
            feature_count: agent.feature_count(),
            alpha: hp.alpha,
            gamma: hp.gamma,
            epsilon: hp.epsilon,
            lambda: hp.lambda,
            fourier_order: agent.fourier_order(),
            state_dimension: agent.state_dimension(),
            fourier_dimension: agent.fourier_dimension(),
            action_count: agent.action_count(),
            observation_bounds: agent.config().observation_bounds.clone(),
        }
    }

    /// Serialize as JSON into `writer`. Non-finite weights are rejected since
    /// JSON would store them as `null`.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
        self.check_finite()?;
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    fn check_finite(&self) -> Result<(), SnapshotError> {
        for (action, row) in self.weights.iter().enumerate() {
            if let Some(feature) = row.iter().position(|w| !w.is_finite()) {
                return Err(SnapshotError::Inconsistent(format!(
                    "non-finite weight {} at action {action}, feature {feature}",
                    row[feature]
                )));
            }
        }
        Ok(())
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            alpha: self.alpha,
            gamma: self.gamma,
            epsilon: self.epsilon,
            lambda: self.lambda,
            fourier_order: self.fourier_order,
        }
    }

    /// Rebuild an agent, checking the persisted arrays against the persisted
    /// hyperparameters and the caller's hints.
    pub fn into_agent(
        self,
        action_count_hint: usize,
        state_dimension_hint: usize,
    ) -> Result<TrueOnlineSarsaLambda, SnapshotError> {
        self.check_structure(action_count_hint, state_dimension_hint)?;

        let mut config = AgentConfig::new(
            self.state_dimension,
            self.action_count,
            self.hyperparameters(),
        );
        config.observation_bounds = self.observation_bounds;
        config.validate()?;

        // Regenerate first, then let the persisted coefficients win
        let basis = FourierBasis::new(
            self.fourier_order,
            self.fourier_dimension,
            config.observation_bounds.as_ref(),
        );
        if basis.coefficients() != self.coefficients.as_slice() {
            debug!("persisted coefficients differ from regenerated basis; using persisted");
        }
        let basis = basis.with_coefficients(self.coefficients);
        let q = LinearQ::from_weights(self.weights);

        Ok(TrueOnlineSarsaLambda::from_parts(config, basis, q))
    }

    fn check_structure(
        &self,
        action_count_hint: usize,
        state_dimension_hint: usize,
    ) -> Result<(), SnapshotError> {
        let fail = |msg: String| Err(SnapshotError::Inconsistent(msg));

        if self.action_count != action_count_hint {
            return fail(format!(
                "action_count {} does not match expected {}",
                self.action_count, action_count_hint
            ));
        }
        if self.state_dimension != state_dimension_hint {
            return fail(format!(
                "state_dimension {} does not match expected {}",
                self.state_dimension, state_dimension_hint
            ));
        }
        if self.fourier_order > MAX_FOURIER_ORDER {
            return fail(format!(
                "fourier_order {} exceeds cap {MAX_FOURIER_ORDER}",
                self.fourier_order
            ));
        }
        if self.fourier_dimension != self.state_dimension.min(MAX_FOURIER_DIMENSION) {
            return fail(format!(
                "fourier_dimension {} inconsistent with state_dimension {}",
                self.fourier_dimension, self.state_dimension
            ));
        }
        if self.feature_count == 0
            || self.feature_count > capped_feature_count(self.fourier_order, self.fourier_dimension)
        {
            return fail(format!(
                "feature_count {} impossible for order {} and dimension {}",
                self.feature_count, self.fourier_order, self.fourier_dimension
            ));
        }
        if self.coefficients.len() != self.feature_count {
            return fail(format!(
                "{} coefficient vectors for feature_count {}",
                self.coefficients.len(),
                self.feature_count
            ));
        }
        if let Some((i, c)) = self.coefficients.iter().enumerate().find(|(_, c)| {
            c.len() != self.fourier_dimension || c.iter().any(|&e| e > self.fourier_order)
        }) {
            return fail(format!("coefficient vector {i} is malformed: {c:?}"));
        }
        if self.weights.len() != self.action_count {
            return fail(format!(
                "{} weight rows for action_count {}",
                self.weights.len(),
                self.action_count
            ));
        }
        if let Some((a, row)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.feature_count)
        {
            return fail(format!(
                "weight row {a} has {} columns, expected {}",
                row.len(),
                self.feature_count
            ));
        }
        Ok(())
    }
}

impl TrueOnlineSarsaLambda {
    /// Snapshot of this agent (weights, coefficients, hyperparameters).
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot::from_agent(self)
    }

    /// Serialize the snapshot as JSON into `writer`.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
        self.snapshot().to_writer(writer)
    }

    /// Write a snapshot to `path`, replacing any existing file. A diverged
    /// agent is rejected before the file is touched.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        snapshot.check_finite()?;
        let mut writer = BufWriter::new(File::create(path)?);
        snapshot.to_writer(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.display(), features = self.feature_count(), "agent saved");
        Ok(())
    }

    /// Read an agent from JSON. The hints are the action count and state
    /// dimension the caller expects; a snapshot disagreeing with them is rejected.
    pub fn from_reader<R: Read>(
        reader: R,
        action_count_hint: usize,
        state_dimension_hint: usize,
    ) -> Result<Self, SnapshotError> {
        let snapshot: AgentSnapshot = serde_json::from_reader(reader)?;
        snapshot.into_agent(action_count_hint, state_dimension_hint)
    }

    /// Load an agent saved with [`save`](Self::save).
    pub fn load(
        path: impl AsRef<Path>,
        action_count_hint: usize,
        state_dimension_hint: usize,
    ) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let agent = Self::from_reader(reader, action_count_hint, state_dimension_hint)?;
        debug!(path = %path.display(), features = agent.feature_count(), "agent loaded");
        Ok(agent)
    }
}

/// Read a snapshot without reconstructing an agent (for inspection tools).
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<AgentSnapshot, SnapshotError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transition;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::NamedTempFile;

    fn trained_agent() -> TrueOnlineSarsaLambda {
        let hp = Hyperparameters {
            alpha: 0.037,
            gamma: 0.9,
            epsilon: 0.2,
            lambda: 0.8,
            fourier_order: 2,
        };
        let mut agent = TrueOnlineSarsaLambda::new(AgentConfig::new(5, 3, hp)).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let mut state: Vec<f64> = (0..5).map(|_| rng.random()).collect();
        for step in 0..25 {
            let next: Vec<f64> = (0..5).map(|_| rng.random()).collect();
            let action = agent.act(&state, &mut rng);
            agent.learn(
                &Transition {
                    state: &state,
                    action,
                    reward: rng.random_range(-1.0..1.0),
                    next_state: &next,
                    done: step == 24,
                },
                &mut rng,
            );
            state = next;
        }
        // leave non-zero traces behind
        let next = [0.9, 0.1, 0.4, 0.2, 0.7];
        agent.learn(
            &Transition {
                state: &state,
                action: 1,
                reward: 0.3,
                next_state: &next,
                done: false,
            },
            &mut rng,
        );
        agent
    }

    #[test]
    fn test_save_load_round_trip() {
        let agent = trained_agent();
        assert!(agent.traces().iter().flatten().any(|&e| e != 0.0));

        let file = NamedTempFile::new().unwrap();
        agent.save(file.path()).unwrap();
        let loaded = TrueOnlineSarsaLambda::load(file.path(), 3, 5).unwrap();

        assert_eq!(loaded.weights(), agent.weights());
        assert_eq!(loaded.coefficients(), agent.coefficients());
        assert_eq!(loaded.hyperparameters(), agent.hyperparameters());
        assert_eq!(loaded.feature_count(), agent.feature_count());
        assert_eq!(loaded.fourier_dimension(), agent.fourier_dimension());
        assert_eq!(loaded.state_dimension(), agent.state_dimension());
        assert_eq!(loaded.action_count(), agent.action_count());
        assert!(loaded.traces().iter().flatten().all(|&e| e == 0.0));
        assert_eq!(loaded.traces().len(), loaded.weights().len());

        // Bit-level equality, not just ==
        for (a, b) in loaded.weights().iter().flatten().zip(agent.weights().iter().flatten()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_round_trip_keeps_bounds() {
        let config = AgentConfig::new(2, 2, Hyperparameters::default())
            .with_bounds(ObservationBounds::new(vec![0.0, -5.0], vec![10.0, 5.0]));
        let agent = TrueOnlineSarsaLambda::new(config).unwrap();

        let mut buf = Vec::new();
        agent.to_writer(&mut buf).unwrap();
        let loaded = TrueOnlineSarsaLambda::from_reader(buf.as_slice(), 2, 2).unwrap();

        assert_eq!(loaded.config().observation_bounds, agent.config().observation_bounds);
        assert_eq!(loaded.encode(&[3.0, 1.0]), agent.encode(&[3.0, 1.0]));
    }

    #[test]
    fn test_persisted_coefficients_are_authoritative() {
        let agent = TrueOnlineSarsaLambda::new(AgentConfig::new(2, 2, Hyperparameters {
            fourier_order: 1,
            ..Default::default()
        }))
        .unwrap();
        let mut snapshot = agent.snapshot();
        snapshot.coefficients.reverse();

        let loaded = snapshot.clone().into_agent(2, 2).unwrap();
        assert_eq!(loaded.coefficients(), snapshot.coefficients.as_slice());
    }

    #[test]
    fn test_rejects_weight_shape_mismatch() {
        let agent = trained_agent();

        let mut snapshot = agent.snapshot();
        snapshot.weights[1].pop();
        let err = snapshot.into_agent(3, 5).unwrap_err();
        assert!(matches!(err, SnapshotError::Inconsistent(_)), "{err}");

        let mut snapshot = agent.snapshot();
        snapshot.weights.pop();
        assert!(matches!(
            snapshot.into_agent(3, 5),
            Err(SnapshotError::Inconsistent(_))
        ));

        let mut snapshot = agent.snapshot();
        snapshot.feature_count += 1;
        assert!(matches!(
            snapshot.into_agent(3, 5),
            Err(SnapshotError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_rejects_bad_coefficients() {
        let agent = trained_agent();

        let mut snapshot = agent.snapshot();
        snapshot.coefficients[3] = vec![9, 0, 0, 0, 0];
        assert!(matches!(
            snapshot.into_agent(3, 5),
            Err(SnapshotError::Inconsistent(_))
        ));

        let mut snapshot = agent.snapshot();
        snapshot.coefficients[0].push(0);
        assert!(matches!(
            snapshot.into_agent(3, 5),
            Err(SnapshotError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_rejects_mismatched_hints() {
        let agent = trained_agent();
        assert!(matches!(
            agent.snapshot().into_agent(4, 5),
            Err(SnapshotError::Inconsistent(_))
        ));
        assert!(matches!(
            agent.snapshot().into_agent(3, 6),
            Err(SnapshotError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_hyperparameters() {
        let mut snapshot = trained_agent().snapshot();
        snapshot.gamma = 2.0;
        assert!(matches!(
            snapshot.into_agent(3, 5),
            Err(SnapshotError::Config(_))
        ));
    }

    #[test]
    fn test_load_errors() {
        let missing = TrueOnlineSarsaLambda::load("/nonexistent/dir/agent.json", 2, 2);
        assert!(matches!(missing, Err(SnapshotError::Io(_))));

        let garbage = TrueOnlineSarsaLambda::from_reader(&b"{\"weights\": 3"[..], 2, 2);
        assert!(matches!(garbage, Err(SnapshotError::Json(_))));
    }

    #[test]
    fn test_diverged_weights_are_not_saved() {
        let good = trained_agent();
        let file = NamedTempFile::new().unwrap();
        good.save(file.path()).unwrap();

        let mut diverged =
            TrueOnlineSarsaLambda::new(AgentConfig::new(2, 2, Hyperparameters::default())).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        diverged.learn(
            &Transition {
                state: &[0.5, 0.5],
                action: 0,
                reward: f64::INFINITY,
                next_state: &[0.5, 0.5],
                done: true,
            },
            &mut rng,
        );
        assert!(!diverged.weights()[0][0].is_finite());

        let err = diverged.save(file.path()).unwrap_err();
        assert!(
            matches!(err, SnapshotError::Inconsistent(ref msg) if msg.contains("non-finite")),
            "{err}"
        );

        // The earlier snapshot is left intact
        let reloaded = TrueOnlineSarsaLambda::load(file.path(), 3, 5).unwrap();
        assert_eq!(reloaded.weights(), good.weights());

        let mut snapshot = good.snapshot();
        snapshot.weights[2][1] = f64::NAN;
        let mut buf = Vec::new();
        assert!(matches!(
            snapshot.to_writer(&mut buf),
            Err(SnapshotError::Inconsistent(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_snapshot_matches_agent() {
        let agent = trained_agent();
        let file = NamedTempFile::new().unwrap();
        agent.save(file.path()).unwrap();

        let snapshot = read_snapshot(file.path()).unwrap();
        assert_eq!(snapshot, agent.snapshot());
        assert!(snapshot.observation_bounds.is_none());
    }
}
