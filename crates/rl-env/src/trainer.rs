//! Multi-agent training loop
//!
//! Runs episodes against an [`Environment`], one agent per decision point:
//! - every agent picks an action for its own observation
//! - the environment advances one step
//! - every agent learns from its transition (optionally in parallel)
//!
//! Episode metrics are logged and collected into a [`TrainingSummary`]; agents
//! with persistable state are checkpointed as JSON snapshots.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use signal_rl_agent::{ConfigError, Hyperparameters, SnapshotError, Transition, TrueOnlineSarsaLambda};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ActionId, Agent, AgentId, EnvStep, Environment, Observation, Reward, StepInfo};

/// Info keys read as the per-step waiting time, first match wins
pub const WAITING_TIME_KEYS: [&str; 2] = ["system_mean_waiting_time", "agents_total_waiting_time"];

/// Info keys read as the per-step mean speed, first match wins
pub const SPEED_KEYS: [&str; 2] = ["system_mean_speed", "agents_mean_speed"];

/// Configuration for the training loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Number of episodes to run
    pub episodes: usize,

    /// Safety cap on steps per episode; reaching it truncates the episode
    pub max_steps_per_episode: usize,

    /// Update decision points on the rayon pool instead of sequentially
    pub parallel_updates: bool,

    /// Where to write agent snapshots; `None` disables checkpointing
    pub checkpoint_dir: Option<PathBuf>,

    /// Checkpoint every N episodes (0 = only after the last episode)
    pub checkpoint_interval: usize,

    /// Emit a debug line every N steps (0 = never)
    pub log_interval: usize,

    /// Suffix for snapshot file names (`<id>_<tag>.json`) so runs sharing a
    /// checkpoint directory keep each other's files
    #[serde(default)]
    pub run_tag: Option<String>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: 10,
            // 1000 simulated seconds at 5 seconds per decision
            max_steps_per_episode: 200,
            parallel_updates: false,
            checkpoint_dir: None,
            checkpoint_interval: 0,
            log_interval: 50,
            run_tag: None,
        }
    }
}

/// Metrics of one finished episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// 1-based episode number
    pub episode: usize,

    pub steps: usize,

    /// Sum of rewards over all steps and decision points
    pub total_reward: f64,

    /// Mean of the per-step waiting time, when the environment reports one
    pub mean_waiting_time: Option<f64>,

    /// Mean of the per-step speed, when the environment reports one
    pub mean_speed: Option<f64>,

    /// True if the step cap ended the episode before the environment did
    pub truncated: bool,
}

impl EpisodeStats {
    fn new(episode: usize) -> Self {
        Self {
            episode,
            steps: 0,
            total_reward: 0.0,
            mean_waiting_time: None,
            mean_speed: None,
            truncated: false,
        }
    }
}

/// Running sums for one episode's metrics
#[derive(Default)]
struct MetricAccumulator {
    waiting_sum: f64,
    waiting_seen: bool,
    speed_sum: f64,
    speed_count: usize,
}

impl MetricAccumulator {
    fn record(&mut self, info: &StepInfo) {
        if let Some(w) = first_metric(info, &WAITING_TIME_KEYS) {
            self.waiting_sum += w;
            self.waiting_seen = true;
        }
        if let Some(s) = first_metric(info, &SPEED_KEYS) {
            self.speed_sum += s;
            self.speed_count += 1;
        }
    }

    fn finish(&self, stats: &mut EpisodeStats) {
        if self.waiting_seen && stats.steps > 0 {
            stats.mean_waiting_time = Some(self.waiting_sum / stats.steps as f64);
        }
        if self.speed_count > 0 {
            stats.mean_speed = Some(self.speed_sum / self.speed_count as f64);
        }
    }
}

fn first_metric(info: &StepInfo, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| info.get(*k).copied())
}

/// Aggregate result of a training run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub episodes: Vec<EpisodeStats>,
    pub total_reward: f64,
    pub mean_reward: f64,
    pub final_reward: f64,
    pub min_reward: f64,
    pub max_reward: f64,

    /// Mean over episodes that reported waiting times
    pub mean_waiting_time: Option<f64>,

    /// Mean over episodes that reported speeds
    pub mean_speed: Option<f64>,

    /// Shared hyperparameters, when the agents were built from them
    pub hyperparameters: Option<Hyperparameters>,

    /// Final snapshot path per decision point
    pub checkpoints: BTreeMap<AgentId, PathBuf>,
}

impl TrainingSummary {
    fn new(
        episodes: Vec<EpisodeStats>,
        hyperparameters: Option<Hyperparameters>,
        checkpoints: BTreeMap<AgentId, PathBuf>,
    ) -> Self {
        let rewards: Vec<f64> = episodes.iter().map(|e| e.total_reward).collect();
        let total_reward: f64 = rewards.iter().sum();
        let n = rewards.len();

        let (mean_reward, final_reward, min_reward, max_reward) = if n == 0 {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            (
                total_reward / n as f64,
                rewards[n - 1],
                rewards.iter().copied().fold(f64::INFINITY, f64::min),
                rewards.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        let mean_of = |values: Vec<f64>| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let mean_waiting_time = mean_of(episodes.iter().filter_map(|e| e.mean_waiting_time).collect());
        let mean_speed = mean_of(episodes.iter().filter_map(|e| e.mean_speed).collect());

        Self {
            episodes,
            total_reward,
            mean_reward,
            final_reward,
            min_reward,
            max_reward,
            mean_waiting_time,
            mean_speed,
            hyperparameters,
            checkpoints,
        }
    }
}

/// Training error types.
#[derive(Error, Debug)]
pub enum TrainingError {
    /// The environment failed; the original error is the source
    #[error("environment failed: {0}")]
    Environment(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The environment published spaces no agent can be built for
    #[error("invalid configuration for agent {agent}: {source}")]
    Config {
        agent: AgentId,
        #[source]
        source: ConfigError,
    },

    /// The environment reports no decision points at all
    #[error("environment has no decision points")]
    NoAgents,

    /// An observation arrived for a decision point without an agent
    #[error("no agent for decision point {0}")]
    UnknownAgent(AgentId),

    /// A per-agent reward/done mapping lacks an entry
    #[error("environment reported no {field} for decision point {agent}")]
    MissingAgentValue { agent: AgentId, field: &'static str },

    /// Writing a snapshot failed
    #[error("failed to write checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },
}

fn env_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> TrainingError {
    TrainingError::Environment(Box::new(e))
}

/// Drives one agent per decision point through repeated episodes.
pub struct Trainer<E: Environment, A: Agent> {
    env: E,
    agents: BTreeMap<AgentId, A>,
    cfg: TrainerConfig,
    rng: StdRng,

    /// Observations from a reset done before the first episode
    pending_reset: Option<BTreeMap<AgentId, Observation>>,

    hyperparameters: Option<Hyperparameters>,
}

impl<E: Environment> Trainer<E, TrueOnlineSarsaLambda> {
    /// Reset the environment and build one SARSA agent per decision point from
    /// its published spaces. The first episode starts from this reset.
    pub fn with_sarsa_agents(
        mut env: E,
        hyperparameters: Hyperparameters,
        cfg: TrainerConfig,
        rng: StdRng,
    ) -> Result<Self, TrainingError> {
        let initial = env.reset().map_err(env_error)?;

        let spaces = env.spaces();
        if spaces.is_empty() {
            return Err(TrainingError::NoAgents);
        }

        let mut agents = BTreeMap::new();
        for (id, space) in spaces {
            let agent = TrueOnlineSarsaLambda::new(space.agent_config(hyperparameters))
                .map_err(|source| TrainingError::Config {
                    agent: id.clone(),
                    source,
                })?;
            info!(
                agent = %id,
                state_dimension = agent.state_dimension(),
                actions = agent.action_count(),
                features = agent.feature_count(),
                "agent created"
            );
            agents.insert(id, agent);
        }

        let mut trainer = Self::new(env, agents, cfg, rng);
        trainer.pending_reset = Some(initial);
        trainer.hyperparameters = Some(hyperparameters);
        Ok(trainer)
    }

    /// Like [`with_sarsa_agents`](Self::with_sarsa_agents), with
    /// hyperparameters from [`Hyperparameters::from_env`].
    pub fn with_sarsa_agents_from_env(
        env: E,
        cfg: TrainerConfig,
        rng: StdRng,
    ) -> Result<Self, TrainingError> {
        let hyperparameters = Hyperparameters::from_env();
        debug!(?hyperparameters, "hyperparameters from environment");
        Self::with_sarsa_agents(env, hyperparameters, cfg, rng)
    }
}

impl<E, A> Trainer<E, A>
where
    E: Environment,
    A: Agent + Send,
{
    /// Create a trainer around already constructed agents.
    pub fn new(env: E, agents: BTreeMap<AgentId, A>, cfg: TrainerConfig, rng: StdRng) -> Self {
        Self {
            env,
            agents,
            cfg,
            rng,
            pending_reset: None,
            hyperparameters: None,
        }
    }

    pub fn agents(&self) -> &BTreeMap<AgentId, A> {
        &self.agents
    }

    pub fn into_agents(self) -> BTreeMap<AgentId, A> {
        self.agents
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Run every configured episode.
    pub fn run(&mut self) -> Result<TrainingSummary, TrainingError> {
        self.run_with_progress(|_| {})
    }

    /// Run every configured episode, calling `on_episode` after each one.
    pub fn run_with_progress(
        &mut self,
        mut on_episode: impl FnMut(&EpisodeStats),
    ) -> Result<TrainingSummary, TrainingError> {
        let episodes = self.cfg.episodes;
        let mut history = Vec::with_capacity(episodes);
        let mut checkpoints = BTreeMap::new();

        for episode in 1..=episodes {
            let stats = self.run_episode(episode)?;

            info!(
                episode,
                episodes,
                steps = stats.steps,
                total_reward = stats.total_reward,
                mean_waiting_time = stats.mean_waiting_time.unwrap_or(0.0),
                mean_speed = stats.mean_speed.unwrap_or(0.0),
                truncated = stats.truncated,
                "episode finished"
            );
            on_episode(&stats);
            history.push(stats);

            if let Some(dir) = self.cfg.checkpoint_dir.clone() {
                let interval = self.cfg.checkpoint_interval;
                let periodic = interval > 0 && episode % interval == 0;
                if periodic || episode == episodes {
                    checkpoints = self.save_checkpoint(&dir)?;
                }
            }
        }

        let summary = TrainingSummary::new(history, self.hyperparameters, checkpoints);
        info!(
            episodes = summary.episodes.len(),
            total_reward = summary.total_reward,
            mean_reward = summary.mean_reward,
            min_reward = summary.min_reward,
            max_reward = summary.max_reward,
            "training complete"
        );
        Ok(summary)
    }

    /// Run a single episode (1-based `episode` is only used for reporting).
    pub fn run_episode(&mut self, episode: usize) -> Result<EpisodeStats, TrainingError> {
        let mut observations = match self.pending_reset.take() {
            Some(obs) => obs,
            None => self.env.reset().map_err(env_error)?,
        };

        let mut stats = EpisodeStats::new(episode);
        let mut metrics = MetricAccumulator::default();
        let mut done = false;

        while !done && stats.steps < self.cfg.max_steps_per_episode {
            let actions = self.select_actions(&observations)?;
            let step = self.env.step(&actions).map_err(env_error)?;

            done = step.dones.all();
            stats.steps += 1;

            let step_reward = self.learn_step(&observations, &actions, &step)?;
            stats.total_reward += step_reward;
            metrics.record(&step.info);

            if self.cfg.log_interval > 0 && stats.steps % self.cfg.log_interval == 0 {
                debug!(
                    episode,
                    step = stats.steps,
                    step_reward,
                    cumulative = stats.total_reward,
                    "training progress"
                );
            }

            observations = step.observations;
        }

        if !done {
            // Hard episode boundary even when the environment never said done
            stats.truncated = true;
            warn!(episode, steps = stats.steps, "episode hit the step cap before done");
            for agent in self.agents.values_mut() {
                agent.end_episode();
            }
        }

        metrics.finish(&mut stats);
        Ok(stats)
    }

    fn select_actions(
        &mut self,
        observations: &BTreeMap<AgentId, Observation>,
    ) -> Result<BTreeMap<AgentId, ActionId>, TrainingError> {
        let mut actions = BTreeMap::new();
        for (id, obs) in observations {
            let agent = self
                .agents
                .get_mut(id)
                .ok_or_else(|| TrainingError::UnknownAgent(id.clone()))?;
            actions.insert(id.clone(), agent.select_action(obs, &mut self.rng));
        }
        Ok(actions)
    }

    /// Feed every decision point its transition; returns the summed reward.
    fn learn_step(
        &mut self,
        observations: &BTreeMap<AgentId, Observation>,
        actions: &BTreeMap<AgentId, ActionId>,
        step: &EnvStep,
    ) -> Result<Reward, TrainingError> {
        let mut transitions: BTreeMap<&str, Transition<'_>> = BTreeMap::new();
        let mut step_reward = 0.0;

        for (id, next_state) in &step.observations {
            if !self.agents.contains_key(id) {
                return Err(TrainingError::UnknownAgent(id.clone()));
            }
            let (Some(state), Some(&action)) = (observations.get(id), actions.get(id)) else {
                // Decision point joined mid-episode; it acts from the next step on
                continue;
            };
            let reward = step.rewards.get(id).ok_or_else(|| TrainingError::MissingAgentValue {
                agent: id.clone(),
                field: "reward",
            })?;
            let done = step.dones.get(id).ok_or_else(|| TrainingError::MissingAgentValue {
                agent: id.clone(),
                field: "done",
            })?;

            step_reward += reward;
            transitions.insert(
                id.as_str(),
                Transition {
                    state,
                    action,
                    reward,
                    next_state,
                    done,
                },
            );
        }

        if self.cfg.parallel_updates {
            // Seeds are drawn in id order so results do not depend on scheduling
            let seeds: BTreeMap<&str, u64> = transitions
                .keys()
                .map(|id| (*id, self.rng.next_u64()))
                .collect();

            self.agents.par_iter_mut().for_each(|(id, agent)| {
                if let (Some(t), Some(&seed)) = (transitions.get(id.as_str()), seeds.get(id.as_str())) {
                    let mut local_rng = StdRng::seed_from_u64(seed);
                    agent.observe(t, &mut local_rng);
                }
            });
        } else {
            for (id, t) in &transitions {
                if let Some(agent) = self.agents.get_mut(*id) {
                    agent.observe(t, &mut self.rng);
                }
            }
        }

        Ok(step_reward)
    }

    /// Write one snapshot per persistable agent into `dir` as `<id>.json`
    /// (`<id>_<tag>.json` with a run tag).
    ///
    /// Each file is written to a temporary file in `dir` first and then renamed
    /// over the target, so readers never see a partial snapshot.
    pub fn save_checkpoint(&self, dir: &Path) -> Result<BTreeMap<AgentId, PathBuf>, TrainingError> {
        let io_fail = |path: &Path, e: std::io::Error| TrainingError::Checkpoint {
            path: path.to_path_buf(),
            source: SnapshotError::Io(e),
        };

        std::fs::create_dir_all(dir).map_err(|e| io_fail(dir, e))?;

        let mut written = BTreeMap::new();
        for (id, agent) in &self.agents {
            let Some(snapshot) = agent.snapshot() else {
                continue;
            };
            let path = dir.join(snapshot_file_name(id, self.cfg.run_tag.as_deref()));

            let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_fail(&path, e))?;
            {
                let mut writer = BufWriter::new(tmp.as_file_mut());
                snapshot
                    .to_writer(&mut writer)
                    .map_err(|source| TrainingError::Checkpoint {
                        path: path.clone(),
                        source,
                    })?;
                writer.flush().map_err(|e| io_fail(&path, e))?;
            }
            tmp.persist(&path).map_err(|e| io_fail(&path, e.error))?;

            debug!(agent = %id, path = %path.display(), "checkpoint written");
            written.insert(id.clone(), path);
        }

        info!(dir = %dir.display(), agents = written.len(), "checkpoint saved");
        Ok(written)
    }
}

/// File name for a decision point's snapshot, optionally suffixed with a run
/// tag; characters that are unsafe in file names are replaced with `_`.
pub fn snapshot_file_name(id: &str, run_tag: Option<&str>) -> String {
    match run_tag {
        Some(tag) => format!("{}_{}.json", sanitize(id), sanitize(tag)),
        None => format!("{}.json", sanitize(id)),
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
