//! Multi-agent training harness for traffic-signal control
//!
//! This crate provides:
//! - Core types shared with environments (observations, rewards, spaces)
//! - Environment trait for pluggable simulators
//! - Agent trait, with the SARSA(λ) learner and a RandomAgent baseline
//! - Trainer that runs episodes, aggregates metrics and checkpoints agents

mod agent;
mod environment;
mod trainer;
mod types;

pub use agent::*;
pub use environment::*;
pub use trainer::*;
pub use types::*;
