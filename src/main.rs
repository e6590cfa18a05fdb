//! Command-line tool for trained signal-control agents
//!
//! Inspects saved agent snapshots: hyperparameters, basis size and, for a given
//! observation, the per-action Q-values and the greedy action.
//!
//! Usage: cargo run -- inspect agents/tl_1.json --state 0.1,0.4,0.0,0.9

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use signal_rl::{read_snapshot, AgentSnapshot};

#[derive(Parser, Debug)]
#[command(name = "signal-rl")]
#[command(about = "Inspect trained traffic-signal agents", long_about = None)]
struct Args {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a snapshot's configuration and optionally evaluate a state
    Inspect {
        /// Path to a JSON agent snapshot
        snapshot: PathBuf,

        /// Observation to evaluate, comma separated
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        state: Option<Vec<f64>>,

        /// Expected action count (defaults to the snapshot's)
        #[arg(long)]
        actions: Option<usize>,

        /// Expected state dimension (defaults to the snapshot's)
        #[arg(long)]
        state_dimension: Option<usize>,
    },

    /// List agent snapshots in a checkpoint directory
    List {
        /// Checkpoint directory
        dir: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Inspect {
            snapshot,
            state,
            actions,
            state_dimension,
        } => inspect(&snapshot, state.as_deref(), actions, state_dimension),
        Command::List { dir } => list(&dir),
    }
}

fn inspect(
    path: &Path,
    state: Option<&[f64]>,
    actions: Option<usize>,
    state_dimension: Option<usize>,
) -> Result<()> {
    let snapshot = read_snapshot(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    print_summary(path, &snapshot);

    let action_hint = actions.unwrap_or(snapshot.action_count);
    let dimension_hint = state_dimension.unwrap_or(snapshot.state_dimension);
    let agent = snapshot
        .into_agent(action_hint, dimension_hint)
        .with_context(|| format!("snapshot {} is not a valid agent", path.display()))?;
    debug!(features = agent.feature_count(), "agent reconstructed");

    let Some(state) = state else {
        return Ok(());
    };
    if state.is_empty() {
        bail!("--state needs at least one value");
    }

    let q_values = agent.q_values(state);
    let greedy = agent.greedy_action(state);

    println!("\nQ-values for state {state:?}:");
    println!("{:<8} {:>14}", "Action", "Q");
    println!("{}", "-".repeat(23));
    for (action, q) in q_values.iter().enumerate() {
        let marker = if action == greedy { " *" } else { "" };
        println!("{action:<8} {q:>14.6}{marker}");
    }
    println!("\nGreedy action: {greedy}");
    Ok(())
}

fn print_summary(path: &Path, snapshot: &AgentSnapshot) {
    println!("Snapshot: {}", path.display());
    println!("  State dimension:   {}", snapshot.state_dimension);
    println!("  Actions:           {}", snapshot.action_count);
    println!("  Fourier order:     {}", snapshot.fourier_order);
    println!("  Fourier dimension: {}", snapshot.fourier_dimension);
    println!("  Features:          {}", snapshot.feature_count);
    println!(
        "  alpha={} gamma={} epsilon={} lambda={}",
        snapshot.alpha, snapshot.gamma, snapshot.epsilon, snapshot.lambda
    );
    if snapshot.observation_bounds.is_some() {
        println!("  Observation bounds: yes");
    }

    let norms: Vec<f64> = snapshot
        .weights
        .iter()
        .map(|row| row.iter().map(|w| w * w).sum::<f64>().sqrt())
        .collect();
    for (action, norm) in norms.iter().enumerate() {
        println!("  |w[{action}]| = {norm:.6}");
    }
}

fn list(dir: &Path) -> Result<()> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        println!("No snapshots in {}", dir.display());
        return Ok(());
    }

    println!("{:<32} {:>8} {:>8} {:>6}", "Snapshot", "Actions", "Features", "Order");
    println!("{}", "-".repeat(57));
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match read_snapshot(&path) {
            Ok(s) => println!(
                "{name:<32} {:>8} {:>8} {:>6}",
                s.action_count, s.feature_count, s.fourier_order
            ),
            Err(e) => println!("{name:<32} unreadable: {e}"),
        }
    }
    Ok(())
}
