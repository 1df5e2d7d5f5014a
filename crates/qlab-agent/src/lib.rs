//! Tabular Q-learning with a bank of double-Q tables and opposition learning.
//!
//! # Overview
//!
//! - [`schedule`]: linear per-episode schedules and the nine-gene
//!   [`Hyperparameters`](schedule::Hyperparameters) they form
//! - [`q_table`]: the [`QTableBank`](q_table::QTableBank) with double-Q
//!   action selection and updates
//! - [`agent`]: an [`Agent`](agent::Agent) tracking run, episode and turn
//! - [`experiment`]: the run / episode / turn loop that turns a set of
//!   hyperparameters into a [`TrainingResult`](experiment::TrainingResult)
//!
//! # Randomness
//!
//! Nothing in this crate owns a global random number generator. Every
//! operation that samples takes the caller's RNG, so a seeded
//! `rand_pcg::Pcg64` makes whole experiments reproducible.

use qlab_env::MAX_STATE_DIMS;

pub mod agent;
pub mod experiment;
pub mod q_table;
pub mod schedule;

/// Error raised when an agent or experiment is configured with settings it
/// cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum AgentConfigError {
    #[display("at least one Q-table is required")]
    NoTables,
    #[display("at least one action is required")]
    NoActions,
    #[display("state rank {rank} exceeds the supported maximum of {}", MAX_STATE_DIMS)]
    StateRank { rank: usize },
    #[display("state dimension {dimension} has no buckets")]
    EmptyDimension { dimension: usize },
    #[display("{name} must be at least 1")]
    EmptyBudget { name: &'static str },
}
