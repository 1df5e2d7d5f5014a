use chrono::{DateTime, Utc};
use qlab_agent::schedule::Hyperparameters;
use qlab_stats::summary::ExperimentSummary;
use qlab_training::{chromosome::Chromosome, genetic::EvaluatedChromosome};
use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;

/// Output of the `experiment` command.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExperimentReport {
    pub generated_at: DateTime<Utc>,
    pub config: ExperimentConfig,
    pub include_failures: bool,
    pub attempted_runs: usize,
    /// Episodes-to-solve of every recorded run, in run order.
    pub episodes: Vec<usize>,
    pub summary: ExperimentSummary,
}

/// Output of the `tune` command.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TuneReport {
    pub generated_at: DateTime<Utc>,
    pub config: ExperimentConfig,
    /// Fittest chromosomes found, best first.
    pub best: Vec<TunedHyperparameters>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunedHyperparameters {
    pub fitness: f64,
    pub genes: Chromosome,
    pub hyperparameters: Hyperparameters,
}

impl From<&EvaluatedChromosome> for TunedHyperparameters {
    fn from(evaluated: &EvaluatedChromosome) -> Self {
        Self {
            fitness: evaluated.fitness,
            genes: evaluated.chromosome,
            hyperparameters: evaluated.chromosome.hyperparameters(),
        }
    }
}
