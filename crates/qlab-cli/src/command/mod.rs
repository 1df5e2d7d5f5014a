use std::path::PathBuf;

use clap::{Parser, Subcommand};
use qlab_agent::q_table::TableInit;

use crate::{
    config::{EnvKind, ExperimentConfig},
    util,
};

use self::{defaults::DefaultsArg, experiment::ExperimentArg, tune::TuneArg};

mod defaults;
mod experiment;
mod tune;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Train agents with fixed hyperparameters and compare against a baseline
    Experiment(#[clap(flatten)] ExperimentArg),
    /// Search hyperparameters with a genetic algorithm
    Tune(#[clap(flatten)] TuneArg),
    /// Print an environment's default configuration
    Defaults(#[clap(flatten)] DefaultsArg),
}

/// Options shared by every command that trains agents.
#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ConfigArg {
    /// Environment whose defaults are used when no config file is given
    #[arg(long, default_value = "cartpole")]
    env: EnvKind,
    /// Experiment config file, as printed by `defaults`
    #[arg(long)]
    config: Option<PathBuf>,
    /// Random seed, overriding the configured one
    #[arg(long)]
    seed: Option<u64>,
    /// Reward kind of the chosen environment, overriding the configured one
    #[arg(long)]
    reward: Option<String>,
    /// Q-table initialization (Zeros, Normal or Uniform)
    #[arg(long)]
    table_init: Option<TableInit>,
    /// Environment copies trained in parallel, overriding the configured count
    #[arg(long)]
    env_copies: Option<usize>,
}

impl ConfigArg {
    fn load(&self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => util::read_config_file(path)?,
            None => ExperimentConfig::defaults(self.env),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(reward) = &self.reward {
            config.environment.set_reward(reward)?;
        }
        if let Some(table_init) = self.table_init {
            config.agent.table_init = table_init;
        }
        if let Some(env_copies) = self.env_copies {
            config.training.env_copies = env_copies;
        }
        Ok(config)
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Experiment(arg) => experiment::run(&arg)?,
        Mode::Tune(arg) => tune::run(&arg)?,
        Mode::Defaults(arg) => defaults::run(&arg)?,
    }
    Ok(())
}
