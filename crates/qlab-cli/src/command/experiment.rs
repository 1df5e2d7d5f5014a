use std::{path::PathBuf, sync::mpsc};

use chrono::Utc;
use qlab_agent::experiment::{Experiment, RunReport, RunStatus, TrainingResult};
use qlab_env::Environment;
use qlab_stats::summary::ExperimentSummary;
use rand::SeedableRng as _;
use rand_pcg::Pcg64;

use super::ConfigArg;
use crate::{
    config::{BuiltEnvironment, ExperimentConfig},
    report::ExperimentReport,
    util,
    worker,
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ExperimentArg {
    #[clap(flatten)]
    pub(super) config: ConfigArg,
    /// Number of results to record, overriding the configured one
    #[arg(long)]
    runs: Option<usize>,
    /// Record failed runs with the full episode budget instead of skipping them
    #[arg(long)]
    include_failures: bool,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ExperimentArg) -> anyhow::Result<()> {
    let ExperimentArg {
        config,
        runs,
        include_failures,
        output,
    } = arg;
    let mut config = config.load()?;
    if let Some(runs) = runs {
        config.runs = *runs;
    }
    config.validate()?;

    eprintln!(
        "Running experiment: {} results wanted, at most {} runs on {} env copies (seed {})",
        config.runs, config.training.max_runs, config.training.env_copies, config.seed
    );
    let result = match config.environment.build()? {
        BuiltEnvironment::CartPole(env) => train(env, &config, *include_failures)?,
        BuiltEnvironment::Acrobot(env) => train(env, &config, *include_failures)?,
    };

    let summary = ExperimentSummary::new(&result.episodes, result.failed_runs, &config.baseline);
    eprintln!();
    eprintln!("Experiment finished");
    eprintln!("  Runs:       {} ({} failed)", summary.runs, summary.failed_runs);
    eprintln!("  Mean:       {:.3}", summary.mean);
    eprintln!("  Std dev:    {:.3}", summary.std_dev);
    eprintln!("  Median:     {:.3}", summary.median);
    eprintln!("  IQR:        {:.3}", summary.inter_quartile_range);
    eprintln!("  Min / Max:  {} / {}", summary.min, summary.max);
    eprintln!(
        "  Difference: {:.3} (baseline mean {}, confidence {})",
        summary.difference, config.baseline.mean, config.baseline.confidence_level
    );

    let report = ExperimentReport {
        generated_at: Utc::now(),
        include_failures: *include_failures,
        attempted_runs: result.attempted_runs,
        episodes: result.episodes,
        summary,
        config,
    };
    util::save_json(&report, output.as_deref())?;

    if let Some(path) = &output {
        eprintln!("Report saved to {}", path.display());
    }

    Ok(())
}

fn train<E>(
    env: E,
    config: &ExperimentConfig,
    include_failures: bool,
) -> anyhow::Result<TrainingResult>
where
    E: Environment + Clone + Send + 'static,
{
    let mut experiment = Experiment::new(env, config.agent, config.training)?;
    let hyperparameters = config.hyperparameters;
    let runs = config.runs;
    let seed = config.seed;

    worker::run_with_progress(
        move |tx: &mpsc::Sender<RunReport>| {
            let mut rng = Pcg64::seed_from_u64(seed);
            experiment.run(
                &hyperparameters,
                runs,
                !include_failures,
                &mut rng,
                &mut |report: &RunReport| {
                    let _ = tx.send(*report);
                },
            )
        },
        |report| match report.status {
            RunStatus::Succeeded => eprintln!(
                "Agent succeeded in {} episodes for run {}",
                report.episodes, report.run
            ),
            RunStatus::Failed => eprintln!(
                "Agent failed to solve within {} episodes for run {}",
                report.episodes, report.run
            ),
        },
    )
}

#[cfg(test)]
mod tests {
    use qlab_agent::experiment::TrainingSettings;

    use super::*;
    use crate::config::EnvKind;

    #[test]
    fn worker_training_matches_direct_training() {
        let config = ExperimentConfig {
            training: TrainingSettings {
                max_runs: 3,
                max_episodes: 4,
                max_turns: 30,
                env_copies: 1,
            },
            runs: 2,
            ..ExperimentConfig::defaults(EnvKind::CartPole)
        };
        let BuiltEnvironment::CartPole(env) = config.environment.build().unwrap() else {
            panic!("expected cart-pole");
        };

        let threaded = train(env.clone(), &config, false).unwrap();

        let mut experiment = Experiment::new(env, config.agent, config.training).unwrap();
        let mut rng = Pcg64::seed_from_u64(config.seed);
        let direct = experiment.run(&config.hyperparameters, 2, true, &mut rng, &mut ());

        assert_eq!(threaded, direct);
        assert_eq!(threaded.attempted_runs, 3);
    }
}
