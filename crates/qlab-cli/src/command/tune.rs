use std::{path::PathBuf, sync::mpsc};

use chrono::Utc;
use qlab_agent::experiment::Experiment;
use qlab_env::Environment;
use qlab_stats::descriptive::DescriptiveStats;
use qlab_training::{
    fitness::ExperimentFitness,
    genetic::{EvaluatedChromosome, EvaluatedPopulation, GeneticOptimizer},
};
use rand::SeedableRng as _;
use rand_pcg::Pcg64;

use super::ConfigArg;
use crate::{
    config::{BuiltEnvironment, ExperimentConfig},
    report::{TuneReport, TunedHyperparameters},
    util,
    worker,
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TuneArg {
    #[clap(flatten)]
    pub(super) config: ConfigArg,
    /// Number of generations, overriding the configured one
    #[arg(long)]
    generations: Option<usize>,
    /// Population size, overriding the configured one
    #[arg(long)]
    population: Option<usize>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Snapshot sent after each generation.
#[derive(Debug, Clone)]
struct GenerationProgress {
    generation: usize,
    archive: Vec<EvaluatedChromosome>,
    fitness_stats: Option<DescriptiveStats>,
}

pub(crate) fn run(arg: &TuneArg) -> anyhow::Result<()> {
    let TuneArg {
        config,
        generations,
        population,
        output,
    } = arg;
    let mut config = config.load()?;
    if let Some(generations) = generations {
        config.tuning.generations = *generations;
    }
    if let Some(population) = population {
        config.tuning.population_size = *population;
    }
    config.validate()?;

    let best = match config.environment.build()? {
        BuiltEnvironment::CartPole(env) => tune(env, &config)?,
        BuiltEnvironment::Acrobot(env) => tune(env, &config)?,
    };

    eprintln!("Best Chromosomes:");
    for (i, evaluated) in best.iter().enumerate() {
        eprintln!(
            "  {i:2}: {:.3?} => {:.3}",
            evaluated.chromosome.genes(),
            evaluated.fitness
        );
    }
    eprintln!("Hyperparameter tuning completed.");

    let report = TuneReport {
        generated_at: Utc::now(),
        best: best.iter().map(TunedHyperparameters::from).collect(),
        config,
    };
    util::save_json(&report, output.as_deref())?;

    if let Some(path) = &output {
        eprintln!("Report saved to {}", path.display());
    }

    Ok(())
}

fn tune<E>(env: E, config: &ExperimentConfig) -> anyhow::Result<Vec<EvaluatedChromosome>>
where
    E: Environment + Clone + Send + Sync + 'static,
{
    let optimizer = GeneticOptimizer::new(config.tuning)?;
    let experiment = Experiment::new(env, config.agent, config.training)?;
    let fitness = ExperimentFitness::new(experiment, config.fitness_runs);
    let generations = config.tuning.generations;
    let seed = config.seed;

    worker::run_with_progress(
        move |tx: &mpsc::Sender<GenerationProgress>| {
            let mut rng = Pcg64::seed_from_u64(seed);
            optimizer.run(
                &fitness,
                &mut rng,
                &mut |generation: usize,
                      archive: &[EvaluatedChromosome],
                      population: &EvaluatedPopulation| {
                    let _ = tx.send(GenerationProgress {
                        generation,
                        archive: archive.to_vec(),
                        fitness_stats: population.fitness_stats(),
                    });
                },
            )
        },
        |progress| print_generation(&progress, generations),
    )
}

fn print_generation(progress: &GenerationProgress, generations: usize) {
    let GenerationProgress {
        generation,
        archive,
        fitness_stats,
    } = progress;
    eprintln!("Generation #{generation} of {generations}:");
    if let Some(stats) = fitness_stats {
        eprintln!("  Fitness Stats:");
        eprintln!("    Min:  {:.3}", stats.min);
        eprintln!("    Max:  {:.3}", stats.max);
        eprintln!("    Mean: {:.3}", stats.mean);
    }
    eprintln!("  Fittest so far:");
    for (i, evaluated) in archive.iter().enumerate() {
        eprintln!(
            "  {i:2}: {:.3?} => {:.3}",
            evaluated.chromosome.genes(),
            evaluated.fitness
        );
    }
}
