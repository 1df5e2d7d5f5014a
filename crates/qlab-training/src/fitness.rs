//! Fitness functions scored by the genetic optimizer.

use qlab_agent::experiment::Experiment;
use qlab_env::Environment;
use rand::SeedableRng as _;
use rand_pcg::Pcg64;

use crate::chromosome::Chromosome;

/// Scores a chromosome; lower is better.
///
/// Evaluations of one generation run on separate threads, so implementors
/// are shared by reference and must be [`Sync`]. `seed` is drawn from the
/// optimizer's RNG, one per chromosome, and is the only source of randomness
/// an implementation should use.
pub trait FitnessFunction: Sync {
    fn fitness(&self, chromosome: &Chromosome, seed: u64) -> f64;
}

impl<F> FitnessFunction for F
where
    F: Fn(&Chromosome, u64) -> f64 + Sync,
{
    fn fitness(&self, chromosome: &Chromosome, seed: u64) -> f64 {
        self(chromosome, seed)
    }
}

/// Mean episodes-to-solve of a short experiment trained with the
/// chromosome's hyperparameters.
///
/// Failed runs count with the full episode budget, so a chromosome that never
/// solves scores `max_episodes`.
#[derive(Debug, Clone)]
pub struct ExperimentFitness<E> {
    experiment: Experiment<E>,
    runs: usize,
}

impl<E> ExperimentFitness<E>
where
    E: Environment + Clone + Send + Sync,
{
    /// Scores each chromosome over `runs` training runs of `experiment`.
    #[must_use]
    pub fn new(experiment: Experiment<E>, runs: usize) -> Self {
        Self { experiment, runs }
    }

    #[must_use]
    pub fn experiment(&self) -> &Experiment<E> {
        &self.experiment
    }
}

impl<E> FitnessFunction for ExperimentFitness<E>
where
    E: Environment + Clone + Send + Sync,
{
    #[expect(clippy::cast_precision_loss)]
    fn fitness(&self, chromosome: &Chromosome, seed: u64) -> f64 {
        let mut experiment = self.experiment.clone();
        let mut rng = Pcg64::seed_from_u64(seed);
        let result = experiment.run(
            &chromosome.hyperparameters(),
            self.runs,
            false,
            &mut rng,
            &mut (),
        );
        if result.episodes.is_empty() {
            return experiment.training_settings().max_episodes as f64;
        }
        result.episodes.iter().sum::<usize>() as f64 / result.episodes.len() as f64
    }
}
