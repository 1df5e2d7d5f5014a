//! Genetic algorithm searching hyperparameters that solve a task in the
//! fewest episodes.
//!
//! This is a minimization GA: lower fitness is better.
//!
//! # Algorithm Overview
//!
//! Each generation:
//!
//! 1. **Evaluate** - Every chromosome is scored by a [`FitnessFunction`], in parallel
//! 2. **Archive** - The generation is merged into the [`FittestArchive`]
//! 3. **Elitism** - The best `elite_count` chromosomes pass on unchanged
//! 4. **Selection** - Tournament or roulette selection, chosen per generation
//! 5. **Crossover** - Parents are paired; each pair is copied or crossed
//! 6. **Mutation** - Every gene of every child may be redrawn
//!
//! The search runs for a fixed number of generations and returns the archive.
//!
//! # Key Components
//!
//! - [`EvaluatedChromosome`] - A chromosome with its fitness
//! - [`Population`] / [`EvaluatedPopulation`] - One generation before and after scoring
//! - [`PopulationEvolver`] - Selection, crossover and mutation
//! - [`FittestArchive`] - Best distinct chromosomes seen so far
//! - [`GeneticOptimizer`] - Drives the generations
//!
//! # Genetic Operators
//!
//! ## Tournament Selection
//!
//! Samples `ceil(population_size / 4)` distinct evaluated chromosomes and keeps
//! the fittest.
//!
//! ## Roulette Selection
//!
//! Samples with replacement, weighting each chromosome by
//! `1 - fitness / total_fitness`.
//!
//! ## Crossover
//!
//! A pair is copied unchanged with probability `crossover_rate`. Otherwise
//! [`single_point`] crossover is applied with probability `single_point_prob`
//! and [`double_point`] crossover the rest of the time.
//!
//! # Parallelization
//!
//! Chromosomes of one generation are scored on scoped threads. Each one gets a
//! seed drawn in order from the optimizer's RNG, so a seeded search is
//! reproducible regardless of thread scheduling.
//!
//! # Example
//!
//! ```
//! use qlab_training::{
//!     chromosome::Chromosome,
//!     genetic::{GeneticOptimizer, GeneticParams},
//! };
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg64;
//!
//! let params = GeneticParams {
//!     population_size: 6,
//!     generations: 3,
//!     elite_count: 2,
//!     best_count: 3,
//!     ..GeneticParams::default()
//! };
//! let optimizer = GeneticOptimizer::new(params).unwrap();
//! let fitness = |c: &Chromosome, _seed: u64| c.genes().iter().sum::<f64>();
//!
//! let mut rng = Pcg64::seed_from_u64(0);
//! let best = optimizer.run(&fitness, &mut rng, &mut ());
//! assert_eq!(best.len(), 3);
//! assert!(best.is_sorted_by(|a, b| a.fitness <= b.fitness));
//! ```

use std::thread;

use qlab_stats::descriptive::DescriptiveStats;
use rand::{
    Rng,
    distr::{Distribution as _, weighted::WeightedIndex},
    seq::IndexedRandom as _,
};
use serde::{Deserialize, Serialize};

use crate::{
    chromosome::{Chromosome, double_point, single_point},
    fitness::FitnessFunction,
};

/// A chromosome and its fitness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedChromosome {
    pub chromosome: Chromosome,
    pub fitness: f64,
}

/// One generation of chromosomes awaiting evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    chromosomes: Vec<Chromosome>,
}

impl Population {
    /// Creates `count` random chromosomes.
    #[must_use]
    pub fn random<R>(count: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let chromosomes = (0..count).map(|_| Chromosome::random(rng)).collect();
        Self { chromosomes }
    }

    #[must_use]
    pub fn from_chromosomes(chromosomes: Vec<Chromosome>) -> Self {
        Self { chromosomes }
    }

    #[must_use]
    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    /// Scores every chromosome in parallel and sorts them by ascending fitness.
    ///
    /// Equal fitness keeps population order.
    pub fn evaluate<F, R>(&self, fitness: &F, rng: &mut R) -> EvaluatedPopulation
    where
        F: FitnessFunction + ?Sized,
        R: Rng + ?Sized,
    {
        let seeds: Vec<u64> = self.chromosomes.iter().map(|_| rng.random()).collect();
        let mut members: Vec<EvaluatedChromosome> = self
            .chromosomes
            .iter()
            .map(|&chromosome| EvaluatedChromosome {
                chromosome,
                fitness: f64::NAN,
            })
            .collect();

        thread::scope(|s| {
            for (member, seed) in members.iter_mut().zip(seeds) {
                s.spawn(move || {
                    member.fitness = fitness.fitness(&member.chromosome, seed);
                });
            }
        });

        members.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        EvaluatedPopulation { members }
    }
}

/// A generation sorted by ascending fitness (best first).
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedPopulation {
    members: Vec<EvaluatedChromosome>,
}

impl EvaluatedPopulation {
    #[must_use]
    pub fn members(&self) -> &[EvaluatedChromosome] {
        &self.members
    }

    #[must_use]
    pub fn best(&self) -> Option<&EvaluatedChromosome> {
        self.members.first()
    }

    /// Statistics of this generation's fitness values.
    #[must_use]
    pub fn fitness_stats(&self) -> Option<DescriptiveStats> {
        DescriptiveStats::new(self.members.iter().map(|m| m.fitness))
    }
}

/// Controls how one generation turns into the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationEvolver {
    /// Number of top chromosomes copied unchanged.
    pub elite_count: usize,
    /// Probability that a parent pair is copied without crossover.
    pub crossover_rate: f64,
    /// Per-gene probability of being redrawn.
    pub mutation_rate: f64,
    /// Probability of single-point (rather than double-point) crossover.
    pub single_point_prob: f64,
    /// Probability of tournament (rather than roulette) selection.
    pub tournament_prob: f64,
}

impl PopulationEvolver {
    /// Builds the next generation of the same size as `population`.
    ///
    /// # Panics
    ///
    /// Panics if `population` is not sorted by ascending fitness, if
    /// `elite_count` exceeds its size, if the offspring count is odd or if a
    /// probability lies outside `[0, 1]`. [`GeneticParams::validate`] rules
    /// these out.
    #[must_use]
    pub fn evolve<R>(&self, population: &EvaluatedPopulation, rng: &mut R) -> Population
    where
        R: Rng + ?Sized,
    {
        let members = &population.members;
        assert!(members.is_sorted_by(|a, b| a.fitness <= b.fitness));
        assert!(self.elite_count <= members.len());
        let offspring_count = members.len() - self.elite_count;
        assert!(offspring_count % 2 == 0, "offspring must pair up");

        let mut next: Vec<Chromosome> = members[..self.elite_count]
            .iter()
            .map(|m| m.chromosome)
            .collect();

        let parents = if rng.random::<f64>() < self.tournament_prob {
            tournament_selection(members, offspring_count, rng)
        } else {
            roulette_selection(members, offspring_count, rng)
        };

        for pair in parents.chunks_exact(2) {
            for mut child in self.crossover(&pair[0], &pair[1], rng) {
                child.mutate(self.mutation_rate, rng);
                next.push(child);
            }
        }

        Population { chromosomes: next }
    }

    fn crossover<R>(&self, first: &Chromosome, second: &Chromosome, rng: &mut R) -> [Chromosome; 2]
    where
        R: Rng + ?Sized,
    {
        if rng.random_bool(self.crossover_rate) {
            return [*first, *second];
        }
        if rng.random::<f64>() < self.single_point_prob {
            single_point(first, second, rng)
        } else {
            double_point(first, second, rng)
        }
    }
}

/// Tournament size for a population: a quarter, rounded up, at least 1.
#[must_use]
pub fn tournament_size(population_size: usize) -> usize {
    population_size.div_ceil(4).max(1)
}

fn tournament_selection<R>(
    members: &[EvaluatedChromosome],
    count: usize,
    rng: &mut R,
) -> Vec<Chromosome>
where
    R: Rng + ?Sized,
{
    let size = tournament_size(members.len());
    (0..count)
        .filter_map(|_| {
            members
                .choose_multiple(rng, size)
                .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
                .map(|m| m.chromosome)
        })
        .collect()
}

fn roulette_selection<R>(
    members: &[EvaluatedChromosome],
    count: usize,
    rng: &mut R,
) -> Vec<Chromosome>
where
    R: Rng + ?Sized,
{
    let total: f64 = members.iter().map(|m| m.fitness).sum();
    let weights: Vec<f64> = members
        .iter()
        .map(|m| {
            if total > 0.0 {
                1.0 - m.fitness / total
            } else {
                1.0
            }
        })
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(wheel) => (0..count)
            .map(|_| members[wheel.sample(rng)].chromosome)
            .collect(),
        // every weight is zero (a single member holds all the fitness)
        Err(_) => (0..count)
            .filter_map(|_| members.choose(rng).map(|m| m.chromosome))
            .collect(),
    }
}

/// The best distinct chromosomes seen so far, sorted by ascending fitness.
///
/// When a chromosome is seen more than once the archive keeps its worst
/// (highest) fitness.
#[derive(Debug, Clone, PartialEq)]
pub struct FittestArchive {
    capacity: usize,
    entries: Vec<EvaluatedChromosome>,
}

impl FittestArchive {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: vec![],
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[EvaluatedChromosome] {
        &self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<EvaluatedChromosome> {
        self.entries
    }

    /// Merges `population`, deduplicates, re-sorts and truncates.
    pub fn merge(&mut self, population: &EvaluatedPopulation) {
        let mut candidates = std::mem::take(&mut self.entries);
        candidates.extend_from_slice(&population.members);
        // worst first so the retained duplicate is the worst one
        candidates.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let mut distinct: Vec<EvaluatedChromosome> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !distinct.iter().any(|d| d.chromosome == candidate.chromosome) {
                distinct.push(candidate);
            }
        }
        distinct.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        distinct.truncate(self.capacity);
        self.entries = distinct;
    }
}

/// Error raised for genetic-algorithm settings that cannot be run.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum GeneticConfigError {
    #[display("population size must be at least 2")]
    PopulationTooSmall,
    #[display("elite count {elite_count} exceeds population size {population_size}")]
    TooManyElites {
        elite_count: usize,
        population_size: usize,
    },
    #[display(
        "population size {population_size} minus elite count {elite_count} must be even so parents pair up"
    )]
    OddOffspring {
        elite_count: usize,
        population_size: usize,
    },
    #[display("best count must be at least 1")]
    EmptyArchive,
    #[display("{name} = {value} is not a probability")]
    NotProbability { name: &'static str, value: f64 },
}

/// Tuning settings of the genetic algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticParams {
    pub population_size: usize,
    pub generations: usize,
    pub elite_count: usize,
    /// Size of the returned archive.
    pub best_count: usize,
    /// Probability that a parent pair is copied without crossover.
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    /// Probability of single-point (rather than double-point) crossover.
    pub single_point_prob: f64,
    /// Probability of tournament (rather than roulette) selection.
    pub tournament_prob: f64,
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 10,
            elite_count: 2,
            best_count: 5,
            crossover_rate: 0.2,
            mutation_rate: 0.1,
            single_point_prob: 0.5,
            tournament_prob: 0.5,
        }
    }
}

impl GeneticParams {
    pub fn validate(&self) -> Result<(), GeneticConfigError> {
        if self.population_size < 2 {
            return Err(GeneticConfigError::PopulationTooSmall);
        }
        if self.elite_count > self.population_size {
            return Err(GeneticConfigError::TooManyElites {
                elite_count: self.elite_count,
                population_size: self.population_size,
            });
        }
        if (self.population_size - self.elite_count) % 2 != 0 {
            return Err(GeneticConfigError::OddOffspring {
                elite_count: self.elite_count,
                population_size: self.population_size,
            });
        }
        if self.best_count == 0 {
            return Err(GeneticConfigError::EmptyArchive);
        }
        for (name, value) in [
            ("crossover_rate", self.crossover_rate),
            ("mutation_rate", self.mutation_rate),
            ("single_point_prob", self.single_point_prob),
            ("tournament_prob", self.tournament_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GeneticConfigError::NotProbability { name, value });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn evolver(&self) -> PopulationEvolver {
        PopulationEvolver {
            elite_count: self.elite_count,
            crossover_rate: self.crossover_rate,
            mutation_rate: self.mutation_rate,
            single_point_prob: self.single_point_prob,
            tournament_prob: self.tournament_prob,
        }
    }
}

/// Receives progress events from the optimizer.
pub trait GenerationObserver {
    /// Called after generation `generation` (1-based) is evaluated and merged
    /// into the archive.
    fn generation_finished(
        &mut self,
        _generation: usize,
        _archive: &[EvaluatedChromosome],
        _population: &EvaluatedPopulation,
    ) {
    }
}

impl GenerationObserver for () {}

impl<F> GenerationObserver for F
where
    F: FnMut(usize, &[EvaluatedChromosome], &EvaluatedPopulation),
{
    fn generation_finished(
        &mut self,
        generation: usize,
        archive: &[EvaluatedChromosome],
        population: &EvaluatedPopulation,
    ) {
        self(generation, archive, population);
    }
}

/// Runs the genetic algorithm with validated [`GeneticParams`].
#[derive(Debug, Clone)]
pub struct GeneticOptimizer {
    params: GeneticParams,
}

impl GeneticOptimizer {
    pub fn new(params: GeneticParams) -> Result<Self, GeneticConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn params(&self) -> &GeneticParams {
        &self.params
    }

    /// Searches from a random initial population and returns the archive,
    /// best first.
    pub fn run<F, R, O>(
        &self,
        fitness: &F,
        rng: &mut R,
        observer: &mut O,
    ) -> Vec<EvaluatedChromosome>
    where
        F: FitnessFunction + ?Sized,
        R: Rng + ?Sized,
        O: GenerationObserver + ?Sized,
    {
        let initial = Population::random(self.params.population_size, rng);
        self.run_from(initial, fitness, rng, observer)
    }

    /// Searches from `initial`, which should hold `population_size` chromosomes.
    pub fn run_from<F, R, O>(
        &self,
        initial: Population,
        fitness: &F,
        rng: &mut R,
        observer: &mut O,
    ) -> Vec<EvaluatedChromosome>
    where
        F: FitnessFunction + ?Sized,
        R: Rng + ?Sized,
        O: GenerationObserver + ?Sized,
    {
        let evolver = self.params.evolver();
        let mut archive = FittestArchive::new(self.params.best_count);
        let mut population = initial;

        for generation in 1..=self.params.generations {
            let evaluated = population.evaluate(fitness, rng);
            archive.merge(&evaluated);
            observer.generation_finished(generation, archive.entries(), &evaluated);
            if generation < self.params.generations {
                population = evolver.evolve(&evaluated, rng);
            }
        }

        archive.into_entries()
    }
}
