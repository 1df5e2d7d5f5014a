//! Genetic-algorithm search over Q-learning hyperparameters.
//!
//! A hyperparameter set (learning-rate, explore-rate and discount-factor
//! schedules) is encoded as a nine-gene [`Chromosome`](chromosome::Chromosome).
//! Its fitness is the number of episodes a fresh agent needs to solve the
//! task, so the search minimizes.
//!
//! # Architecture
//!
//! ```text
//! GeneticOptimizer
//!     ↓ evolves
//! Chromosomes (nine genes each)
//!     ↓ decoded into
//! Hyperparameters (qlab-agent)
//!     ↓ trained by
//! Experiment (fitness function)
//!     ↓ produces
//! Mean episodes-to-solve
//!     ↓ guides
//! Selection & Reproduction
//! ```
//!
//! # Modules
//!
//! - [`chromosome`]: gene layout, gene ranges, crossover and mutation
//! - [`fitness`]: the [`FitnessFunction`](fitness::FitnessFunction) seam and
//!   the experiment-backed implementation
//! - [`genetic`]: populations, selection, the fittest archive and the
//!   optimizer loop
//!
//! # Current Limitations
//!
//! - **No early stopping**: the search always runs every generation
//! - **Noisy fitness**: one short experiment per chromosome per generation;
//!   a chromosome seen again is re-scored with a fresh seed

pub mod chromosome;
pub mod fitness;
pub mod genetic;
