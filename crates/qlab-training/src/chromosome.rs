//! Nine-gene chromosomes and their genetic operators.
//!
//! A [`Chromosome`] encodes one [`Hyperparameters`] set as three
//! `(initial, final, step)` triples. Genes live on fixed grids:
//!
//! | position `% 3` | meaning          | values               |
//! |----------------|------------------|----------------------|
//! | 0, 1           | initial, final   | `k / 100`, `k ∈ 0..=100` |
//! | 2              | step per episode | `k / 1000`, `k ∈ 0..=10` |
//!
//! # Operations
//!
//! - **Initialization**: [`Chromosome::random`] draws every gene from its grid
//! - **Crossover**: [`single_point`] swaps tails after one cut in `1..=7`;
//!   [`double_point`] swaps the segment between cuts in `1..=3` and `5..=7`
//! - **Mutation**: [`Chromosome::mutate`] redraws genes independently with a
//!   given probability

use std::ops::RangeInclusive;

use qlab_agent::schedule::Hyperparameters;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const GENE_COUNT: usize = Hyperparameters::GENE_COUNT;

const RATE_GRID: (u32, f64) = (100, 100.0);
const STEP_GRID: (u32, f64) = (10, 1000.0);

fn grid(position: usize) -> (u32, f64) {
    if position % 3 == 2 {
        STEP_GRID
    } else {
        RATE_GRID
    }
}

/// Legal values of the gene at `position`.
///
/// ```
/// use qlab_training::chromosome::gene_range;
///
/// assert_eq!(gene_range(0), 0.0..=1.0);
/// assert_eq!(gene_range(5), 0.0..=0.01);
/// ```
#[must_use]
pub fn gene_range(position: usize) -> RangeInclusive<f64> {
    let (max, divisor) = grid(position);
    0.0..=f64::from(max) / divisor
}

/// Draws a gene for `position` uniformly from its grid.
pub fn random_gene<R>(position: usize, rng: &mut R) -> f64
where
    R: Rng + ?Sized,
{
    let (max, divisor) = grid(position);
    f64::from(rng.random_range(0..=max)) / divisor
}

/// A candidate hyperparameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chromosome([f64; GENE_COUNT]);

impl Chromosome {
    #[must_use]
    pub const fn new(genes: [f64; GENE_COUNT]) -> Self {
        Self(genes)
    }

    pub fn random<R>(rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self(std::array::from_fn(|position| random_gene(position, rng)))
    }

    #[must_use]
    pub fn genes(&self) -> &[f64; GENE_COUNT] {
        &self.0
    }

    #[must_use]
    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::from_genes(&self.0)
    }

    /// Redraws each gene from its grid with probability `rate`.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is outside `[0, 1]`.
    pub fn mutate<R>(&mut self, rate: f64, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for (position, gene) in self.0.iter_mut().enumerate() {
            if rng.random_bool(rate) {
                *gene = random_gene(position, rng);
            }
        }
    }
}

impl From<Hyperparameters> for Chromosome {
    fn from(hyperparameters: Hyperparameters) -> Self {
        Self(hyperparameters.to_genes())
    }
}

/// Single-point crossover with a cut drawn from `1..=7`.
pub fn single_point<R>(first: &Chromosome, second: &Chromosome, rng: &mut R) -> [Chromosome; 2]
where
    R: Rng + ?Sized,
{
    single_point_at(first, second, rng.random_range(1..=7))
}

/// Children that keep their parent's genes before `cut` and swap the rest.
///
/// ```
/// use qlab_training::chromosome::{Chromosome, single_point_at};
///
/// let a = Chromosome::new([0.0; 9]);
/// let b = Chromosome::new([1.0; 9]);
/// let [c, d] = single_point_at(&a, &b, 3);
/// assert_eq!(c.genes(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
/// assert_eq!(d.genes(), &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
/// ```
#[must_use]
pub fn single_point_at(first: &Chromosome, second: &Chromosome, cut: usize) -> [Chromosome; 2] {
    swap_segment(first, second, cut..GENE_COUNT)
}

/// Double-point crossover with cuts drawn from `1..=3` and `5..=7`.
pub fn double_point<R>(first: &Chromosome, second: &Chromosome, rng: &mut R) -> [Chromosome; 2]
where
    R: Rng + ?Sized,
{
    let start = rng.random_range(1..=3);
    let end = rng.random_range(5..=7);
    double_point_at(first, second, start, end)
}

/// Children that swap the genes in `start..end` and keep the rest.
#[must_use]
pub fn double_point_at(
    first: &Chromosome,
    second: &Chromosome,
    start: usize,
    end: usize,
) -> [Chromosome; 2] {
    swap_segment(first, second, start..end)
}

fn swap_segment(
    first: &Chromosome,
    second: &Chromosome,
    segment: std::ops::Range<usize>,
) -> [Chromosome; 2] {
    let mut a = *first;
    let mut b = *second;
    a.0[segment.clone()].swap_with_slice(&mut b.0[segment]);
    [a, b]
}
