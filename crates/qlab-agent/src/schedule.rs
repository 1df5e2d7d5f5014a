//! Episode-indexed schedules for learning rate, explore rate and discount factor.

use serde::{Deserialize, Serialize};

/// A value that moves linearly from `initial` toward `final_value` by `step`
/// per episode and then stays there.
///
/// # Example
///
/// ```
/// use qlab_agent::schedule::Schedule;
///
/// let explore = Schedule::new(1.0, 0.1, 0.2).normalized();
/// assert_eq!(explore.step, -0.2);
/// assert_eq!(explore.value_at(0), 1.0);
/// assert!((explore.value_at(2) - 0.6).abs() < 1e-12);
/// assert_eq!(explore.value_at(100), 0.1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub initial: f64,
    #[serde(rename = "final")]
    pub final_value: f64,
    pub step: f64,
}

impl Schedule {
    #[must_use]
    pub const fn new(initial: f64, final_value: f64, step: f64) -> Self {
        Self {
            initial,
            final_value,
            step,
        }
    }

    /// A schedule that never changes.
    #[must_use]
    pub const fn constant(value: f64) -> Self {
        Self::new(value, value, 0.0)
    }

    /// Returns this schedule with a negative `step` when it falls from
    /// `initial` to `final_value`.
    ///
    /// Only falling schedules are corrected; a rising schedule keeps its step
    /// as given.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.initial > self.final_value {
            Self {
                step: -self.step.abs(),
                ..self
            }
        } else {
            self
        }
    }

    /// Value during the given 0-based episode of a run.
    ///
    /// A non-negative step (`-0.0` included) caps the value at `final_value`
    /// with `min`, a negative one floors it with `max`. A badly signed step
    /// therefore lands on `final_value` at once.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn value_at(&self, episode: usize) -> f64 {
        let value = self.initial + self.step * episode as f64;
        if self.step >= 0.0 {
            value.min(self.final_value)
        } else {
            value.max(self.final_value)
        }
    }
}

/// The three schedules an agent learns with.
///
/// Laid out as nine genes, `(initial, final, step)` for learning rate,
/// explore rate and discount factor in that order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub learning_rate: Schedule,
    pub explore_rate: Schedule,
    pub discount_factor: Schedule,
}

impl Hyperparameters {
    pub const GENE_COUNT: usize = 9;

    #[must_use]
    pub const fn from_genes(genes: &[f64; Self::GENE_COUNT]) -> Self {
        Self {
            learning_rate: Schedule::new(genes[0], genes[1], genes[2]),
            explore_rate: Schedule::new(genes[3], genes[4], genes[5]),
            discount_factor: Schedule::new(genes[6], genes[7], genes[8]),
        }
    }

    #[must_use]
    pub fn to_genes(&self) -> [f64; Self::GENE_COUNT] {
        let Self {
            learning_rate: l,
            explore_rate: e,
            discount_factor: d,
        } = self;
        [
            l.initial,
            l.final_value,
            l.step,
            e.initial,
            e.final_value,
            e.step,
            d.initial,
            d.final_value,
            d.step,
        ]
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            learning_rate: self.learning_rate.normalized(),
            explore_rate: self.explore_rate.normalized(),
            discount_factor: self.discount_factor.normalized(),
        }
    }
}
