//! Q-tables and the double-table bank the agent learns into.
//!
//! A [`QTableBank`] owns `K` tables of identical shape. Each turn the agent
//! draws a [`TablePair`]: the `main` table proposes the bootstrap action and
//! receives the update, the `secondary` table supplies the value of that
//! action. With a single table both indices point at it and the update is
//! plain Q-learning.

use qlab_env::{MAX_STATE_DIMS, State};
use rand::{Rng, seq::index};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::AgentConfigError;

const INIT_BOUND: f64 = 10.0;

/// How table values are filled at the start of every run.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
pub enum TableInit {
    /// All zeros.
    #[default]
    #[serde(alias = "None")]
    Zeros,
    /// Standard normal samples scaled by 10/3 and clipped to `[-10, 10]`.
    Normal,
    /// Uniform samples in `[-10, 10]`.
    Uniform,
}

/// One action-value table, stored row-major with one row per state.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    shape: State,
    action_count: usize,
    values: Vec<f64>,
}

impl QTable {
    fn zeros(shape: State, action_count: usize) -> Self {
        let rows: usize = shape.iter().product();
        Self {
            shape,
            action_count,
            values: vec![0.0; rows * action_count],
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.action_count
    }

    /// Action values at `state`.
    ///
    /// # Panics
    ///
    /// Panics if `state` does not fit the table shape.
    #[must_use]
    pub fn row(&self, state: &[usize]) -> &[f64] {
        let start = self.offset(state);
        &self.values[start..start + self.action_count]
    }

    fn row_mut(&mut self, state: &[usize]) -> &mut [f64] {
        let start = self.offset(state);
        &mut self.values[start..start + self.action_count]
    }

    #[must_use]
    pub fn get(&self, state: &[usize], action: usize) -> f64 {
        self.row(state)[action]
    }

    fn offset(&self, state: &[usize]) -> usize {
        assert_eq!(state.len(), self.shape.len(), "state rank mismatch");
        let row = state.iter().zip(&self.shape).fold(0, |acc, (&s, &dim)| {
            assert!(s < dim, "bucket {s} out of range for dimension of size {dim}");
            acc * dim + s
        });
        row * self.action_count
    }

    fn fill<R>(&mut self, init: TableInit, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        match init {
            TableInit::Zeros => self.values.fill(0.0),
            TableInit::Normal => {
                for v in &mut self.values {
                    let sample: f64 = rng.sample(StandardNormal);
                    *v = (sample * INIT_BOUND / 3.0).clamp(-INIT_BOUND, INIT_BOUND);
                }
            }
            TableInit::Uniform => {
                for v in &mut self.values {
                    *v = rng.random_range(-INIT_BOUND..=INIT_BOUND);
                }
            }
        }
    }
}

/// Indices of the two tables taking part in one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePair {
    pub main: usize,
    pub secondary: usize,
}

/// One observed transition, addressed by discretized states.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    pub state: &'a [usize],
    pub action: usize,
    pub next_state: &'a [usize],
    pub reward: f64,
}

/// `K` Q-tables of identical shape, reinitialized at every run boundary.
///
/// # Example
///
/// ```
/// use qlab_agent::q_table::{QTableBank, TableInit, TablePair, Transition};
///
/// let mut bank = QTableBank::new(1, TableInit::Zeros, &[4], 2).unwrap();
/// let pair = TablePair { main: 0, secondary: 0 };
/// let transition = Transition { state: &[0], action: 1, next_state: &[1], reward: 1.0 };
/// bank.update(pair, &transition, 0.5, 0.9);
///
/// assert_eq!(bank.table(0).get(&[0], 1), 0.5);
/// assert_eq!(bank.best_action(&[0]), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QTableBank {
    init: TableInit,
    tables: Vec<QTable>,
}

impl QTableBank {
    /// Allocates `count` zeroed tables indexed by `shape` and `action_count`.
    ///
    /// Values follow `init` only after [`QTableBank::reinitialize`].
    pub fn new(
        count: usize,
        init: TableInit,
        shape: &[usize],
        action_count: usize,
    ) -> Result<Self, AgentConfigError> {
        if count == 0 {
            return Err(AgentConfigError::NoTables);
        }
        if action_count == 0 {
            return Err(AgentConfigError::NoActions);
        }
        if shape.len() > MAX_STATE_DIMS {
            return Err(AgentConfigError::StateRank { rank: shape.len() });
        }
        if let Some(dimension) = shape.iter().position(|&n| n == 0) {
            return Err(AgentConfigError::EmptyDimension { dimension });
        }
        let shape: State = shape.iter().copied().collect();
        let tables = vec![QTable::zeros(shape, action_count); count];
        Ok(Self { init, tables })
    }

    /// Refills every table according to the configured [`TableInit`].
    pub fn reinitialize<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for table in &mut self.tables {
            table.fill(self.init, rng);
        }
    }

    #[must_use]
    pub fn init(&self) -> TableInit {
        self.init
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.tables[0].action_count
    }

    #[must_use]
    pub fn table(&self, index: usize) -> &QTable {
        &self.tables[index]
    }

    #[must_use]
    pub fn tables(&self) -> &[QTable] {
        &self.tables
    }

    /// Draws two distinct tables without replacement, or the sole table twice.
    #[must_use]
    pub fn select_pair<R>(&self, rng: &mut R) -> TablePair
    where
        R: Rng + ?Sized,
    {
        if self.tables.len() < 2 {
            return TablePair {
                main: 0,
                secondary: 0,
            };
        }
        let picked = index::sample(rng, self.tables.len(), 2);
        TablePair {
            main: picked.index(0),
            secondary: picked.index(1),
        }
    }

    /// Greedy action at `state` over the sum of all tables.
    #[must_use]
    pub fn best_action(&self, state: &[usize]) -> usize {
        let action_count = self.action_count();
        let mut totals = vec![0.0; action_count];
        for table in &self.tables {
            for (total, v) in totals.iter_mut().zip(table.row(state)) {
                *total += v;
            }
        }
        argmax(&totals)
    }

    /// Applies one double-Q temporal-difference update and returns the new
    /// value of the updated cell.
    ///
    /// The bootstrap action is the argmax of `main` at the destination, its
    /// value is read from `secondary`, and only `main` is written.
    pub fn update(
        &mut self,
        pair: TablePair,
        transition: &Transition<'_>,
        learning_rate: f64,
        discount_factor: f64,
    ) -> f64 {
        let next_action = argmax(self.tables[pair.main].row(transition.next_state));
        let best_q = self.tables[pair.secondary].get(transition.next_state, next_action);
        let target = transition.reward + discount_factor * best_q;
        let cell = &mut self.tables[pair.main].row_mut(transition.state)[transition.action];
        *cell += learning_rate * (target - *cell);
        *cell
    }
}

/// Index of the largest value, lowest index on ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
