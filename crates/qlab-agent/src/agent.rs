use qlab_env::State;
use rand::Rng;

use crate::{
    q_table::{QTableBank, TablePair, Transition},
    schedule::Hyperparameters,
};

/// A Q-learning agent: a table bank plus the run-scoped counters its
/// schedules are evaluated against.
///
/// The turn counter resets every episode and the episode counter every run.
/// The discretized state the agent last arrived at is kept as `state`, the
/// origin of the next update.
#[derive(Debug, Clone)]
pub struct Agent {
    bank: QTableBank,
    hyperparameters: Hyperparameters,
    runs: usize,
    episode: usize,
    turn: usize,
    state: State,
}

impl Agent {
    /// Creates an agent whose schedule steps point toward their final values.
    #[must_use]
    pub fn new(bank: QTableBank, hyperparameters: &Hyperparameters) -> Self {
        Self {
            bank,
            hyperparameters: hyperparameters.normalized(),
            runs: 0,
            episode: 0,
            turn: 0,
            state: State::new(),
        }
    }

    #[must_use]
    pub fn bank(&self) -> &QTableBank {
        &self.bank
    }

    #[must_use]
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Number of runs finished so far.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// 0-based index of the current episode within the run.
    #[must_use]
    pub fn episode(&self) -> usize {
        self.episode
    }

    /// Turns taken in the current episode.
    #[must_use]
    pub fn turn(&self) -> usize {
        self.turn
    }

    #[must_use]
    pub fn state(&self) -> &[usize] {
        &self.state
    }

    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.hyperparameters.learning_rate.value_at(self.episode)
    }

    #[must_use]
    pub fn explore_rate(&self) -> f64 {
        self.hyperparameters.explore_rate.value_at(self.episode)
    }

    #[must_use]
    pub fn discount_factor(&self) -> f64 {
        self.hyperparameters.discount_factor.value_at(self.episode)
    }

    /// Starts a run with freshly initialized tables.
    pub fn new_run<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.bank.reinitialize(rng);
        self.episode = 0;
        self.turn = 0;
    }

    pub fn finish_run(&mut self) {
        self.runs += 1;
    }

    pub fn start_episode(&mut self, state: State) {
        self.turn = 0;
        self.state = state;
    }

    pub fn finish_episode(&mut self) {
        self.episode += 1;
    }

    /// Counts a new turn and draws the tables it will update.
    pub fn begin_turn<R>(&mut self, rng: &mut R) -> TablePair
    where
        R: Rng + ?Sized,
    {
        self.turn += 1;
        self.bank.select_pair(rng)
    }

    /// ε-greedy choice at the current state.
    pub fn select_action<R>(&self, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        if rng.random::<f64>() < self.explore_rate() {
            rng.random_range(0..self.bank.action_count())
        } else {
            self.bank.best_action(&self.state)
        }
    }

    /// Updates the value of `action` taken from the current state.
    pub fn learn(
        &mut self,
        pair: TablePair,
        action: usize,
        next_state: &[usize],
        reward: f64,
    ) -> f64 {
        let learning_rate = self.learning_rate();
        let discount_factor = self.discount_factor();
        let transition = Transition {
            state: &self.state,
            action,
            next_state,
            reward,
        };
        self.bank.update(pair, &transition, learning_rate, discount_factor)
    }

    /// Moves the agent to the state it arrived at.
    pub fn advance(&mut self, state: State) {
        self.state = state;
    }
}
