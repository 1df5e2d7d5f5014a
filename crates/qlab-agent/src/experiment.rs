//! The run / episode / turn training loop.
//!
//! An [`Experiment`] drives repeated runs of a fresh agent against one
//! environment until enough results are collected or the run budget is spent:
//!
//! 1. **Run start**: tables are reinitialized and the episode history cleared
//! 2. **Episodes**: up to `max_episodes`, each up to `max_turns` turns
//! 3. **Success check**: after every episode the environment judges the
//!    history; a solved run records `episode + 1`
//! 4. **Exhaustion**: a run that never solves records `max_episodes`, unless
//!    failures are excluded
//!
//! No run outcome is an error. Failed runs are counted and reported through
//! the [`TrainingObserver`], and the loop moves on.
//!
//! # Environment copies
//!
//! With [`TrainingSettings::env_copies`] above one, the experiment trains that
//! many independent copies side by side on scoped threads. Each copy owns its
//! environment, tables, history and a `Pcg64` seeded from the caller's RNG,
//! and plays one run per batch. Batch results are recorded in copy order, so
//! a seeded experiment stays reproducible regardless of thread scheduling.

use std::thread;

use qlab_env::{Environment, EpisodeHistory};
use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{
    AgentConfigError,
    agent::Agent,
    q_table::{QTableBank, TableInit},
    schedule::Hyperparameters,
};

/// Agent-side configuration fixed for the whole experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub table_count: usize,
    pub table_init: TableInit,
    /// Apply a second update for the environment's opposite action each turn.
    pub opposition: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            table_count: 1,
            table_init: TableInit::Zeros,
            opposition: false,
        }
    }
}

/// Budgets of the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Hard ceiling on attempted runs.
    pub max_runs: usize,
    pub max_episodes: usize,
    pub max_turns: usize,
    /// Environment copies trained in parallel, one run each per batch.
    #[serde(default = "default_env_copies")]
    pub env_copies: usize,
}

fn default_env_copies() -> usize {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum RunStatus {
    #[display("succeeded")]
    Succeeded,
    #[display("failed")]
    Failed,
}

/// Outcome of one finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// 1-based index among the attempted runs.
    pub run: usize,
    pub status: RunStatus,
    /// Episodes to solve, or the episode budget for a failed run.
    pub episodes: usize,
}

/// Result of [`Experiment::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Episodes-to-solve per recorded run, in run order.
    pub episodes: Vec<usize>,
    pub attempted_runs: usize,
    /// Runs that exhausted the episode budget, recorded or not.
    pub failed_runs: usize,
}

impl TrainingResult {
    fn record(&mut self, status: RunStatus, episodes: usize, exclude_failure: bool) -> RunReport {
        self.attempted_runs += 1;
        match status {
            RunStatus::Succeeded => self.episodes.push(episodes),
            RunStatus::Failed => {
                self.failed_runs += 1;
                if !exclude_failure {
                    self.episodes.push(episodes);
                }
            }
        }
        RunReport {
            run: self.attempted_runs,
            status,
            episodes,
        }
    }
}

/// Receives progress events from the training loop.
pub trait TrainingObserver {
    fn run_finished(&mut self, _report: &RunReport) {}
}

impl TrainingObserver for () {}

impl<F> TrainingObserver for F
where
    F: FnMut(&RunReport),
{
    fn run_finished(&mut self, report: &RunReport) {
        self(report);
    }
}

/// A training loop bound to one environment and fixed settings.
///
/// # Example
///
/// ```
/// use qlab_agent::{
///     experiment::{AgentSettings, Experiment, TrainingSettings},
///     schedule::{Hyperparameters, Schedule},
/// };
/// use qlab_env::{CartPole, CartPoleReward};
/// use rand::SeedableRng as _;
/// use rand_pcg::Pcg64;
///
/// let env = CartPole::new(&CartPole::DEFAULT_BUCKETS, CartPoleReward::Base).unwrap();
/// let training = TrainingSettings {
///     max_runs: 2,
///     max_episodes: 5,
///     max_turns: 50,
///     env_copies: 1,
/// };
/// let mut experiment = Experiment::new(env, AgentSettings::default(), training).unwrap();
///
/// let hyperparameters = Hyperparameters {
///     learning_rate: Schedule::new(1.0, 0.1, 0.01),
///     explore_rate: Schedule::new(1.0, 0.01, 0.01),
///     discount_factor: Schedule::constant(0.99),
/// };
/// let mut rng = Pcg64::seed_from_u64(0);
/// let result = experiment.run(&hyperparameters, 2, false, &mut rng, &mut ());
///
/// assert_eq!(result.attempted_runs, 2);
/// assert_eq!(result.episodes.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Experiment<E> {
    env: E,
    settings: AgentSettings,
    training: TrainingSettings,
    bank: QTableBank,
}

impl<E> Experiment<E>
where
    E: Environment,
{
    pub fn new(
        env: E,
        settings: AgentSettings,
        training: TrainingSettings,
    ) -> Result<Self, AgentConfigError> {
        if training.max_episodes == 0 {
            return Err(AgentConfigError::EmptyBudget {
                name: "max_episodes",
            });
        }
        if training.max_turns == 0 {
            return Err(AgentConfigError::EmptyBudget { name: "max_turns" });
        }
        if training.env_copies == 0 {
            return Err(AgentConfigError::EmptyBudget { name: "env_copies" });
        }
        let bank = QTableBank::new(
            settings.table_count,
            settings.table_init,
            env.state_shape(),
            env.action_count(),
        )?;
        Ok(Self {
            env,
            settings,
            training,
            bank,
        })
    }

    #[must_use]
    pub fn environment(&self) -> &E {
        &self.env
    }

    #[must_use]
    pub fn agent_settings(&self) -> &AgentSettings {
        &self.settings
    }

    #[must_use]
    pub fn training_settings(&self) -> &TrainingSettings {
        &self.training
    }

    /// Trains fresh agents until `target_results` results are recorded or
    /// `max_runs` runs have been attempted.
    ///
    /// With `exclude_failure` set, failed runs are counted but contribute no
    /// entry to [`TrainingResult::episodes`].
    pub fn run<R, O>(
        &mut self,
        hyperparameters: &Hyperparameters,
        target_results: usize,
        exclude_failure: bool,
        rng: &mut R,
        observer: &mut O,
    ) -> TrainingResult
    where
        E: Clone + Send,
        R: Rng,
        O: TrainingObserver + ?Sized,
    {
        if self.training.env_copies > 1 {
            return self.run_copies(
                hyperparameters,
                target_results,
                exclude_failure,
                rng,
                observer,
            );
        }

        let mut agent = Agent::new(self.bank.clone(), hyperparameters);
        let mut history = EpisodeHistory::new();
        let mut result = TrainingResult::default();

        while result.episodes.len() < target_results
            && result.attempted_runs < self.training.max_runs
        {
            let (status, episodes) = self.play_run(&mut agent, &mut history, rng);
            agent.finish_run();
            let report = result.record(status, episodes, exclude_failure);
            observer.run_finished(&report);
        }
        result
    }

    fn run_copies<R, O>(
        &self,
        hyperparameters: &Hyperparameters,
        target_results: usize,
        exclude_failure: bool,
        rng: &mut R,
        observer: &mut O,
    ) -> TrainingResult
    where
        E: Clone + Send,
        R: Rng,
        O: TrainingObserver + ?Sized,
    {
        let mut copies: Vec<EnvCopy<E>> = (0..self.training.env_copies)
            .map(|_| EnvCopy {
                experiment: self.clone(),
                agent: Agent::new(self.bank.clone(), hyperparameters),
                history: EpisodeHistory::new(),
                rng: Pcg64::seed_from_u64(rng.random()),
            })
            .collect();
        let mut result = TrainingResult::default();

        loop {
            // every run of a batch can record, so the batch never overshoots the target
            let batch = copies
                .len()
                .min(target_results.saturating_sub(result.episodes.len()))
                .min(self.training.max_runs.saturating_sub(result.attempted_runs));
            if batch == 0 {
                break;
            }

            let mut outcomes = vec![(RunStatus::Failed, 0); batch];
            thread::scope(|s| {
                for (copy, outcome) in copies.iter_mut().zip(&mut outcomes) {
                    s.spawn(move || *outcome = copy.play_run());
                }
            });

            for (status, episodes) in outcomes {
                let report = result.record(status, episodes, exclude_failure);
                observer.run_finished(&report);
            }
        }
        result
    }

    fn play_run<R>(
        &mut self,
        agent: &mut Agent,
        history: &mut EpisodeHistory,
        rng: &mut R,
    ) -> (RunStatus, usize)
    where
        R: Rng,
    {
        agent.new_run(rng);
        history.clear();
        for episode in 0..self.training.max_episodes {
            let last_observation = self.play_episode(agent, history, rng);
            if self.env.is_solved(history, &last_observation) {
                return (RunStatus::Succeeded, episode + 1);
            }
            agent.finish_episode();
        }
        (RunStatus::Failed, self.training.max_episodes)
    }

    /// Plays one episode and records it in `history`. Returns the last
    /// observation.
    fn play_episode<R>(
        &mut self,
        agent: &mut Agent,
        history: &mut EpisodeHistory,
        rng: &mut R,
    ) -> E::Observation
    where
        R: Rng,
    {
        let mut observation = self.env.reset(rng);
        agent.start_episode(self.env.discretize(&observation));
        let mut reward_total = 0.0;

        while agent.turn() < self.training.max_turns {
            let pair = agent.begin_turn(rng);
            let q_action = agent.select_action(rng);
            let mapped = self.env.map_action(q_action);
            let turn = agent.turn();

            let step = self.env.step(mapped.action);
            let next_state = self.env.discretize(&step.observation);
            let reward = self.env.reward(&step.observation, step.terminated, turn);
            agent.learn(pair, q_action, &next_state, reward);

            // mirror update from the pre-step observation; the real simulation stays put
            if self.settings.opposition
                && let Some(opposite) = mapped.opposite
            {
                let mirror = self.env.simulate(&observation, opposite.action);
                let mirror_state = self.env.discretize(&mirror.observation);
                let mirror_reward = self.env.reward(&mirror.observation, mirror.terminated, turn);
                agent.learn(pair, opposite.q_action, &mirror_state, mirror_reward);
            }

            reward_total += reward;
            observation = step.observation;
            agent.advance(next_state);
            if step.terminated {
                break;
            }
        }

        history.push(agent.turn(), reward_total);
        observation
    }
}

/// One independently trained copy of an experiment.
struct EnvCopy<E> {
    experiment: Experiment<E>,
    agent: Agent,
    history: EpisodeHistory,
    rng: Pcg64,
}

impl<E> EnvCopy<E>
where
    E: Environment,
{
    fn play_run(&mut self) -> (RunStatus, usize) {
        let outcome = self
            .experiment
            .play_run(&mut self.agent, &mut self.history, &mut self.rng);
        self.agent.finish_run();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use qlab_env::{MappedAction, OppositeAction, State, Step};
    use rand::{RngCore, SeedableRng as _};
    use rand_pcg::Pcg64;

    use super::*;
    use crate::schedule::Schedule;

    /// A walk on `0..LEN` that terminates at either end and counts real steps.
    #[derive(Debug, Clone)]
    struct Corridor {
        shape: [usize; 1],
        start: usize,
        position: usize,
        step_reward: f64,
        steps: usize,
        solved_after: Option<usize>,
    }

    const LEN: usize = 8;

    impl Corridor {
        fn new(solved_after: Option<usize>) -> Self {
            Self {
                shape: [LEN],
                start: LEN / 2,
                position: LEN / 2,
                step_reward: 0.0,
                steps: 0,
                solved_after,
            }
        }

        fn moved(position: usize, action: usize) -> Step<usize> {
            let observation = if action == 1 {
                position + 1
            } else {
                position - 1
            };
            Step {
                observation,
                terminated: observation == 0 || observation == LEN - 1,
            }
        }
    }

    impl Environment for Corridor {
        type Observation = usize;

        fn state_shape(&self) -> &[usize] {
            &self.shape
        }

        fn action_count(&self) -> usize {
            2
        }

        fn reset(&mut self, _rng: &mut dyn RngCore) -> usize {
            self.position = self.start;
            self.position
        }

        fn step(&mut self, action: usize) -> Step<usize> {
            self.steps += 1;
            let step = Self::moved(self.position, action);
            self.position = step.observation;
            step
        }

        fn simulate(&self, observation: &usize, action: usize) -> Step<usize> {
            Self::moved(*observation, action)
        }

        fn discretize(&self, observation: &usize) -> State {
            State::from_iter([*observation])
        }

        fn map_action(&self, q_action: usize) -> MappedAction {
            MappedAction {
                action: q_action,
                opposite: Some(OppositeAction {
                    q_action: 1 - q_action,
                    action: 1 - q_action,
                }),
            }
        }

        fn reward(&self, observation: &usize, _terminated: bool, _turn: usize) -> f64 {
            if *observation == LEN - 1 {
                1.0
            } else {
                self.step_reward
            }
        }

        fn is_solved(&self, history: &EpisodeHistory, _last: &usize) -> bool {
            self.solved_after
                .is_some_and(|episodes| history.episodes() >= episodes)
        }
    }

    fn hyperparameters() -> Hyperparameters {
        Hyperparameters {
            learning_rate: Schedule::constant(0.5),
            explore_rate: Schedule::new(1.0, 0.1, 0.05),
            discount_factor: Schedule::constant(0.9),
        }
    }

    fn training(max_runs: usize) -> TrainingSettings {
        TrainingSettings {
            max_runs,
            max_episodes: 10,
            max_turns: 30,
            env_copies: 1,
        }
    }

    fn experiment(solved_after: Option<usize>, opposition: bool) -> Experiment<Corridor> {
        let settings = AgentSettings {
            opposition,
            ..AgentSettings::default()
        };
        Experiment::new(Corridor::new(solved_after), settings, training(5)).unwrap()
    }

    fn cells_with_values(bank: &QTableBank) -> BTreeSet<(usize, usize)> {
        let table = bank.table(0);
        let mut cells = BTreeSet::new();
        for state in 0..LEN {
            for action in 0..2 {
                if table.get(&[state], action) != 0.0 {
                    cells.insert((state, action));
                }
            }
        }
        cells
    }

    fn single_turn_cells(opposition: bool) -> (BTreeSet<(usize, usize)>, usize) {
        let mut exp = experiment(None, opposition);
        exp.env.step_reward = 1.0;
        exp.training.max_turns = 1;
        let mut agent = Agent::new(exp.bank.clone(), &hyperparameters());
        let mut history = EpisodeHistory::new();
        let mut rng = Pcg64::seed_from_u64(8);
        agent.new_run(&mut rng);
        exp.play_episode(&mut agent, &mut history, &mut rng);
        (cells_with_values(agent.bank()), exp.env.steps)
    }

    #[test]
    fn opposition_touches_both_actions_while_the_simulation_steps_once() {
        let (cells, steps) = single_turn_cells(true);
        assert_eq!(steps, 1);
        assert_eq!(cells, BTreeSet::from([(LEN / 2, 0), (LEN / 2, 1)]));

        let (cells, steps) = single_turn_cells(false);
        assert_eq!(steps, 1);
        assert_eq!(cells.len(), 1);
        assert!(cells.iter().all(|&(state, _)| state == LEN / 2));
    }

    #[test]
    fn opposition_simulates_from_the_pre_step_observation() {
        let mut exp = experiment(None, true);
        exp.env.start = LEN - 2;
        exp.training.max_turns = 1;
        let mut agent = Agent::new(exp.bank.clone(), &hyperparameters());
        let mut history = EpisodeHistory::new();
        let mut rng = Pcg64::seed_from_u64(8);
        agent.new_run(&mut rng);
        exp.play_episode(&mut agent, &mut history, &mut rng);

        // whichever action was taken, stepping right from LEN - 2 reaches the goal
        let table = agent.bank().table(0);
        assert_eq!(table.get(&[LEN - 2], 1), 0.5);
        assert_eq!(table.get(&[LEN - 2], 0), 0.0);
    }

    #[test]
    fn real_steps_equal_recorded_turns_without_opposition() {
        let mut exp = experiment(None, false);
        let mut agent = Agent::new(exp.bank.clone(), &hyperparameters());
        let mut history = EpisodeHistory::new();
        let mut rng = Pcg64::seed_from_u64(1);
        agent.new_run(&mut rng);
        for _ in 0..5 {
            exp.play_episode(&mut agent, &mut history, &mut rng);
        }
        assert_eq!(exp.env.steps, *history.cumulative_turns().last().unwrap());
    }

    #[test]
    fn real_steps_equal_recorded_turns_with_opposition() {
        let mut exp = experiment(None, true);
        let mut agent = Agent::new(exp.bank.clone(), &hyperparameters());
        let mut history = EpisodeHistory::new();
        let mut rng = Pcg64::seed_from_u64(21);
        agent.new_run(&mut rng);
        for _ in 0..5 {
            exp.play_episode(&mut agent, &mut history, &mut rng);
        }
        assert_eq!(exp.env.steps, *history.cumulative_turns().last().unwrap());
    }

    #[test]
    fn solved_runs_record_episodes_to_solve() {
        let mut exp = experiment(Some(3), false);
        let mut rng = Pcg64::seed_from_u64(2);
        let mut reports = vec![];
        let result = exp.run(&hyperparameters(), 4, false, &mut rng, &mut |r: &RunReport| {
            reports.push(*r);
        });
        assert_eq!(result.episodes, vec![3; 4]);
        assert_eq!(result.attempted_runs, 4);
        assert_eq!(result.failed_runs, 0);
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.status == RunStatus::Succeeded));
        assert_eq!(reports[3].run, 4);
    }

    #[test]
    fn failed_runs_are_padded_or_excluded() {
        let mut rng = Pcg64::seed_from_u64(3);

        let mut exp = experiment(None, false);
        let padded = exp.run(&hyperparameters(), 3, false, &mut rng, &mut ());
        assert_eq!(padded.episodes, vec![10; 3]);
        assert_eq!(padded.failed_runs, 3);

        let mut exp = experiment(None, false);
        let excluded = exp.run(&hyperparameters(), 3, true, &mut rng, &mut ());
        assert!(excluded.episodes.is_empty());
        assert_eq!(excluded.attempted_runs, 5);
        assert_eq!(excluded.failed_runs, 5);
    }

    #[test]
    fn timed_out_episodes_count_full_length() {
        let mut exp = experiment(None, false);
        exp.training.max_turns = 1;
        let mut agent = Agent::new(exp.bank.clone(), &hyperparameters());
        let mut history = EpisodeHistory::new();
        let mut rng = Pcg64::seed_from_u64(6);
        agent.new_run(&mut rng);
        exp.play_episode(&mut agent, &mut history, &mut rng);
        assert_eq!(history.cumulative_turns(), &[0, 1]);
    }

    #[test]
    fn same_seed_reproduces_results() {
        let run = |seed| {
            let mut exp = Experiment::new(
                Corridor::new(None),
                AgentSettings {
                    table_count: 3,
                    table_init: TableInit::Uniform,
                    opposition: true,
                },
                training(2),
            )
            .unwrap();
            let mut agent_rng = Pcg64::seed_from_u64(seed);
            exp.run(&hyperparameters(), 2, false, &mut agent_rng, &mut ());
            exp.env.steps
        };
        assert_eq!(run(17), run(17));
    }

    fn experiment_with_copies(
        solved_after: Option<usize>,
        max_runs: usize,
        env_copies: usize,
    ) -> Experiment<Corridor> {
        let training = TrainingSettings {
            env_copies,
            ..training(max_runs)
        };
        Experiment::new(Corridor::new(solved_after), AgentSettings::default(), training).unwrap()
    }

    #[test]
    fn env_copies_stop_at_the_run_ceiling() {
        let mut exp = experiment_with_copies(None, 5, 3);
        let mut rng = Pcg64::seed_from_u64(4);
        let mut reports = vec![];
        let result = exp.run(&hyperparameters(), 10, true, &mut rng, &mut |r: &RunReport| {
            reports.push(*r);
        });
        assert!(result.episodes.is_empty());
        assert_eq!(result.attempted_runs, 5);
        assert_eq!(result.failed_runs, 5);
        assert_eq!(
            reports.iter().map(|r| r.run).collect::<Vec<_>>(),
            [1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn env_copies_stop_at_the_target() {
        let mut exp = experiment_with_copies(Some(3), 20, 4);
        let mut rng = Pcg64::seed_from_u64(5);
        let result = exp.run(&hyperparameters(), 6, false, &mut rng, &mut ());
        assert_eq!(result.episodes, vec![3; 6]);
        assert_eq!(result.attempted_runs, 6);
        assert_eq!(result.failed_runs, 0);
    }

    #[test]
    fn env_copies_are_seeded_from_the_callers_rng() {
        let mut exp = experiment_with_copies(Some(2), 4, 3);
        let mut rng = Pcg64::seed_from_u64(9);
        exp.run(&hyperparameters(), 4, false, &mut rng, &mut ());

        let mut expected = Pcg64::seed_from_u64(9);
        for _ in 0..3 {
            let _: u64 = expected.random();
        }
        assert_eq!(rng.random::<u64>(), expected.random::<u64>());
        // the copies own their environments
        assert_eq!(exp.env.steps, 0);
    }

    #[test]
    fn rejects_empty_budgets() {
        let err = Experiment::new(
            Corridor::new(None),
            AgentSettings::default(),
            TrainingSettings {
                max_runs: 1,
                max_episodes: 0,
                max_turns: 1,
                env_copies: 1,
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            AgentConfigError::EmptyBudget {
                name: "max_episodes"
            }
        );

        let err = Experiment::new(
            Corridor::new(None),
            AgentSettings::default(),
            TrainingSettings {
                env_copies: 0,
                ..training(1)
            },
        )
        .unwrap_err();
        assert_eq!(err, AgentConfigError::EmptyBudget { name: "env_copies" });
    }
}
