use std::fmt;

use rand::RngCore;

use crate::{EpisodeHistory, State};

/// Outcome of advancing a simulation by one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O> {
    pub observation: O,
    pub terminated: bool,
}

/// A Q-table action resolved into the action the simulator understands.
///
/// Environments whose simulator action space differs from the agent's (e.g.
/// an agent with two actions driving a three-torque acrobot) translate here.
/// The opposite action, when the environment defines one, carries both
/// indices: `q_action` addresses the Q-table cell, `action` drives the
/// lookahead simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedAction {
    pub action: usize,
    pub opposite: Option<OppositeAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OppositeAction {
    pub q_action: usize,
    pub action: usize,
}

/// A discrete-action control task the training loop can learn against.
pub trait Environment {
    /// Raw continuous observation produced by the simulator.
    type Observation: Clone + fmt::Debug;

    /// Number of buckets along each observation dimension.
    fn state_shape(&self) -> &[usize];

    /// Number of actions the agent chooses between.
    fn action_count(&self) -> usize;

    /// Starts a new episode and returns its initial observation.
    fn reset(&mut self, rng: &mut dyn RngCore) -> Self::Observation;

    /// Advances the real simulation by one action.
    fn step(&mut self, action: usize) -> Step<Self::Observation>;

    /// Computes the step that `action` would produce from `observation`,
    /// without touching the real simulation state.
    fn simulate(&self, observation: &Self::Observation, action: usize) -> Step<Self::Observation>;

    /// Maps an observation onto its Q-table bucket tuple.
    fn discretize(&self, observation: &Self::Observation) -> State;

    /// Resolves a Q-table action into a simulator action and its opposite.
    fn map_action(&self, q_action: usize) -> MappedAction;

    /// Reward for arriving at `observation` on the given (1-based) turn.
    fn reward(&self, observation: &Self::Observation, terminated: bool, turn: usize) -> f64;

    /// Whether the run is solved, judged after each finished episode.
    fn is_solved(&self, history: &EpisodeHistory, last_observation: &Self::Observation) -> bool;
}
