//! Control environments consumed by the Q-learning training loop.
//!
//! The training loop never looks inside a simulator. It only needs the shape
//! described by the [`Environment`] trait:
//!
//! - [`Environment::reset`] / [`Environment::step`] drive the real simulation
//! - [`Environment::simulate`] is a pure one-step lookahead (used for opposition learning)
//! - [`Environment::discretize`] maps an observation onto a Q-table [`State`]
//! - [`Environment::map_action`] resolves a Q-table action and its opposite
//! - [`Environment::reward`] and [`Environment::is_solved`] define the task
//!
//! Two classic control tasks are provided: [`CartPole`] and [`Acrobot`]. Both
//! discretize through a [`Bucketizer`] and judge success with the rolling
//! average kept in [`EpisodeHistory`].
//!
//! # Example
//!
//! ```
//! use qlab_env::{CartPole, CartPoleReward, Environment};
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg64;
//!
//! let mut rng = Pcg64::seed_from_u64(0);
//! let mut env = CartPole::new(&[1, 1, 6, 7], CartPoleReward::Base).unwrap();
//!
//! let observation = env.reset(&mut rng);
//! let state = env.discretize(&observation);
//! assert_eq!(state.len(), 4);
//!
//! let step = env.step(env.map_action(1).action);
//! assert!(!step.terminated);
//! ```

pub use self::{acrobot::*, cartpole::*, environment::*, history::*, state::*};

mod acrobot;
mod cartpole;
mod environment;
mod history;
mod state;

/// Error raised when an environment is configured with settings it cannot honor.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum EnvConfigError {
    #[display("invalid state buckets: {_0}")]
    Bucket(BucketError),
    #[display("unsupported action count {actual} (expected one of {expected:?})")]
    #[from(ignore)]
    ActionCount {
        actual: usize,
        expected: &'static [usize],
    },
}
