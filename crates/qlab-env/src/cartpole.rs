use std::f64::consts::PI;

use rand::{Rng as _, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    Bucketizer, EnvConfigError, Environment, EpisodeHistory, MappedAction, OppositeAction, State,
    Step,
};

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
const HALF_LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * HALF_LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;

const X_THRESHOLD: f64 = 2.4;
const THETA_THRESHOLD: f64 = PI / 15.0;

const STATE_BOUNDS: [(f64, f64); 4] = [
    (-4.8, 4.8),
    (-0.5, 0.5),
    (-24.0 * PI / 180.0, 24.0 * PI / 180.0),
    (-50.0 * PI / 180.0, 50.0 * PI / 180.0),
];

/// Average episode length a run must reach to count as balanced.
pub const CARTPOLE_SOLVED_TURNS: f64 = 195.0;

/// Cart position, cart velocity, pole angle, pole angular velocity.
pub type CartPoleObservation = [f64; 4];

/// Reward signals available for the cart-pole task.
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
pub enum CartPoleReward {
    /// Constant reward of 1 per turn.
    #[default]
    Base,
    /// 1 per turn, -1 when the pole falls or is about to.
    Termination,
    /// Grows exponentially with the turn index.
    Time,
    /// Linear in the pole's predicted distance from the failure angle.
    Uniform,
    /// Exponential in the same angle margin.
    Exponential,
    /// Logarithmic in the same angle margin.
    Logarithmic,
}

impl CartPoleReward {
    #[expect(clippy::cast_precision_loss)]
    fn reward(self, observation: &CartPoleObservation, terminated: bool, turn: usize) -> f64 {
        match self {
            Self::Base => 1.0,
            Self::Termination => {
                if terminated || future_angle(observation).1 {
                    -1.0
                } else {
                    1.0
                }
            }
            Self::Time => (turn as f64 / 100.0).exp(),
            Self::Uniform => 10.0 * angle_margin(observation),
            Self::Exponential => 10.0 * (angle_margin(observation) - 1.0).exp(),
            Self::Logarithmic => 10.0 * angle_margin(observation).ln_1p(),
        }
    }
}

/// Pole angle one tick ahead, and whether that angle is past the failure threshold.
fn future_angle(observation: &CartPoleObservation) -> (f64, bool) {
    let [_, _, angle, velocity] = *observation;
    let next = angle + TAU * velocity;
    (next, !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&next))
}

fn angle_margin(observation: &CartPoleObservation) -> f64 {
    let (angle, _) = future_angle(observation);
    f64::max(THETA_THRESHOLD - angle.abs(), 0.0)
}

/// Classic cart-pole balancing task with two actions (push left, push right).
#[derive(Debug, Clone)]
pub struct CartPole {
    bucketizer: Bucketizer,
    reward: CartPoleReward,
    state: CartPoleObservation,
}

impl CartPole {
    /// Default bucket counts: position and velocity ignored, six angle and seven angular-velocity buckets.
    pub const DEFAULT_BUCKETS: [usize; 4] = [1, 1, 6, 7];

    pub fn new(buckets: &[usize], reward: CartPoleReward) -> Result<Self, EnvConfigError> {
        Ok(Self {
            bucketizer: Bucketizer::new(&STATE_BOUNDS, buckets)?,
            reward,
            state: [0.0; 4],
        })
    }

    #[must_use]
    pub fn reward_kind(&self) -> CartPoleReward {
        self.reward
    }

    fn dynamics(state: &CartPoleObservation, action: usize) -> Step<CartPoleObservation> {
        let [x, x_dot, theta, theta_dot] = *state;
        let force = if action == 1 { FORCE_MAG } else { -FORCE_MAG };
        let (sin_theta, cos_theta) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot.powi(2) * sin_theta) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (HALF_LENGTH * (4.0 / 3.0 - MASS_POLE * cos_theta.powi(2) / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

        let observation = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
        let terminated = !(-X_THRESHOLD..=X_THRESHOLD).contains(&observation[0])
            || !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&observation[2]);
        Step {
            observation,
            terminated,
        }
    }
}

impl Environment for CartPole {
    type Observation = CartPoleObservation;

    fn state_shape(&self) -> &[usize] {
        self.bucketizer.shape()
    }

    fn action_count(&self) -> usize {
        2
    }

    fn reset(&mut self, rng: &mut dyn RngCore) -> CartPoleObservation {
        self.state = std::array::from_fn(|_| rng.random_range(-0.05..0.05));
        self.state
    }

    fn step(&mut self, action: usize) -> Step<CartPoleObservation> {
        let step = Self::dynamics(&self.state, action);
        self.state = step.observation;
        step
    }

    fn simulate(&self, observation: &CartPoleObservation, action: usize) -> Step<CartPoleObservation> {
        Self::dynamics(observation, action)
    }

    fn discretize(&self, observation: &CartPoleObservation) -> State {
        self.bucketizer.bucketize(observation)
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

    fn reward(&self, observation: &CartPoleObservation, terminated: bool, turn: usize) -> f64 {
        self.reward.reward(observation, terminated, turn)
    }

    fn is_solved(&self, history: &EpisodeHistory, _last_observation: &CartPoleObservation) -> bool {
        history
            .average_turns()
            .is_some_and(|avg| avg >= CARTPOLE_SOLVED_TURNS)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn reset_stays_near_upright() {
        let mut env = CartPole::new(&CartPole::DEFAULT_BUCKETS, CartPoleReward::Base).unwrap();
        let mut rng = Pcg64::seed_from_u64(7);
        let obs = env.reset(&mut rng);
        assert!(obs.iter().all(|v| v.abs() < 0.05));
    }

    #[test]
    fn pushing_one_way_eventually_drops_the_pole() {
        let mut env = CartPole::new(&CartPole::DEFAULT_BUCKETS, CartPoleReward::Base).unwrap();
        let mut rng = Pcg64::seed_from_u64(1);
        env.reset(&mut rng);
        let terminated_at = (1..=200).find(|_| env.step(1).terminated);
        assert!(terminated_at.is_some_and(|turn| turn < 100));
    }

    #[test]
    fn simulate_does_not_advance_the_real_state() {
        let mut env = CartPole::new(&CartPole::DEFAULT_BUCKETS, CartPoleReward::Base).unwrap();
        let mut rng = Pcg64::seed_from_u64(3);
        let obs = env.reset(&mut rng);
        let lookahead = env.simulate(&obs, 0);
        let real = env.step(1);
        assert_ne!(lookahead.observation, real.observation);
        assert_eq!(env.simulate(&obs, 1), real);
    }

    #[test]
    fn opposite_action_is_an_involution() {
        let env = CartPole::new(&CartPole::DEFAULT_BUCKETS, CartPoleReward::Base).unwrap();
        for a in 0..2 {
            let opposite = env.map_action(a).opposite.unwrap();
            let back = env.map_action(opposite.q_action).opposite.unwrap();
            assert_eq!(back.q_action, a);
        }
    }

    #[test]
    fn termination_reward_penalizes_predicted_fall() {
        let falling = [0.0, 0.0, 0.2, 2.0];
        let upright = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(CartPoleReward::Termination.reward(&falling, false, 1), -1.0);
        assert_eq!(CartPoleReward::Termination.reward(&upright, false, 1), 1.0);
        assert_eq!(CartPoleReward::Termination.reward(&upright, true, 1), -1.0);
    }

    #[test]
    fn angle_rewards_peak_when_upright() {
        let upright = [0.0; 4];
        let tilted = [0.0, 0.0, 0.1, 0.0];
        for kind in [
            CartPoleReward::Uniform,
            CartPoleReward::Exponential,
            CartPoleReward::Logarithmic,
        ] {
            assert!(kind.reward(&upright, false, 1) > kind.reward(&tilted, false, 1));
        }
    }

    #[test]
    fn reward_kind_parses_from_name() {
        assert_eq!(
            "Logarithmic".parse::<CartPoleReward>().unwrap(),
            CartPoleReward::Logarithmic
        );
        assert!("Velocity".parse::<CartPoleReward>().is_err());
    }

    #[test]
    fn solved_once_rolling_average_reaches_threshold() {
        let env = CartPole::new(&CartPole::DEFAULT_BUCKETS, CartPoleReward::Base).unwrap();
        let mut history = EpisodeHistory::new();
        history.push(150, 150.0);
        assert!(!env.is_solved(&history, &[0.0; 4]));
        history.push(240, 240.0);
        assert!(env.is_solved(&history, &[0.0; 4]));
    }
}
