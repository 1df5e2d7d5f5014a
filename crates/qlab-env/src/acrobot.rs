use std::f64::consts::PI;

use rand::{Rng as _, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    Bucketizer, EnvConfigError, Environment, EpisodeHistory, MappedAction, OppositeAction, State,
    Step,
};

const LINK_LENGTH_1: f64 = 1.0;
const LINK_MASS_1: f64 = 1.0;
const LINK_MASS_2: f64 = 1.0;
const LINK_COM_POS_1: f64 = 0.5;
const LINK_COM_POS_2: f64 = 0.5;
const LINK_MOI: f64 = 1.0;
const GRAVITY: f64 = 9.8;
const DT: f64 = 0.2;

const MAX_VEL_1: f64 = 4.0 * PI;
const MAX_VEL_2: f64 = 9.0 * PI;
const AVAILABLE_TORQUE: [f64; 3] = [-1.0, 0.0, 1.0];

const STATE_BOUNDS: [(f64, f64); 6] = [
    (-1.0, 1.0),
    (-1.0, 1.0),
    (-1.0, 1.0),
    (-1.0, 1.0),
    (-MAX_VEL_1, MAX_VEL_1),
    (-MAX_VEL_2, MAX_VEL_2),
];

/// Average episode length a run must get down to for the swing-up to count as learned.
pub const ACROBOT_SOLVED_TURNS: f64 = 195.0;

/// `cos θ1, sin θ1, cos θ2, sin θ2, θ1', θ2'`.
pub type AcrobotObservation = [f64; 6];

/// Reward signals available for the acrobot task.
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
pub enum AcrobotReward {
    /// -1 per turn until the tip crosses the line.
    #[default]
    Base,
    /// Penalty growing exponentially with the turn index.
    Time,
    /// Rewards combined joint speed.
    Velocity,
    /// Rewards tip height.
    Height,
}

impl AcrobotReward {
    #[expect(clippy::cast_precision_loss)]
    fn reward(self, observation: &AcrobotObservation, terminated: bool, turn: usize) -> f64 {
        if terminated {
            return 0.0;
        }
        let o = observation;
        match self {
            Self::Base => -1.0,
            Self::Time => -(turn as f64 / 200.0).exp(),
            Self::Velocity => (o[4] + o[5]).abs() - 13.0 * PI,
            Self::Height => o[1] * o[3] - o[0] * (o[2] + 1.0) - 2.0,
        }
    }
}

/// Two-link underactuated pendulum that must swing its tip above a line.
///
/// With three agent actions the torques are `-1, 0, +1`; with two the agent
/// only chooses between `-1` and `+1`.
#[derive(Debug, Clone)]
pub struct Acrobot {
    bucketizer: Bucketizer,
    action_count: usize,
    reward: AcrobotReward,
    state: [f64; 4],
}

impl Acrobot {
    pub const DEFAULT_BUCKETS: [usize; 6] = [1, 1, 1, 1, 10, 10];
    pub const SUPPORTED_ACTION_COUNTS: &'static [usize] = &[2, 3];

    pub fn new(
        buckets: &[usize],
        action_count: usize,
        reward: AcrobotReward,
    ) -> Result<Self, EnvConfigError> {
        if !Self::SUPPORTED_ACTION_COUNTS.contains(&action_count) {
            return Err(EnvConfigError::ActionCount {
                actual: action_count,
                expected: Self::SUPPORTED_ACTION_COUNTS,
            });
        }
        Ok(Self {
            bucketizer: Bucketizer::new(&STATE_BOUNDS, buckets)?,
            action_count,
            reward,
            state: [0.0; 4],
        })
    }

    #[must_use]
    pub fn reward_kind(&self) -> AcrobotReward {
        self.reward
    }

    fn observe(state: &[f64; 4]) -> AcrobotObservation {
        let [t1, t2, dt1, dt2] = *state;
        [t1.cos(), t1.sin(), t2.cos(), t2.sin(), dt1, dt2]
    }

    fn unobserve(observation: &AcrobotObservation) -> [f64; 4] {
        let [c1, s1, c2, s2, dt1, dt2] = *observation;
        [s1.atan2(c1), s2.atan2(c2), dt1, dt2]
    }

    fn dynamics(state: &[f64; 4], action: usize) -> ([f64; 4], bool) {
        let torque = AVAILABLE_TORQUE[action];
        let mut next = rk4(state, torque);
        next[0] = wrap(next[0]);
        next[1] = wrap(next[1]);
        next[2] = next[2].clamp(-MAX_VEL_1, MAX_VEL_1);
        next[3] = next[3].clamp(-MAX_VEL_2, MAX_VEL_2);
        let terminated = -next[0].cos() - (next[1] + next[0]).cos() > 1.0;
        (next, terminated)
    }
}

fn wrap(mut x: f64) -> f64 {
    while x > PI {
        x -= 2.0 * PI;
    }
    while x < -PI {
        x += 2.0 * PI;
    }
    x
}

fn derivatives(s: &[f64; 4], torque: f64) -> [f64; 4] {
    let (m1, m2) = (LINK_MASS_1, LINK_MASS_2);
    let (l1, lc1, lc2) = (LINK_LENGTH_1, LINK_COM_POS_1, LINK_COM_POS_2);
    let (i1, i2) = (LINK_MOI, LINK_MOI);
    let g = GRAVITY;
    let [theta1, theta2, dtheta1, dtheta2] = *s;

    let d1 = m1 * lc1.powi(2)
        + m2 * (l1.powi(2) + lc2.powi(2) + 2.0 * l1 * lc2 * theta2.cos())
        + i1
        + i2;
    let d2 = m2 * (lc2.powi(2) + l1 * lc2 * theta2.cos()) + i2;
    let phi2 = m2 * lc2 * g * (theta1 + theta2 - PI / 2.0).cos();
    let phi1 = -m2 * l1 * lc2 * dtheta2.powi(2) * theta2.sin()
        - 2.0 * m2 * l1 * lc2 * dtheta2 * dtheta1 * theta2.sin()
        + (m1 * lc1 + m2 * l1) * g * (theta1 - PI / 2.0).cos()
        + phi2;
    let ddtheta2 = (torque + d2 / d1 * phi1 - m2 * l1 * lc2 * dtheta1.powi(2) * theta2.sin() - phi2)
        / (m2 * lc2.powi(2) + i2 - d2.powi(2) / d1);
    let ddtheta1 = -(d2 * ddtheta2 + phi1) / d1;

    [dtheta1, dtheta2, ddtheta1, ddtheta2]
}

/// One fourth-order Runge-Kutta step of length [`DT`].
fn rk4(y0: &[f64; 4], torque: f64) -> [f64; 4] {
    let offset = |y: &[f64; 4], k: &[f64; 4], h: f64| -> [f64; 4] {
        std::array::from_fn(|i| y[i] + h * k[i])
    };
    let k1 = derivatives(y0, torque);
    let k2 = derivatives(&offset(y0, &k1, DT / 2.0), torque);
    let k3 = derivatives(&offset(y0, &k2, DT / 2.0), torque);
    let k4 = derivatives(&offset(y0, &k3, DT), torque);
    std::array::from_fn(|i| y0[i] + DT / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
}

impl Environment for Acrobot {
    type Observation = AcrobotObservation;

    fn state_shape(&self) -> &[usize] {
        self.bucketizer.shape()
    }

    fn action_count(&self) -> usize {
        self.action_count
    }

    fn reset(&mut self, rng: &mut dyn RngCore) -> AcrobotObservation {
        self.state = std::array::from_fn(|_| rng.random_range(-0.1..0.1));
        Self::observe(&self.state)
    }

    fn step(&mut self, action: usize) -> Step<AcrobotObservation> {
        let (next, terminated) = Self::dynamics(&self.state, action);
        self.state = next;
        Step {
            observation: Self::observe(&next),
            terminated,
        }
    }

    fn simulate(&self, observation: &AcrobotObservation, action: usize) -> Step<AcrobotObservation> {
        let (next, terminated) = Self::dynamics(&Self::unobserve(observation), action);
        Step {
            observation: Self::observe(&next),
            terminated,
        }
    }

    fn discretize(&self, observation: &AcrobotObservation) -> State {
        self.bucketizer.bucketize(observation)
    }

    fn map_action(&self, q_action: usize) -> MappedAction {
        let two_actions = self.action_count == 2;
        let action = if two_actions { q_action * 2 } else { q_action };
        let opposite = (action != 1).then(|| OppositeAction {
            q_action: if two_actions { 1 - q_action } else { 2 - q_action },
            action: 2 - action,
        });
        MappedAction { action, opposite }
    }

    fn reward(&self, observation: &AcrobotObservation, terminated: bool, turn: usize) -> f64 {
        self.reward.reward(observation, terminated, turn)
    }

    fn is_solved(&self, history: &EpisodeHistory, _last_observation: &AcrobotObservation) -> bool {
        history
            .average_turns()
            .is_some_and(|avg| avg <= ACROBOT_SOLVED_TURNS)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    fn acrobot(action_count: usize) -> Acrobot {
        Acrobot::new(&Acrobot::DEFAULT_BUCKETS, action_count, AcrobotReward::Base).unwrap()
    }

    #[test]
    fn rejects_unsupported_action_count() {
        assert!(matches!(
            Acrobot::new(&Acrobot::DEFAULT_BUCKETS, 4, AcrobotReward::Base),
            Err(EnvConfigError::ActionCount { actual: 4, .. })
        ));
    }

    #[test]
    fn hanging_at_rest_stays_at_rest() {
        let next = rk4(&[0.0; 4], 0.0);
        assert!(next.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn observation_round_trips_through_angles() {
        let state = [0.3, -1.2, 0.5, -0.7];
        let back = Acrobot::unobserve(&Acrobot::observe(&state));
        for (a, b) in state.iter().zip(back) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn simulate_matches_step_from_same_state() {
        let mut env = acrobot(3);
        let mut rng = Pcg64::seed_from_u64(11);
        let obs = env.reset(&mut rng);
        let lookahead = env.simulate(&obs, 2);
        let real = env.step(2);
        assert_eq!(lookahead.terminated, real.terminated);
        for (a, b) in lookahead.observation.iter().zip(real.observation) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn three_action_mapping_pairs_opposite_torques() {
        let env = acrobot(3);
        assert_eq!(
            env.map_action(0).opposite,
            Some(OppositeAction {
                q_action: 2,
                action: 2
            })
        );
        assert_eq!(env.map_action(1).opposite, None);
        assert_eq!(env.map_action(2).opposite.unwrap().q_action, 0);
    }

    #[test]
    fn two_action_mapping_skips_zero_torque() {
        let env = acrobot(2);
        let first = env.map_action(0);
        let second = env.map_action(1);
        assert_eq!((first.action, second.action), (0, 2));
        assert_eq!(
            first.opposite,
            Some(OppositeAction {
                q_action: 1,
                action: 2
            })
        );
        assert_eq!(second.opposite.unwrap().q_action, 0);
    }

    #[test]
    fn rewards_vanish_on_termination() {
        let obs = [1.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        for kind in [
            AcrobotReward::Base,
            AcrobotReward::Time,
            AcrobotReward::Velocity,
            AcrobotReward::Height,
        ] {
            assert_eq!(kind.reward(&obs, true, 10), 0.0);
            assert!(kind.reward(&obs, false, 10) < 0.0);
        }
    }

    #[test]
    fn solved_when_swing_up_gets_fast() {
        let env = acrobot(3);
        let mut history = EpisodeHistory::new();
        history.push(500, -500.0);
        assert!(!env.is_solved(&history, &[0.0; 6]));
        for _ in 0..4 {
            history.push(100, -100.0);
        }
        assert!(env.is_solved(&history, &[0.0; 6]));
    }
}
