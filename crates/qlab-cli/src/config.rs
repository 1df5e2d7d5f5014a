//! Experiment configuration files and per-environment defaults.

use anyhow::Context as _;
use qlab_agent::{
    experiment::{AgentSettings, TrainingSettings},
    q_table::TableInit,
    schedule::{Hyperparameters, Schedule},
};
use qlab_env::{Acrobot, AcrobotReward, CartPole, CartPoleReward, EnvConfigError};
use qlab_stats::summary::Baseline;
use qlab_training::genetic::GeneticParams;
use serde::{Deserialize, Serialize};

#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::FromStr,
)]
pub enum EnvKind {
    #[default]
    CartPole,
    Acrobot,
}

/// Which environment to train against, and how it is discretized and rewarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum EnvironmentConfig {
    CartPole {
        buckets: Vec<usize>,
        reward: CartPoleReward,
    },
    Acrobot {
        buckets: Vec<usize>,
        action_count: usize,
        reward: AcrobotReward,
    },
}

#[derive(Debug, Clone)]
pub enum BuiltEnvironment {
    CartPole(CartPole),
    Acrobot(Acrobot),
}

impl EnvironmentConfig {
    pub fn build(&self) -> Result<BuiltEnvironment, EnvConfigError> {
        let env = match self {
            Self::CartPole { buckets, reward } => {
                BuiltEnvironment::CartPole(CartPole::new(buckets, *reward)?)
            }
            Self::Acrobot {
                buckets,
                action_count,
                reward,
            } => BuiltEnvironment::Acrobot(Acrobot::new(buckets, *action_count, *reward)?),
        };
        Ok(env)
    }

    /// Replaces the reward kind with the one named, parsed for this
    /// environment.
    pub fn set_reward(&mut self, name: &str) -> anyhow::Result<()> {
        match self {
            Self::CartPole { reward, .. } => {
                *reward = name
                    .parse()
                    .with_context(|| format!("unknown cart-pole reward `{name}`"))?;
            }
            Self::Acrobot { reward, .. } => {
                *reward = name
                    .parse()
                    .with_context(|| format!("unknown acrobot reward `{name}`"))?;
            }
        }
        Ok(())
    }
}

/// Everything an `experiment` or `tune` invocation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub environment: EnvironmentConfig,
    pub seed: u64,
    pub training: TrainingSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    pub hyperparameters: Hyperparameters,
    /// Recorded results an experiment collects before stopping.
    pub runs: usize,
    pub baseline: Baseline,
    #[serde(default = "default_tuning")]
    pub tuning: GeneticParams,
    /// Training runs behind one chromosome's fitness.
    pub fitness_runs: usize,
}

const DEFAULT_SEED: u64 = 20_313_854;
const DEFAULT_MAX_RUNS: usize = 50;
const DEFAULT_RUNS: usize = 30;
const DEFAULT_CONFIDENCE: f64 = 0.99;

const DEFAULT_HYPERPARAMETERS: Hyperparameters = Hyperparameters {
    learning_rate: Schedule::new(0.9, 0.1, 0.004),
    explore_rate: Schedule::new(0.5, 0.01, 0.002),
    discount_factor: Schedule::new(0.9, 0.99, 0.001),
};

const DEFAULT_TUNING: GeneticParams = GeneticParams {
    population_size: 10,
    generations: 50,
    elite_count: 2,
    best_count: 10,
    crossover_rate: 0.75,
    mutation_rate: 0.05,
    single_point_prob: 0.5,
    tournament_prob: 0.5,
};

fn default_tuning() -> GeneticParams {
    DEFAULT_TUNING
}

impl ExperimentConfig {
    #[must_use]
    pub fn defaults(env: EnvKind) -> Self {
        let (environment, max_episodes, baseline_mean, baseline_std_dev) = match env {
            EnvKind::CartPole => (
                EnvironmentConfig::CartPole {
                    buckets: CartPole::DEFAULT_BUCKETS.to_vec(),
                    reward: CartPoleReward::Base,
                },
                200,
                257.27,
                14.94,
            ),
            EnvKind::Acrobot => (
                EnvironmentConfig::Acrobot {
                    buckets: Acrobot::DEFAULT_BUCKETS.to_vec(),
                    action_count: 3,
                    reward: AcrobotReward::Base,
                },
                500,
                293.87,
                36.64,
            ),
        };
        Self {
            environment,
            seed: DEFAULT_SEED,
            training: TrainingSettings {
                max_runs: DEFAULT_MAX_RUNS,
                max_episodes,
                max_turns: 500,
                env_copies: 1,
            },
            agent: AgentSettings {
                table_count: 1,
                table_init: TableInit::Zeros,
                opposition: false,
            },
            hyperparameters: DEFAULT_HYPERPARAMETERS,
            runs: DEFAULT_RUNS,
            baseline: Baseline {
                confidence_level: DEFAULT_CONFIDENCE,
                mean: baseline_mean,
                std_dev: baseline_std_dev,
                size: 30,
            },
            tuning: DEFAULT_TUNING,
            fitness_runs: 1,
        }
    }

    /// Checks the settings no library constructor sees.
    pub fn validate(&self) -> anyhow::Result<()> {
        let Baseline {
            confidence_level,
            size,
            ..
        } = self.baseline;
        anyhow::ensure!(
            confidence_level > 0.0 && confidence_level < 1.0,
            "baseline confidence level must be between 0 and 1 (exclusive), got {confidence_level}"
        );
        anyhow::ensure!(
            size >= 2,
            "baseline sample size must be at least 2, got {size}"
        );
        anyhow::ensure!(self.runs > 0, "runs must be at least 1");
        anyhow::ensure!(self.fitness_runs > 0, "fitness_runs must be at least 1");
        self.tuning.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use qlab_env::Environment as _;

    use super::*;

    #[test]
    fn defaults_are_valid_and_buildable() {
        for kind in [EnvKind::CartPole, EnvKind::Acrobot] {
            let config = ExperimentConfig::defaults(kind);
            config.validate().unwrap();
            config.environment.build().unwrap();
        }
    }

    #[test]
    fn default_environments_match_their_kind() {
        let BuiltEnvironment::CartPole(env) = ExperimentConfig::defaults(EnvKind::CartPole)
            .environment
            .build()
            .unwrap()
        else {
            panic!("expected cart-pole");
        };
        assert_eq!(env.action_count(), 2);
        assert_eq!(env.state_shape(), &[1, 1, 6, 7]);

        let BuiltEnvironment::Acrobot(env) = ExperimentConfig::defaults(EnvKind::Acrobot)
            .environment
            .build()
            .unwrap()
        else {
            panic!("expected acrobot");
        };
        assert_eq!(env.action_count(), 3);
    }

    #[test]
    fn env_kind_parses_lowercase_names() {
        assert_eq!("cartpole".parse::<EnvKind>().unwrap(), EnvKind::CartPole);
        assert_eq!("acrobot".parse::<EnvKind>().unwrap(), EnvKind::Acrobot);
        assert!("pendulum".parse::<EnvKind>().is_err());
    }

    #[test]
    fn config_file_round_trips() {
        let config = ExperimentConfig::defaults(EnvKind::Acrobot);
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains(r#""name": "acrobot""#));
        let parsed: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn agent_and_tuning_sections_are_optional() {
        let mut value = serde_json::to_value(ExperimentConfig::defaults(EnvKind::CartPole)).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("agent");
        object.remove("tuning");
        let parsed: ExperimentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.agent, AgentSettings::default());
        assert_eq!(parsed.tuning, DEFAULT_TUNING);
        assert_ne!(parsed.tuning, GeneticParams::default());
    }

    #[test]
    fn env_copies_default_to_one() {
        let mut value = serde_json::to_value(ExperimentConfig::defaults(EnvKind::Acrobot)).unwrap();
        value["training"]
            .as_object_mut()
            .unwrap()
            .remove("env_copies");
        let parsed: ExperimentConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.training.env_copies, 1);
    }

    #[test]
    fn rejects_unusable_baselines() {
        let mut config = ExperimentConfig::defaults(EnvKind::CartPole);
        config.baseline.confidence_level = 1.0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::defaults(EnvKind::CartPole);
        config.baseline.size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_tuning() {
        let mut config = ExperimentConfig::defaults(EnvKind::CartPole);
        config.tuning.elite_count = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rewards_are_parsed_for_the_configured_environment() {
        let mut config = ExperimentConfig::defaults(EnvKind::Acrobot).environment;
        config.set_reward("Height").unwrap();
        assert!(matches!(config, EnvironmentConfig::Acrobot {
            reward: AcrobotReward::Height,
            ..
        }));

        let mut config = ExperimentConfig::defaults(EnvKind::CartPole).environment;
        let err = config.set_reward("Height").unwrap_err();
        assert!(err.to_string().contains("cart-pole"));
        config.set_reward("Logarithmic").unwrap();
        assert!(matches!(config, EnvironmentConfig::CartPole {
            reward: CartPoleReward::Logarithmic,
            ..
        }));
    }

    #[test]
    fn invalid_buckets_fail_to_build() {
        let config = EnvironmentConfig::CartPole {
            buckets: vec![1, 1, 6],
            reward: CartPoleReward::Base,
        };
        assert!(config.build().is_err());
    }
}
