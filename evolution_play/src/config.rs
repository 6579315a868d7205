//! Model configuration
//!
//! The configuration is a flat record loaded from TOML. Field names follow the
//! historical experiment files (`allowplay`, `sample_freq`, `R`, ...) so that
//! existing parameter sets load unchanged and merge into output records under
//! the same keys.

use crate::Outcome;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid {name} distribution: {source}")]
    Distribution {
        name: &'static str,
        source: rand_distr::NormalError,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// The `noise` field: a probability, or a legacy string marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoiseSetting {
    Probability(f64),
    Label(String),
}

/// The `noisetype` field: a channel name, or the legacy numeric placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoiseType {
    Channel(String),
    Legacy(f64),
}

/// Where noise enters an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseChannel {
    /// Outcomes are misperceived during the affect update
    Percept,
    /// Cooperation choices are flipped before the outcome is resolved
    Action,
}

/// Decision gate applied to a phenotype value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionPolicy {
    #[serde(rename = "piece-wise")]
    PieceWise,
    #[serde(rename = "smooth")]
    Smooth,
}

fn default_discrete_buckets() -> usize {
    4
}

fn default_min_geno() -> f64 {
    -1.0
}

fn default_max_geno() -> f64 {
    1.0
}

/// Fully resolved model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub population: usize,
    pub iterations: usize,
    /// Fraction of the population replaced each iteration
    pub deaths: f64,
    /// Standard deviation of mutation around the parent's genotype
    pub mutation: f64,
    pub noise: NoiseSetting,
    pub noisetype: NoiseType,

    pub playcost: f64,
    pub deceitcost: f64,
    pub divorcecost: f64,

    pub allowplay: bool,
    pub allowdeceit: bool,
    pub allowdivorce: bool,
    pub emotions: bool,

    pub replicas: usize,
    pub sample_freq: usize,
    pub top_n: usize,
    pub log_genotypes: bool,

    #[serde(rename = "R")]
    pub reward: f64,
    #[serde(rename = "T")]
    pub temptation: f64,
    #[serde(rename = "P")]
    pub punishment: f64,
    #[serde(rename = "S")]
    pub sucker: f64,

    pub std_dev_initial_trait_value: f64,
    pub initial_trait_value: f64,
    pub sigmoid: DecisionPolicy,

    // Genotype representation
    #[serde(default = "default_discrete_buckets")]
    pub discrete_buckets: usize,
    #[serde(default = "default_min_geno")]
    pub min_geno: f64,
    #[serde(default = "default_max_geno")]
    pub max_geno: f64,

    /// Reproduce the historical behaviour where an agent left without a
    /// partner at the end of a pairing round disappears from the population
    #[serde(default)]
    pub drop_unmatched_agent: bool,

    /// Seed of replica 0; replica `i` uses `base_seed + i`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_seed: Option<u64>,
}

impl ModelConfig {
    /// The configuration used for the published experiments
    pub fn baseline() -> Self {
        ModelConfig {
            population: 500,
            iterations: 100_000,
            deaths: 0.01,
            mutation: 0.04,
            noise: NoiseSetting::Label("percept".to_string()),
            noisetype: NoiseType::Legacy(0.0),
            playcost: 0.0,
            deceitcost: 16.0,
            divorcecost: 1.0,
            allowplay: true,
            allowdeceit: true,
            allowdivorce: true,
            emotions: true,
            replicas: 14,
            sample_freq: 500,
            top_n: 25,
            log_genotypes: false,
            reward: 3.0,
            temptation: 5.0,
            punishment: 0.0,
            sucker: -1.0,
            std_dev_initial_trait_value: 0.25,
            initial_trait_value: 0.0,
            sigmoid: DecisionPolicy::PieceWise,
            discrete_buckets: default_discrete_buckets(),
            min_geno: default_min_geno(),
            max_geno: default_max_geno(),
            drop_unmatched_agent: false,
            base_seed: None,
        }
    }

    /// Parse a TOML document
    ///
    /// Only the shape is checked here; call [`ModelConfig::validate`] (or
    /// hand the configuration to a `ReplicaRunner`) before running it.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check every field the simulation relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population < 2 {
            return Err(ConfigError::invalid("population", "need at least 2 agents"));
        }
        if self.iterations == 0 {
            return Err(ConfigError::invalid("iterations", "must be positive"));
        }
        if self.sample_freq == 0 {
            return Err(ConfigError::invalid("sample_freq", "must be positive"));
        }
        if self.replicas == 0 {
            return Err(ConfigError::invalid("replicas", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.deaths) {
            return Err(ConfigError::invalid(
                "deaths",
                format!("{} is not a fraction in [0, 1]", self.deaths),
            ));
        }
        for (field, value) in [
            ("mutation", self.mutation),
            ("std_dev_initial_trait_value", self.std_dev_initial_trait_value),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    format!("{value} is not a standard deviation"),
                ));
            }
        }
        if !(self.min_geno < self.max_geno) {
            return Err(ConfigError::invalid(
                "min_geno",
                format!("{} must be below max_geno {}", self.min_geno, self.max_geno),
            ));
        }
        if !(1..=9).contains(&self.discrete_buckets) {
            return Err(ConfigError::invalid(
                "discrete_buckets",
                "must be between 1 and 9 so every bin is a single digit",
            ));
        }

        let channel = self.noise_channel()?;
        match (&self.noise, channel) {
            (NoiseSetting::Probability(p), _) if !(0.0..=1.0).contains(p) => {
                return Err(ConfigError::invalid(
                    "noise",
                    format!("{p} is not a probability"),
                ));
            }
            (NoiseSetting::Label(label), Some(_)) => {
                return Err(ConfigError::invalid(
                    "noise",
                    format!("noise channel is active but noise is {label:?}, not a probability"),
                ));
            }
            (NoiseSetting::Label(label), None) => {
                tracing::warn!(
                    noise = %label,
                    noisetype = ?self.noisetype,
                    "noise holds a label rather than a probability; no noise will be applied"
                );
            }
            _ => {}
        }
        Ok(())
    }

    /// The active noise channel, if `noisetype` names one
    pub fn noise_channel(&self) -> Result<Option<NoiseChannel>, ConfigError> {
        match &self.noisetype {
            NoiseType::Legacy(_) => Ok(None),
            NoiseType::Channel(name) => match name.as_str() {
                "percept" => Ok(Some(NoiseChannel::Percept)),
                "action" => Ok(Some(NoiseChannel::Action)),
                other => Err(ConfigError::invalid(
                    "noisetype",
                    format!("unknown noise channel {other:?}"),
                )),
            },
        }
    }

    /// The active channel together with its probability
    pub fn active_noise(&self) -> Result<Option<(NoiseChannel, f64)>, ConfigError> {
        Ok(match (&self.noise, self.noise_channel()?) {
            (NoiseSetting::Probability(p), Some(channel)) => Some((channel, *p)),
            _ => None,
        })
    }

    pub fn payoff(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Reward => self.reward,
            Outcome::Temptation => self.temptation,
            Outcome::Punishment => self.punishment,
            Outcome::Sucker => self.sucker,
        }
    }

    /// `floor(deaths * population)`
    pub fn deaths_per_iteration(&self) -> usize {
        (self.deaths * self.population as f64) as usize
    }

    /// Number of sample points in one replica
    pub fn num_samples(&self) -> usize {
        self.iterations.div_ceil(self.sample_freq)
    }

    /// Sample index of iteration `t`, if it is a sample point
    pub fn sample_index(&self, t: usize) -> Option<usize> {
        if t % self.sample_freq == 0 {
            Some(t / self.sample_freq)
        } else {
            None
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::baseline()
    }
}

/// The configuration one replica plays by, with noise resolved up front
#[derive(Debug, Clone, Copy)]
pub struct Rules<'a> {
    pub config: &'a ModelConfig,
    pub(crate) noise: Option<(NoiseChannel, f64)>,
}

impl<'a> Rules<'a> {
    pub fn new(config: &'a ModelConfig) -> Result<Self, ConfigError> {
        Ok(Rules {
            config,
            noise: config.active_noise()?,
        })
    }

    /// Noise probability for `channel`, or `None` when that channel is off
    pub fn noise_on(&self, channel: NoiseChannel) -> Option<f64> {
        match self.noise {
            Some((active, p)) if active == channel => Some(p),
            _ => None,
        }
    }
}
