//! Evolution of play, deceit and affect in the Prisoner's Dilemma
//!
//! Agents carry a heritable genotype that shapes an affective phenotype.
//! Every iteration they pair up (optionally courting through pre-commitment
//! "play" rounds), play one round of the dilemma, update their affect and may
//! deceive their partner or divorce. Fitness-weighted reproduction replaces a
//! fraction of the population each iteration.
//!
//! Components:
//! - [`agent`]: genotype/phenotype records and decision rules
//! - [`population`]: agent arena and symmetric relationship bookkeeping
//! - [`interaction`]: one game round, deceit, noise and play rounds
//! - [`pairing`]: one full pairing round over the population
//! - [`evolution`]: the per-iteration selection/death/reproduction loop
//! - [`stats`]: per-sample statistics and strategy histograms
//! - [`replica`]: independent, seeded replicas run in parallel

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod error;
pub mod evolution;
pub mod interaction;
pub mod output;
pub mod pairing;
pub mod population;
pub mod replica;
pub mod stats;

pub use agent::{Agent, GeneRecord, Genotype, GenotypeSampler, Phenotype};
pub use config::{
    ConfigError, DecisionPolicy, ModelConfig, NoiseChannel, NoiseSetting, NoiseType, Rules,
};
pub use error::Error;
pub use evolution::{ReplicaSummary, SampleReport, Simulation};
pub use population::{AgentId, Population};
pub use replica::{ReplicaRecord, ReplicaRunner};
pub use stats::{Histogram, Metric, MetricMeans, Mode, ModeSlots, SampleStats};

// ============================================================================
// Core Domain Types
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    Cooperate,
    Defect,
}

impl Choice {
    pub fn from_cooperated(cooperated: bool) -> Self {
        if cooperated {
            Choice::Cooperate
        } else {
            Choice::Defect
        }
    }
}

/// Result of one round of the dilemma, seen from one player's side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// R: both cooperated
    Reward,
    /// T: defected against a cooperator
    Temptation,
    /// P: both defected
    Punishment,
    /// S: cooperated against a defector
    Sucker,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::Reward,
        Outcome::Temptation,
        Outcome::Punishment,
        Outcome::Sucker,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Reward => "R",
            Outcome::Temptation => "T",
            Outcome::Punishment => "P",
            Outcome::Sucker => "S",
        }
    }

    /// Resolve both players' outcomes from their choices
    pub fn resolve(a: Choice, b: Choice) -> (Outcome, Outcome) {
        match (a, b) {
            (Choice::Cooperate, Choice::Cooperate) => (Outcome::Reward, Outcome::Reward),
            (Choice::Cooperate, Choice::Defect) => (Outcome::Sucker, Outcome::Temptation),
            (Choice::Defect, Choice::Cooperate) => (Outcome::Temptation, Outcome::Sucker),
            (Choice::Defect, Choice::Defect) => (Outcome::Punishment, Outcome::Punishment),
        }
    }

    /// True if the player holding this outcome cooperated
    pub fn cooperated(self) -> bool {
        matches!(self, Outcome::Reward | Outcome::Sucker)
    }

    /// Outcome a deceived player believes they got, if deceit applies
    pub fn deceived(self) -> Option<Outcome> {
        match self {
            Outcome::Sucker => Some(Outcome::Reward),
            Outcome::Punishment => Some(Outcome::Temptation),
            _ => None,
        }
    }

    /// Perceptual noise swaps R with S and T with P
    pub fn misperceived(self) -> Outcome {
        match self {
            Outcome::Reward => Outcome::Sucker,
            Outcome::Sucker => Outcome::Reward,
            Outcome::Temptation => Outcome::Punishment,
            Outcome::Punishment => Outcome::Temptation,
        }
    }
}

/// Evolvable behavioural axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trait {
    /// Relationship persistence
    Attach,
    /// Propensity to cooperate
    Cooper,
    /// Propensity to exploit a partner's bad outcome by deceit
    Deceit,
    /// Propensity to enter pre-commitment play rounds
    Play,
}

impl Trait {
    pub const ALL: [Trait; 4] = [Trait::Attach, Trait::Cooper, Trait::Deceit, Trait::Play];

    pub fn index(self) -> usize {
        match self {
            Trait::Attach => 0,
            Trait::Cooper => 1,
            Trait::Deceit => 2,
            Trait::Play => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Trait::Attach => "attach",
            Trait::Cooper => "cooper",
            Trait::Deceit => "deceit",
            Trait::Play => "play",
        }
    }

    /// Prefix used in discretized strategy strings
    ///
    /// The play prefix is upper-case `P` so keys stay comparable with
    /// histograms recorded by earlier runs of the model.
    pub fn strategy_prefix(self) -> char {
        match self {
            Trait::Attach => 'a',
            Trait::Cooper => 'c',
            Trait::Deceit => 'd',
            Trait::Play => 'P',
        }
    }
}

/// One of the six genotype components of a trait
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    Base,
    Vol,
    Response(Outcome),
}

impl Component {
    /// Canonical order, also used by discretization
    pub const ALL: [Component; 6] = [
        Component::Base,
        Component::Vol,
        Component::Response(Outcome::Reward),
        Component::Response(Outcome::Temptation),
        Component::Response(Outcome::Punishment),
        Component::Response(Outcome::Sucker),
    ];

    pub fn index(self) -> usize {
        match self {
            Component::Base => 0,
            Component::Vol => 1,
            Component::Response(Outcome::Reward) => 2,
            Component::Response(Outcome::Temptation) => 3,
            Component::Response(Outcome::Punishment) => 4,
            Component::Response(Outcome::Sucker) => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Component::Base => "BASE",
            Component::Vol => "VOL",
            Component::Response(outcome) => outcome.label(),
        }
    }
}

/// Clamp `value` into `[min, max]`
pub fn clip(value: f64, min: f64, max: f64) -> f64 {
    if value > max {
        max
    } else if value < min {
        min
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_matrix() {
        use Choice::*;
        assert_eq!(Outcome::resolve(Cooperate, Cooperate), (Outcome::Reward, Outcome::Reward));
        assert_eq!(Outcome::resolve(Cooperate, Defect), (Outcome::Sucker, Outcome::Temptation));
        assert_eq!(Outcome::resolve(Defect, Cooperate), (Outcome::Temptation, Outcome::Sucker));
        assert_eq!(
            Outcome::resolve(Defect, Defect),
            (Outcome::Punishment, Outcome::Punishment)
        );
    }

    #[test]
    fn test_deceit_only_masks_bad_outcomes() {
        assert_eq!(Outcome::Sucker.deceived(), Some(Outcome::Reward));
        assert_eq!(Outcome::Punishment.deceived(), Some(Outcome::Temptation));
        assert_eq!(Outcome::Reward.deceived(), None);
        assert_eq!(Outcome::Temptation.deceived(), None);
    }

    #[test]
    fn test_misperception_is_an_involution() {
        for outcome in Outcome::ALL {
            assert_ne!(outcome.misperceived(), outcome);
            assert_eq!(outcome.misperceived().misperceived(), outcome);
        }
    }

    #[test]
    fn test_component_order_matches_index() {
        for (i, component) in Component::ALL.iter().enumerate() {
            assert_eq!(component.index(), i);
        }
        for (i, t) in Trait::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip(1.5, -1.0, 1.0), 1.0);
        assert_eq!(clip(-3.0, -1.0, 1.0), -1.0);
        assert_eq!(clip(0.25, -1.0, 1.0), 0.25);
    }
}
