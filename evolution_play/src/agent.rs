//! Agent genotype, phenotype and decision rules
//!
//! The genotype is a fixed 4x6 table (trait x component). It only changes at
//! birth. The phenotype holds one affect value per trait and is updated after
//! every interaction.

use crate::config::{ConfigError, DecisionPolicy, ModelConfig};
use crate::{clip, Component, Outcome, Trait};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// The six heritable components of one trait
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeneRecord {
    values: [f64; 6],
}

impl GeneRecord {
    pub fn get(&self, component: Component) -> f64 {
        self.values[component.index()]
    }

    pub fn base(&self) -> f64 {
        self.get(Component::Base)
    }

    pub fn vol(&self) -> f64 {
        self.get(Component::Vol)
    }

    pub fn response(&self, outcome: Outcome) -> f64 {
        self.get(Component::Response(outcome))
    }
}

impl Serialize for GeneRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Component::ALL.len()))?;
        for component in Component::ALL {
            map.serialize_entry(component.name(), &self.get(component))?;
        }
        map.end()
    }
}

/// Heritable parameters, one [`GeneRecord`] per trait
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Genotype {
    genes: [GeneRecord; 4],
}

impl Genotype {
    pub fn gene(&self, t: Trait) -> &GeneRecord {
        &self.genes[t.index()]
    }

    pub fn get(&self, t: Trait, component: Component) -> f64 {
        self.genes[t.index()].get(component)
    }

    /// Write one component, clipped into `[min, max]`
    pub fn set(&mut self, t: Trait, component: Component, value: f64, min: f64, max: f64) {
        self.genes[t.index()].values[component.index()] = clip(value, min, max);
    }

    /// All (trait, component, value) triples in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Trait, Component, f64)> + '_ {
        Trait::ALL.into_iter().flat_map(move |t| {
            Component::ALL
                .into_iter()
                .map(move |c| (t, c, self.get(t, c)))
        })
    }

    /// Map the genotype to its strategy-classification key
    ///
    /// Each component falls into one of `buckets` bins by its position in
    /// `[min, max]`; volatility is binned by magnitude over half the range.
    /// The key is a trait prefix followed by six digits, for each trait.
    pub fn discretize(&self, buckets: usize, min: f64, max: f64) -> String {
        let range = max - min;
        let buckets = buckets as f64;
        let mut key = String::with_capacity(Trait::ALL.len() * (Component::ALL.len() + 1));
        for t in Trait::ALL {
            key.push(t.strategy_prefix());
            for component in Component::ALL {
                let x = self.get(t, component);
                let bin = match component {
                    Component::Vol => (2.0 * x.abs() / range * buckets) as usize,
                    _ => ((x - min) / range * buckets) as usize,
                };
                key.push_str(&bin.to_string());
            }
        }
        key
    }
}

impl Serialize for Genotype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Trait::ALL.len()))?;
        for t in Trait::ALL {
            map.serialize_entry(t.name(), self.gene(t))?;
        }
        map.end()
    }
}

/// Current affect value per trait
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Phenotype {
    values: [f64; 4],
}

impl Phenotype {
    pub fn get(&self, t: Trait) -> f64 {
        self.values[t.index()]
    }

    pub fn set(&mut self, t: Trait, value: f64) {
        self.values[t.index()] = value;
    }

    /// Phenotype expressed at rest: every trait at its BASE
    pub fn at_base(genotype: &Genotype) -> Self {
        let mut phenotype = Phenotype::default();
        for t in Trait::ALL {
            phenotype.set(t, genotype.gene(t).base());
        }
        phenotype
    }
}

/// Draws genotypes for founders and offspring
#[derive(Debug, Clone)]
pub struct GenotypeSampler {
    initial: Normal<f64>,
    mutation: Normal<f64>,
    min: f64,
    max: f64,
}

impl GenotypeSampler {
    pub fn new(config: &ModelConfig) -> Result<Self, ConfigError> {
        let initial = Normal::new(
            config.initial_trait_value,
            config.std_dev_initial_trait_value,
        )
        .map_err(|source| ConfigError::Distribution {
            name: "initial trait",
            source,
        })?;
        let mutation = Normal::new(0.0, config.mutation).map_err(|source| {
            ConfigError::Distribution {
                name: "mutation",
                source,
            }
        })?;
        Ok(GenotypeSampler {
            initial,
            mutation,
            min: config.min_geno,
            max: config.max_geno,
        })
    }

    /// Founder genotype: every component i.i.d. around the initial value
    pub fn founder<R: Rng>(&self, rng: &mut R) -> Genotype {
        let mut genotype = Genotype::default();
        for t in Trait::ALL {
            for component in Component::ALL {
                genotype.set(t, component, self.initial.sample(rng), self.min, self.max);
            }
        }
        genotype
    }

    /// Offspring genotype: every component mutated around the parent's
    pub fn offspring<R: Rng>(&self, parent: &Genotype, rng: &mut R) -> Genotype {
        let mut genotype = Genotype::default();
        for (t, component, value) in parent.iter() {
            let mutated = value + self.mutation.sample(rng);
            genotype.set(t, component, mutated, self.min, self.max);
        }
        genotype
    }
}

/// One individual of the population
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub genotype: Genotype,
    pub phenotype: Phenotype,
    /// Lifetime payoff, the agent's fitness
    pub payoff: f64,
    pub(crate) partner: Option<usize>,
}

impl Agent {
    pub fn new(genotype: Genotype) -> Self {
        Agent {
            phenotype: Phenotype::at_base(&genotype),
            genotype,
            payoff: 0.0,
            partner: None,
        }
    }

    pub fn partner(&self) -> Option<usize> {
        self.partner
    }

    pub fn is_partnered(&self) -> bool {
        self.partner.is_some()
    }

    /// Stochastic decision gate over the current phenotype of `t`
    pub fn decide<R: Rng>(&self, t: Trait, policy: DecisionPolicy, rng: &mut R) -> bool {
        let affect = self.phenotype.get(t);
        match policy {
            DecisionPolicy::PieceWise => rng.random_range(-0.5..0.5) < affect,
            DecisionPolicy::Smooth => rng.random::<f64>() < sigmoid(affect),
        }
    }

    /// Update the phenotype after perceiving `outcome`
    ///
    /// With emotions the affect doubles, moves by the outcome response and is
    /// pulled back towards BASE in proportion to |VOL|. Without emotions the
    /// phenotype is just the response to the last outcome.
    pub fn express(&mut self, outcome: Outcome, emotions: bool, min: f64, max: f64) {
        for t in Trait::ALL {
            let gene = *self.genotype.gene(t);
            let next = if emotions {
                let v = 2.0 * self.phenotype.get(t) + 2.0 * gene.response(outcome);
                clip(v + (gene.base() - v) * gene.vol().abs(), min, max)
            } else {
                gene.response(outcome)
            };
            self.phenotype.set(t, next);
        }
    }

    /// Reset the affect to rest; used when a relationship ends
    pub fn calm(&mut self) {
        self.phenotype = Phenotype::at_base(&self.genotype);
    }

    pub fn discretize(&self, config: &ModelConfig) -> String {
        self.genotype
            .discretize(config.discrete_buckets, config.min_geno, config.max_geno)
    }
}

/// Logistic curve with slope 5 at the origin
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-5.0 * x).exp())
}
