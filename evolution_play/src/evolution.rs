//! Evolutionary loop for a single replica
//!
//! Every iteration runs a pairing round, selects parents in proportion to
//! lifetime payoff, replaces random victims with mutated offspring and, on
//! sample iterations, records the strategy histogram and statistics.
//!
//! A [`Simulation`] owns its RNG; two simulations built from the same
//! configuration and seed evolve identically.

use crate::agent::{Genotype, GenotypeSampler};
use crate::config::{ConfigError, ModelConfig, NoiseChannel, Rules};
use crate::pairing;
use crate::population::{AgentId, Population};
use crate::stats::{Histogram, Metric, MetricMeans, Mode, SampleStats};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::mem;

/// What was observed at one sample point
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport {
    pub iteration: usize,
    pub sample: usize,
    /// Distinct strategies among living agents
    pub distinct: usize,
    /// Most frequent strategies among living agents
    pub modes: Vec<Mode>,
}

/// End-of-replica aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSummary {
    /// Mean of every metric over the sample points
    pub means: MetricMeans,
    /// Most frequent strategies over the whole replica
    pub modes: Vec<Mode>,
    /// Genotype of every surviving agent, when `log_genotypes` is set
    pub genotypes: Option<Vec<Genotype>>,
}

pub struct Simulation {
    config: ModelConfig,
    /// Noise channel and probability, resolved once
    noise: Option<(NoiseChannel, f64)>,
    sampler: GenotypeSampler,
    population: Population,
    /// Living agents
    agents: Vec<AgentId>,
    /// Living agents without a partner
    pool: Vec<AgentId>,
    stats: SampleStats,
    histogram: Histogram,
    rng: StdRng,
    seed: u64,
    iteration: usize,
}

impl Simulation {
    pub fn new(config: &ModelConfig, seed: u64) -> Result<Self, ConfigError> {
        let noise = config.active_noise()?;
        let sampler = GenotypeSampler::new(config)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let population = Population::founders(config.population, &sampler, &mut rng);
        let agents: Vec<AgentId> = (0..population.len()).collect();
        Ok(Simulation {
            config: config.clone(),
            noise,
            sampler,
            population,
            pool: agents.clone(),
            agents,
            stats: SampleStats::new(config.num_samples()),
            histogram: Histogram::new(),
            rng,
            seed,
            iteration: 0,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of completed iterations
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn living(&self) -> &[AgentId] {
        &self.agents
    }

    pub fn pool(&self) -> &[AgentId] {
        &self.pool
    }

    pub fn stats(&self) -> &SampleStats {
        &self.stats
    }

    /// Cumulative strategy histogram over every sample point so far
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Advance one iteration; returns the report if it was a sample point
    pub fn step(&mut self) -> Option<SampleReport> {
        let t = self.iteration;
        let sample = self
            .config
            .sample_index(t)
            .filter(|&s| s < self.stats.num_samples());

        let rules = Rules {
            config: &self.config,
            noise: self.noise,
        };
        let round = pairing::run_round(
            &mut self.population,
            mem::take(&mut self.agents),
            mem::take(&mut self.pool),
            &rules,
            sample,
            &mut self.stats,
            &mut self.rng,
        );
        self.agents = round.agents;
        self.pool = round.pool;

        let parents = self.select_parents();
        for parent in parents {
            self.replace_random_agent(parent);
        }

        let report = sample.map(|s| self.take_sample(t, s));
        self.iteration += 1;
        report
    }

    /// Run the remaining iterations and summarise the replica
    pub fn run(&mut self) -> ReplicaSummary {
        while self.iteration < self.config.iterations {
            self.step();
        }
        self.summary()
    }

    pub fn summary(&self) -> ReplicaSummary {
        let genotypes = self.config.log_genotypes.then(|| {
            self.agents
                .iter()
                .map(|&id| self.population.get(id).genotype)
                .collect()
        });
        ReplicaSummary {
            means: self.stats.means(),
            modes: self.histogram.top(self.config.top_n),
            genotypes,
        }
    }

    /// Fitness-proportional draw with replacement, one parent per death
    ///
    /// Fitness is shifted so the least fit living agent weighs zero. When
    /// every agent is equally fit the parents are drawn uniformly.
    fn select_parents(&mut self) -> Vec<AgentId> {
        let deaths = self.config.deaths_per_iteration();
        if deaths == 0 || self.agents.is_empty() {
            return Vec::new();
        }

        let fitness: Vec<f64> = self
            .agents
            .iter()
            .map(|&id| self.population.get(id).payoff)
            .collect();
        let min = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let shifted: Vec<f64> = fitness.iter().map(|f| f - min).collect();
        let total: f64 = shifted.iter().sum();

        let weighted = if total > 0.0 {
            WeightedIndex::new(&shifted).ok()
        } else {
            None
        };
        if weighted.is_none() {
            tracing::debug!(
                iteration = self.iteration,
                "no fitness differences, drawing parents uniformly"
            );
        }

        (0..deaths)
            .map(|_| {
                let idx = match &weighted {
                    Some(dist) => dist.sample(&mut self.rng),
                    None => self.rng.random_range(0..self.agents.len()),
                };
                self.agents[idx]
            })
            .collect()
    }

    /// A uniformly chosen living agent dies and is reborn from `parent`
    fn replace_random_agent(&mut self, parent: AgentId) {
        let victim = self.agents[self.rng.random_range(0..self.agents.len())];
        if !self.pool.contains(&victim) {
            self.pool.push(victim);
            if let Some(partner) = self.population.partner_of(victim) {
                if !self.pool.contains(&partner) {
                    self.pool.push(partner);
                }
            }
        }
        self.population
            .rebirth(victim, Some(parent), &self.sampler, &mut self.rng);
    }

    fn take_sample(&mut self, iteration: usize, sample: usize) -> SampleReport {
        let mut snapshot = Histogram::new();
        for &id in &self.agents {
            let key = self.population.get(id).discretize(&self.config);
            self.histogram.record(&key);
            snapshot.record(&key);
        }
        let modes = snapshot.top(self.config.top_n);

        self.stats.normalize_outcomes(sample);
        self.stats.set(
            sample,
            Metric::Unattached,
            self.pool.len() as f64 / self.config.population as f64,
        );

        let top: Vec<(&str, usize)> = modes
            .iter()
            .map(|m| (m.strategy.as_str(), m.frequency))
            .collect();
        tracing::info!(
            iteration,
            sample,
            distinct = snapshot.distinct(),
            modes = ?top,
            "sample"
        );

        SampleReport {
            iteration,
            sample,
            distinct: snapshot.distinct(),
            modes,
        }
    }
}
