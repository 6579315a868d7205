//! Per-sample statistics and strategy histograms

use crate::agent::Agent;
use crate::{Outcome, Trait};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Tracked statistic; names match the columns of earlier result files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Sum of a trait's phenotype over sampled interactions
    Phenotype(Trait),
    Payoff,
    /// Interactions in which the agent cooperated
    Cooperations,
    /// Fraction of sampled outcomes equal to this outcome
    OutcomeShare(Outcome),
    Unattached,
    NewRelationships,
    PlayCount,
    PlayCountSquared,
}

impl Metric {
    pub const COUNT: usize = 14;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Phenotype(Trait::Attach),
        Metric::Phenotype(Trait::Cooper),
        Metric::Phenotype(Trait::Deceit),
        Metric::Phenotype(Trait::Play),
        Metric::Payoff,
        Metric::Cooperations,
        Metric::OutcomeShare(Outcome::Reward),
        Metric::OutcomeShare(Outcome::Temptation),
        Metric::OutcomeShare(Outcome::Punishment),
        Metric::OutcomeShare(Outcome::Sucker),
        Metric::Unattached,
        Metric::NewRelationships,
        Metric::PlayCount,
        Metric::PlayCountSquared,
    ];

    pub fn index(self) -> usize {
        match self {
            Metric::Phenotype(t) => t.index(),
            Metric::Payoff => 4,
            Metric::Cooperations => 5,
            Metric::OutcomeShare(Outcome::Reward) => 6,
            Metric::OutcomeShare(Outcome::Temptation) => 7,
            Metric::OutcomeShare(Outcome::Punishment) => 8,
            Metric::OutcomeShare(Outcome::Sucker) => 9,
            Metric::Unattached => 10,
            Metric::NewRelationships => 11,
            Metric::PlayCount => 12,
            Metric::PlayCountSquared => 13,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Phenotype(t) => t.name(),
            Metric::Payoff => "payoff",
            Metric::Cooperations => "n_C",
            Metric::OutcomeShare(Outcome::Reward) => "p_R",
            Metric::OutcomeShare(Outcome::Temptation) => "p_T",
            Metric::OutcomeShare(Outcome::Punishment) => "p_P",
            Metric::OutcomeShare(Outcome::Sucker) => "p_S",
            Metric::Unattached => "unattached",
            Metric::NewRelationships => "new_relationships",
            Metric::PlayCount => "play_count",
            Metric::PlayCountSquared => "play_count_squared",
        }
    }
}

/// One accumulator row per sample point
#[derive(Debug, Clone)]
pub struct SampleStats {
    rows: Vec<[f64; Metric::COUNT]>,
}

impl SampleStats {
    pub fn new(num_samples: usize) -> Self {
        SampleStats {
            rows: vec![[0.0; Metric::COUNT]; num_samples],
        }
    }

    pub fn num_samples(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, sample: usize, metric: Metric) -> f64 {
        self.rows[sample][metric.index()]
    }

    pub fn add(&mut self, sample: usize, metric: Metric, value: f64) {
        self.rows[sample][metric.index()] += value;
    }

    pub fn set(&mut self, sample: usize, metric: Metric, value: f64) {
        self.rows[sample][metric.index()] = value;
    }

    /// Record one side of a sampled interaction
    pub fn record_interaction(&mut self, sample: usize, outcome: Outcome, agent: &Agent) {
        if outcome.cooperated() {
            self.add(sample, Metric::Cooperations, 1.0);
        }
        self.add(sample, Metric::OutcomeShare(outcome), 1.0);
        for t in Trait::ALL {
            self.add(sample, Metric::Phenotype(t), agent.phenotype.get(t));
        }
        self.add(sample, Metric::Payoff, agent.payoff);
    }

    /// Turn outcome counts into fractions; skipped when nothing was counted
    pub fn normalize_outcomes(&mut self, sample: usize) {
        let interacted: f64 = Outcome::ALL
            .iter()
            .map(|&o| self.get(sample, Metric::OutcomeShare(o)))
            .sum();
        if interacted > 0.0 {
            for o in Outcome::ALL {
                let share = self.get(sample, Metric::OutcomeShare(o)) / interacted;
                self.set(sample, Metric::OutcomeShare(o), share);
            }
        }
    }

    /// Mean of every metric over all sample points, in [`Metric::ALL`] order
    pub fn means(&self) -> MetricMeans {
        let n = self.rows.len().max(1) as f64;
        MetricMeans(
            Metric::ALL
                .iter()
                .map(|&m| {
                    let total: f64 = self.rows.iter().map(|row| row[m.index()]).sum();
                    (m, total / n)
                })
                .collect(),
        )
    }
}

/// A strategy and how often it was seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
    pub strategy: String,
    pub frequency: usize,
}

/// Discretized genotype -> occurrence count
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    counts: HashMap<String, usize>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, strategy: &str) {
        match self.counts.get_mut(strategy) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(strategy.to_string(), 1);
            }
        }
    }

    pub fn count(&self, strategy: &str) -> usize {
        self.counts.get(strategy).copied().unwrap_or(0)
    }

    /// Number of distinct strategies seen
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// The `n` most frequent strategies, ties broken by strategy string
    pub fn top(&self, n: usize) -> Vec<Mode> {
        let mut modes: Vec<Mode> = self
            .counts
            .iter()
            .map(|(strategy, &frequency)| Mode {
                strategy: strategy.clone(),
                frequency,
            })
            .collect();
        modes.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.strategy.cmp(&b.strategy))
        });
        modes.truncate(n);
        modes
    }
}

/// Metric means keyed by metric name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricMeans(pub Vec<(Metric, f64)>);

impl MetricMeans {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0.iter().find(|(m, _)| *m == metric).map(|&(_, v)| v)
    }
}

impl Serialize for MetricMeans {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (metric, value) in &self.0 {
            map.serialize_entry(metric.name(), value)?;
        }
        map.end()
    }
}

/// Modes laid out as `strat0`, `prev0`, `strat1`, `prev1`, ...
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeSlots(pub Vec<Mode>);

impl Serialize for ModeSlots {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() * 2))?;
        for (i, mode) in self.0.iter().enumerate() {
            map.serialize_entry(&format!("strat{i}"), &mode.strategy)?;
            map.serialize_entry(&format!("prev{i}"), &mode.frequency)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::uniform_genotype;
    use approx::assert_relative_eq;

    #[test]
    fn test_metric_table_is_consistent() {
        for (i, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), i);
        }
        let names: Vec<&str> = Metric::ALL.iter().map(|m| m.name()).collect();
        assert_eq!(names[0], "attach");
        assert_eq!(names[5], "n_C");
        assert_eq!(names[13], "play_count_squared");
    }

    #[test]
    fn test_record_interaction() {
        let mut stats = SampleStats::new(2);
        let mut agent = Agent::new(uniform_genotype(0.25));
        agent.payoff = 7.0;
        stats.record_interaction(1, Outcome::Sucker, &agent);
        stats.record_interaction(1, Outcome::Temptation, &agent);

        assert_eq!(stats.get(1, Metric::Cooperations), 1.0);
        assert_eq!(stats.get(1, Metric::OutcomeShare(Outcome::Sucker)), 1.0);
        assert_eq!(stats.get(1, Metric::Payoff), 14.0);
        assert_relative_eq!(stats.get(1, Metric::Phenotype(Trait::Play)), 0.5);
        assert_eq!(stats.get(0, Metric::Payoff), 0.0);
    }

    #[test]
    fn test_normalize_outcomes() {
        let mut stats = SampleStats::new(1);
        stats.add(0, Metric::OutcomeShare(Outcome::Reward), 3.0);
        stats.add(0, Metric::OutcomeShare(Outcome::Punishment), 1.0);
        stats.normalize_outcomes(0);
        assert_relative_eq!(stats.get(0, Metric::OutcomeShare(Outcome::Reward)), 0.75);
        assert_relative_eq!(stats.get(0, Metric::OutcomeShare(Outcome::Punishment)), 0.25);
    }

    #[test]
    fn test_normalize_without_interactions_is_a_no_op() {
        let mut stats = SampleStats::new(1);
        stats.normalize_outcomes(0);
        assert_eq!(stats.get(0, Metric::OutcomeShare(Outcome::Reward)), 0.0);
    }

    #[test]
    fn test_means() {
        let mut stats = SampleStats::new(4);
        stats.set(0, Metric::Unattached, 1.0);
        stats.set(3, Metric::Unattached, 0.5);
        let means = stats.means();
        assert_eq!(means.0.len(), Metric::COUNT);
        assert_relative_eq!(means.get(Metric::Unattached).unwrap(), 0.375);

        let json = serde_json::to_value(&means).unwrap();
        assert_eq!(json["unattached"], 0.375);
        assert_eq!(json["p_R"], 0.0);
    }

    #[test]
    fn test_top_n_ordering() {
        let mut histo = Histogram::new();
        for s in ["b", "a", "b", "c", "b", "a"] {
            histo.record(s);
        }
        assert_eq!(histo.distinct(), 3);
        assert_eq!(histo.total(), 6);
        assert_eq!(histo.count("b"), 3);
        assert_eq!(histo.count("c"), 1);
        assert_eq!(histo.count("zzz"), 0);
        let top = histo.top(2);
        assert_eq!(top[0], Mode { strategy: "b".into(), frequency: 3 });
        assert_eq!(top[1], Mode { strategy: "a".into(), frequency: 2 });

        let top = histo.top(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].strategy, "b");
        assert_eq!(histo.top(10).len(), 3);
    }

    #[test]
    fn test_ties_break_by_strategy() {
        let mut histo = Histogram::new();
        histo.record("z");
        histo.record("m");
        let top = histo.top(2);
        assert_eq!(top[0].strategy, "m");
        assert_eq!(top[1].strategy, "z");
    }

    #[test]
    fn test_mode_slots_serialization() {
        let slots = ModeSlots(vec![
            Mode { strategy: "x".into(), frequency: 9 },
            Mode { strategy: "y".into(), frequency: 4 },
        ]);
        let json = serde_json::to_value(&slots).unwrap();
        assert_eq!(json["strat0"], "x");
        assert_eq!(json["prev0"], 9);
        assert_eq!(json["strat1"], "y");
        assert_eq!(json["prev1"], 4);
    }
}
