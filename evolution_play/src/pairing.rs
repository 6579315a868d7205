//! Pairing round: every live agent plays once per iteration
//!
//! Agents are drawn in random order. Partnered agents play their partner;
//! unpartnered agents court a random unpartnered agent, optionally through a
//! series of play rounds, and settle into a relationship if it survives.

use crate::config::Rules;
use crate::interaction::{interact, play_pretend};
use crate::population::{AgentId, Population};
use crate::stats::{Metric, SampleStats};
use crate::Trait;
use rand::Rng;

/// Maximum number of play rounds in one courtship
pub const PLAY_ROUND_CAP: usize = 20;

/// Who is alive and who is single after a pairing round
#[derive(Debug, Clone, Default)]
pub struct RoundResult {
    /// Agents carried into selection and the next iteration
    pub agents: Vec<AgentId>,
    /// The subset of `agents` without a partner
    pub pool: Vec<AgentId>,
    /// Agents that found no one to play with this round
    pub unmatched: Vec<AgentId>,
}

fn take_random<R: Rng>(ids: &mut Vec<AgentId>, rng: &mut R) -> AgentId {
    let idx = rng.random_range(0..ids.len());
    ids.swap_remove(idx)
}

fn remove_id(ids: &mut Vec<AgentId>, id: AgentId) {
    if let Some(pos) = ids.iter().position(|&x| x == id) {
        ids.swap_remove(pos);
    }
}

/// Run one pairing round over `agents`, whose unpartnered members are `pool`
///
/// When `sample` is set the round's interactions, courtships and play rounds
/// are accumulated into `stats`.
pub fn run_round<R: Rng>(
    population: &mut Population,
    agents: Vec<AgentId>,
    mut pool: Vec<AgentId>,
    rules: &Rules,
    sample: Option<usize>,
    stats: &mut SampleStats,
    rng: &mut R,
) -> RoundResult {
    let mut remaining = agents;
    let mut result = RoundResult {
        agents: Vec::with_capacity(remaining.len()),
        pool: Vec::with_capacity(pool.len()),
        unmatched: Vec::new(),
    };

    while remaining.len() > 1 {
        let a = take_random(&mut remaining, rng);
        let b = match population.partner_of(a) {
            Some(b) => {
                play_and_record(population, a, b, rules, sample, stats, rng);
                b
            }
            None => {
                remove_id(&mut pool, a);
                if pool.is_empty() {
                    // Only couples remain
                    result.unmatched.push(a);
                    continue;
                }
                let b = take_random(&mut pool, rng);
                if let Some(s) = sample {
                    stats.add(s, Metric::NewRelationships, 1.0);
                }
                if court(population, a, b, rules, sample, stats, rng) {
                    population.start_relationship(a, b);
                    play_and_record(population, a, b, rules, sample, stats, rng);
                }
                b
            }
        };
        remove_id(&mut remaining, b);
        result.agents.push(a);
        result.agents.push(b);
        if !population.get(a).is_partnered() {
            result.pool.push(a);
            result.pool.push(b);
        }
    }
    result.unmatched.append(&mut remaining);

    if !rules.config.drop_unmatched_agent {
        for &id in &result.unmatched {
            result.agents.push(id);
            result.pool.push(id);
        }
    } else if !result.unmatched.is_empty() {
        tracing::debug!(dropped = result.unmatched.len(), "unmatched agents dropped");
    }
    result
}

/// Courtship: play rounds until neither wants to play, one detaches, or the cap
fn court<R: Rng>(
    population: &mut Population,
    a: AgentId,
    b: AgentId,
    rules: &Rules,
    sample: Option<usize>,
    stats: &mut SampleStats,
    rng: &mut R,
) -> bool {
    if !rules.config.allowplay {
        return true;
    }
    let mut stay = true;
    let mut rounds = 0;
    while stay && rounds < PLAY_ROUND_CAP && wants_to_play(population, a, b, rules, rng) {
        stay = play_pretend(population, a, b, rules, rng);
        rounds += 1;
    }
    if let Some(s) = sample {
        stats.add(s, Metric::PlayCount, rounds as f64);
        stats.add(s, Metric::PlayCountSquared, (rounds * rounds) as f64);
    }
    stay
}

fn wants_to_play<R: Rng>(
    population: &Population,
    a: AgentId,
    b: AgentId,
    rules: &Rules,
    rng: &mut R,
) -> bool {
    population.get(a).decide(Trait::Play, rules.config.sigmoid, rng)
        || population.get(b).decide(Trait::Play, rules.config.sigmoid, rng)
}

fn play_and_record<R: Rng>(
    population: &mut Population,
    a: AgentId,
    b: AgentId,
    rules: &Rules,
    sample: Option<usize>,
    stats: &mut SampleStats,
    rng: &mut R,
) {
    let (outcome_a, outcome_b) = interact(population, a, b, rules, rng);
    if let Some(s) = sample {
        stats.record_interaction(s, outcome_a, population.get(a));
        stats.record_interaction(s, outcome_b, population.get(b));
    }
}
