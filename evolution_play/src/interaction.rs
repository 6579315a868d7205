//! One round of the dilemma between two agents
//!
//! These functions hold no state of their own. They read the replica's
//! [`Rules`], draw from the caller's RNG and mutate agents through the
//! [`Population`].

use crate::config::{NoiseChannel, Rules};
use crate::population::{AgentId, Population};
use crate::{Choice, Outcome, Trait};
use rand::Rng;

/// Both agents choose and the outcome matrix is applied
///
/// With action noise each choice is flipped independently before resolving.
pub fn play<R: Rng>(
    population: &Population,
    a: AgentId,
    b: AgentId,
    rules: &Rules,
    rng: &mut R,
) -> (Outcome, Outcome) {
    let config = rules.config;
    let mut a_cooperates = population.get(a).decide(Trait::Cooper, config.sigmoid, rng);
    let mut b_cooperates = population.get(b).decide(Trait::Cooper, config.sigmoid, rng);
    if let Some(p) = rules.noise_on(NoiseChannel::Action) {
        if rng.random::<f64>() < p {
            a_cooperates = !a_cooperates;
        }
        if rng.random::<f64>() < p {
            b_cooperates = !b_cooperates;
        }
    }
    Outcome::resolve(
        Choice::from_cooperated(a_cooperates),
        Choice::from_cooperated(b_cooperates),
    )
}

/// Update the affect of `id` after it received `outcome` against `other`
///
/// `other` may deceive `id` into perceiving a better outcome, paying the
/// deceit cost. Perceptual noise may then swap the perceived outcome. The
/// returned value is the outcome `id` finally perceived.
pub fn update_affect<R: Rng>(
    population: &mut Population,
    id: AgentId,
    other: AgentId,
    outcome: Outcome,
    rules: &Rules,
    rng: &mut R,
) -> Outcome {
    let config = rules.config;
    let mut perceived = outcome;
    if config.allowdeceit {
        if let Some(masked) = outcome.deceived() {
            if population.get(other).decide(Trait::Deceit, config.sigmoid, rng) {
                population.get_mut(other).payoff -= config.deceitcost;
                perceived = masked;
            }
        }
    }
    if let Some(p) = rules.noise_on(NoiseChannel::Percept) {
        if rng.random::<f64>() < p {
            perceived = perceived.misperceived();
        }
    }
    population
        .get_mut(id)
        .express(perceived, config.emotions, config.min_geno, config.max_geno);
    perceived
}

/// Pay `id` for `outcome`, update its affect and consider divorce
pub fn update_relationship<R: Rng>(
    population: &mut Population,
    id: AgentId,
    outcome: Outcome,
    rules: &Rules,
    rng: &mut R,
) {
    let config = rules.config;
    population.get_mut(id).payoff += config.payoff(outcome);
    let Some(partner) = population.partner_of(id) else {
        return;
    };
    update_affect(population, id, partner, outcome, rules, rng);
    if config.allowdivorce && !population.get(id).decide(Trait::Attach, config.sigmoid, rng) {
        population.get_mut(partner).payoff -= config.divorcecost;
        population.get_mut(id).payoff -= config.divorcecost;
        population.end_relationship(id);
    }
}

/// One pre-commitment round; returns false when the courtship fails
///
/// Play rounds cost payoff and move affect but pay no game payoff.
pub fn play_pretend<R: Rng>(
    population: &mut Population,
    a: AgentId,
    b: AgentId,
    rules: &Rules,
    rng: &mut R,
) -> bool {
    let config = rules.config;
    let (outcome_a, outcome_b) = play(population, a, b, rules, rng);
    population.get_mut(a).payoff -= config.playcost;
    population.get_mut(b).payoff -= config.playcost;
    update_affect(population, b, a, outcome_b, rules, rng);
    update_affect(population, a, b, outcome_a, rules, rng);
    if !population.get(a).decide(Trait::Attach, config.sigmoid, rng)
        || !population.get(b).decide(Trait::Attach, config.sigmoid, rng)
    {
        population.end_relationship(a);
        population.end_relationship(b);
        return false;
    }
    true
}

/// A paid round between partners; `b` settles before `a`
pub fn interact<R: Rng>(
    population: &mut Population,
    a: AgentId,
    b: AgentId,
    rules: &Rules,
    rng: &mut R,
) -> (Outcome, Outcome) {
    let (outcome_a, outcome_b) = play(population, a, b, rules, rng);
    update_relationship(population, b, outcome_b, rules, rng);
    update_relationship(population, a, outcome_a, rules, rng);
    (outcome_a, outcome_b)
}
