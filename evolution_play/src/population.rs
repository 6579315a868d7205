//! Agent arena and relationship bookkeeping
//!
//! Agents live in a `Vec` and refer to their partner by index. All changes to
//! `partner` go through this module so the link is always symmetric.

use crate::agent::{Agent, Genotype, GenotypeSampler};
use rand::Rng;

/// Stable index of an agent within its [`Population`]
pub type AgentId = usize;

#[derive(Debug, Clone)]
pub struct Population {
    agents: Vec<Agent>,
}

impl Population {
    /// Create `size` founders
    pub fn founders<R: Rng>(size: usize, sampler: &GenotypeSampler, rng: &mut R) -> Self {
        let agents = (0..size).map(|_| Agent::new(sampler.founder(rng))).collect();
        Population { agents }
    }

    pub fn from_agents(agents: Vec<Agent>) -> Self {
        Population { agents }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: AgentId) -> &Agent {
        &self.agents[id]
    }

    pub fn get_mut(&mut self, id: AgentId) -> &mut Agent {
        &mut self.agents[id]
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn partner_of(&self, id: AgentId) -> Option<AgentId> {
        self.agents[id].partner
    }

    /// Link `a` and `b` as partners
    pub fn start_relationship(&mut self, a: AgentId, b: AgentId) {
        debug_assert_ne!(a, b);
        self.agents[a].partner = Some(b);
        self.agents[b].partner = Some(a);
    }

    /// End whatever relationship `a` is in; both sides return to rest
    pub fn end_relationship(&mut self, a: AgentId) {
        if let Some(b) = self.agents[a].partner.take() {
            self.agents[b].partner = None;
            self.agents[b].calm();
        }
        self.agents[a].calm();
    }

    /// Overwrite `id` with a newborn
    ///
    /// With a parent the genotype is a mutated copy of the parent's current
    /// genotype, otherwise a founder genotype. Any relationship is severed.
    pub fn rebirth<R: Rng>(
        &mut self,
        id: AgentId,
        parent: Option<AgentId>,
        sampler: &GenotypeSampler,
        rng: &mut R,
    ) {
        let genotype: Genotype = match parent {
            Some(p) => sampler.offspring(&self.agents[p].genotype, rng),
            None => sampler.founder(rng),
        };
        if let Some(partner) = self.agents[id].partner.take() {
            self.agents[partner].partner = None;
            self.agents[partner].calm();
        }
        self.agents[id] = Agent::new(genotype);
    }

    /// True when every partner link points back at its owner
    pub fn relationships_are_symmetric(&self) -> bool {
        self.agents.iter().enumerate().all(|(id, agent)| match agent.partner {
            Some(p) => p != id && self.agents[p].partner == Some(id),
            None => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::uniform_genotype;
    use crate::{Component, ModelConfig, Trait};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn population(n: usize) -> Population {
        Population::from_agents((0..n).map(|_| Agent::new(uniform_genotype(0.2))).collect())
    }

    #[test]
    fn test_relationships_are_symmetric() {
        let mut pop = population(4);
        pop.start_relationship(0, 3);
        assert_eq!(pop.partner_of(0), Some(3));
        assert_eq!(pop.partner_of(3), Some(0));
        assert!(pop.relationships_are_symmetric());

        pop.end_relationship(3);
        assert_eq!(pop.partner_of(0), None);
        assert_eq!(pop.partner_of(3), None);
        assert!(pop.relationships_are_symmetric());
    }

    #[test]
    fn test_ending_relationship_calms_both() {
        let mut pop = population(2);
        pop.start_relationship(0, 1);
        pop.get_mut(0).phenotype.set(Trait::Attach, 0.9);
        pop.get_mut(1).phenotype.set(Trait::Attach, -0.9);
        pop.end_relationship(0);
        assert_eq!(pop.get(0).phenotype.get(Trait::Attach), 0.2);
        assert_eq!(pop.get(1).phenotype.get(Trait::Attach), 0.2);
    }

    #[test]
    fn test_rebirth_resets_and_notifies_partner() {
        let config = ModelConfig::baseline();
        let sampler = GenotypeSampler::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut pop = population(3);
        pop.start_relationship(0, 1);
        pop.get_mut(0).payoff = 42.0;
        pop.get_mut(1).phenotype.set(Trait::Cooper, -0.7);

        pop.rebirth(0, Some(2), &sampler, &mut rng);

        assert_eq!(pop.get(0).payoff, 0.0);
        assert_eq!(pop.partner_of(0), None);
        assert_eq!(pop.partner_of(1), None);
        assert_eq!(pop.get(1).phenotype.get(Trait::Cooper), 0.2);
        assert!(pop.relationships_are_symmetric());
        let child = pop.get(0);
        assert_eq!(
            child.phenotype.get(Trait::Play),
            child.genotype.get(Trait::Play, Component::Base)
        );
    }

    #[test]
    fn test_rebirth_from_self() {
        let mut config = ModelConfig::baseline();
        config.mutation = 0.0;
        let sampler = GenotypeSampler::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut pop = population(2);
        pop.rebirth(1, Some(1), &sampler, &mut rng);
        assert_eq!(pop.get(1).genotype, uniform_genotype(0.2));
    }
}
