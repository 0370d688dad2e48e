use crate::stats::Census;
use rand::prelude::*;
use std::fmt;

/// Epidemiological compartment of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compartment {
    Susceptible,
    Infectious,
    Recovered,
    Vaccinated,
    Dead,
}

impl Compartment {
    /// Single uppercase letter used in agent dumps.
    pub fn code(self) -> char {
        match self {
            Self::Susceptible => 'S',
            Self::Infectious => 'I',
            Self::Recovered => 'R',
            Self::Vaccinated => 'V',
            Self::Dead => 'D',
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Susceptible => "susceptible",
            Self::Infectious => "infectious",
            Self::Recovered => "recovered",
            Self::Vaccinated => "vaccinated",
            Self::Dead => "dead",
        };
        f.write_str(name)
    }
}

/// Agent of the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    id: usize,
    state: Compartment,
}

impl Agent {
    pub fn new(id: usize, state: Compartment) -> Self {
        Self { id, state }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> Compartment {
        self.state
    }

    pub fn set_state(&mut self, state: Compartment) {
        debug_assert_ne!(self.state, Compartment::Dead, "agent {} left dead", self.id);
        self.state = state;
    }
}

/// Ordered, growable collection of agents.
///
/// Agents are never removed: dead agents stay in place so identities
/// remain stable for the whole run.
#[derive(Debug, Clone, Default)]
pub struct Population {
    agt_vec: Vec<Agent>,
}

impl Population {
    /// Create `n_agt` susceptible agents and infect the first `n_inf`.
    pub fn new(n_agt: usize, n_inf: usize) -> Self {
        let agt_vec = (0..n_agt)
            .map(|id| {
                let state = if id < n_inf {
                    Compartment::Infectious
                } else {
                    Compartment::Susceptible
                };
                Agent::new(id, state)
            })
            .collect();
        Self { agt_vec }
    }

    pub fn len(&self) -> usize {
        self.agt_vec.len()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agt_vec
    }

    /// Append `count` susceptible agents.
    ///
    /// Identities continue from the total length, dead agents included,
    /// so they never collide with existing ones.
    pub fn grow(&mut self, count: usize) {
        let start = self.agt_vec.len();
        self.agt_vec.reserve(count);
        self.agt_vec
            .extend((start..start + count).map(|id| Agent::new(id, Compartment::Susceptible)));
    }

    /// Uniformly random index into the population.
    ///
    /// # Panics
    /// Panics if the population is empty.
    pub fn random_index<R: Rng>(&self, rng: &mut R) -> usize {
        rng.random_range(0..self.agt_vec.len())
    }

    /// Reorder agents uniformly at random.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.agt_vec.shuffle(rng);
    }

    /// Restore creation order.
    pub fn sort_by_identity(&mut self) {
        self.agt_vec.sort_by_key(Agent::id);
    }

    pub fn count_alive(&self) -> usize {
        self.agt_vec
            .iter()
            .filter(|agt| agt.state() != Compartment::Dead)
            .count()
    }

    /// Indices of the first `max` susceptible agents, in current order.
    pub fn susceptible_indices(&self, max: usize) -> Vec<usize> {
        self.agt_vec
            .iter()
            .enumerate()
            .filter(|(_, agt)| agt.state() == Compartment::Susceptible)
            .map(|(i_agt, _)| i_agt)
            .take(max)
            .collect()
    }

    /// Count agents in each compartment.
    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for agt in &self.agt_vec {
            census.add(agt.state());
        }
        census
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    const ALL: [Compartment; 5] = [
        Compartment::Susceptible,
        Compartment::Infectious,
        Compartment::Recovered,
        Compartment::Vaccinated,
        Compartment::Dead,
    ];

    #[test]
    fn codes_are_distinct_first_letters() {
        for state in ALL {
            let name = state.to_string();
            let first = name.chars().next().unwrap().to_ascii_uppercase();
            assert_eq!(state.code(), first);
        }
        let mut codes: Vec<_> = ALL.iter().map(|s| s.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 5);
    }

    #[test]
    fn new_infects_leading_agents() {
        let pop = Population::new(10, 3);
        let census = pop.census();
        assert_eq!(census.infectious, 3);
        assert_eq!(census.susceptible, 7);
        assert!(pop.agents()[..3].iter().all(|a| a.state() == Compartment::Infectious));
    }

    #[test]
    fn grow_counts_dead_agents_in_identities() {
        let mut pop = Population::new(4, 0);
        pop.agents_mut()[1].set_state(Compartment::Dead);
        pop.grow(2);
        let ids: Vec<_> = pop.agents().iter().map(Agent::id).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4, 5]);
        assert_eq!(pop.count_alive(), 5);
    }

    #[test]
    fn shuffle_then_sort_restores_order() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut pop = Population::new(50, 5);
        pop.shuffle(&mut rng);
        assert_eq!(pop.len(), 50);
        pop.sort_by_identity();
        assert!(pop.agents().iter().enumerate().all(|(i, a)| a.id() == i));
        assert_eq!(pop.census().infectious, 5);
    }

    #[test]
    fn susceptible_indices_stop_at_max() {
        let mut pop = Population::new(6, 0);
        pop.agents_mut()[0].set_state(Compartment::Infectious);
        pop.agents_mut()[2].set_state(Compartment::Vaccinated);
        assert_eq!(pop.susceptible_indices(2), [1, 3]);
        assert_eq!(pop.susceptible_indices(10), [1, 3, 4, 5]);
        assert!(pop.susceptible_indices(0).is_empty());
    }

    #[test]
    fn random_index_stays_in_bounds() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let pop = Population::new(3, 0);
        for _ in 0..100 {
            assert!(pop.random_index(&mut rng) < 3);
        }
    }
}
