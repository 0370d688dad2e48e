use crate::model::Compartment;
use std::fmt;

/// Header row preceding the statistics rows.
pub const REPORT_HEADER: &str = "#,iter,S,I,R,V,D,TI,TID";

/// Number of agents in each compartment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub susceptible: usize,
    pub infectious: usize,
    pub recovered: usize,
    pub vaccinated: usize,
    pub dead: usize,
}

impl Census {
    pub fn add(&mut self, state: Compartment) {
        match state {
            Compartment::Susceptible => self.susceptible += 1,
            Compartment::Infectious => self.infectious += 1,
            Compartment::Recovered => self.recovered += 1,
            Compartment::Vaccinated => self.vaccinated += 1,
            Compartment::Dead => self.dead += 1,
        }
    }

    /// Total number of agents, dead included.
    pub fn total(&self) -> usize {
        self.susceptible + self.infectious + self.recovered + self.vaccinated + self.dead
    }
}

/// Snapshot of a simulation's vital statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub census: Census,
    /// Infections ever caused, initial ones included.
    pub total_infections: usize,
    /// Deaths of infectious agents.
    pub infection_deaths: usize,
}

/// One statistics row of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub sim: usize,
    pub iteration: usize,
    pub stats: Statistics,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Census {
            susceptible,
            infectious,
            recovered,
            vaccinated,
            dead,
        } = self.stats.census;
        write!(
            f,
            "{}.{},{susceptible},{infectious},{recovered},{vaccinated},{dead},{},{}",
            self.sim, self.iteration, self.stats.total_infections, self.stats.infection_deaths
        )
    }
}
