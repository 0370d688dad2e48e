use crate::config::{Config, InfectionMethod, Tally};
use crate::model::{Compartment, Population};
use crate::report::{Sink, write_agents};
use crate::stats::{Report, Statistics};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

/// Per-agent transition distributions.
struct Rates {
    recovery: Bernoulli,
    vaccination: Bernoulli,
    regression: Bernoulli,
    death_sus: Bernoulli,
    death_inf: Bernoulli,
}

impl Rates {
    fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            recovery: Bernoulli::new(cfg.recovery_prob)?,
            vaccination: Bernoulli::new(cfg.vaccination_prob)?,
            regression: Bernoulli::new(cfg.regression_prob)?,
            death_sus: Bernoulli::new(cfg.death_prob_susceptible)?,
            death_inf: Bernoulli::new(cfg.death_prob_infectious)?,
        })
    }
}

/// Infection algorithm of one simulation, fixed for its whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Infection {
    Paired,
    Shuffled,
}

impl Infection {
    /// Under [`InfectionMethod::Both`] even ordinals pair, odd ones shuffle.
    fn resolve(method: InfectionMethod, ordinal: usize) -> Self {
        match method {
            InfectionMethod::One => Self::Paired,
            InfectionMethod::Two => Self::Shuffled,
            InfectionMethod::Both if ordinal % 2 == 0 => Self::Paired,
            InfectionMethod::Both => Self::Shuffled,
        }
    }
}

/// Simulation engine.
///
/// Owns the population, the cumulative counters and its own random number
/// generator, so simulations can run concurrently without sharing state.
pub struct Simulation {
    ordinal: usize,
    cfg: Config,
    infection: Infection,
    rates: Rates,
    pop: Population,
    total_infections: usize,
    infection_deaths: usize,
    rng: ChaCha12Rng,
}

impl Simulation {
    /// Create a new `Simulation` drawing from the given generator.
    pub fn new(ordinal: usize, cfg: Config, rng: ChaCha12Rng) -> Result<Self> {
        let rates = Rates::new(&cfg).context("failed to build transition distributions")?;
        let infection = Infection::resolve(cfg.infection_method, ordinal);
        let pop = Population::new(cfg.agents, cfg.infections);
        let total_infections = cfg.infections;

        Ok(Self {
            ordinal,
            cfg,
            infection,
            rates,
            pop,
            total_infections,
            infection_deaths: 0,
            rng,
        })
    }

    /// Create a new `Simulation` with a generator chosen by the configured seed.
    ///
    /// With a seed, every ordinal gets its own ChaCha stream, so runs are
    /// reproducible; without one the generator is seeded from the OS.
    pub fn from_config(ordinal: usize, cfg: Config) -> Result<Self> {
        let rng = match cfg.seed {
            Some(seed) => {
                let mut rng = ChaCha12Rng::seed_from_u64(seed);
                rng.set_stream(ordinal as u64);
                rng
            }
            None => ChaCha12Rng::try_from_os_rng()?,
        };
        Self::new(ordinal, cfg, rng)
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn population(&self) -> &Population {
        &self.pop
    }

    /// Compartment counts and cumulative totals of the current population.
    pub fn statistics(&self) -> Statistics {
        Statistics {
            census: self.pop.census(),
            total_infections: self.total_infections,
            infection_deaths: self.infection_deaths,
        }
    }

    /// Run every iteration, reporting through `sink`.
    ///
    /// A failed agent dump does not stop the run: the remaining iterations
    /// are still executed and reported.
    ///
    /// # Errors
    /// Returns an error if writing a row fails, or, once the run is
    /// complete, the first agent dump failure.
    pub fn run(&mut self, sink: &mut dyn Sink) -> Result<()> {
        if self.ordinal == 0 {
            sink.header().context("failed to write header")?;
        }

        let mut dump_error = None;

        let n_iter = self.cfg.iterations;
        if n_iter == 0 {
            self.report(0, sink, &mut dump_error)?;
        }

        for iteration in 1..=n_iter {
            self.step();

            if iteration % self.cfg.report_every == 0 || iteration == n_iter {
                self.report(iteration, sink, &mut dump_error)
                    .with_context(|| format!("failed to report iteration {iteration}"))?;
            }
        }

        match dump_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Execute one iteration of the event pipeline.
    pub fn step(&mut self) {
        self.grow();
        self.infect();
        self.recover();
        self.vaccinate();
        self.regress();
        self.die();
    }

    /// Add susceptible agents in proportion to the alive population.
    pub fn grow(&mut self) {
        let n_alive = self.pop.count_alive();
        let n_new = (self.cfg.growth * n_alive as f64).round() as usize;
        self.pop.grow(n_new);
    }

    pub fn infect(&mut self) {
        match self.infection {
            Infection::Paired => self.infect_paired(),
            Infection::Shuffled => self.infect_shuffled(),
        }
    }

    /// Pair two random agents `encounters` times.
    pub fn infect_paired(&mut self) {
        for _ in 0..self.cfg.encounters {
            let i_fst = self.pop.random_index(&mut self.rng);
            let i_snd = self.pop.random_index(&mut self.rng);
            self.encounter(i_fst, i_snd);
        }
    }

    /// Let the agents at two positions meet; returns whether one got infected.
    ///
    /// Under [`Tally::Asymmetric`] an infection of the second agent is not
    /// counted in the total.
    pub fn encounter(&mut self, i_fst: usize, i_snd: usize) -> bool {
        use Compartment::{Infectious, Susceptible};

        let agents = self.pop.agents_mut();
        match (agents[i_fst].state(), agents[i_snd].state()) {
            (Susceptible, Infectious) => {
                agents[i_fst].set_state(Infectious);
                self.total_infections += 1;
                true
            }
            (Infectious, Susceptible) => {
                agents[i_snd].set_state(Infectious);
                if self.cfg.tally == Tally::Symmetric {
                    self.total_infections += 1;
                }
                true
            }
            _ => false,
        }
    }

    /// Collect susceptible targets, shuffle, then pair the k-th target with
    /// whoever now sits at position k.
    pub fn infect_shuffled(&mut self) {
        use Compartment::{Infectious, Susceptible};

        let i_targets = self.pop.susceptible_indices(self.cfg.encounters);
        self.pop.shuffle(&mut self.rng);

        let agents = self.pop.agents_mut();
        for (i_slot, &i_target) in i_targets.iter().enumerate() {
            // The target position may hold a different agent after the shuffle.
            if agents[i_slot].state() == Infectious && agents[i_target].state() == Susceptible {
                agents[i_target].set_state(Infectious);
                self.total_infections += 1;
            }
        }
    }

    pub fn recover(&mut self) {
        for agt in self.pop.agents_mut() {
            if agt.state() == Compartment::Infectious && self.rates.recovery.sample(&mut self.rng) {
                agt.set_state(Compartment::Recovered);
            }
        }
    }

    pub fn vaccinate(&mut self) {
        for agt in self.pop.agents_mut() {
            if agt.state() == Compartment::Susceptible
                && self.rates.vaccination.sample(&mut self.rng)
            {
                agt.set_state(Compartment::Vaccinated);
            }
        }
    }

    /// Return recovered and vaccinated agents to the susceptible compartment.
    pub fn regress(&mut self) {
        for agt in self.pop.agents_mut() {
            let immune = matches!(
                agt.state(),
                Compartment::Vaccinated | Compartment::Recovered
            );
            if immune && self.rates.regression.sample(&mut self.rng) {
                agt.set_state(Compartment::Susceptible);
            }
        }
    }

    pub fn die(&mut self) {
        for agt in self.pop.agents_mut() {
            match agt.state() {
                Compartment::Susceptible => {
                    if self.rates.death_sus.sample(&mut self.rng) {
                        agt.set_state(Compartment::Dead);
                    }
                }
                Compartment::Infectious => {
                    if self.rates.death_inf.sample(&mut self.rng) {
                        agt.set_state(Compartment::Dead);
                        self.infection_deaths += 1;
                    }
                }
                _ => {}
            }
        }
    }

    /// Sort agents by identity and write them to this simulation's dump file.
    pub fn dump_agents(&mut self) -> Result<()> {
        self.pop.sort_by_identity();
        let file = self.cfg.agent_file(self.ordinal);
        write_agents(&file, &self.pop).with_context(|| format!("failed to dump agents to {file:?}"))
    }

    fn report(
        &mut self,
        iteration: usize,
        sink: &mut dyn Sink,
        dump_error: &mut Option<anyhow::Error>,
    ) -> Result<()> {
        let report = Report {
            sim: self.ordinal,
            iteration,
            stats: self.statistics(),
        };
        debug_assert_eq!(report.stats.census.total(), self.pop.len());
        log::debug!("simulation {} reached iteration {iteration}", self.ordinal);
        sink.record(&report).context("failed to record statistics")?;

        let every = self.cfg.output_agents;
        if every > 0 && iteration > 0 && iteration % every == 0 {
            if let Err(error) = self.dump_agents() {
                log::error!("simulation {} iteration {iteration}: {error:#}", self.ordinal);
                let error = error.context(format!("failed to dump agents at iteration {iteration}"));
                dump_error.get_or_insert(error);
            }
        }

        Ok(())
    }
}
