mod config;
mod engine;
mod model;
mod report;
mod runner;
mod stats;

use crate::config::{InfectionMethod, Params, Tally};
use crate::runner::Runner;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// TOML file with simulation parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    simulations: Option<usize>,
    /// Ordinal of the first simulation.
    #[arg(long)]
    identity: Option<usize>,

    #[arg(short, long)]
    agents: Option<usize>,
    #[arg(long)]
    infections: Option<usize>,
    #[arg(short, long)]
    iterations: Option<usize>,
    #[arg(short, long)]
    encounters: Option<usize>,
    #[arg(short, long)]
    growth: Option<f64>,

    #[arg(long)]
    death_prob_susceptible: Option<f64>,
    #[arg(long)]
    death_prob_infectious: Option<f64>,
    #[arg(short, long)]
    recovery_prob: Option<f64>,
    #[arg(short, long)]
    vaccination_prob: Option<f64>,
    #[arg(long)]
    regression_prob: Option<f64>,

    #[arg(long, value_enum)]
    infection_method: Option<InfectionMethod>,
    #[arg(long, value_enum)]
    tally: Option<Tally>,

    /// Iterations between statistics rows.
    #[arg(long)]
    report_every: Option<usize>,
    /// Iterations between agent dumps (0 = never).
    #[arg(long)]
    output_agents: Option<usize>,
    #[arg(long)]
    agent_filename: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads (0 = one per CPU).
    #[arg(long)]
    threads: Option<usize>,
}

impl CLI {
    // Flags override the config file, which overrides the defaults.
    fn params(self) -> Result<Params> {
        let mut par = match &self.config {
            Some(file) => Params::from_file(file)
                .with_context(|| format!("failed to load params from {file:?}"))?,
            None => Params::default(),
        };

        if let Some(val) = self.simulations {
            par.simulations = val;
        }
        if let Some(val) = self.identity {
            par.first_identity = val;
        }
        if let Some(val) = self.agents {
            par.agents = val;
        }
        if let Some(val) = self.infections {
            par.infections = val;
        }
        if let Some(val) = self.iterations {
            par.iterations = val;
        }
        if let Some(val) = self.encounters {
            par.encounters = val;
        }
        if let Some(val) = self.growth {
            par.growth = val;
        }
        if let Some(val) = self.death_prob_susceptible {
            par.death_prob_susceptible = val;
        }
        if let Some(val) = self.death_prob_infectious {
            par.death_prob_infectious = val;
        }
        if let Some(val) = self.recovery_prob {
            par.recovery_prob = val;
        }
        if let Some(val) = self.vaccination_prob {
            par.vaccination_prob = val;
        }
        if let Some(val) = self.regression_prob {
            par.regression_prob = val;
        }
        if let Some(val) = self.infection_method {
            par.infection_method = val;
        }
        if let Some(val) = self.tally {
            par.tally = val;
        }
        if let Some(val) = self.report_every {
            par.report_every = val;
        }
        if let Some(val) = self.output_agents {
            par.output_agents = val;
        }
        if let Some(val) = self.agent_filename {
            par.agent_filename = val;
        }
        if let Some(val) = self.threads {
            par.threads = val;
        }
        if let Some(seed) = self.seed {
            par.seed = Some(seed);
        }

        Ok(par)
    }
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let cfg = args
        .params()?
        .validate()
        .context("failed to validate params")?;
    log::info!("{cfg:#?}");

    let runner = Runner::new(cfg).context("failed to construct runner")?;
    runner.run_all()?;

    Ok(())
}
