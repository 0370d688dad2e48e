use crate::config::Config;
use crate::engine::Simulation;
use crate::report::StdoutSink;
use anyhow::{Context, Result, bail};
use rayon::prelude::*;

/// Runs independent simulations on a pool of worker threads.
pub struct Runner {
    cfg: Config,
    pool: rayon::ThreadPool,
}

impl Runner {
    pub fn new(cfg: Config) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .thread_name(|i_thread| format!("sim-worker-{i_thread}"))
            .build()
            .context("failed to build thread pool")?;
        log::info!("using {} worker threads", pool.current_num_threads());

        Ok(Self { cfg, pool })
    }

    /// Run every simulation to completion.
    ///
    /// A failing simulation does not stop the others.
    ///
    /// # Errors
    /// Returns an error if any simulation failed; each failure is logged
    /// with its ordinal.
    pub fn run_all(&self) -> Result<()> {
        let ordinals: Vec<_> = self.cfg.ordinals().collect();
        let n_sims = ordinals.len();

        let failures: Vec<_> = self.pool.install(|| {
            ordinals
                .into_par_iter()
                .filter_map(|ordinal| self.run_one(ordinal).err().map(|error| (ordinal, error)))
                .collect()
        });

        for (ordinal, error) in &failures {
            log::error!("simulation {ordinal} failed: {error:#}");
        }
        if !failures.is_empty() {
            bail!("{} of {n_sims} simulations failed", failures.len());
        }

        Ok(())
    }

    fn run_one(&self, ordinal: usize) -> Result<()> {
        let mut sim = Simulation::from_config(ordinal, self.cfg.clone())
            .context("failed to construct simulation")?;
        log::info!("started simulation {}", sim.ordinal());

        sim.run(&mut StdoutSink).context("failed to run simulation")?;

        let stats = sim.statistics();
        log::info!(
            "completed simulation {} with {} agents, {} infections",
            sim.ordinal(),
            sim.population().len(),
            stats.total_infections
        );

        Ok(())
    }
}
