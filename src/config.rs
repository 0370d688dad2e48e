use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::{Deref, RangeBounds},
    path::{Path, PathBuf},
};

/// Largest growth rate: the alive population at most doubles per iteration.
const MAX_GROWTH: f64 = 1.0;

/// Infection algorithm used by the simulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InfectionMethod {
    /// Even simulations use [`InfectionMethod::One`], odd ones [`InfectionMethod::Two`].
    Both,
    /// Paired random encounters.
    One,
    /// Shuffle pairing.
    Two,
}

/// How paired encounters count new infections.
///
/// `Asymmetric` reproduces the historical behaviour where an infection
/// caused by the second agent of a pair is not added to the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Tally {
    Symmetric,
    Asymmetric,
}

/// Raw simulation parameters.
///
/// Every field has a default, so a config file only needs the values it
/// changes. Turned into a [`Config`] by [`Params::validate`].
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    /// Number of independent simulations.
    pub simulations: usize,
    /// Ordinal of the first simulation.
    pub first_identity: usize,

    /// Initial number of agents.
    pub agents: usize,
    /// Initial number of infectious agents.
    pub infections: usize,
    /// Number of iterations per simulation.
    pub iterations: usize,
    /// Number of encounters per iteration.
    pub encounters: usize,
    /// New agents per iteration, relative to the alive population (at most 1).
    pub growth: f64,

    pub death_prob_susceptible: f64,
    pub death_prob_infectious: f64,
    pub recovery_prob: f64,
    pub vaccination_prob: f64,
    pub regression_prob: f64,

    pub infection_method: InfectionMethod,
    pub tally: Tally,

    /// Number of iterations between statistics rows.
    pub report_every: usize,
    /// Number of iterations between agent dumps (0 disables them).
    pub output_agents: usize,
    /// Base name of the agent dump files.
    pub agent_filename: PathBuf,

    /// Base seed; simulations draw from OS entropy when absent.
    pub seed: Option<u64>,
    /// Worker threads (0 picks one per CPU).
    pub threads: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            simulations: 10,
            first_identity: 0,
            agents: 10_000,
            infections: 10,
            iterations: 365 * 4,
            encounters: 100,
            growth: 0.0001,
            death_prob_susceptible: 0.0001,
            death_prob_infectious: 0.001,
            recovery_prob: 0.01,
            vaccination_prob: 0.001,
            regression_prob: 0.0003,
            infection_method: InfectionMethod::Both,
            tally: Tally::Symmetric,
            report_every: 100,
            output_agents: 0,
            agent_filename: PathBuf::from("agents.csv"),
            seed: None,
            threads: 0,
        }
    }
}

impl Params {
    /// Load [`Params`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or deserialized.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        let params = toml::from_str(&contents).context("failed to deserialize params")?;
        Ok(params)
    }

    /// Check every parameter and freeze them into a [`Config`].
    ///
    /// # Errors
    /// Returns an error naming the first invalid field and its value.
    pub fn validate(self) -> Result<Config> {
        check_num(self.simulations, 1..).context("invalid simulations")?;
        check_num(self.agents, 1..).context("invalid agents")?;
        check_num(self.infections, 0..=self.agents).context("invalid infections")?;

        check_num(self.growth, 0.0..=MAX_GROWTH).context("invalid growth")?;

        check_prob(self.death_prob_susceptible).context("invalid death_prob_susceptible")?;
        check_prob(self.death_prob_infectious).context("invalid death_prob_infectious")?;
        check_prob(self.recovery_prob).context("invalid recovery_prob")?;
        check_prob(self.vaccination_prob).context("invalid vaccination_prob")?;
        check_prob(self.regression_prob).context("invalid regression_prob")?;

        check_num(self.report_every, 1..).context("invalid report_every")?;

        if self.output_agents > 0 && self.agent_filename.file_name().is_none() {
            bail!("invalid agent_filename: {:?} does not name a file", self.agent_filename);
        }

        Ok(Config { params: self })
    }
}

/// Validated, immutable simulation configuration.
///
/// Only obtainable through [`Params::validate`]; fields are read through
/// [`Deref`] to [`Params`].
#[derive(Debug, PartialEq, Clone)]
pub struct Config {
    params: Params,
}

impl Deref for Config {
    type Target = Params;

    fn deref(&self) -> &Params {
        &self.params
    }
}

impl Config {
    /// Ordinals of all simulations of the run.
    pub fn ordinals(&self) -> std::ops::Range<usize> {
        self.first_identity..self.first_identity + self.simulations
    }

    /// Agent dump file of one simulation, e.g. `agents-0003.csv` for ordinal 3.
    pub fn agent_file(&self, ordinal: usize) -> PathBuf {
        let base = &self.agent_filename;
        let stem = base
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();
        let name = match base.extension() {
            Some(ext) => format!("{stem}-{ordinal:04}.{}", ext.to_string_lossy()),
            None => format!("{stem}-{ordinal:04}"),
        };
        base.with_file_name(name)
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_prob(prob: f64) -> Result<()> {
    check_num(prob, 0.0..=1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Params::default().validate().unwrap();
        assert_eq!(cfg.agents, 10_000);
        assert_eq!(cfg.iterations, 1460);
        assert_eq!(cfg.ordinals(), 0..10);
    }

    #[test]
    fn rejects_probability_above_one() {
        let err = Params {
            recovery_prob: 1.5,
            ..Params::default()
        }
        .validate()
        .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("recovery_prob"), "{msg}");
        assert!(msg.contains("1.5"), "{msg}");
    }

    #[test]
    fn rejects_negative_and_nan_probabilities() {
        let negative = Params {
            death_prob_infectious: -0.1,
            ..Params::default()
        };
        assert!(negative.validate().is_err());

        let nan = Params {
            vaccination_prob: f64::NAN,
            ..Params::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn rejects_more_infections_than_agents() {
        let err = Params {
            agents: 5,
            infections: 6,
            ..Params::default()
        }
        .validate()
        .unwrap_err();
        assert!(format!("{err:#}").contains("infections"));
    }

    #[test]
    fn rejects_bad_growth_and_counts() {
        for params in [
            Params {
                growth: -0.1,
                ..Params::default()
            },
            Params {
                growth: f64::INFINITY,
                ..Params::default()
            },
            Params {
                growth: 1e30,
                ..Params::default()
            },
            Params {
                growth: f64::NAN,
                ..Params::default()
            },
            Params {
                simulations: 0,
                ..Params::default()
            },
            Params {
                agents: 0,
                infections: 0,
                ..Params::default()
            },
            Params {
                report_every: 0,
                ..Params::default()
            },
        ] {
            assert!(params.clone().validate().is_err(), "{params:?}");
        }
    }

    #[test]
    fn growth_accepts_doubling() {
        let cfg = Params {
            growth: 1.0,
            ..Params::default()
        }
        .validate()
        .unwrap();
        assert_eq!(cfg.growth, 1.0);

        let err = Params {
            growth: 1.5,
            ..Params::default()
        }
        .validate()
        .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("invalid growth"), "{msg}");
        assert!(msg.contains("1.5"), "{msg}");
    }

    #[test]
    fn agent_file_is_distinct_per_simulation() {
        let cfg = Params {
            agent_filename: PathBuf::from("out/agents.csv"),
            ..Params::default()
        }
        .validate()
        .unwrap();
        assert_eq!(cfg.agent_file(3), PathBuf::from("out/agents-0003.csv"));
        assert_ne!(cfg.agent_file(0), cfg.agent_file(1));
    }

    #[test]
    fn parses_partial_toml() {
        let params: Params = toml::from_str(
            r#"
agents = 200
infection_method = "two"
tally = "asymmetric"
seed = 42
"#,
        )
        .unwrap();
        assert_eq!(params.agents, 200);
        assert_eq!(params.infection_method, InfectionMethod::Two);
        assert_eq!(params.tally, Tally::Asymmetric);
        assert_eq!(params.seed, Some(42));
        assert_eq!(params.encounters, Params::default().encounters);
    }

    #[test]
    fn rejects_unknown_toml_keys() {
        assert!(toml::from_str::<Params>("agnets = 5").is_err());
    }
}
