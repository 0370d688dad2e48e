use crate::model::Population;
use crate::stats::{REPORT_HEADER, Report};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    io::{self, Write},
    path::Path,
};

/// Destination of a simulation's statistics rows.
pub trait Sink {
    fn header(&mut self) -> Result<()>;
    fn record(&mut self, report: &Report) -> Result<()>;
}

/// Writes rows to standard output, one locked write per row.
pub struct StdoutSink;

impl StdoutSink {
    fn write_line(&mut self, line: &dyn std::fmt::Display) -> Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}").context("failed to write to stdout")?;
        Ok(())
    }
}

impl Sink for StdoutSink {
    fn header(&mut self) -> Result<()> {
        self.write_line(&REPORT_HEADER)
    }

    fn record(&mut self, report: &Report) -> Result<()> {
        self.write_line(report)
    }
}

/// Collects rows in memory.
impl Sink for Vec<Report> {
    fn header(&mut self) -> Result<()> {
        Ok(())
    }

    fn record(&mut self, report: &Report) -> Result<()> {
        self.push(*report);
        Ok(())
    }
}

#[derive(Serialize)]
struct AgentRow {
    id: usize,
    state: char,
}

/// Write every agent's identity and compartment code to a CSV file.
///
/// Agents are written in population order; sort the population by identity
/// beforehand for a stable layout.
pub fn write_agents<P: AsRef<Path>>(file: P, pop: &Population) -> Result<()> {
    let file = file.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(file)
        .with_context(|| format!("failed to create {file:?}"))?;

    writer
        .write_record(["id", "state"])
        .context("failed to write header")?;
    for agt in pop.agents() {
        writer
            .serialize(AgentRow {
                id: agt.id(),
                state: agt.state().code(),
            })
            .with_context(|| format!("failed to write agent {}", agt.id()))?;
    }

    writer.flush().context("failed to flush writer stream")?;

    Ok(())
}
