use super::AgentDistribution;
use anyhow::Result;
use csv::Writer;
use serde::Serialize;
use std::io;

#[derive(Debug, Serialize)]
struct Row<'a> {
    agent_id: &'a str,
    state: usize,
    probability: f64,
}

// One CSV row per (agent, state). The caller picks the sink.
pub struct DistributionLogger<W: io::Write> {
    writer: Writer<W>,
}

impl<W: io::Write> DistributionLogger<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: Writer::from_writer(sink),
        }
    }

    pub fn log(&mut self, distribution: &AgentDistribution) -> Result<()> {
        for (&state, &probability) in &distribution.probabilities {
            self.writer.serialize(Row {
                agent_id: &distribution.agent_id,
                state,
                probability,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_all(&mut self, distributions: &[AgentDistribution]) -> Result<()> {
        for distribution in distributions {
            self.log(distribution)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| anyhow::anyhow!("flushing CSV output: {}", e.error()))
    }
}
