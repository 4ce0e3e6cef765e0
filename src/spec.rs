// Declarative description of a problem, as handed over by whatever stores or
// receives it. Nothing here is live, the assembler turns it into agents.

use crate::simulation::SimConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub arguments: Vec<ArgValue>,
}

impl DistributionSpec {
    pub fn new(type_name: impl Into<String>, arguments: Vec<ArgValue>) -> Self {
        Self {
            type_name: type_name.into(),
            arguments,
        }
    }

    pub fn exponential(rate: f64) -> Self {
        Self::new("Exponential", vec![ArgValue::Float(rate)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub arguments: Vec<ArgValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<AgentSpec>,
}

impl AgentSpec {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            arguments: Vec::new(),
            distribution: None,
            buffers: Vec::new(),
        }
    }

    pub fn with_distribution(mut self, distribution: DistributionSpec) -> Self {
        self.distribution = Some(distribution);
        self
    }

    pub fn with_args(mut self, arguments: Vec<ArgValue>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_buffer(mut self, buffer: AgentSpec) -> Self {
        self.buffers.push(buffer);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemSpec {
    pub agents: Vec<AgentSpec>,
    // Agent id to the ordered list of downstream agent ids.
    #[serde(default)]
    pub links: BTreeMap<String, Vec<String>>,
    // Ids of the agents whose occupancy distribution is collected.
    #[serde(default)]
    pub tracked: Vec<String>,
    #[serde(default)]
    pub config: SimConfig,
}

impl ProblemSpec {
    pub fn new(config: SimConfig) -> Self {
        Self {
            agents: Vec::new(),
            links: BTreeMap::new(),
            tracked: Vec::new(),
            config,
        }
    }

    pub fn agent(mut self, agent: AgentSpec) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn link(mut self, from: &str, to: &str) -> Self {
        self.links.entry(from.to_string()).or_default().push(to.to_string());
        self
    }

    pub fn track(mut self, id: &str) -> Self {
        self.tracked.push(id.to_string());
        self
    }

    // Classic M/M/S/Q problem: Poisson arrivals at `lambda`, exponential
    // service at `mu`. `servers = None` gives M/M/inf, `queue = None` an
    // unbounded waiting room and `Some(0)` no waiting room at all.
    pub fn queueing_system(
        lambda: f64,
        mu: f64,
        servers: Option<u32>,
        queue: Option<u32>,
        config: SimConfig,
    ) -> Self {
        let source = AgentSpec::new("source", "Source").with_distribution(DistributionSpec::exponential(lambda));

        let block = match servers {
            None => AgentSpec::new("block", "InfServiceBlocks").with_distribution(DistributionSpec::exponential(mu)),
            Some(n) => {
                let block = AgentSpec::new("block", "FinServiceBlocks")
                    .with_distribution(DistributionSpec::exponential(mu))
                    .with_args(vec![ArgValue::Int(i64::from(n))]);
                match queue {
                    Some(0) => block,
                    Some(q) => block.with_buffer(AgentSpec::new("queue", "QueueBuffer").with_args(vec![ArgValue::Int(i64::from(q))])),
                    None => block.with_buffer(AgentSpec::new("queue", "QueueBuffer")),
                }
            }
        };

        let name = match (servers, queue) {
            (None, _) => format!("M={lambda}/M={mu}/Inf"),
            (Some(n), None) => format!("M={lambda}/M={mu}/n={n}/Inf"),
            (Some(n), Some(q)) => format!("M={lambda}/M={mu}/n={n}/c={q}"),
        };

        let mut config = config;
        if config.name == SimConfig::default().name {
            config.name = name;
        }

        Self::new(config)
            .agent(source)
            .agent(block)
            .link("source", "block")
            .track("block")
    }
}
