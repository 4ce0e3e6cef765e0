use crate::agents::{Agent, AgentIndex, ModellingAgent, Network};
use crate::error::{Result, SimError};
use crate::simulation::SimConfig;
use crate::supervisor::handlers::HandlerTable;
use std::collections::HashMap;

// A live agent graph ready to simulate.
#[derive(Debug)]
pub struct Problem {
    pub(crate) network: Network,
    pub(crate) links: HashMap<AgentIndex, Vec<AgentIndex>>,
    pub(crate) tracked: Vec<AgentIndex>,
    pub(crate) config: SimConfig,
    pub(crate) handlers: HandlerTable,
}

impl Problem {
    pub fn new(config: SimConfig) -> Self {
        Self {
            network: Network::new(),
            links: HashMap::new(),
            tracked: Vec::new(),
            config,
            handlers: HandlerTable::new(),
        }
    }

    // Adds the agent and makes sure its event tag has a handler.
    pub fn add_agent(&mut self, agent: Agent) -> Result<AgentIndex> {
        let tag = agent.event_tag();
        let idx = self.network.push(agent)?;
        self.handlers.register(tag);
        Ok(idx)
    }

    // Appends `to` to the routing list of `from`.
    pub fn link(&mut self, from: &str, to: &str) -> Result<()> {
        let source = self
            .network
            .find(from)
            .ok_or_else(|| SimError::UnknownAgent { id: from.to_string() })?;
        let target = self.network.find(to).ok_or_else(|| SimError::UnknownLinkTarget {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        self.links.entry(source).or_default().push(target);
        Ok(())
    }

    pub fn track(&mut self, id: &str) -> Result<()> {
        let idx = self
            .network
            .find(id)
            .ok_or_else(|| SimError::UnknownAgent { id: id.to_string() })?;
        if !self.tracked.contains(&idx) {
            self.tracked.push(idx);
        }
        Ok(())
    }

    // Every buffer a service block draws from must be a buffer agent of
    // this problem.
    pub fn validate(&self) -> Result<()> {
        for (_, agent) in self.network.iter() {
            let Some(block) = agent.as_service_block() else {
                continue;
            };
            for buffer in block.buffers() {
                let idx = self.network.find(buffer.id()).ok_or_else(|| SimError::UnknownAgent {
                    id: buffer.id().to_string(),
                })?;
                if let Some(other) = self.network.get(idx).filter(|a| a.as_buffer().is_none()) {
                    return Err(SimError::NotABuffer {
                        id: buffer.id().to_string(),
                        kind: other.kind().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn links_of(&self, idx: AgentIndex) -> &[AgentIndex] {
        self.links.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tracked(&self) -> &[AgentIndex] {
        &self.tracked
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SimConfig {
        &mut self.config
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }
}
