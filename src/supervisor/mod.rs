pub mod handlers;

pub use handlers::{EventHandler, HandlerTable};

use crate::agents::{Agent, AgentIndex, ModellingAgent, Network};
use crate::error::{Result, SimError};
use std::collections::HashMap;
use tracing::trace;

// The globally next thing to happen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub model_time: f64,
    pub agent: AgentIndex,
}

// Owns the agents and dispatches their events in time order.
#[derive(Debug)]
pub struct Supervisor {
    network: Network,
    links: HashMap<AgentIndex, Vec<AgentIndex>>,
    handlers: HandlerTable,
    active: Vec<AgentIndex>,
    now: f64,
}

impl Supervisor {
    pub fn new(network: Network, links: HashMap<AgentIndex, Vec<AgentIndex>>, handlers: HandlerTable) -> Self {
        let active = network
            .iter()
            .filter(|(_, agent)| agent.is_active())
            .map(|(idx, _)| idx)
            .collect();
        Self {
            network,
            links,
            handlers,
            active,
            now: 0.0,
        }
    }

    // Picks the active agent with the earliest event. On a tie the agent
    // that comes last in insertion order wins.
    pub fn get_next_event(&self) -> Result<Event> {
        let mut next: Option<Event> = None;
        for &idx in &self.active {
            let Some(agent) = self.network.get(idx) else {
                continue;
            };
            let t = agent.next_event_time();
            if !t.is_finite() {
                continue;
            }
            if next.is_none_or(|best| t <= best.model_time) {
                next = Some(Event { model_time: t, agent: idx });
            }
        }

        let event = next.ok_or(SimError::NoActiveAgents { model_time: self.now })?;
        trace!("next event at {:.6} from agent #{}", event.model_time, event.agent.0);
        Ok(event)
    }

    pub fn fire_event(&mut self, event: Event) -> Result<bool> {
        let agent: &Agent = self.network.get(event.agent).ok_or_else(|| SimError::UnknownAgent {
            id: format!("#{}", event.agent.0),
        })?;
        let tag = agent.event_tag();
        let handler = self.handlers.get(tag).ok_or_else(|| SimError::MissingHandler {
            tag: tag.to_string(),
            agent_id: agent.id().to_string(),
        })?;

        self.now = event.model_time;
        let links = self.links.get(&event.agent).map(Vec::as_slice).unwrap_or(&[]);
        handler(&mut self.network, event.agent, links, event.model_time)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn now(&self) -> f64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::service_block::{ServiceBlock, SingleServer};
    use crate::agents::{Buffer, Discipline, EventTag, SharedBuffer, Source};
    use crate::distributions::Distribution;
    use crate::distributions::continuous::Deterministic;

    fn every(v: f64) -> Box<dyn Distribution> {
        Box::new(Deterministic::new(v).unwrap())
    }

    #[test]
    fn ties_go_to_the_last_agent() {
        let mut network = Network::new();
        network.push(Source::new("first", every(1.0)).into()).unwrap();
        let second = network.push(Source::new("second", every(1.0)).into()).unwrap();
        network.push(Source::new("later", every(2.0)).into()).unwrap();

        let supervisor = Supervisor::new(network, HashMap::new(), HandlerTable::with_all());
        let event = supervisor.get_next_event().unwrap();
        assert_eq!(event.agent, second);
        assert_eq!(event.model_time, 1.0);
    }

    #[test]
    fn buffers_are_never_scheduled() {
        let mut network = Network::new();
        network
            .push(SharedBuffer::new(Buffer::unbounded("q", Discipline::Queue)).into())
            .unwrap();
        network
            .push(ServiceBlock::Single(SingleServer::new("idle", every(1.0))).into())
            .unwrap();

        let supervisor = Supervisor::new(network, HashMap::new(), HandlerTable::with_all());
        let err = supervisor.get_next_event().unwrap_err();
        assert!(matches!(err, SimError::NoActiveAgents { .. }));
    }

    #[test]
    fn firing_without_a_handler_fails() {
        let mut network = Network::new();
        network.push(Source::new("src", every(1.0)).into()).unwrap();

        let mut supervisor = Supervisor::new(network, HashMap::new(), HandlerTable::new());
        let event = supervisor.get_next_event().unwrap();
        let err = supervisor.fire_event(event).unwrap_err();
        assert!(matches!(err, SimError::MissingHandler { tag, .. } if tag == EventTag::Source.as_str()));
    }

    #[test]
    fn an_agent_without_links_still_fires() {
        let mut network = Network::new();
        let src = network.push(Source::new("src", every(1.0)).into()).unwrap();

        let mut supervisor = Supervisor::new(network, HashMap::new(), HandlerTable::with_all());
        let event = supervisor.get_next_event().unwrap();
        // The call is dropped, not an error.
        assert!(!supervisor.fire_event(event).unwrap());
        assert_eq!(supervisor.now(), 1.0);
        assert_eq!(supervisor.network().get(src).unwrap().next_event_time(), 2.0);
    }
}
