pub mod buffer;
pub mod call;
pub mod orbit;
pub mod service_block;
pub mod source;

pub use buffer::{Buffer, Discipline, SharedBuffer};
pub use call::{Call, Offer, RejectReason, Rejected};
pub use orbit::Orbit;
pub use service_block::{FiniteServers, InfiniteServers, PollingServer, ServiceBlock, SingleServer};
pub use source::Source;

use crate::error::{Result, SimError};
use std::collections::HashMap;
use std::fmt;

// Slot of an agent inside its [`Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentIndex(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Source,
    ServiceBlock,
    Buffer,
    Orbit,
    Call,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentKind::Source => "Source",
            AgentKind::ServiceBlock => "ServiceBlock",
            AgentKind::Buffer => "Buffer",
            AgentKind::Orbit => "Orbit",
            AgentKind::Call => "Call",
        };
        f.write_str(name)
    }
}

// Selects the state transition that runs when an agent's event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTag {
    Source,
    FiniteSource,
    ServiceBlock,
    InfServiceBlocks,
    FinServiceBlocks,
    PollingServiceBlock,
    QueueBuffer,
    StackBuffer,
    Orbit,
    Call,
}

impl EventTag {
    pub const ALL: [EventTag; 10] = [
        EventTag::Source,
        EventTag::FiniteSource,
        EventTag::ServiceBlock,
        EventTag::InfServiceBlocks,
        EventTag::FinServiceBlocks,
        EventTag::PollingServiceBlock,
        EventTag::QueueBuffer,
        EventTag::StackBuffer,
        EventTag::Orbit,
        EventTag::Call,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::Source => "Source",
            EventTag::FiniteSource => "FiniteSource",
            EventTag::ServiceBlock => "ServiceBlock",
            EventTag::InfServiceBlocks => "InfServiceBlocks",
            EventTag::FinServiceBlocks => "FinServiceBlocks",
            EventTag::PollingServiceBlock => "PollingServiceBlock",
            EventTag::QueueBuffer => "QueueBuffer",
            EventTag::StackBuffer => "StackBuffer",
            EventTag::Orbit => "Orbit",
            EventTag::Call => "Call",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Common surface of every live participant in the network.
pub trait ModellingAgent: fmt::Debug {
    fn id(&self) -> &str;

    // `f64::INFINITY` when the agent has nothing scheduled.
    fn next_event_time(&self) -> f64;

    fn event_tag(&self) -> EventTag;

    fn kind(&self) -> AgentKind;

    // Whether the agent can ever schedule its own events.
    fn is_active(&self) -> bool;

    // Discrete occupancy used for statistics.
    fn current_state(&self) -> usize;
}

#[derive(Debug)]
pub enum Agent {
    Source(Source),
    ServiceBlock(ServiceBlock),
    Buffer(SharedBuffer),
    Orbit(Orbit),
}

impl Agent {
    fn inner(&self) -> &dyn ModellingAgent {
        match self {
            Agent::Source(a) => a,
            Agent::ServiceBlock(a) => a,
            Agent::Buffer(a) => a,
            Agent::Orbit(a) => a,
        }
    }

    pub fn as_source_mut(&mut self) -> Option<&mut Source> {
        match self {
            Agent::Source(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_service_block(&self) -> Option<&ServiceBlock> {
        match self {
            Agent::ServiceBlock(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_service_block_mut(&mut self) -> Option<&mut ServiceBlock> {
        match self {
            Agent::ServiceBlock(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_orbit_mut(&mut self) -> Option<&mut Orbit> {
        match self {
            Agent::Orbit(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&SharedBuffer> {
        match self {
            Agent::Buffer(b) => Some(b),
            _ => None,
        }
    }
}

impl ModellingAgent for Agent {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn next_event_time(&self) -> f64 {
        self.inner().next_event_time()
    }

    fn event_tag(&self) -> EventTag {
        self.inner().event_tag()
    }

    fn kind(&self) -> AgentKind {
        self.inner().kind()
    }

    fn is_active(&self) -> bool {
        self.inner().is_active()
    }

    fn current_state(&self) -> usize {
        self.inner().current_state()
    }
}

impl From<Source> for Agent {
    fn from(source: Source) -> Self {
        Agent::Source(source)
    }
}

impl From<ServiceBlock> for Agent {
    fn from(block: ServiceBlock) -> Self {
        Agent::ServiceBlock(block)
    }
}

impl From<SharedBuffer> for Agent {
    fn from(buffer: SharedBuffer) -> Self {
        Agent::Buffer(buffer)
    }
}

impl From<Orbit> for Agent {
    fn from(orbit: Orbit) -> Self {
        Agent::Orbit(orbit)
    }
}

// Every agent of a problem, in insertion order, addressable by id.
#[derive(Debug, Default)]
pub struct Network {
    agents: Vec<Agent>,
    index: HashMap<String, AgentIndex>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, agent: Agent) -> Result<AgentIndex> {
        if self.index.contains_key(agent.id()) {
            return Err(SimError::DuplicateAgent {
                id: agent.id().to_string(),
            });
        }
        let idx = AgentIndex(self.agents.len());
        self.index.insert(agent.id().to_string(), idx);
        self.agents.push(agent);
        Ok(idx)
    }

    pub fn get(&self, idx: AgentIndex) -> Option<&Agent> {
        self.agents.get(idx.0)
    }

    pub fn get_mut(&mut self, idx: AgentIndex) -> Option<&mut Agent> {
        self.agents.get_mut(idx.0)
    }

    pub fn find(&self, id: &str) -> Option<AgentIndex> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentIndex, &Agent)> {
        self.agents.iter().enumerate().map(|(i, a)| (AgentIndex(i), a))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::continuous::Deterministic;

    fn source(id: &str) -> Agent {
        Source::new(id, Box::new(Deterministic::new(1.0).unwrap())).into()
    }

    #[test]
    fn ids_are_unique_within_a_network() {
        let mut network = Network::new();
        let first = network.push(source("src")).unwrap();
        assert_eq!(first, AgentIndex(0));

        let err = network.push(source("src")).unwrap_err();
        assert!(matches!(err, SimError::DuplicateAgent { id } if id == "src"));
        assert_eq!(network.len(), 1);
    }

    #[test]
    fn lookup_by_id_and_kind() {
        let mut network = Network::new();
        network.push(source("src")).unwrap();
        let q = network
            .push(SharedBuffer::new(Buffer::unbounded("q", Discipline::Stack)).into())
            .unwrap();

        assert_eq!(network.find("q"), Some(q));
        assert_eq!(network.find("nope"), None);

        let agent = network.get(q).unwrap();
        assert_eq!(agent.kind(), AgentKind::Buffer);
        assert_eq!(agent.event_tag(), EventTag::StackBuffer);
        assert!(agent.as_buffer().is_some());
        assert!(agent.as_service_block().is_none());
    }

    #[test]
    fn tag_names_are_stable() {
        let names: Vec<&str> = EventTag::ALL.iter().map(EventTag::as_str).collect();
        assert!(names.contains(&"PollingServiceBlock"));
        assert_eq!(EventTag::FinServiceBlocks.to_string(), "FinServiceBlocks");
    }
}
