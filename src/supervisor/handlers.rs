// State transitions run when an agent's event fires, one per event tag.

use crate::agents::{
    Agent, AgentIndex, Call, EventTag, ModellingAgent, Network, Offer, Orbit, RejectReason, Rejected, ServiceBlock,
    Source,
};
use crate::error::{Result, SimError};
use std::collections::HashMap;
use tracing::{debug, warn};

// `(network, firing agent, its links, model time)`. The returned flag says
// whether the transition's side effects went through.
pub type EventHandler = fn(&mut Network, AgentIndex, &[AgentIndex], f64) -> Result<bool>;

pub fn handler_for(tag: EventTag) -> EventHandler {
    match tag {
        EventTag::Source | EventTag::FiniteSource => source_arrival,
        EventTag::ServiceBlock
        | EventTag::InfServiceBlocks
        | EventTag::FinServiceBlocks
        | EventTag::PollingServiceBlock => service_completion,
        EventTag::Orbit => orbit_retry,
        EventTag::QueueBuffer | EventTag::StackBuffer | EventTag::Call => passive,
    }
}

// Handlers for the event tags present in one problem.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<EventTag, EventHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_all() -> Self {
        let mut table = Self::new();
        for tag in EventTag::ALL {
            table.register(tag);
        }
        table
    }

    // Returns false when the tag already had a handler.
    pub fn register(&mut self, tag: EventTag) -> bool {
        if self.handlers.contains_key(&tag) {
            return false;
        }
        self.handlers.insert(tag, handler_for(tag));
        true
    }

    pub fn get(&self, tag: EventTag) -> Option<EventHandler> {
        self.handlers.get(&tag).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn missing(idx: AgentIndex) -> SimError {
    SimError::UnknownAgent {
        id: format!("#{}", idx.0),
    }
}

fn source_mut(network: &mut Network, idx: AgentIndex) -> Result<&mut Source> {
    network.get_mut(idx).and_then(Agent::as_source_mut).ok_or_else(|| missing(idx))
}

fn block_mut(network: &mut Network, idx: AgentIndex) -> Result<&mut ServiceBlock> {
    network
        .get_mut(idx)
        .and_then(Agent::as_service_block_mut)
        .ok_or_else(|| missing(idx))
}

fn orbit_mut(network: &mut Network, idx: AgentIndex) -> Result<&mut Orbit> {
    network.get_mut(idx).and_then(Agent::as_orbit_mut).ok_or_else(|| missing(idx))
}

// The call leaves the system; a closed-loop owner may emit again.
fn release(network: &mut Network, call: &mut Call, t: f64) {
    if let Some(owner) = call.do_event(t) {
        if let Some(source) = network.get_mut(owner).and_then(Agent::as_source_mut) {
            source.unblock(t);
        }
    }
}

// Offers the call to linked service blocks in link order, free ones first
// when `free_only` is set.
fn offer_to_blocks(network: &mut Network, links: &[AgentIndex], call: Call, t: f64, free_only: bool) -> Offer {
    let mut call = call;
    let mut reason = RejectReason::Busy;
    for &link in links {
        let Some(block) = network.get_mut(link).and_then(Agent::as_service_block_mut) else {
            continue;
        };
        if free_only && !block.is_free() {
            continue;
        }
        match block.take_call(call, t) {
            Ok(()) => return Ok(()),
            Err(rejected) => {
                reason = rejected.reason;
                call = rejected.call;
            }
        }
    }
    Err(Rejected::new(call, reason))
}

// Free blocks, then any block willing to take it, then the first orbit.
fn place_call(network: &mut Network, links: &[AgentIndex], call: Call, t: f64) -> Offer {
    let call = match offer_to_blocks(network, links, call, t, true) {
        Ok(()) => return Ok(()),
        Err(rejected) => rejected.call,
    };
    let rejected = match offer_to_blocks(network, links, call, t, false) {
        Ok(()) => return Ok(()),
        Err(rejected) => rejected,
    };
    for &link in links {
        if let Some(orbit) = network.get_mut(link).and_then(Agent::as_orbit_mut) {
            orbit.take_call(rejected.call, t);
            return Ok(());
        }
    }
    Err(rejected)
}

fn source_arrival(network: &mut Network, me: AgentIndex, links: &[AgentIndex], t: f64) -> Result<bool> {
    let call = source_mut(network, me)?.do_event(t, me);

    match place_call(network, links, call, t) {
        Ok(()) => Ok(true),
        Err(Rejected { mut call, reason }) => {
            let source = source_mut(network, me)?;
            warn!("t={:.6} {} dropped {}: {}", t, source.id(), call.id(), reason);
            source.record_drop();
            release(network, &mut call, t);
            Ok(false)
        }
    }
}

fn service_completion(network: &mut Network, me: AgentIndex, _links: &[AgentIndex], t: f64) -> Result<bool> {
    let block = block_mut(network, me)?;
    let polling = matches!(block, ServiceBlock::Polling(_));
    match block.do_event(t) {
        Some(mut call) => {
            release(network, &mut call, t);
            Ok(true)
        }
        // A poll switch completes nothing.
        None => Ok(polling),
    }
}

fn orbit_retry(network: &mut Network, me: AgentIndex, links: &[AgentIndex], t: f64) -> Result<bool> {
    let Some(call) = orbit_mut(network, me)?.take_head() else {
        return Ok(false);
    };
    debug!("t={:.6} retrying {}", t, call.id());

    match offer_to_blocks(network, links, call, t, false) {
        Ok(()) => {
            orbit_mut(network, me)?.reschedule(t);
            Ok(true)
        }
        Err(rejected) => {
            orbit_mut(network, me)?.retry_failed(rejected.call, t);
            Ok(false)
        }
    }
}

fn passive(_: &mut Network, _: AgentIndex, _: &[AgentIndex], _: f64) -> Result<bool> {
    Ok(false)
}
