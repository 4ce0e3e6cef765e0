// Service blocks: one server, unlimited servers, a fixed pool, and a single
// server that polls its buffers round-robin.

use super::buffer::SharedBuffer;
use super::call::{Call, Offer, RejectReason, Rejected};
use super::{AgentKind, EventTag, ModellingAgent};
use crate::distributions::Distribution;
use crate::error::{Result, SimError};
use tracing::debug;

// Offers the call to each bound buffer in declaration order.
fn send_to_buffer(owner: &str, buffers: &[SharedBuffer], call: Call) -> Offer {
    let reason = if buffers.is_empty() { RejectReason::Busy } else { RejectReason::Capacity };
    let mut call = call;
    for buffer in buffers {
        match buffer.take_call(call) {
            Ok(()) => {
                debug!("{} parked call in buffer {}", owner, buffer.id());
                return Ok(());
            }
            Err(rejected) => call = rejected.call,
        }
    }
    Err(Rejected::new(call, reason))
}

// Pulls from the first non-empty bound buffer.
fn pull_from_buffers(buffers: &[SharedBuffer]) -> Option<Call> {
    buffers.iter().find_map(|b| b.pass_call())
}

fn buffered(buffers: &[SharedBuffer]) -> usize {
    buffers.iter().map(|b| b.len()).sum()
}

#[derive(Debug)]
pub struct SingleServer {
    id: String,
    distribution: Box<dyn Distribution>,
    buffers: Vec<SharedBuffer>,
    busy: Option<(Call, f64)>,
}

impl SingleServer {
    pub fn new(id: impl Into<String>, distribution: Box<dyn Distribution>) -> Self {
        Self {
            id: id.into(),
            distribution,
            buffers: Vec::new(),
            busy: None,
        }
    }

    fn accept(&mut self, call: Call, t: f64) {
        let done_at = t + self.distribution.generate();
        debug!("t={:.6} {} serving {} until {:.6}", t, self.id, call.id(), done_at);
        self.busy = Some((call, done_at));
    }

    pub fn take_call(&mut self, call: Call, t: f64) -> Offer {
        if self.busy.is_none() {
            self.accept(call, t);
            Ok(())
        } else {
            send_to_buffer(&self.id, &self.buffers, call)
        }
    }

    pub fn do_event(&mut self, t: f64) -> Option<Call> {
        let (finished, _) = self.busy.take()?;
        debug!("t={:.6} {} finished {}", t, self.id, finished.id());
        if let Some(next) = pull_from_buffers(&self.buffers) {
            self.accept(next, t);
        }
        Some(finished)
    }

    pub fn in_service(&self) -> usize {
        usize::from(self.busy.is_some())
    }
}

// Unlimited parallel servers, every call starts service on arrival.
#[derive(Debug)]
pub struct InfiniteServers {
    id: String,
    distribution: Box<dyn Distribution>,
    in_flight: Vec<(f64, Call)>,
}

impl InfiniteServers {
    pub fn new(id: impl Into<String>, distribution: Box<dyn Distribution>) -> Self {
        Self {
            id: id.into(),
            distribution,
            in_flight: Vec::new(),
        }
    }

    fn earliest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, (done_at, _)) in self.in_flight.iter().enumerate() {
            if best.is_none_or(|b| *done_at < self.in_flight[b].0) {
                best = Some(i);
            }
        }
        best
    }

    pub fn take_call(&mut self, call: Call, t: f64) -> Offer {
        let done_at = t + self.distribution.generate();
        debug!("t={:.6} {} serving {} until {:.6}", t, self.id, call.id(), done_at);
        self.in_flight.push((done_at, call));
        Ok(())
    }

    pub fn do_event(&mut self, t: f64) -> Option<Call> {
        let idx = self.earliest()?;
        let (_, finished) = self.in_flight.swap_remove(idx);
        debug!("t={:.6} {} finished {}", t, self.id, finished.id());
        Some(finished)
    }

    pub fn in_service(&self) -> usize {
        self.in_flight.len()
    }
}

// A fixed pool of identical servers.
#[derive(Debug)]
pub struct FiniteServers {
    id: String,
    distribution: Box<dyn Distribution>,
    buffers: Vec<SharedBuffer>,
    slots: Vec<Option<(f64, Call)>>,
}

impl FiniteServers {
    pub fn new(id: impl Into<String>, distribution: Box<dyn Distribution>, servers: usize) -> Result<Self> {
        if servers == 0 {
            return Err(SimError::invalid("servers", "a server pool needs at least one server"));
        }
        Ok(Self {
            id: id.into(),
            distribution,
            buffers: Vec::new(),
            slots: (0..servers).map(|_| None).collect(),
        })
    }

    fn earliest(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some((done_at, _)) = slot {
                if best.is_none_or(|(_, b)| *done_at < b) {
                    best = Some((i, *done_at));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    fn accept_into(&mut self, slot: usize, call: Call, t: f64) {
        let done_at = t + self.distribution.generate();
        debug!("t={:.6} {} server {} serving {} until {:.6}", t, self.id, slot, call.id(), done_at);
        self.slots[slot] = Some((done_at, call));
    }

    pub fn servers(&self) -> usize {
        self.slots.len()
    }

    pub fn is_free(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    pub fn take_call(&mut self, call: Call, t: f64) -> Offer {
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.accept_into(slot, call, t);
                Ok(())
            }
            None => send_to_buffer(&self.id, &self.buffers, call),
        }
    }

    pub fn do_event(&mut self, t: f64) -> Option<Call> {
        let slot = self.earliest()?;
        let (_, finished) = self.slots[slot].take()?;
        debug!("t={:.6} {} server {} finished {}", t, self.id, slot, finished.id());
        if let Some(next) = pull_from_buffers(&self.buffers) {
            self.accept_into(slot, next, t);
        }
        Some(finished)
    }

    pub fn in_service(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

// Single server that only ever serves from the buffer it is currently
// polling, moving to the next one every `period`.
#[derive(Debug)]
pub struct PollingServer {
    id: String,
    distribution: Box<dyn Distribution>,
    buffers: Vec<SharedBuffer>,
    busy: Option<(Call, f64)>,
    current: usize,
    period: f64,
    next_poll: f64,
}

impl PollingServer {
    pub fn new(id: impl Into<String>, distribution: Box<dyn Distribution>, period: f64) -> Result<Self> {
        if !(period.is_finite() && period > 0.0) {
            return Err(SimError::invalid("period", format!("must be a positive real, got {period}")));
        }
        Ok(Self {
            id: id.into(),
            distribution,
            buffers: Vec::new(),
            busy: None,
            current: 0,
            period,
            next_poll: period,
        })
    }

    fn completion_time(&self) -> f64 {
        self.busy.as_ref().map_or(f64::INFINITY, |(_, done_at)| *done_at)
    }

    fn take_next_call(&mut self, t: f64) {
        let Some(buffer) = self.buffers.get(self.current) else {
            return;
        };
        if let Some(call) = buffer.pass_call() {
            let done_at = t + self.distribution.generate();
            debug!("t={:.6} {} serving {} until {:.6}", t, self.id, call.id(), done_at);
            self.busy = Some((call, done_at));
        }
    }

    pub fn polled_buffer(&self) -> Option<&SharedBuffer> {
        self.buffers.get(self.current)
    }

    pub fn next_poll(&self) -> f64 {
        self.next_poll
    }

    // Calls always wait in a buffer first, the server only pulls from the
    // one it is polling.
    pub fn take_call(&mut self, call: Call, t: f64) -> Offer {
        send_to_buffer(&self.id, &self.buffers, call)?;
        if self.busy.is_none() {
            self.take_next_call(t);
        }
        Ok(())
    }

    pub fn do_event(&mut self, t: f64) -> Option<Call> {
        if self.next_poll < self.completion_time() {
            if !self.buffers.is_empty() {
                self.current = (self.current + 1) % self.buffers.len();
            }
            debug!("t={:.6} {} now polling buffer #{}", t, self.id, self.current);
            self.next_poll += self.period;
            if self.busy.is_none() {
                self.take_next_call(t);
            }
            None
        } else {
            let (finished, _) = self.busy.take()?;
            debug!("t={:.6} {} finished {}", t, self.id, finished.id());
            self.take_next_call(t);
            Some(finished)
        }
    }

    pub fn in_service(&self) -> usize {
        usize::from(self.busy.is_some())
    }
}

#[derive(Debug)]
pub enum ServiceBlock {
    Single(SingleServer),
    Infinite(InfiniteServers),
    Finite(FiniteServers),
    Polling(PollingServer),
}

impl ServiceBlock {
    pub fn is_free(&self) -> bool {
        match self {
            ServiceBlock::Single(s) => s.busy.is_none(),
            ServiceBlock::Infinite(_) => true,
            ServiceBlock::Finite(s) => s.is_free(),
            ServiceBlock::Polling(s) => s.busy.is_none(),
        }
    }

    pub fn take_call(&mut self, call: Call, t: f64) -> Offer {
        match self {
            ServiceBlock::Single(s) => s.take_call(call, t),
            ServiceBlock::Infinite(s) => s.take_call(call, t),
            ServiceBlock::Finite(s) => s.take_call(call, t),
            ServiceBlock::Polling(s) => s.take_call(call, t),
        }
    }

    // Finishes whatever is due at `t`. Polling switches return no call.
    pub fn do_event(&mut self, t: f64) -> Option<Call> {
        match self {
            ServiceBlock::Single(s) => s.do_event(t),
            ServiceBlock::Infinite(s) => s.do_event(t),
            ServiceBlock::Finite(s) => s.do_event(t),
            ServiceBlock::Polling(s) => s.do_event(t),
        }
    }

    // Unlimited servers never queue anything.
    fn buffers_mut(&mut self) -> Option<&mut Vec<SharedBuffer>> {
        match self {
            ServiceBlock::Single(s) => Some(&mut s.buffers),
            ServiceBlock::Infinite(_) => None,
            ServiceBlock::Finite(s) => Some(&mut s.buffers),
            ServiceBlock::Polling(s) => Some(&mut s.buffers),
        }
    }

    pub fn buffers(&self) -> &[SharedBuffer] {
        match self {
            ServiceBlock::Single(s) => &s.buffers,
            ServiceBlock::Infinite(_) => &[],
            ServiceBlock::Finite(s) => &s.buffers,
            ServiceBlock::Polling(s) => &s.buffers,
        }
    }

    pub fn can_bind_buffers(&self) -> bool {
        !matches!(self, ServiceBlock::Infinite(_))
    }

    pub fn bind_buffer(&mut self, buffer: SharedBuffer) -> Result<()> {
        let id = self.id().to_string();
        match self.buffers_mut() {
            Some(buffers) => {
                buffers.push(buffer);
                Ok(())
            }
            None => Err(SimError::invalid(
                "buffers",
                format!("'{id}' starts every call at once and cannot bind buffer '{}'", buffer.id()),
            )),
        }
    }

    // Calls currently being served, not counting anything buffered.
    pub fn in_service(&self) -> usize {
        match self {
            ServiceBlock::Single(s) => s.in_service(),
            ServiceBlock::Infinite(s) => s.in_service(),
            ServiceBlock::Finite(s) => s.in_service(),
            ServiceBlock::Polling(s) => s.in_service(),
        }
    }
}

impl ModellingAgent for ServiceBlock {
    fn id(&self) -> &str {
        match self {
            ServiceBlock::Single(s) => &s.id,
            ServiceBlock::Infinite(s) => &s.id,
            ServiceBlock::Finite(s) => &s.id,
            ServiceBlock::Polling(s) => &s.id,
        }
    }

    fn next_event_time(&self) -> f64 {
        match self {
            ServiceBlock::Single(s) => s.busy.as_ref().map_or(f64::INFINITY, |(_, done_at)| *done_at),
            ServiceBlock::Infinite(s) => s.earliest().map_or(f64::INFINITY, |i| s.in_flight[i].0),
            ServiceBlock::Finite(s) => s
                .earliest()
                .and_then(|i| s.slots[i].as_ref())
                .map_or(f64::INFINITY, |(done_at, _)| *done_at),
            ServiceBlock::Polling(s) => s.completion_time().min(s.next_poll),
        }
    }

    fn event_tag(&self) -> EventTag {
        match self {
            ServiceBlock::Single(_) => EventTag::ServiceBlock,
            ServiceBlock::Infinite(_) => EventTag::InfServiceBlocks,
            ServiceBlock::Finite(_) => EventTag::FinServiceBlocks,
            ServiceBlock::Polling(_) => EventTag::PollingServiceBlock,
        }
    }

    fn kind(&self) -> AgentKind {
        AgentKind::ServiceBlock
    }

    fn is_active(&self) -> bool {
        true
    }

    // Calls in the block: being served plus waiting in bound buffers.
    fn current_state(&self) -> usize {
        self.in_service() + buffered(self.buffers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::buffer::{Buffer, Discipline};
    use crate::distributions::continuous::Deterministic;
    use crate::distributions::{SequenceSource, continuous::Exponential};

    fn fixed(v: f64) -> Box<dyn Distribution> {
        Box::new(Deterministic::new(v).unwrap())
    }

    fn queue(id: &str, cap: usize) -> SharedBuffer {
        SharedBuffer::new(Buffer::new(id, Discipline::Queue, cap))
    }

    fn call(id: &str) -> Call {
        Call::new(id)
    }

    #[test]
    fn busy_single_server_without_buffers_hands_the_call_back() {
        let mut block = ServiceBlock::Single(SingleServer::new("sb", fixed(1.0)));
        block.take_call(call("a"), 0.0).unwrap();
        assert!(!block.is_free());

        let rejected = block.take_call(call("b"), 0.5).unwrap_err();
        assert_eq!(rejected.call.id(), "b");
        assert_eq!(rejected.reason, RejectReason::Busy);
        assert_eq!(block.current_state(), 1);
        assert_eq!(block.next_event_time(), 1.0);
    }

    #[test]
    fn single_server_pulls_from_buffers_in_declaration_order() {
        let mut block = ServiceBlock::Single(SingleServer::new("sb", fixed(1.0)));
        let first = queue("q1", 1);
        let second = queue("q2", 0);
        block.bind_buffer(first.clone()).unwrap();
        block.bind_buffer(second.clone()).unwrap();

        block.take_call(call("a"), 0.0).unwrap();
        block.take_call(call("b"), 0.1).unwrap();
        block.take_call(call("c"), 0.2).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(block.current_state(), 3);

        let done = block.do_event(1.0).unwrap();
        assert_eq!(done.id(), "a");
        assert_eq!(first.len(), 0);
        assert_eq!(block.next_event_time(), 2.0);

        assert_eq!(block.do_event(2.0).unwrap().id(), "b");
        assert_eq!(block.do_event(3.0).unwrap().id(), "c");
        assert!(block.is_free());
        assert_eq!(block.next_event_time(), f64::INFINITY);
    }

    #[test]
    fn full_buffers_reject_by_capacity() {
        let mut block = ServiceBlock::Single(SingleServer::new("sb", fixed(1.0)));
        block.bind_buffer(queue("q", 1)).unwrap();
        block.take_call(call("a"), 0.0).unwrap();
        block.take_call(call("b"), 0.0).unwrap();
        let rejected = block.take_call(call("c"), 0.0).unwrap_err();
        assert_eq!(rejected.reason, RejectReason::Capacity);
    }

    #[test]
    fn infinite_servers_track_the_earliest_completion() {
        let source = SequenceSource::new(vec![0.1, 0.9, 0.5]).unwrap();
        let dist = Box::new(Exponential::new(1.0, Box::new(source)).unwrap());
        let mut block = ServiceBlock::Infinite(InfiniteServers::new("inf", dist));
        assert_eq!(block.next_event_time(), f64::INFINITY);
        assert!(block.is_free());

        for (i, t) in [0.0, 0.0, 0.0].iter().enumerate() {
            block.take_call(call(&format!("c{i}")), *t).unwrap();
        }
        let expected = [-(0.1f64).ln(), -(0.9f64).ln(), -(0.5f64).ln()];
        let min = expected.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((block.next_event_time() - min).abs() < 1e-12);

        assert_eq!(block.do_event(min).unwrap().id(), "c1");
        assert_eq!(block.current_state(), 2);
        block.do_event(0.0);
        block.do_event(0.0);
        assert_eq!(block.next_event_time(), f64::INFINITY);
        assert!(block.do_event(0.0).is_none());
    }

    #[test]
    fn infinite_servers_cannot_bind_buffers() {
        let mut block = ServiceBlock::Infinite(InfiniteServers::new("inf", fixed(1.0)));
        assert!(!block.can_bind_buffers());
        assert!(block.bind_buffer(queue("q", 0)).is_err());
        assert!(block.buffers().is_empty());
    }

    #[test]
    fn finite_pool_refills_the_finishing_slot() {
        let mut pool = FiniteServers::new("pool", fixed(2.0), 2).unwrap();
        let q = queue("q", 0);
        pool.buffers.push(q.clone());
        let mut block = ServiceBlock::Finite(pool);

        block.take_call(call("a"), 0.0).unwrap();
        block.take_call(call("b"), 1.0).unwrap();
        assert!(!block.is_free());
        block.take_call(call("c"), 1.5).unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(block.current_state(), 3);

        assert_eq!(block.next_event_time(), 2.0);
        assert_eq!(block.do_event(2.0).unwrap().id(), "a");
        assert_eq!(block.in_service(), 2);
        assert_eq!(block.next_event_time(), 3.0);
        assert_eq!(block.do_event(3.0).unwrap().id(), "b");
        assert_eq!(block.do_event(4.0).unwrap().id(), "c");
        assert!(block.is_free());
    }

    #[test]
    fn finite_pool_needs_a_server() {
        assert!(FiniteServers::new("pool", fixed(1.0), 0).is_err());
    }

    #[test]
    fn polling_server_rotates_buffers() {
        let mut server = PollingServer::new("poll", fixed(0.5), 1.0).unwrap();
        let q0 = queue("q0", 0);
        let q1 = queue("q1", 0);
        server.buffers.push(q0.clone());
        server.buffers.push(q1.clone());
        let mut block = ServiceBlock::Polling(server);
        assert_eq!(block.next_event_time(), 1.0);

        // Parked in q0, which is the polled buffer, so service starts.
        block.take_call(call("a"), 0.1).unwrap();
        assert!(!block.is_free());
        assert!((block.next_event_time() - 0.6).abs() < 1e-12);
        assert_eq!(block.do_event(0.6).unwrap().id(), "a");

        // q1 isn't polled yet, so nothing starts.
        q1.take_call(call("b")).unwrap();
        assert_eq!(block.next_event_time(), 1.0);

        // Poll switch to q1 picks up "b".
        assert!(block.do_event(1.0).is_none());
        assert!(!block.is_free());
        assert_eq!(block.next_event_time(), 1.5);
        assert_eq!(block.do_event(1.5).unwrap().id(), "b");
        assert_eq!(block.next_event_time(), 2.0);
    }

    #[test]
    fn polling_period_must_be_positive() {
        assert!(PollingServer::new("p", fixed(1.0), 0.0).is_err());
        assert!(PollingServer::new("p", fixed(1.0), f64::INFINITY).is_err());
    }
}
