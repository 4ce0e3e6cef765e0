use super::call::{Call, Offer, RejectReason, Rejected};
use super::{AgentKind, EventTag, ModellingAgent};
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    // First in, first out.
    Queue,
    // Last in, first out.
    Stack,
}

pub const DISCIPLINES: &[&str] = &["queue", "stack"];

impl Discipline {
    pub fn from_choice(idx: usize) -> Self {
        if idx == 1 { Discipline::Stack } else { Discipline::Queue }
    }
}

#[derive(Debug)]
pub struct Buffer {
    id: String,
    discipline: Discipline,
    capacity: Option<usize>,
    calls: VecDeque<Call>,
}

impl Buffer {
    // A capacity of 0 means unbounded.
    pub fn new(id: impl Into<String>, discipline: Discipline, capacity: usize) -> Self {
        Self {
            id: id.into(),
            discipline,
            capacity: (capacity > 0).then_some(capacity),
            calls: VecDeque::new(),
        }
    }

    pub fn unbounded(id: impl Into<String>, discipline: Discipline) -> Self {
        Self::new(id, discipline, 0)
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.calls.len() >= cap)
    }

    pub fn take_call(&mut self, call: Call) -> Offer {
        if self.is_full() {
            return Err(Rejected::new(call, RejectReason::Capacity));
        }
        self.calls.push_back(call);
        Ok(())
    }

    pub fn pass_call(&mut self) -> Option<Call> {
        match self.discipline {
            Discipline::Queue => self.calls.pop_front(),
            Discipline::Stack => self.calls.pop_back(),
        }
    }

    pub fn do_event(&mut self, _t: f64) -> Option<Call> {
        None
    }
}

impl ModellingAgent for Buffer {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_event_time(&self) -> f64 {
        f64::INFINITY
    }

    fn event_tag(&self) -> EventTag {
        match self.discipline {
            Discipline::Queue => EventTag::QueueBuffer,
            Discipline::Stack => EventTag::StackBuffer,
        }
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Buffer
    }

    fn is_active(&self) -> bool {
        false
    }

    fn current_state(&self) -> usize {
        self.calls.len()
    }
}

// A buffer shared between the agent collection and the service blocks it is
// bound to.
#[derive(Debug, Clone)]
pub struct SharedBuffer {
    id: String,
    tag: EventTag,
    inner: Arc<Mutex<Buffer>>,
}

impl SharedBuffer {
    pub fn new(buffer: Buffer) -> Self {
        Self {
            id: buffer.id.clone(),
            tag: buffer.event_tag(),
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.inner.lock()
    }

    pub fn take_call(&self, call: Call) -> Offer {
        self.inner.lock().take_call(call)
    }

    pub fn pass_call(&self) -> Option<Call> {
        self.inner.lock().pass_call()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl ModellingAgent for SharedBuffer {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_event_time(&self) -> f64 {
        f64::INFINITY
    }

    fn event_tag(&self) -> EventTag {
        self.tag
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Buffer
    }

    fn is_active(&self) -> bool {
        false
    }

    fn current_state(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls(n: usize) -> Vec<Call> {
        (0..n).map(|i| Call::new(format!("c{i}"))).collect()
    }

    #[test]
    fn queue_is_fifo_and_stack_is_lifo() {
        let mut queue = Buffer::unbounded("q", Discipline::Queue);
        let mut stack = Buffer::unbounded("s", Discipline::Stack);
        for call in calls(3) {
            queue.take_call(call.clone()).unwrap();
            stack.take_call(call).unwrap();
        }
        let q: Vec<String> = std::iter::from_fn(|| queue.pass_call()).map(|c| c.id().to_string()).collect();
        let s: Vec<String> = std::iter::from_fn(|| stack.pass_call()).map(|c| c.id().to_string()).collect();
        assert_eq!(q, ["c0", "c1", "c2"]);
        assert_eq!(s, ["c2", "c1", "c0"]);
    }

    #[test]
    fn bounded_buffer_rejects_at_capacity_and_hands_the_call_back() {
        let mut buffer = Buffer::new("q", Discipline::Queue, 2);
        let mut it = calls(3).into_iter();
        buffer.take_call(it.next().unwrap()).unwrap();
        buffer.take_call(it.next().unwrap()).unwrap();
        let rejected = buffer.take_call(it.next().unwrap()).unwrap_err();
        assert_eq!(rejected.reason, RejectReason::Capacity);
        assert_eq!(rejected.call.id(), "c2");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn zero_capacity_means_unbounded() {
        let mut buffer = Buffer::new("q", Discipline::Stack, 0);
        assert_eq!(buffer.capacity(), None);
        for call in calls(1000) {
            buffer.take_call(call).unwrap();
        }
        assert!(!buffer.is_full());
    }

    #[test]
    fn buffers_never_schedule_events() {
        let shared = SharedBuffer::new(Buffer::unbounded("q", Discipline::Queue));
        assert!(!shared.is_active());
        assert_eq!(shared.next_event_time(), f64::INFINITY);
        assert_eq!(shared.event_tag(), EventTag::QueueBuffer);
        assert!(shared.lock().do_event(0.0).is_none());

        let alias = shared.clone();
        alias.take_call(Call::new("x")).unwrap();
        assert_eq!(shared.current_state(), 1);
    }
}
