use super::call::Call;
use super::{AgentKind, EventTag, ModellingAgent};
use crate::distributions::Distribution;
use std::collections::VecDeque;
use tracing::debug;

// Retrial queue: calls that found no room wait here and retry, oldest first.
#[derive(Debug)]
pub struct Orbit {
    id: String,
    distribution: Box<dyn Distribution>,
    calls: VecDeque<Call>,
    teta: f64,
}

impl Orbit {
    pub fn new(id: impl Into<String>, distribution: Box<dyn Distribution>) -> Self {
        Self {
            id: id.into(),
            distribution,
            calls: VecDeque::new(),
            teta: f64::INFINITY,
        }
    }

    // Re-arms the retry timer from `t`, or disarms it when the orbit is empty.
    pub fn reschedule(&mut self, t: f64) {
        self.teta = if self.calls.is_empty() {
            f64::INFINITY
        } else {
            t + self.distribution.generate()
        };
    }

    // The orbit never refuses a call.
    pub fn take_call(&mut self, call: Call, t: f64) {
        debug!("t={:.6} {} holds {} for retry", t, self.id, call.id());
        self.calls.push_back(call);
        if self.calls.len() == 1 {
            self.reschedule(t);
        }
    }

    pub fn peek_next_call(&self) -> Option<&Call> {
        self.calls.front()
    }

    // Removes the oldest call without touching the timer.
    pub fn take_head(&mut self) -> Option<Call> {
        self.calls.pop_front()
    }

    // Releases the oldest call for a retry and times the next one.
    pub fn do_event(&mut self, t: f64) -> Option<Call> {
        let call = self.take_head()?;
        self.reschedule(t);
        Some(call)
    }

    // The retry at `t` failed: the call keeps its place at the head and the
    // timer is drawn again.
    pub fn retry_failed(&mut self, call: Call, t: f64) {
        debug!("t={:.6} {} retry of {} failed", t, self.id, call.id());
        self.calls.push_front(call);
        self.reschedule(t);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl ModellingAgent for Orbit {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_event_time(&self) -> f64 {
        self.teta
    }

    fn event_tag(&self) -> EventTag {
        EventTag::Orbit
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Orbit
    }

    fn is_active(&self) -> bool {
        true
    }

    fn current_state(&self) -> usize {
        self.calls.len()
    }
}
