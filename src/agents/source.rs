use super::call::Call;
use super::{AgentIndex, AgentKind, EventTag, ModellingAgent};
use crate::distributions::Distribution;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Open,
    // One call in flight at a time; no arrivals until it leaves.
    Closed { blocked: bool },
}

#[derive(Debug)]
pub struct Source {
    id: String,
    distribution: Box<dyn Distribution>,
    tau: f64,
    mode: Mode,
    created: u64,
    dropped: u64,
}

impl Source {
    pub fn new(id: impl Into<String>, distribution: Box<dyn Distribution>) -> Self {
        let mut source = Self {
            id: id.into(),
            distribution,
            tau: f64::INFINITY,
            mode: Mode::Open,
            created: 0,
            dropped: 0,
        };
        source.calc_next_event_time(0.0);
        source
    }

    // Closed-loop variant.
    pub fn finite(id: impl Into<String>, distribution: Box<dyn Distribution>) -> Self {
        let mut source = Self::new(id, distribution);
        source.mode = Mode::Closed { blocked: false };
        source
    }

    fn calc_next_event_time(&mut self, t: f64) -> f64 {
        self.tau = t + self.distribution.generate();
        self.tau
    }

    // Emits a new call and schedules the next arrival. `me` is this source's
    // own slot, stamped on closed-loop calls so they can find their way back.
    pub fn do_event(&mut self, t: f64, me: AgentIndex) -> Call {
        self.calc_next_event_time(t);
        let call_id = format!("CALL_{}_{}", self.id, self.created);
        self.created += 1;

        let call = match &mut self.mode {
            Mode::Open => Call::new(call_id),
            Mode::Closed { blocked } => {
                *blocked = true;
                Call::owned_by(call_id, me)
            }
        };
        debug!("t={:.6} {} emitted {}", t, self.id, call.id());
        call
    }

    // The closed-loop call has left the system.
    pub fn unblock(&mut self, t: f64) {
        if let Mode::Closed { blocked } = &mut self.mode {
            *blocked = false;
            self.calc_next_event_time(t);
            debug!("t={:.6} {} unblocked, next arrival at {:.6}", t, self.id, self.tau);
        }
    }

    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.mode, Mode::Closed { blocked: true })
    }

    pub fn is_finite(&self) -> bool {
        matches!(self.mode, Mode::Closed { .. })
    }

    pub fn calls_created(&self) -> u64 {
        self.created
    }

    pub fn calls_dropped(&self) -> u64 {
        self.dropped
    }
}

impl ModellingAgent for Source {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_event_time(&self) -> f64 {
        if self.is_blocked() { f64::INFINITY } else { self.tau }
    }

    fn event_tag(&self) -> EventTag {
        match self.mode {
            Mode::Open => EventTag::Source,
            Mode::Closed { .. } => EventTag::FiniteSource,
        }
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Source
    }

    fn is_active(&self) -> bool {
        true
    }

    fn current_state(&self) -> usize {
        usize::from(self.is_blocked())
    }
}
