use super::{AgentIndex, AgentKind, EventTag, ModellingAgent};
use std::fmt;

// One unit of work moving through the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    id: String,
    // Closed-loop sources get told when their call leaves. Only a handle, the
    // source never depends on the call staying alive.
    owner: Option<AgentIndex>,
    done: bool,
}

impl Call {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: None,
            done: false,
        }
    }

    pub fn owned_by(id: impl Into<String>, owner: AgentIndex) -> Self {
        Self {
            owner: Some(owner),
            ..Self::new(id)
        }
    }

    pub fn owner(&self) -> Option<AgentIndex> {
        self.owner
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    // Marks the call as having left the system. Returns the source that must
    // be unblocked, if any.
    pub fn do_event(&mut self, _t: f64) -> Option<AgentIndex> {
        self.done = true;
        self.owner
    }
}

impl ModellingAgent for Call {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_event_time(&self) -> f64 {
        f64::INFINITY
    }

    fn event_tag(&self) -> EventTag {
        EventTag::Call
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Call
    }

    fn is_active(&self) -> bool {
        false
    }

    fn current_state(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    // Every buffer that could hold the call is full.
    Capacity,
    // The server is occupied and has nowhere to park the call.
    Busy,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Capacity => write!(f, "rejected by capacity"),
            RejectReason::Busy => write!(f, "server busy"),
        }
    }
}

// A refused offer. The call comes back so the caller can try elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub call: Call,
    pub reason: RejectReason,
}

impl Rejected {
    pub fn new(call: Call, reason: RejectReason) -> Self {
        Self { call, reason }
    }
}

pub type Offer = Result<(), Rejected>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completing_a_closed_loop_call_names_its_source() {
        let mut call = Call::owned_by("CALL_src_0", AgentIndex(3));
        assert!(!call.is_done());
        assert_eq!(call.do_event(1.0), Some(AgentIndex(3)));
        assert!(call.is_done());

        let mut open = Call::new("CALL_src_1");
        assert_eq!(open.do_event(1.0), None);
    }

    #[test]
    fn calls_never_schedule_themselves() {
        let call = Call::new("c");
        assert_eq!(call.next_event_time(), f64::INFINITY);
        assert!(!call.is_active());
        assert_eq!(call.kind(), AgentKind::Call);
    }
}
