use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

// Where an error sits in the run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Bad problem description, raised before the first event.
    Configuration,
    // A specification value could not be bound to a constructor parameter.
    ArgumentConversion,
    // The event loop cannot continue.
    Scheduling,
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Unknown agent type: {type_name}")]
    UnknownType { type_name: String },

    #[error("Unknown distribution type: {type_name}")]
    UnknownDistribution { type_name: String },

    #[error("No constructor of '{type_name}' accepts {arity} argument(s) of the given types")]
    NoMatchingConstructor { type_name: String, arity: usize },

    #[error("Argument {position} of '{type_name}' could not be converted: {reason}")]
    ArgumentConversionFailed {
        type_name: String,
        position: usize,
        reason: String,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Agent id '{id}' is declared more than once")]
    DuplicateAgent { id: String },

    #[error("Link from '{from}' points to unknown agent '{to}'")]
    UnknownLinkTarget { from: String, to: String },

    #[error("Agent '{id}' is not part of the problem")]
    UnknownAgent { id: String },

    #[error("Agent '{id}' is bound as a buffer but is a {kind}")]
    NotABuffer { id: String, kind: String },

    #[error("No event handler registered for tag '{tag}' (agent '{agent_id}')")]
    MissingHandler { tag: String, agent_id: String },

    #[error("No agent has a pending event at model time {model_time}")]
    NoActiveAgents { model_time: f64 },
}

impl SimError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SimError::ArgumentConversionFailed { .. } => ErrorCategory::ArgumentConversion,
            SimError::NoActiveAgents { .. } => ErrorCategory::Scheduling,
            _ => ErrorCategory::Configuration,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
