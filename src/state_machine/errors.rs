use thiserror::Error;

/// Errors raised while applying state machine events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid {entity} transition from {from} on event {event}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        event: String,
    },
}

impl StateMachineError {
    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        event: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            event: event.into(),
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
