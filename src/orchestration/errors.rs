//! # Orchestration Errors

use thiserror::Error;
use uuid::Uuid;

use crate::messaging::MessagingError;
use crate::repositories::RepositoryError;
use crate::state_machine::StateMachineError;

/// Failure of the metrics provider for one image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Image unreadable at {path}: {reason}")]
    ImageUnreadable { path: String, reason: String },

    #[error("Metrics computation failed: {0}")]
    Computation(String),
}

/// Errors that leave an analysis task unacknowledged
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Worker state machine error: {0}")]
    StateMachine(#[from] StateMachineError),
}

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("Examination not found: {examination_id}")]
    ExaminationNotFound { examination_id: Uuid },

    #[error("No user available to sign the report")]
    NoReportAuthor,

    #[error("Aggregation repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Aggregation state machine error: {0}")]
    StateMachine(#[from] StateMachineError),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Examination not found: {examination_id}")]
    NotFound { examination_id: Uuid },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Dispatch repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Dispatch state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("Dispatch messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

impl DispatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
