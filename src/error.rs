//! # Crate Error Types
//!
//! Each layer owns a focused error enum; `CapillaryError` folds them together
//! for callers that drive several layers at once (binaries, web handlers).

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::hub::HubError;
use crate::messaging::MessagingError;
use crate::orchestration::{AggregationError, DispatchError, WorkerError};
use crate::repositories::RepositoryError;
use crate::state_machine::StateMachineError;

#[derive(Error, Debug)]
pub enum CapillaryError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CapillaryError {
    /// True when the error means a referenced entity does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Repository(e) => e.is_not_found(),
            Self::Dispatch(DispatchError::NotFound { .. }) => true,
            Self::Aggregation(AggregationError::ExaminationNotFound { .. }) => true,
            Self::Hub(HubError::NotFound { .. }) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CapillaryError>;
