//! # Messaging Error Types
//!
//! Structured errors for the task queue transport. Connection, publish and
//! receive failures map onto the pipeline's `ConnectionError`, `PublishError`
//! and `ConsumeError` categories.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Connection error after {attempts} attempt(s): {message}")]
    Connection { attempts: u32, message: String },

    #[error("Publish to {queue_name} failed: {message}")]
    Send { queue_name: String, message: String },

    #[error("Receive from {queue_name} failed: {message}")]
    Receive { queue_name: String, message: String },

    #[error("Ack of {receipt_handle} on {queue_name} failed: {message}")]
    Ack {
        queue_name: String,
        receipt_handle: String,
        message: String,
    },

    #[error("Nack of {receipt_handle} on {queue_name} failed: {message}")]
    Nack {
        queue_name: String,
        receipt_handle: String,
        message: String,
    },

    #[error("Queue creation failed: {queue_name}: {message}")]
    QueueCreation { queue_name: String, message: String },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Queue statistics unavailable for {queue_name}: {message}")]
    QueueStats { queue_name: String, message: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Message not found: {receipt_handle}")]
    MessageNotFound { receipt_handle: String },

    #[error("Invalid receipt handle: {receipt_handle}")]
    InvalidReceiptHandle { receipt_handle: String },

    #[error("Health check failed: {message}")]
    HealthCheck { message: String },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },
}

impl MessagingError {
    pub fn connection(attempts: u32, message: impl Into<String>) -> Self {
        Self::Connection {
            attempts,
            message: message.into(),
        }
    }

    pub fn send(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    pub fn receive(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Receive {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    pub fn ack(
        queue_name: impl Into<String>,
        receipt_handle: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Ack {
            queue_name: queue_name.into(),
            receipt_handle: receipt_handle.to_string(),
            message: message.into(),
        }
    }

    pub fn nack(
        queue_name: impl Into<String>,
        receipt_handle: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Nack {
            queue_name: queue_name.into(),
            receipt_handle: receipt_handle.to_string(),
            message: message.into(),
        }
    }

    pub fn queue_creation(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueCreation {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    pub fn queue_stats(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueStats {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    pub fn message_not_found(receipt_handle: impl ToString) -> Self {
        Self::MessageNotFound {
            receipt_handle: receipt_handle.to_string(),
        }
    }

    pub fn invalid_receipt_handle(receipt_handle: impl ToString) -> Self {
        Self::InvalidReceiptHandle {
            receipt_handle: receipt_handle.to_string(),
        }
    }

    pub fn health_check(message: impl Into<String>) -> Self {
        Self::HealthCheck {
            message: message.into(),
        }
    }

    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the payload itself is unusable, so redelivery cannot help
    pub fn is_poison(&self) -> bool {
        matches!(self, Self::MessageDeserialization { .. })
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        Self::message_serialization(err.to_string())
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
