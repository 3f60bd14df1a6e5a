//! # Messaging Service Types
//!
//! Provider-agnostic handles and metadata for queued messages.

use chrono::{DateTime, Utc};

/// Identifier assigned to a message when it is published
///
/// - RabbitMQ: generated UUID carried in the `message_id` property
/// - InMemory: per-queue sequence number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Handle used to acknowledge one specific delivery
///
/// - RabbitMQ: delivery tag
/// - InMemory: message sequence number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form used by both providers
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReceiptHandle {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// A message received from a queue with metadata
#[derive(Debug, Clone)]
pub struct QueuedMessage<T> {
    /// Handle for acknowledging this delivery
    pub receipt_handle: ReceiptHandle,

    pub message_id: Option<MessageId>,

    pub message: T,

    /// Number of times this message has been delivered, including this one
    pub receive_count: u32,

    /// When the message was published, if the provider knows
    pub enqueued_at: Option<DateTime<Utc>>,
}

impl<T> QueuedMessage<T> {
    pub fn new(receipt_handle: ReceiptHandle, message: T, receive_count: u32) -> Self {
        Self {
            receipt_handle,
            message_id: None,
            message,
            receive_count,
            enqueued_at: None,
        }
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_enqueued_at(mut self, enqueued_at: DateTime<Utc>) -> Self {
        self.enqueued_at = Some(enqueued_at);
        self
    }

    pub fn map<U, F>(self, f: F) -> QueuedMessage<U>
    where
        F: FnOnce(T) -> U,
    {
        QueuedMessage {
            receipt_handle: self.receipt_handle,
            message_id: self.message_id,
            message: f(self.message),
            receive_count: self.receive_count,
            enqueued_at: self.enqueued_at,
        }
    }
}

/// Raw payload as delivered by the broker
pub type RawMessage = QueuedMessage<Vec<u8>>;

/// Queue statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queue_name: String,

    /// Messages waiting for delivery
    pub message_count: u64,

    /// Messages routed to the dead-letter queue, when the provider can tell
    pub dead_letter_count: Option<u64>,

    /// Counters kept by this process
    pub total_sent: u64,
    pub total_received: u64,
    pub total_acked: u64,
    pub total_nacked: u64,
}

impl QueueStats {
    pub fn new(queue_name: impl Into<String>, message_count: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_count,
            ..Default::default()
        }
    }

    pub fn with_dead_letter_count(mut self, count: u64) -> Self {
        self.dead_letter_count = Some(count);
        self
    }

    pub fn with_counters(mut self, sent: u64, received: u64, acked: u64, nacked: u64) -> Self {
        self.total_sent = sent;
        self.total_received = received;
        self.total_acked = acked;
        self.total_nacked = nacked;
        self
    }
}
