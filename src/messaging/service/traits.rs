//! # Messaging Service Traits
//!
//! Core trait definitions for provider-agnostic messaging.

use async_trait::async_trait;

use super::types::{MessageId, QueueStats, RawMessage, ReceiptHandle};
use crate::messaging::errors::{MessagingError, MessagingResult};

/// Durable publish/receive transport with explicit acknowledgment
///
/// Receive hands back raw bytes so the consumer decides what to do with a
/// payload it cannot decode, instead of the provider dropping the delivery.
#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Create a queue (and its dead-letter route) if it doesn't exist
    ///
    /// Safe to call multiple times.
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()>;

    /// Publish a persistent message
    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> MessagingResult<MessageId>;

    /// Take at most one message off the queue without waiting for one to arrive
    async fn receive_message(&self, queue_name: &str) -> MessagingResult<Option<RawMessage>>;

    /// Acknowledge successful processing, removing the message permanently
    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()>;

    /// Negative acknowledge
    ///
    /// With `requeue` the message goes back to the tail of the queue and is
    /// redelivered after messages published after it. Without `requeue` it is
    /// routed to the dead-letter queue.
    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> MessagingResult<()>;

    async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats>;

    /// Verify the messaging backend is reachable
    async fn health_check(&self) -> MessagingResult<bool>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Message serialization contract
pub trait QueueMessage: Send + Sync + Clone + 'static {
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError>
    where
        Self: Sized;
}

/// JSON serialization for every serde-compatible type
impl<T> QueueMessage for T
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
    struct TestMessage {
        id: u64,
        data: String,
    }

    #[test]
    fn test_queue_message_invalid_bytes_is_deserialization_error() {
        let result = TestMessage::from_bytes(b"not valid json");
        assert!(matches!(
            result,
            Err(MessagingError::MessageDeserialization { .. })
        ));
    }
}
