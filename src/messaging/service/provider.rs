//! # Messaging Provider Enum
//!
//! Enum dispatch over the concrete messaging services. `MessagingService` has
//! generic methods, so it cannot be used as a trait object; the enum lets the
//! dispatcher and consumer hold one concrete type.

use super::providers::{InMemoryMessagingService, RabbitMqMessagingService};
use super::traits::{MessagingService, QueueMessage};
use super::types::{MessageId, QueueStats, RawMessage, ReceiptHandle};
use crate::messaging::errors::MessagingResult;

#[derive(Debug)]
pub enum MessagingProvider {
    /// RabbitMQ via lapin
    RabbitMq(RabbitMqMessagingService),

    /// In-process queues for tests and single-process runs
    InMemory(InMemoryMessagingService),
}

impl MessagingProvider {
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::RabbitMq(s) => s.provider_name(),
            Self::InMemory(s) => s.provider_name(),
        }
    }

    /// The in-memory service, when that is the active provider (for testing)
    pub fn as_in_memory(&self) -> Option<&InMemoryMessagingService> {
        match self {
            Self::InMemory(s) => Some(s),
            _ => None,
        }
    }

    pub async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        match self {
            Self::RabbitMq(s) => s.ensure_queue(queue_name).await,
            Self::InMemory(s) => s.ensure_queue(queue_name).await,
        }
    }

    pub async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> MessagingResult<MessageId> {
        match self {
            Self::RabbitMq(s) => s.send_message(queue_name, message).await,
            Self::InMemory(s) => s.send_message(queue_name, message).await,
        }
    }

    pub async fn receive_message(&self, queue_name: &str) -> MessagingResult<Option<RawMessage>> {
        match self {
            Self::RabbitMq(s) => s.receive_message(queue_name).await,
            Self::InMemory(s) => s.receive_message(queue_name).await,
        }
    }

    pub async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()> {
        match self {
            Self::RabbitMq(s) => s.ack_message(queue_name, receipt_handle).await,
            Self::InMemory(s) => s.ack_message(queue_name, receipt_handle).await,
        }
    }

    pub async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> MessagingResult<()> {
        match self {
            Self::RabbitMq(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
            Self::InMemory(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
        }
    }

    pub async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats> {
        match self {
            Self::RabbitMq(s) => s.queue_stats(queue_name).await,
            Self::InMemory(s) => s.queue_stats(queue_name).await,
        }
    }

    pub async fn health_check(&self) -> MessagingResult<bool> {
        match self {
            Self::RabbitMq(s) => s.health_check().await,
            Self::InMemory(s) => s.health_check().await,
        }
    }
}

impl From<RabbitMqMessagingService> for MessagingProvider {
    fn from(service: RabbitMqMessagingService) -> Self {
        Self::RabbitMq(service)
    }
}

impl From<InMemoryMessagingService> for MessagingProvider {
    fn from(service: InMemoryMessagingService) -> Self {
        Self::InMemory(service)
    }
}
