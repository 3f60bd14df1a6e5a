//! # In-Memory Messaging Service
//!
//! Thread-safe in-process queues with the same delivery semantics as the
//! RabbitMQ provider: FIFO delivery, requeue to the tail on nack, and a
//! dead-letter list per queue. Used by tests and single-process runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::service::traits::{MessagingService, QueueMessage};
use crate::messaging::service::types::{
    MessageId, QueueStats, QueuedMessage, RawMessage, ReceiptHandle,
};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct InMemoryQueue {
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<u64, StoredMessage>,
    dead_letters: Vec<StoredMessage>,
    next_id: u64,
    total_sent: u64,
    total_received: u64,
    total_acked: u64,
    total_nacked: u64,
}

#[derive(Debug)]
pub struct InMemoryMessagingService {
    queues: Mutex<HashMap<String, InMemoryQueue>>,
    available: AtomicBool,
}

impl Default for InMemoryMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessagingService {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Create with pre-declared queues
    pub fn with_queues(queue_names: &[&str]) -> Self {
        let service = Self::new();
        {
            let mut queues = service.queues.lock();
            for name in queue_names {
                queues.insert((*name).to_string(), InMemoryQueue::default());
            }
        }
        service
    }

    /// Messages waiting for delivery (for testing)
    pub fn queue_length(&self, queue_name: &str) -> usize {
        self.queues
            .lock()
            .get(queue_name)
            .map(|q| q.ready.len())
            .unwrap_or(0)
    }

    /// Delivered but not yet acknowledged (for testing)
    pub fn in_flight_count(&self, queue_name: &str) -> usize {
        self.queues
            .lock()
            .get(queue_name)
            .map(|q| q.in_flight.len())
            .unwrap_or(0)
    }

    /// Decoded dead-lettered payloads, oldest first (for testing)
    pub fn dead_letters<T: QueueMessage>(&self, queue_name: &str) -> MessagingResult<Vec<T>> {
        let queues = self.queues.lock();
        let Some(queue) = queues.get(queue_name) else {
            return Ok(Vec::new());
        };
        queue
            .dead_letters
            .iter()
            .map(|m| T::from_bytes(&m.payload))
            .collect()
    }

    pub fn dead_letter_count(&self, queue_name: &str) -> usize {
        self.queues
            .lock()
            .get(queue_name)
            .map(|q| q.dead_letters.len())
            .unwrap_or(0)
    }

    /// Enqueue raw bytes, bypassing serialization (for testing malformed payloads)
    pub fn send_raw(&self, queue_name: &str, payload: Vec<u8>) -> MessagingResult<MessageId> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
        Ok(Self::push(queue, payload))
    }

    /// Simulate a broker outage: receive and health checks fail while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn push(queue: &mut InMemoryQueue, payload: Vec<u8>) -> MessageId {
        queue.next_id += 1;
        queue.total_sent += 1;
        let id = queue.next_id;
        queue.ready.push_back(StoredMessage {
            id,
            payload,
            enqueued_at: Utc::now(),
            receive_count: 0,
        });
        MessageId::from(id)
    }

    fn take_in_flight(
        queue: &mut InMemoryQueue,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<StoredMessage> {
        let id = receipt_handle
            .as_u64()
            .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle))?;
        queue
            .in_flight
            .remove(&id)
            .ok_or_else(|| MessagingError::message_not_found(receipt_handle))
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        self.queues
            .lock()
            .entry(queue_name.to_string())
            .or_default();
        Ok(())
    }

    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> MessagingResult<MessageId> {
        let payload = message.to_bytes()?;
        if !self.available.load(Ordering::SeqCst) {
            return Err(MessagingError::send(queue_name, "in-memory broker unavailable"));
        }
        self.send_raw(queue_name, payload)
    }

    async fn receive_message(&self, queue_name: &str) -> MessagingResult<Option<RawMessage>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(MessagingError::receive(queue_name, "in-memory broker unavailable"));
        }

        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let Some(mut message) = queue.ready.pop_front() else {
            return Ok(None);
        };

        message.receive_count += 1;
        queue.total_received += 1;

        let received = QueuedMessage::new(
            ReceiptHandle::from(message.id),
            message.payload.clone(),
            message.receive_count,
        )
        .with_message_id(MessageId::from(message.id))
        .with_enqueued_at(message.enqueued_at);

        queue.in_flight.insert(message.id, message);
        Ok(Some(received))
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        Self::take_in_flight(queue, receipt_handle)?;
        queue.total_acked += 1;
        Ok(())
    }

    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> MessagingResult<()> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let message = Self::take_in_flight(queue, receipt_handle)?;
        queue.total_nacked += 1;
        if requeue {
            queue.ready.push_back(message);
        } else {
            queue.dead_letters.push(message);
        }
        Ok(())
    }

    async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats> {
        let queues = self.queues.lock();
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        Ok(QueueStats::new(queue_name, queue.ready.len() as u64)
            .with_dead_letter_count(queue.dead_letters.len() as u64)
            .with_counters(
                queue.total_sent,
                queue.total_received,
                queue.total_acked,
                queue.total_nacked,
            ))
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const QUEUE: &str = "test_queue";

    async fn service() -> InMemoryMessagingService {
        let service = InMemoryMessagingService::new();
        service.ensure_queue(QUEUE).await.unwrap();
        service
    }

    async fn receive_json(service: &InMemoryMessagingService) -> Option<QueuedMessage<serde_json::Value>> {
        service
            .receive_message(QUEUE)
            .await
            .unwrap()
            .map(|m| m.map(|bytes| serde_json::from_slice(&bytes).unwrap()))
    }

    #[tokio::test]
    async fn test_send_to_missing_queue_fails() {
        let service = InMemoryMessagingService::new();
        let result = service.send_message("missing", &json!({"a": 1})).await;
        assert!(matches!(result, Err(MessagingError::QueueNotFound { .. })));
    }

    #[tokio::test]
    async fn test_messages_delivered_in_publish_order() {
        let service = service().await;
        for i in 0..3 {
            service.send_message(QUEUE, &json!({"index": i})).await.unwrap();
        }

        for expected in 0..3 {
            let message = receive_json(&service).await.unwrap();
            assert_eq!(message.message["index"], expected);
            service.ack_message(QUEUE, &message.receipt_handle).await.unwrap();
        }
        assert!(receive_json(&service).await.is_none());
    }

    #[tokio::test]
    async fn test_requeued_message_goes_behind_later_messages() {
        let service = service().await;
        service.send_message(QUEUE, &json!({"name": "first"})).await.unwrap();
        service.send_message(QUEUE, &json!({"name": "second"})).await.unwrap();

        let first = receive_json(&service).await.unwrap();
        service.nack_message(QUEUE, &first.receipt_handle, true).await.unwrap();

        let next = receive_json(&service).await.unwrap();
        assert_eq!(next.message["name"], "second");
        service.ack_message(QUEUE, &next.receipt_handle).await.unwrap();

        let redelivered = receive_json(&service).await.unwrap();
        assert_eq!(redelivered.message["name"], "first");
        assert_eq!(redelivered.receive_count, 2);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_dead_letters() {
        let service = service().await;
        service.send_message(QUEUE, &json!({"poison": true})).await.unwrap();

        let message = receive_json(&service).await.unwrap();
        service.nack_message(QUEUE, &message.receipt_handle, false).await.unwrap();

        assert_eq!(service.queue_length(QUEUE), 0);
        let dead: Vec<serde_json::Value> = service.dead_letters(QUEUE).unwrap();
        assert_eq!(dead, vec![json!({"poison": true})]);

        let stats = service.queue_stats(QUEUE).await.unwrap();
        assert_eq!(stats.dead_letter_count, Some(1));
        assert_eq!(stats.total_nacked, 1);
    }

    #[tokio::test]
    async fn test_ack_twice_fails() {
        let service = service().await;
        service.send_message(QUEUE, &json!({})).await.unwrap();
        let message = receive_json(&service).await.unwrap();

        service.ack_message(QUEUE, &message.receipt_handle).await.unwrap();
        let again = service.ack_message(QUEUE, &message.receipt_handle).await;
        assert!(matches!(again, Err(MessagingError::MessageNotFound { .. })));
    }

    #[tokio::test]
    async fn test_unavailable_broker_fails_receive() {
        let service = service().await;
        service.set_available(false);

        assert!(matches!(
            service.receive_message(QUEUE).await,
            Err(MessagingError::Receive { .. })
        ));
        assert!(!service.health_check().await.unwrap());
    }
}
