//! # Queue Consumer
//!
//! Sequential receive loop: one delivery at a time, acknowledged only after
//! its handler returns. Deliveries that keep failing are dead-lettered once
//! they reach the configured attempt limit.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::MessagingConfig;
use crate::messaging::errors::MessagingResult;
use crate::messaging::service::{MessagingProvider, QueueMessage, RawMessage};

/// Processes decoded deliveries for a [`QueueConsumer`]
#[async_trait]
pub trait MessageHandler<T>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handle one message. `Err` leaves the message for redelivery.
    async fn handle(&self, message: &T) -> Result<(), Self::Error>;

    /// Called after a message is dead-lettered for failing too many times
    async fn on_retries_exhausted(&self, _message: &T, _last_error: &str) {}
}

/// Point-in-time copy of consumer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub messages_processed: u64,
    pub messages_requeued: u64,
    pub messages_dead_lettered: u64,
}

#[derive(Debug, Default)]
struct ConsumerCounters {
    processed: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
}

impl ConsumerCounters {
    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            messages_processed: self.processed.load(Ordering::Relaxed),
            messages_requeued: self.requeued.load(Ordering::Relaxed),
            messages_dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Acked,
    Requeued,
    DeadLettered,
}

pub struct QueueConsumer<T> {
    provider: Arc<MessagingProvider>,
    queue_name: String,
    poll_interval: Duration,
    max_delivery_attempts: u32,
    counters: ConsumerCounters,
    _message: PhantomData<fn() -> T>,
}

impl<T: QueueMessage> QueueConsumer<T> {
    pub fn new(
        provider: Arc<MessagingProvider>,
        queue_name: impl Into<String>,
        poll_interval: Duration,
        max_delivery_attempts: u32,
    ) -> Self {
        Self {
            provider,
            queue_name: queue_name.into(),
            poll_interval,
            max_delivery_attempts: max_delivery_attempts.max(1),
            counters: ConsumerCounters::default(),
            _message: PhantomData,
        }
    }

    pub fn from_config(provider: Arc<MessagingProvider>, config: &MessagingConfig) -> Self {
        Self::new(
            provider,
            config.queue_name.clone(),
            config.poll_interval(),
            config.max_delivery_attempts,
        )
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    /// Consume until `cancel` fires
    ///
    /// Cancellation is checked between deliveries, so a message already
    /// handed to `handler` is always settled before the loop exits. Transport
    /// failures end the loop with an error.
    #[instrument(skip(self, handler, cancel), fields(queue = %self.queue_name))]
    pub async fn consume<H>(
        &self,
        handler: &H,
        cancel: CancellationToken,
    ) -> MessagingResult<ConsumerStats>
    where
        H: MessageHandler<T>,
    {
        self.provider.ensure_queue(&self.queue_name).await?;

        info!(
            queue = %self.queue_name,
            provider = self.provider.provider_name(),
            max_delivery_attempts = self.max_delivery_attempts,
            "Queue consumer started"
        );

        while !cancel.is_cancelled() {
            match self.provider.receive_message(&self.queue_name).await? {
                Some(delivery) => {
                    self.process_delivery(handler, delivery).await?;
                }
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        let stats = self.stats();
        info!(
            queue = %self.queue_name,
            processed = stats.messages_processed,
            requeued = stats.messages_requeued,
            dead_lettered = stats.messages_dead_lettered,
            "Queue consumer stopped"
        );
        Ok(stats)
    }

    /// Receive and settle at most one delivery; returns whether one was found
    pub async fn consume_one<H>(&self, handler: &H) -> MessagingResult<bool>
    where
        H: MessageHandler<T>,
    {
        match self.provider.receive_message(&self.queue_name).await? {
            Some(delivery) => {
                self.process_delivery(handler, delivery).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn process_delivery<H>(&self, handler: &H, delivery: RawMessage) -> MessagingResult<()>
    where
        H: MessageHandler<T>,
    {
        let receipt = delivery.receipt_handle.clone();

        let message = match T::from_bytes(&delivery.message) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    queue = %self.queue_name,
                    receipt_handle = %receipt,
                    error = %e,
                    "Undecodable message, dead-lettering"
                );
                self.provider
                    .nack_message(&self.queue_name, &receipt, false)
                    .await?;
                self.record(Disposition::DeadLettered);
                return Ok(());
            }
        };

        match handler.handle(&message).await {
            Ok(()) => {
                self.provider.ack_message(&self.queue_name, &receipt).await?;
                debug!(queue = %self.queue_name, receipt_handle = %receipt, "Message acknowledged");
                self.record(Disposition::Acked);
            }
            Err(e) if delivery.receive_count >= self.max_delivery_attempts => {
                let last_error = e.to_string();
                error!(
                    queue = %self.queue_name,
                    receipt_handle = %receipt,
                    attempts = delivery.receive_count,
                    error = %last_error,
                    "Delivery attempts exhausted, dead-lettering"
                );
                self.provider
                    .nack_message(&self.queue_name, &receipt, false)
                    .await?;
                handler.on_retries_exhausted(&message, &last_error).await;
                self.record(Disposition::DeadLettered);
            }
            Err(e) => {
                warn!(
                    queue = %self.queue_name,
                    receipt_handle = %receipt,
                    attempt = delivery.receive_count,
                    error = %e,
                    "Handler failed, requeueing"
                );
                self.provider
                    .nack_message(&self.queue_name, &receipt, true)
                    .await?;
                self.record(Disposition::Requeued);
            }
        }

        Ok(())
    }

    fn record(&self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Acked => &self.counters.processed,
            Disposition::Requeued => &self.counters.requeued,
            Disposition::DeadLettered => &self.counters.dead_lettered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::service::InMemoryMessagingService;
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};

    const QUEUE: &str = "consumer_test";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Job {
        id: u32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("job {0} failed")]
    struct JobFailed(u32);

    /// Fails each job `failures` times before succeeding
    struct FlakyHandler {
        failures: u32,
        attempts: Mutex<Vec<u32>>,
        exhausted: Mutex<Vec<(u32, String)>>,
    }

    impl FlakyHandler {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                attempts: Mutex::new(Vec::new()),
                exhausted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageHandler<Job> for FlakyHandler {
        type Error = JobFailed;

        async fn handle(&self, message: &Job) -> Result<(), JobFailed> {
            let mut attempts = self.attempts.lock();
            attempts.push(message.id);
            let seen = attempts.iter().filter(|id| **id == message.id).count() as u32;
            if seen <= self.failures {
                Err(JobFailed(message.id))
            } else {
                Ok(())
            }
        }

        async fn on_retries_exhausted(&self, message: &Job, last_error: &str) {
            self.exhausted
                .lock()
                .push((message.id, last_error.to_string()));
        }
    }

    fn consumer(max_attempts: u32) -> (QueueConsumer<Job>, Arc<MessagingProvider>) {
        let provider = Arc::new(MessagingProvider::from(
            InMemoryMessagingService::with_queues(&[QUEUE]),
        ));
        let consumer =
            QueueConsumer::new(provider.clone(), QUEUE, Duration::from_millis(10), max_attempts);
        (consumer, provider)
    }

    fn in_memory(provider: &MessagingProvider) -> &InMemoryMessagingService {
        provider.as_in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_successful_message_is_acknowledged() {
        let (consumer, provider) = consumer(3);
        provider.send_message(QUEUE, &Job { id: 1 }).await.unwrap();

        let handler = FlakyHandler::new(0);
        assert!(consumer.consume_one(&handler).await.unwrap());

        assert_eq!(in_memory(&provider).queue_length(QUEUE), 0);
        assert_eq!(in_memory(&provider).in_flight_count(QUEUE), 0);
        assert_eq!(consumer.stats().messages_processed, 1);
    }

    #[tokio::test]
    async fn test_empty_queue_returns_false() {
        let (consumer, _provider) = consumer(3);
        let handler = FlakyHandler::new(0);
        assert!(!consumer.consume_one(&handler).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_message_is_requeued_then_succeeds() {
        let (consumer, provider) = consumer(3);
        provider.send_message(QUEUE, &Job { id: 7 }).await.unwrap();

        let handler = FlakyHandler::new(1);
        assert!(consumer.consume_one(&handler).await.unwrap());
        assert_eq!(in_memory(&provider).queue_length(QUEUE), 1);

        assert!(consumer.consume_one(&handler).await.unwrap());
        assert_eq!(in_memory(&provider).queue_length(QUEUE), 0);

        let stats = consumer.stats();
        assert_eq!(stats.messages_requeued, 1);
        assert_eq!(stats.messages_processed, 1);
        assert!(handler.exhausted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_retries_exhausted_dead_letters_and_notifies() {
        let (consumer, provider) = consumer(2);
        provider.send_message(QUEUE, &Job { id: 3 }).await.unwrap();

        let handler = FlakyHandler::new(u32::MAX);
        while consumer.consume_one(&handler).await.unwrap() {}

        assert_eq!(handler.attempts.lock().len(), 2);
        assert_eq!(
            *handler.exhausted.lock(),
            vec![(3, "job 3 failed".to_string())]
        );
        let dead: Vec<Job> = in_memory(&provider).dead_letters(QUEUE).unwrap();
        assert_eq!(dead, vec![Job { id: 3 }]);
        assert_eq!(consumer.stats().messages_dead_lettered, 1);
    }

    #[tokio::test]
    async fn test_undecodable_message_is_dead_lettered_without_handler() {
        let (consumer, provider) = consumer(5);
        in_memory(&provider)
            .send_raw(QUEUE, b"{not json".to_vec())
            .unwrap();

        let handler = FlakyHandler::new(0);
        assert!(consumer.consume_one(&handler).await.unwrap());

        assert!(handler.attempts.lock().is_empty());
        assert_eq!(in_memory(&provider).dead_letter_count(QUEUE), 1);
        assert_eq!(consumer.stats().messages_dead_lettered, 1);
    }

    #[tokio::test]
    async fn test_consume_drains_queue_and_stops_on_cancel() {
        let (consumer, provider) = consumer(3);
        for id in 0..4 {
            provider.send_message(QUEUE, &Job { id }).await.unwrap();
        }

        let handler = FlakyHandler::new(0);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let watcher = provider.clone();
        tokio::spawn(async move {
            while in_memory(&watcher).queue_length(QUEUE) > 0
                || in_memory(&watcher).in_flight_count(QUEUE) > 0
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            stopper.cancel();
        });

        let stats = consumer.consume(&handler, cancel).await.unwrap();
        assert_eq!(stats.messages_processed, 4);
        assert_eq!(*handler.attempts.lock(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_consume_surfaces_transport_errors() {
        let (consumer, provider) = consumer(3);
        in_memory(&provider).set_available(false);

        let handler = FlakyHandler::new(0);
        let result = consumer.consume(&handler, CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
