//! # RabbitMQ Messaging Service
//!
//! `MessagingService` over AMQP 0.9.1 using the `lapin` crate.
//!
//! - Queues are durable and dead-letter through `<queue>_dlx` into `<queue>_dlq`
//! - Messages are published persistent (delivery mode 2) with a timestamp and a
//!   generated `message_id`, and the publisher confirm is awaited
//! - Receive uses `basic_get` with manual acknowledgment; the delivery tag is
//!   the receipt handle
//!
//! RabbitMQ only reports whether a delivery was redelivered, not how many
//! times, so delivery counts are tracked per `message_id` by this process.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use lapin::options::{
    BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::loader::redact_credentials;
use crate::config::MessagingConfig;
use crate::constants::queues;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::service::connect_with_retry;
use crate::messaging::service::traits::{MessagingService, QueueMessage};
use crate::messaging::service::types::{
    MessageId, QueueStats, QueuedMessage, RawMessage, ReceiptHandle,
};

#[derive(Debug, Default)]
struct QueueCounters {
    total_sent: AtomicU64,
    total_received: AtomicU64,
    total_acked: AtomicU64,
    total_nacked: AtomicU64,
}

/// Bookkeeping for deliveries that have not been settled yet
#[derive(Debug, Default)]
struct DeliveryTracker {
    /// delivery tag -> message id of the unsettled delivery
    in_flight: HashMap<u64, Option<String>>,
    /// message id -> deliveries seen by this process
    receive_counts: HashMap<String, u32>,
}

impl DeliveryTracker {
    fn record_delivery(&mut self, delivery_tag: u64, message_id: Option<&str>, redelivered: bool) -> u32 {
        self.in_flight
            .insert(delivery_tag, message_id.map(str::to_string));

        match message_id {
            Some(id) => {
                let count = self
                    .receive_counts
                    .entry(id.to_string())
                    .or_insert(if redelivered { 1 } else { 0 });
                *count += 1;
                *count
            }
            None if redelivered => 2,
            None => 1,
        }
    }

    /// Forget a delivery; counts survive a requeue so the next delivery keeps counting
    fn settle(&mut self, delivery_tag: u64, requeued: bool) {
        if let Some(Some(message_id)) = self.in_flight.remove(&delivery_tag) {
            if !requeued {
                self.receive_counts.remove(&message_id);
            }
        }
    }
}

#[derive(Debug)]
pub struct RabbitMqMessagingService {
    connection: Connection,
    channel: Channel,
    config: MessagingConfig,
    created_queues: Mutex<HashSet<String>>,
    counters: Mutex<HashMap<String, std::sync::Arc<QueueCounters>>>,
    deliveries: Mutex<DeliveryTracker>,
}

impl RabbitMqMessagingService {
    /// Connect with bounded retries, open a confirm-mode channel and apply QoS
    pub async fn connect(config: &MessagingConfig) -> MessagingResult<Self> {
        info!(
            url = %redact_credentials(&config.url),
            attempts = config.connect_attempts,
            "Connecting to RabbitMQ"
        );

        let connection = connect_with_retry(
            config.connect_attempts,
            config.connect_retry_interval(),
            || {
                Connection::connect(
                    &config.url,
                    ConnectionProperties::default()
                        .with_connection_name(queues::CONNECTION_NAME.into()),
                )
            },
        )
        .await?;

        let channel = connection.create_channel().await.map_err(|e| {
            MessagingError::connection(1, format!("RabbitMQ channel creation failed: {e}"))
        })?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| {
                MessagingError::configuration("rabbitmq", format!("Failed to enable confirms: {e}"))
            })?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| MessagingError::configuration("rabbitmq", format!("Failed to set QoS: {e}")))?;

        Ok(Self {
            connection,
            channel,
            config: config.clone(),
            created_queues: Mutex::new(HashSet::new()),
            counters: Mutex::new(HashMap::new()),
            deliveries: Mutex::new(DeliveryTracker::default()),
        })
    }

    pub fn prefetch_count(&self) -> u16 {
        self.config.prefetch_count
    }

    fn counters(&self, queue_name: &str) -> std::sync::Arc<QueueCounters> {
        self.counters
            .lock()
            .entry(queue_name.to_string())
            .or_default()
            .clone()
    }

    fn parse_delivery_tag(receipt_handle: &ReceiptHandle) -> MessagingResult<u64> {
        receipt_handle
            .as_u64()
            .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle))
    }

    /// Declare the dead-letter exchange and queue for `queue_name`
    async fn setup_dlx(&self, queue_name: &str) -> MessagingResult<()> {
        let dlx_name = format!("{queue_name}{}", queues::DLX_SUFFIX);
        let dlq_name = format!("{queue_name}{}", queues::DLQ_SUFFIX);

        self.channel
            .exchange_declare(
                &dlx_name,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::queue_creation(&dlx_name, format!("DLX creation failed: {e}")))?;

        self.channel
            .queue_declare(
                &dlq_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::queue_creation(&dlq_name, format!("DLQ creation failed: {e}")))?;

        self.channel
            .queue_bind(
                &dlq_name,
                &dlx_name,
                queue_name,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::queue_creation(&dlq_name, format!("DLQ binding failed: {e}")))?;

        Ok(())
    }

    async fn passive_message_count(&self, queue_name: &str) -> MessagingResult<u64> {
        let queue = self
            .channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::queue_stats(queue_name, format!("Queue query failed: {e}")))?;
        Ok(u64::from(queue.message_count()))
    }
}

#[async_trait]
impl MessagingService for RabbitMqMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        if self.created_queues.lock().contains(queue_name) {
            return Ok(());
        }

        self.setup_dlx(queue_name).await?;

        let mut args = FieldTable::default();
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(format!("{queue_name}{}", queues::DLX_SUFFIX).into()),
        );
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(queue_name.into()),
        );

        self.channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args,
            )
            .await
            .map_err(|e| MessagingError::queue_creation(queue_name, format!("Queue creation failed: {e}")))?;

        self.created_queues.lock().insert(queue_name.to_string());
        debug!(queue = %queue_name, "Declared durable queue with dead-letter route");
        Ok(())
    }

    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> MessagingResult<MessageId> {
        let bytes = message.to_bytes()?;
        let message_id = Uuid::new_v4().to_string();
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();

        let confirm = self
            .channel
            .basic_publish(
                "",
                queue_name,
                BasicPublishOptions::default(),
                &bytes,
                BasicProperties::default()
                    .with_delivery_mode(queues::PERSISTENT_DELIVERY_MODE)
                    .with_content_type(queues::JSON_CONTENT_TYPE.into())
                    .with_timestamp(timestamp)
                    .with_message_id(message_id.clone().into()),
            )
            .await
            .map_err(|e| MessagingError::send(queue_name, format!("Publish failed: {e}")))?;

        let confirmation = confirm
            .await
            .map_err(|e| MessagingError::send(queue_name, format!("Publish confirmation failed: {e}")))?;

        if confirmation.is_nack() {
            return Err(MessagingError::send(queue_name, "Broker rejected the message"));
        }

        self.counters(queue_name)
            .total_sent
            .fetch_add(1, Ordering::Relaxed);

        Ok(MessageId::new(message_id))
    }

    async fn receive_message(&self, queue_name: &str) -> MessagingResult<Option<RawMessage>> {
        let fetched = self
            .channel
            .basic_get(queue_name, BasicGetOptions { no_ack: false })
            .await
            .map_err(|e| MessagingError::receive(queue_name, format!("basic_get failed: {e}")))?;

        let Some(fetched) = fetched else {
            return Ok(None);
        };

        let delivery = fetched.delivery;
        let delivery_tag = delivery.delivery_tag;
        let message_id = delivery
            .properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str().to_string());
        let enqueued_at = delivery
            .properties
            .timestamp()
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        let receive_count = self.deliveries.lock().record_delivery(
            delivery_tag,
            message_id.as_deref(),
            delivery.redelivered,
        );

        self.counters(queue_name)
            .total_received
            .fetch_add(1, Ordering::Relaxed);

        let mut received = QueuedMessage::new(ReceiptHandle::from(delivery_tag), delivery.data, receive_count);
        if let Some(id) = message_id {
            received = received.with_message_id(MessageId::new(id));
        }
        if let Some(at) = enqueued_at {
            received = received.with_enqueued_at(at);
        }

        Ok(Some(received))
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> MessagingResult<()> {
        let delivery_tag = Self::parse_delivery_tag(receipt_handle)?;

        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| MessagingError::ack(queue_name, delivery_tag, format!("ack failed: {e}")))?;

        self.deliveries.lock().settle(delivery_tag, false);
        self.counters(queue_name)
            .total_acked
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> MessagingResult<()> {
        let delivery_tag = Self::parse_delivery_tag(receipt_handle)?;

        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| MessagingError::nack(queue_name, delivery_tag, format!("nack failed: {e}")))?;

        self.deliveries.lock().settle(delivery_tag, requeue);
        self.counters(queue_name)
            .total_nacked
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats> {
        let message_count = self.passive_message_count(queue_name).await?;
        let dead_letters = self
            .passive_message_count(&format!("{queue_name}{}", queues::DLQ_SUFFIX))
            .await
            .ok();
        let counters = self.counters(queue_name);

        let mut stats = QueueStats::new(queue_name, message_count).with_counters(
            counters.total_sent.load(Ordering::Relaxed),
            counters.total_received.load(Ordering::Relaxed),
            counters.total_acked.load(Ordering::Relaxed),
            counters.total_nacked.load(Ordering::Relaxed),
        );
        if let Some(count) = dead_letters {
            stats = stats.with_dead_letter_count(count);
        }
        Ok(stats)
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        if self.connection.status().connected() {
            Ok(true)
        } else {
            Err(MessagingError::health_check("RabbitMQ connection is not connected"))
        }
    }

    fn provider_name(&self) -> &'static str {
        "rabbitmq"
    }
}
