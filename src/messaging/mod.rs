//! # Messaging Module
//!
//! Durable task queue between the examination dispatcher and the analysis
//! worker: the wire message, the transport providers, and the consumer loop.

pub mod consumer;
pub mod errors;
pub mod message;
pub mod service;

pub use consumer::{ConsumerStats, MessageHandler, QueueConsumer};
pub use errors::{MessagingError, MessagingResult};
pub use message::AnalysisTaskMessage;
pub use service::{
    connect_with_retry, InMemoryMessagingService, MessageId, MessagingProvider,
    MessagingService, QueueMessage, QueueStats, QueuedMessage, RabbitMqMessagingService,
    RawMessage, ReceiptHandle,
};
