//! # Messaging Service
//!
//! Provider-agnostic task queue transport: the [`MessagingService`] trait, its
//! RabbitMQ and in-memory implementations, and the [`MessagingProvider`] enum
//! used to hold either.

pub mod provider;
pub mod providers;
pub mod traits;
pub mod types;

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::messaging::errors::{MessagingError, MessagingResult};

pub use provider::MessagingProvider;
pub use providers::{InMemoryMessagingService, RabbitMqMessagingService};
pub use traits::{MessagingService, QueueMessage};
pub use types::{MessageId, QueueStats, QueuedMessage, RawMessage, ReceiptHandle};

/// Run `connect` up to `attempts` times, sleeping `interval` between failures
///
/// The broker may come up after the services that depend on it, so startup
/// tolerates a bounded outage before giving up with
/// [`MessagingError::Connection`].
pub async fn connect_with_retry<T, E, F, Fut>(
    attempts: u32,
    interval: Duration,
    mut connect: F,
) -> MessagingResult<T>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match connect().await {
            Ok(connection) => {
                if attempt > 1 {
                    info!(attempt = attempt, "Connected to message broker after retrying");
                }
                return Ok(connection);
            }
            Err(e) => {
                last_error = e.to_string();
                warn!(
                    attempt = attempt,
                    max_attempts = attempts,
                    error = %last_error,
                    "Message broker connection attempt failed"
                );
                if attempt < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(MessagingError::connection(attempts, last_error))
}
