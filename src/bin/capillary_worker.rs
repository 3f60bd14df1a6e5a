//! # Capillary Analysis Worker
//!
//! Consumes analysis tasks from the queue, computes capillary metrics for each
//! image and generates the examination report once every analysis has settled.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin capillary-worker
//!
//! # Run against a specific environment
//! CAPILLARY_ENV=production cargo run --bin capillary-worker
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use capillary_core::config::ConfigManager;
use capillary_core::database::{DatabaseConnection, DatabaseMigrations};
use capillary_core::logging;
use capillary_core::messaging::{
    AnalysisTaskMessage, MessagingProvider, QueueConsumer, RabbitMqMessagingService,
};
use capillary_core::orchestration::{AnalysisWorker, ReportAggregator, SimulatedMetricsProvider};
use capillary_core::repositories::Repositories;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting capillary analysis worker");

    let config_manager = ConfigManager::load().context("failed to load configuration")?;
    let config = config_manager.config();
    info!(environment = %config_manager.environment(), "Configuration ready");

    let database = DatabaseConnection::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    if config.database.run_migrations {
        DatabaseMigrations::run_all(database.pool())
            .await
            .context("failed to apply migrations")?;
    }
    let repositories = Repositories::postgres(database.pool().clone());

    let messaging = RabbitMqMessagingService::connect(&config.messaging)
        .await
        .context("failed to connect to message broker")?;
    let provider = Arc::new(MessagingProvider::RabbitMq(messaging));

    let aggregator = Arc::new(ReportAggregator::new(
        repositories.clone(),
        config.report.clone(),
    ));
    let worker = AnalysisWorker::new(
        repositories,
        Arc::new(SimulatedMetricsProvider::from_config(&config.worker)),
        aggregator,
    );
    let consumer = QueueConsumer::<AnalysisTaskMessage>::from_config(provider, &config.messaging);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, finishing in-flight task");
        shutdown.cancel();
    });

    info!(queue = %consumer.queue_name(), "Worker ready, waiting for tasks");
    match consumer.consume(&worker, cancel).await {
        Ok(stats) => info!(
            processed = stats.messages_processed,
            requeued = stats.messages_requeued,
            dead_lettered = stats.messages_dead_lettered,
            "Consumer stopped"
        ),
        Err(e) => {
            error!(error = %e, "Consumer stopped with error");
            database.close().await;
            return Err(e).context("task consumer failed");
        }
    }

    database.close().await;
    info!("Worker shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
