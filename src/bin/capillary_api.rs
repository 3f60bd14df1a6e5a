//! # Capillary API Server
//!
//! Serves the device hub websocket, stored photos and the examination
//! analysis trigger, which enqueues one task per image for the worker.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin capillary-api
//!
//! # Override the listen port and photo directory
//! SERVER_PORT=9090 PHOTO_STORAGE_PATH=/data/photos cargo run --bin capillary-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use capillary_core::config::ConfigManager;
use capillary_core::database::{DatabaseConnection, DatabaseMigrations};
use capillary_core::hub::{ClientRegistry, DeviceHub, PhotoStore};
use capillary_core::logging;
use capillary_core::messaging::{MessagingProvider, RabbitMqMessagingService};
use capillary_core::orchestration::ExaminationDispatcher;
use capillary_core::repositories::Repositories;
use capillary_core::web::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting capillary API server");

    let config_manager = ConfigManager::load().context("failed to load configuration")?;
    let config = config_manager.config();

    let database = DatabaseConnection::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    if config.database.run_migrations {
        DatabaseMigrations::run_all(database.pool())
            .await
            .context("failed to apply migrations")?;
    }
    let repositories = Repositories::postgres(database.pool().clone());

    let messaging = Arc::new(MessagingProvider::RabbitMq(
        RabbitMqMessagingService::connect(&config.messaging)
            .await
            .context("failed to connect to message broker")?,
    ));
    messaging
        .ensure_queue(&config.messaging.queue_name)
        .await
        .context("failed to declare task queue")?;

    let photos = PhotoStore::new(config.storage.photo_path.clone());
    tokio::fs::create_dir_all(photos.root())
        .await
        .with_context(|| format!("failed to create {}", photos.root().display()))?;

    let dispatcher = Arc::new(ExaminationDispatcher::new(
        repositories,
        messaging.clone(),
        config.messaging.queue_name.clone(),
    ));
    let hub = DeviceHub::with_registry(
        photos,
        ClientRegistry::with_buffer(config.server.client_buffer_size),
    );
    let state = AppState::new(Arc::new(hub), dispatcher, messaging);
    let app = create_router(state);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        address = %address,
        environment = %config_manager.environment(),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    database.close().await;
    info!("API server shutdown complete");
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
