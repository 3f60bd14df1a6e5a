#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, RabbitMQ in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Capillary Core
//!
//! Asynchronous capillaroscopy analysis pipeline and real-time device hub.
//!
//! ## Overview
//!
//! A doctor starts analysis of an examination; the dispatcher creates one
//! analysis per attached image and enqueues a task for each. Workers consume
//! tasks, compute capillary metrics, and once every analysis of the
//! examination has settled a single report is generated and the examination
//! is closed. Independently, the device hub relays microscope control changes
//! and captured photos between websocket clients.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Task queue client: RabbitMQ and in-memory providers, consumer loop
//! - [`orchestration`] - Dispatcher, analysis worker and report aggregator
//! - [`state_machine`] - Analysis and examination lifecycles
//! - [`repositories`] - Persistence seams with in-memory and PostgreSQL backends
//! - [`models`] - Domain entities
//! - [`hub`] - Device broadcast hub and photo storage
//! - [`web`] - axum router: websocket, photos, analysis trigger, health
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging
//! - [`error`] - Crate-level error aggregation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use capillary_core::config::ReportConfig;
//! use capillary_core::messaging::{InMemoryMessagingService, MessagingProvider};
//! use capillary_core::orchestration::{ExaminationDispatcher, NewImage};
//! use capillary_core::repositories::Repositories;
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repositories = Repositories::in_memory();
//! let messaging = Arc::new(MessagingProvider::InMemory(InMemoryMessagingService::new()));
//! let dispatcher = ExaminationDispatcher::new(repositories, messaging, "analysis_tasks");
//!
//! let exam = dispatcher
//!     .create_examination(Uuid::new_v4(), Uuid::new_v4(), "Nailfold, left hand")
//!     .await?;
//! dispatcher
//!     .attach_image(
//!         exam.id,
//!         NewImage {
//!             filename: "frame_01.jpg".to_string(),
//!             file_path: "/data/frame_01.jpg".to_string(),
//!             file_size: 20_480,
//!             mime_type: "image/jpeg".to_string(),
//!         },
//!     )
//!     .await?;
//! let summary = dispatcher.start_analysis(exam.id).await?;
//! assert_eq!(summary.dispatched, 1);
//! # let _ = ReportConfig::default();
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests (in-memory backends)
//! ```

pub mod config;
pub mod constants;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod hub;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod repositories;
pub mod state_machine;
pub mod web;

pub use config::{CapillaryConfig, ConfigManager};
pub use error::{CapillaryError, Result};
