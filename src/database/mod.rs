//! # Database
//!
//! PostgreSQL pool construction and embedded schema migrations backing the
//! [`postgres`](crate::repositories::postgres) repositories.

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::DatabaseMigrations;
