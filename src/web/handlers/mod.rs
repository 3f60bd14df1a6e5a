//! # Web API Request Handlers
//!
//! HTTP and websocket handlers organized by functional area.

pub mod examinations;
pub mod health;
pub mod photos;
pub mod websocket;
