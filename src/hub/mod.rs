//! # Device Broadcast Hub
//!
//! Real-time fan-out between a capture device and any number of viewer
//! clients. Every connection shares one [`ClientRegistry`] and one
//! [`PhotoStore`], both owned by a [`DeviceHub`] that is handed to each
//! connection explicitly.

pub mod device_hub;
pub mod messages;
pub mod photo_store;
pub mod registry;

use thiserror::Error;

pub use device_hub::DeviceHub;
pub use messages::{ControlChange, InboundMessage, OutboundMessage, PhotoLink, RawFrame};
pub use photo_store::{PhotoInfo, PhotoStore};
pub use registry::{ClientId, ClientRegistry};

#[derive(Error, Debug)]
pub enum HubError {
    #[error("{message}")]
    Validation { message: String },

    #[error("Photo not found: {filename}")]
    NotFound { filename: String },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HubError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(filename: impl Into<String>) -> Self {
        Self::NotFound {
            filename: filename.into(),
        }
    }
}

pub type HubResult<T> = Result<T, HubError>;
