//! # Device Hub
//!
//! Routes decoded client messages to their handlers. Replies go to the
//! requesting client only; `new_photo` and `control_change` go to everyone.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, warn};

use super::messages::{InboundMessage, OutboundMessage, PhotoLink};
use super::photo_store::PhotoStore;
use super::registry::{ClientId, ClientRegistry};
use super::{HubError, HubResult};
use crate::logging::log_hub_operation;

const STREAM_STARTED: &str = "Streaming started";
const STREAM_STOPPED: &str = "Streaming stopped";

#[derive(Debug)]
pub struct DeviceHub {
    registry: ClientRegistry,
    photos: PhotoStore,
    streaming: AtomicBool,
}

impl DeviceHub {
    pub fn new(photos: PhotoStore) -> Self {
        Self::with_registry(photos, ClientRegistry::new())
    }

    pub fn with_registry(photos: PhotoStore, registry: ClientRegistry) -> Self {
        Self {
            registry,
            photos,
            streaming: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn photos(&self) -> &PhotoStore {
        &self.photos
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Register a client with the current photo listing as its first frame
    ///
    /// The listing is taken before registration, so a photo saved in between
    /// reaches the client as `new_photo` after the listing, never before it.
    pub async fn connect(&self) -> (ClientId, Receiver<String>) {
        let greeting = match self.photos.list().await {
            Ok(listing) => match OutboundMessage::PhotoList(listing).to_frame() {
                Ok(frame) => Some(frame),
                Err(e) => {
                    error!(error = %e, "Failed to encode photo listing");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Initial photo listing failed");
                None
            }
        };

        let (client_id, rx) = self.registry.add_with_greeting(greeting);
        let id = client_id.to_string();
        log_hub_operation("connect", Some(&id), "connected", self.client_count(), None);

        (client_id, rx)
    }

    pub fn disconnect(&self, client_id: &ClientId) {
        if self.registry.remove(client_id) {
            let id = client_id.to_string();
            log_hub_operation("disconnect", Some(&id), "disconnected", self.client_count(), None);
        }
    }

    /// Handle one text frame from a client
    ///
    /// Text that is not JSON is logged and ignored. Every other failure,
    /// including a JSON frame without a usable `type`, is answered with an
    /// `error` frame to the sender.
    pub async fn handle_text(&self, client_id: &ClientId, text: &str) {
        let message = match InboundMessage::decode(text) {
            Ok(message) => message,
            Err(HubError::Serialization(e)) => {
                warn!(client_id = %client_id, error = %e, "Ignoring non-JSON frame");
                return;
            }
            Err(e) => {
                self.reply(client_id, &OutboundMessage::error(e.to_string()));
                return;
            }
        };

        let kind = message.kind();
        if let Err(e) = self.handle_message(client_id, message).await {
            debug!(client_id = %client_id, message_type = kind, error = %e, "Hub request failed");
            let context = match kind {
                "save_photo" => "Failed to save photo",
                "delete_photo" => "Failed to delete photo",
                "get_photos" => "Failed to get photos",
                _ => "Request failed",
            };
            self.reply(client_id, &OutboundMessage::error(format!("{context}: {e}")));
        }
    }

    pub async fn handle_message(
        &self,
        client_id: &ClientId,
        message: InboundMessage,
    ) -> HubResult<()> {
        match message {
            InboundMessage::StartStream => {
                self.streaming.store(true, Ordering::SeqCst);
                self.reply(client_id, &OutboundMessage::StreamStarted(STREAM_STARTED.into()));
            }
            InboundMessage::StopStream => {
                self.streaming.store(false, Ordering::SeqCst);
                self.reply(client_id, &OutboundMessage::StreamStopped(STREAM_STOPPED.into()));
            }
            InboundMessage::SavePhoto { image } => {
                let filename = self.photos.save_base64(&image).await?;
                self.reply(client_id, &OutboundMessage::PhotoSaved(PhotoLink::new(&filename)));
                self.broadcast(&OutboundMessage::NewPhoto(PhotoLink::new(&filename)));
            }
            InboundMessage::GetPhotos => {
                let listing = self.photos.list().await?;
                self.reply(client_id, &OutboundMessage::PhotoList(listing));
            }
            InboundMessage::DeletePhoto { filename } => {
                let filename = self.photos.delete(&filename).await?;
                self.reply(client_id, &OutboundMessage::PhotoDeleted { filename });
            }
            InboundMessage::ControlChange(change) => {
                self.broadcast(&OutboundMessage::ControlChange(change));
            }
        }
        Ok(())
    }

    /// Send a message to every connected client; returns how many received it
    pub fn broadcast(&self, message: &OutboundMessage) -> usize {
        match message.to_frame() {
            Ok(frame) => {
                let delivered = self.registry.broadcast(&frame);
                log_hub_operation(
                    "broadcast",
                    None,
                    message.kind(),
                    delivered,
                    None,
                );
                delivered
            }
            Err(e) => {
                error!(message_type = message.kind(), error = %e, "Failed to encode broadcast");
                0
            }
        }
    }

    fn reply(&self, client_id: &ClientId, message: &OutboundMessage) {
        match message.to_frame() {
            Ok(frame) => {
                if !self.registry.send_to(client_id, frame) {
                    debug!(client_id = %client_id, "Reply dropped, client gone");
                }
            }
            Err(e) => error!(message_type = message.kind(), error = %e, "Failed to encode reply"),
        }
    }
}
