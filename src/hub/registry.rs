//! # Client Registry
//!
//! The set of connected hub clients. Each client is represented by the
//! sending half of a bounded outbound channel; the connection's writer task
//! owns the receiving half and forwards frames to the socket in order.
//!
//! Every read, write and iteration of the set happens under one lock.
//! Dropping a client's sender closes its channel, which ends its writer task
//! and closes the socket. A client whose channel is full has stopped draining
//! its socket and is dropped the same way as one whose channel has closed.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::hub;

pub type ClientId = Uuid;

#[derive(Debug)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, Sender<String>>>,
    buffer: usize,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::with_buffer(hub::DEFAULT_CLIENT_BUFFER)
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose clients may have at most `buffer` frames queued
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Register a new client and return the receiver its writer drains
    pub fn add(&self) -> (ClientId, Receiver<String>) {
        self.add_with_greeting(None)
    }

    /// Register a new client with `greeting` already queued, so it precedes
    /// any broadcast the client can observe
    pub fn add_with_greeting(&self, greeting: Option<String>) -> (ClientId, Receiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);
        if let Some(frame) = greeting {
            // Fresh channel with capacity >= 1 and a live receiver
            if tx.try_send(frame).is_err() {
                warn!(client_id = %id, "Greeting could not be queued");
            }
        }
        self.clients.lock().insert(id, tx);
        (id, rx)
    }

    /// Returns whether the client was registered
    pub fn remove(&self, id: &ClientId) -> bool {
        self.clients.lock().remove(id).is_some()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.lock().contains_key(id)
    }

    /// Queue a frame for one client
    ///
    /// A client whose channel is closed or full is dropped from the set and
    /// `false` is returned.
    pub fn send_to(&self, id: &ClientId, frame: String) -> bool {
        let mut clients = self.clients.lock();
        let Some(tx) = clients.get(id) else {
            return false;
        };

        if queue(id, tx, frame) {
            true
        } else {
            clients.remove(id);
            false
        }
    }

    /// Queue a frame for every client, dropping any whose channel is closed
    /// or full
    ///
    /// Returns the number of clients the frame was queued for.
    pub fn broadcast(&self, frame: &str) -> usize {
        let mut clients = self.clients.lock();
        clients.retain(|id, tx| queue(id, tx, frame.to_owned()));
        clients.len()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

fn queue(id: &ClientId, tx: &Sender<String>, frame: String) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(client_id = %id, capacity = tx.max_capacity(), "Dropped client not keeping up");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(client_id = %id, "Dropped client with closed channel");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_every_client_in_order() {
        let registry = ClientRegistry::new();
        let (_a, mut rx_a) = registry.add();
        let (_b, mut rx_b) = registry.add();

        assert_eq!(registry.broadcast("one"), 2);
        assert_eq!(registry.broadcast("two"), 2);

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.try_recv().unwrap(), "one");
            assert_eq!(rx.try_recv().unwrap(), "two");
        }
    }

    #[test]
    fn test_dead_client_is_removed_without_affecting_others() {
        let registry = ClientRegistry::new();
        let (dead, rx_dead) = registry.add();
        let (_live, mut rx_live) = registry.add();
        drop(rx_dead);

        assert_eq!(registry.broadcast("hello"), 1);
        assert!(!registry.contains(&dead));
        assert_eq!(rx_live.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_send_to_is_unicast() {
        let registry = ClientRegistry::new();
        let (a, mut rx_a) = registry.add();
        let (_b, mut rx_b) = registry.add();

        assert!(registry.send_to(&a, "only a".into()));
        assert_eq!(rx_a.try_recv().unwrap(), "only a");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_stalled_client_is_dropped_when_buffer_fills() {
        let registry = ClientRegistry::with_buffer(2);
        let (stalled, _rx_stalled) = registry.add();
        let (_live, mut rx_live) = registry.add();

        assert_eq!(registry.broadcast("one"), 2);
        rx_live.try_recv().unwrap();
        assert_eq!(registry.broadcast("two"), 2);
        rx_live.try_recv().unwrap();

        assert_eq!(registry.broadcast("three"), 1);
        assert!(!registry.contains(&stalled));
        assert_eq!(rx_live.try_recv().unwrap(), "three");
        assert!(!registry.send_to(&stalled, "gone".into()));
    }

    #[test]
    fn test_greeting_precedes_broadcasts() {
        let registry = ClientRegistry::new();
        let (_id, mut rx) = registry.add_with_greeting(Some("hello".into()));
        registry.broadcast("news");

        assert_eq!(rx.try_recv().unwrap(), "hello");
        assert_eq!(rx.try_recv().unwrap(), "news");
    }

    #[test]
    fn test_remove_closes_client_channel() {
        let registry = ClientRegistry::new();
        let (id, mut rx) = registry.add();

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
