//! Device hub tests: several clients sharing one hub and one photo directory.

mod common;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use serde_json::{json, Value};
use tokio::sync::mpsc::Receiver;

use capillary_core::hub::{ClientId, DeviceHub, PhotoStore};
use capillary_core::messaging::{InMemoryMessagingService, MessagingProvider};
use capillary_core::orchestration::ExaminationDispatcher;
use capillary_core::repositories::Repositories;
use capillary_core::web::handlers::photos::get_photo;
use capillary_core::web::AppState;

use common::jpeg_base64;

struct Client {
    id: ClientId,
    rx: Receiver<String>,
}

impl Client {
    async fn connect(hub: &DeviceHub) -> Self {
        let (id, rx) = hub.connect().await;
        let mut client = Self { id, rx };
        let greeting = client.frames();
        assert_eq!(greeting.len(), 1);
        assert_eq!(greeting[0]["type"], "photo_list");
        client
    }

    /// Every frame queued for this client so far
    fn frames(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&text).expect("hub sends JSON"));
        }
        frames
    }
}

fn frame(kind: &str, data: Value) -> String {
    json!({ "type": kind, "data": data }).to_string()
}

#[tokio::test]
async fn test_saved_photo_reaches_every_client_once() {
    let dir = tempfile::tempdir().unwrap();
    let hub = DeviceHub::new(PhotoStore::new(dir.path()));

    let mut sender = Client::connect(&hub).await;
    let mut watchers = vec![Client::connect(&hub).await, Client::connect(&hub).await];
    assert_eq!(hub.client_count(), 3);

    hub.handle_text(&sender.id, &frame("save_photo", json!({ "image": jpeg_base64() })))
        .await;

    let sent = sender.frames();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["type"], "photo_saved");
    assert_eq!(sent[1]["type"], "new_photo");
    let filename = sent[0]["data"]["filename"].as_str().unwrap().to_string();
    assert!(filename.starts_with("photo_") && filename.ends_with(".jpg"));
    assert_eq!(sent[0]["data"]["url"], format!("/api/photos/{filename}"));

    for watcher in &mut watchers {
        let frames = watcher.frames();
        assert_eq!(frames.len(), 1, "exactly one new_photo per client");
        assert_eq!(frames[0]["type"], "new_photo");
        assert_eq!(frames[0]["data"]["filename"], filename.as_str());
    }

    assert!(dir.path().join(&filename).is_file());

    hub.handle_text(&watchers[0].id, &frame("get_photos", Value::Null))
        .await;
    let listing = watchers[0].frames();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["type"], "photo_list");
    let photos = listing[0]["data"].as_array().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0]["filename"], filename.as_str());
}

#[tokio::test]
async fn test_delete_cannot_escape_photo_directory() {
    let outer = tempfile::tempdir().unwrap();
    let photo_dir = outer.path().join("photos");
    std::fs::create_dir_all(&photo_dir).unwrap();
    std::fs::write(outer.path().join("secret.jpg"), b"keep me").unwrap();

    let hub = DeviceHub::new(PhotoStore::new(&photo_dir));
    let mut client = Client::connect(&hub).await;

    hub.handle_text(
        &client.id,
        &frame("delete_photo", json!({ "filename": "../secret.jpg" })),
    )
    .await;

    let frames = client.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "error");
    assert_eq!(
        frames[0]["data"]["message"],
        "Failed to delete photo: Photo not found: secret.jpg"
    );
    assert!(outer.path().join("secret.jpg").exists());
}

#[tokio::test]
async fn test_delete_removes_photo_and_replies_to_sender_only() {
    let dir = tempfile::tempdir().unwrap();
    let hub = DeviceHub::new(PhotoStore::new(dir.path()));
    let mut owner = Client::connect(&hub).await;
    let mut other = Client::connect(&hub).await;

    let filename = hub.photos().save_base64(&jpeg_base64()).await.unwrap();

    hub.handle_text(
        &owner.id,
        &frame("delete_photo", json!({ "filename": filename.clone() })),
    )
    .await;

    let frames = owner.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "photo_deleted");
    assert_eq!(frames[0]["data"]["filename"], filename.as_str());
    assert!(other.frames().is_empty());
    assert!(!dir.path().join(&filename).exists());
}

#[tokio::test]
async fn test_control_change_is_relayed_to_all_clients() {
    let dir = tempfile::tempdir().unwrap();
    let hub = DeviceHub::new(PhotoStore::new(dir.path()));
    let mut clients = vec![
        Client::connect(&hub).await,
        Client::connect(&hub).await,
        Client::connect(&hub).await,
    ];

    let sender = clients[1].id;
    hub.handle_text(
        &sender,
        &frame("control_change", json!({ "type": "focus", "value": 42.5, "delta": -1.0 })),
    )
    .await;

    for client in &mut clients {
        let frames = client.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "control_change");
        assert_eq!(frames[0]["data"]["type"], "focus");
        assert_eq!(frames[0]["data"]["value"], 42.5);
    }
}

#[tokio::test]
async fn test_disconnected_client_no_longer_receives_broadcasts() {
    let dir = tempfile::tempdir().unwrap();
    let hub = DeviceHub::new(PhotoStore::new(dir.path()));
    let mut stays = Client::connect(&hub).await;
    let leaves = Client::connect(&hub).await;

    hub.disconnect(&leaves.id);
    assert_eq!(hub.client_count(), 1);

    hub.handle_text(&stays.id, &frame("start_stream", Value::Null))
        .await;
    let frames = stays.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "stream_started");
    assert!(hub.is_streaming());

    hub.handle_text(
        &stays.id,
        &frame("control_change", json!({ "type": "zoom", "value": 2.0 })),
    )
    .await;
    assert_eq!(stays.frames().len(), 1);
}

#[tokio::test]
async fn test_invalid_frames() {
    let dir = tempfile::tempdir().unwrap();
    let hub = DeviceHub::new(PhotoStore::new(dir.path()));
    let mut client = Client::connect(&hub).await;

    hub.handle_text(&client.id, "not json at all").await;
    assert!(client.frames().is_empty());

    hub.handle_text(&client.id, &frame("reboot_device", Value::Null))
        .await;
    let frames = client.frames();
    assert_eq!(frames[0]["type"], "error");
    assert_eq!(frames[0]["data"]["message"], "Unknown message type: reboot_device");

    hub.handle_text(&client.id, &json!({ "data": { "image": "x" } }).to_string())
        .await;
    let frames = client.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "error");
    assert_eq!(frames[0]["data"]["message"], "Unknown message type: ");

    hub.handle_text(&client.id, &frame("save_photo", json!({ "image": "aGVsbG8=" })))
        .await;
    let frames = client.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "error");
    assert!(frames[0]["data"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to save photo:"));
    assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
}

fn app_state(hub: DeviceHub) -> AppState {
    let messaging = Arc::new(MessagingProvider::InMemory(InMemoryMessagingService::new()));
    let dispatcher = Arc::new(ExaminationDispatcher::new(
        Repositories::in_memory(),
        messaging.clone(),
        "analysis_tasks",
    ));
    AppState::new(Arc::new(hub), dispatcher, messaging)
}

#[tokio::test]
async fn test_photo_endpoint_serves_stored_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let hub = DeviceHub::new(PhotoStore::new(dir.path()));
    let filename = hub.photos().save_base64(&jpeg_base64()).await.unwrap();
    let state = app_state(hub);

    let response = match get_photo(State(state.clone()), Path(filename)).await {
        Ok(response) => response,
        Err(e) => panic!("photo not served: {e:?}"),
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let missing = match get_photo(State(state), Path("photo_19700101_000000.jpg".to_string())).await
    {
        Ok(_) => panic!("missing photo must not be served"),
        Err(e) => e.into_response(),
    };
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
