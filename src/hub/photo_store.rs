//! # Photo Store
//!
//! Flat directory of captured photos. File names come either from the store
//! itself (timestamp-derived on save) or from clients, in which case only the
//! base name is used so a request can never reach outside the directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{HubError, HubResult};
use crate::constants::photos;

/// Listing entry for a stored photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoInfo {
    pub filename: String,
    /// Last modification time
    pub timestamp: DateTime<Utc>,
    /// URL the photo is served from
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode, validate and store a base64 image; returns the stored file name
    ///
    /// A `data:<mime>;base64,` prefix is stripped. The payload must decode as
    /// a JPEG or PNG raster. Saves within the same second get `_1`, `_2`, ...
    /// suffixes instead of overwriting each other.
    ///
    /// Bytes go to a hidden upload file first and only appear under the photo
    /// name once fully written, so a failed or interrupted save never leaves a
    /// truncated photo behind.
    pub async fn save_base64(&self, payload: &str) -> HubResult<String> {
        let bytes = STANDARD
            .decode(strip_data_uri(payload).trim())
            .map_err(|e| HubError::validation(format!("failed to decode base64: {e}")))?;

        image::load_from_memory(&bytes)
            .map_err(|e| HubError::validation(format!("invalid image data: {e}")))?;

        fs::create_dir_all(&self.root).await?;

        let upload = self.root.join(format!(
            ".upload_{}.{}",
            Uuid::new_v4().simple(),
            photos::UPLOAD_EXTENSION
        ));

        let result = match write_upload(&upload, &bytes).await {
            Ok(()) => self.publish_upload(&upload).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = fs::remove_file(&upload).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(upload = %upload.display(), error = %e, "Failed to remove upload file");
            }
        }

        let filename = result?;
        info!(filename = %filename, size = bytes.len(), "Photo saved");
        Ok(filename)
    }

    /// Link a finished upload under the first free timestamp-derived name
    async fn publish_upload(&self, upload: &Path) -> HubResult<String> {
        let stem = format!(
            "{}{}",
            photos::FILENAME_PREFIX,
            Local::now().format(photos::FILENAME_TIMESTAMP_FORMAT)
        );

        for attempt in 0..=photos::MAX_NAME_COLLISIONS {
            let filename = if attempt == 0 {
                format!("{stem}.{}", photos::FILENAME_EXTENSION)
            } else {
                format!("{stem}_{attempt}.{}", photos::FILENAME_EXTENSION)
            };

            // hard_link fails instead of replacing an existing photo
            match fs::hard_link(upload, self.root.join(&filename)).await {
                Ok(()) => return Ok(filename),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(HubError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free file name for {stem}"),
        )))
    }

    /// Photos in the directory, newest first; empty when the directory is missing
    pub async fn list(&self) -> HubResult<Vec<PhotoInfo>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut photos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();
            if !is_listed_extension(&filename) {
                continue;
            }

            let timestamp = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            photos.push(PhotoInfo {
                path: format!("{}{filename}", photos::URL_PREFIX),
                filename,
                timestamp,
                size: metadata.len(),
            });
        }

        photos.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(photos)
    }

    /// Remove a photo; returns the sanitized name that was deleted
    pub async fn delete(&self, filename: &str) -> HubResult<String> {
        let (name, path) = self.resolve(filename).await?;
        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => HubError::not_found(&name),
            _ => HubError::Io(e),
        })?;
        info!(filename = %name, "Photo deleted");
        Ok(name)
    }

    /// Raw bytes and content type of a photo
    pub async fn read(&self, filename: &str) -> HubResult<(Vec<u8>, &'static str)> {
        let (name, path) = self.resolve(filename).await?;
        let bytes = fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => HubError::not_found(&name),
            _ => HubError::Io(e),
        })?;
        Ok((bytes, content_type(&name)))
    }

    /// Map a client-supplied name to an existing regular file in the store
    async fn resolve(&self, filename: &str) -> HubResult<(String, PathBuf)> {
        let name = sanitize_filename(filename).ok_or_else(|| HubError::not_found(filename))?;
        let path = self.root.join(&name);

        match fs::symlink_metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok((name, path)),
            Ok(_) => Err(HubError::not_found(name)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(HubError::not_found(name)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Base name of a client-supplied file name, or `None` if nothing usable is left
pub fn sanitize_filename(filename: &str) -> Option<String> {
    // Clients on any platform may send either separator
    let base = filename.rsplit(['/', '\\']).next()?.trim();
    match base {
        "" | "." | ".." => None,
        name => {
            debug!(requested = %filename, resolved = %name, "Sanitized photo name");
            Some(name.to_string())
        }
    }
}

async fn write_upload(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn strip_data_uri(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some((_, data)) = payload.split_once(";base64,") {
            return data;
        }
    }
    payload
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_listed_extension(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| photos::LISTED_EXTENSIONS.contains(&ext.as_str()))
}

fn content_type(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
