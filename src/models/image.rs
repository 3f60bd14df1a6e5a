//! # Image Model
//!
//! A captured image attached to an examination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub examination_id: Uuid,
    pub filename: String,
    /// Location handed to the metrics provider
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub captured_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Image {
    pub fn new(
        examination_id: Uuid,
        filename: impl Into<String>,
        file_path: impl Into<String>,
        file_size: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            examination_id,
            filename: filename.into(),
            file_path: file_path.into(),
            file_size,
            mime_type: mime_type.into(),
            width: None,
            height: None,
            captured_at: now,
            created_at: now,
        }
    }

    pub fn with_dimensions(mut self, width: i32, height: i32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}
