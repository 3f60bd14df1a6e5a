//! # Report Model
//!
//! Summary document generated once per examination from its analyses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    /// At most one report exists per examination
    pub examination_id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub diagnosis: String,
    pub recommendations: String,
    /// User recorded as the report author
    pub generated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Text sections of a report before it is attached to an examination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportContent {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub diagnosis: String,
    pub recommendations: String,
}

impl Report {
    pub fn new(examination_id: Uuid, generated_by: Uuid, content: ReportContent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            examination_id,
            title: content.title,
            content: content.content,
            summary: content.summary,
            diagnosis: content.diagnosis,
            recommendations: content.recommendations,
            generated_by,
            created_at: now,
            updated_at: now,
        }
    }
}
