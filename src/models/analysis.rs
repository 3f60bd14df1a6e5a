//! # Analysis Model
//!
//! Per-image unit of processing work and its outcome.
//!
//! An `Analysis` is created by the examination dispatcher in `pending`, driven
//! through its lifecycle exclusively by the analysis worker, and never deleted
//! by the pipeline. Status changes go through
//! [`AnalysisStateMachine`](crate::state_machine::AnalysisStateMachine) so that
//! `metrics` and `completed_at` are only ever present on a completed analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CapillaryMetrics;
use crate::state_machine::AnalysisState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub examination_id: Uuid,
    pub image_id: Uuid,
    pub status: AnalysisState,
    /// Present only while `status` is `completed`
    pub metrics: Option<CapillaryMetrics>,
    /// Present only while `status` is `failed`
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set if and only if `status` is `completed`
    pub completed_at: Option<DateTime<Utc>>,
}

impl Analysis {
    /// Create a new pending analysis for an image of an examination
    pub fn new(examination_id: Uuid, image_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            examination_id,
            image_id,
            status: AnalysisState::Pending,
            metrics: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status == AnalysisState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == AnalysisState::Failed
    }
}
