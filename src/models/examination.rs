//! # Examination Model
//!
//! The clinical session that groups captured images and produces one report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::ExaminationState;

/// An examination and the ordered list of images attached to it
///
/// `status` becomes `in_progress` only when the dispatcher starts analysis and
/// `completed` only after the report aggregator has written a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Examination {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Operator who performed the capture
    pub doctor_id: Uuid,
    pub status: ExaminationState,
    pub description: String,
    /// Attached image ids in capture order
    pub image_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Examination {
    pub fn new(patient_id: Uuid, doctor_id: Uuid, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            status: ExaminationState::Pending,
            description: description.into(),
            image_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Record an attached image, keeping capture order and ignoring repeats
    pub fn attach_image(&mut self, image_id: Uuid) {
        if !self.image_ids.contains(&image_id) {
            self.image_ids.push(image_id);
            self.updated_at = Utc::now();
        }
    }
}
