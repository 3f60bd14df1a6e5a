//! # Analysis Task Message
//!
//! The durable unit of work handed from the examination dispatcher to the
//! analysis worker. Serialized as a JSON object whose four fields are strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Analysis, Image};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTaskMessage {
    pub analysis_id: Uuid,
    pub examination_id: Uuid,
    pub image_id: Uuid,
    /// Location of the image handed to the metrics provider
    pub image_path: String,
}

impl AnalysisTaskMessage {
    pub fn new(
        analysis_id: Uuid,
        examination_id: Uuid,
        image_id: Uuid,
        image_path: impl Into<String>,
    ) -> Self {
        Self {
            analysis_id,
            examination_id,
            image_id,
            image_path: image_path.into(),
        }
    }

    /// Task for a freshly created analysis of `image`
    pub fn for_analysis(analysis: &Analysis, image: &Image) -> Self {
        Self::new(
            analysis.id,
            analysis.examination_id,
            image.id,
            image.file_path.clone(),
        )
    }
}
