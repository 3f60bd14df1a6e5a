use serde::{Deserialize, Serialize};

use crate::models::CapillaryMetrics;

/// Events that drive analysis state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AnalysisEvent {
    /// A worker begins processing
    StartProcessing,
    /// Metrics were computed for the image
    Complete(CapillaryMetrics),
    /// Processing failed with the given reason
    Fail(String),
}

impl AnalysisEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StartProcessing => "start_processing",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Events that drive examination state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExaminationEvent {
    /// Analyses are being dispatched
    Start,
    /// The report has been written
    Complete,
    /// Processing was abandoned
    Fail,
}

impl ExaminationEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail => "fail",
        }
    }
}
