use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single image analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    /// Created by the dispatcher, waiting for a worker
    Pending,
    /// A worker has picked the analysis up
    Processing,
    /// Metrics were recorded
    Completed,
    /// The metrics provider failed or retries were exhausted
    Failed,
}

impl AnalysisState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if this state counts as settled for report aggregation
    /// when failed analyses are allowed to contribute
    pub fn is_settled(&self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for AnalysisState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid analysis state: {s}")),
        }
    }
}

/// Lifecycle of an examination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExaminationState {
    /// Images are being attached, nothing dispatched yet
    Pending,
    /// Analyses have been dispatched
    InProgress,
    /// A report has been written
    Completed,
    /// Every analysis failed, or processing was abandoned
    Failed,
}

impl ExaminationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for ExaminationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ExaminationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid examination state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_state_round_trips_through_strings() {
        for state in [
            AnalysisState::Pending,
            AnalysisState::Processing,
            AnalysisState::Completed,
            AnalysisState::Failed,
        ] {
            let parsed: AnalysisState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert!("done".parse::<AnalysisState>().is_err());
    }

    #[test]
    fn test_examination_state_serializes_snake_case() {
        let json = serde_json::to_string(&ExaminationState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(AnalysisState::Completed.is_terminal());
        assert!(AnalysisState::Failed.is_terminal());
        assert!(!AnalysisState::Processing.is_terminal());
        assert!(ExaminationState::Completed.is_terminal());
        assert!(!ExaminationState::Failed.is_terminal());
    }
}
