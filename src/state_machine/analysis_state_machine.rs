//! # Analysis State Machine
//!
//! Pure transition table for [`Analysis`] plus the side effects each
//! transition carries. Side effects are applied only once the transition is
//! known to be valid, so a rejected event leaves the analysis untouched.

use chrono::Utc;
use tracing::debug;

use super::errors::{StateMachineError, StateMachineResult};
use super::events::AnalysisEvent;
use super::states::AnalysisState;
use crate::models::Analysis;

/// Reason recorded when a failure arrives without one
pub const UNKNOWN_FAILURE_REASON: &str = "unknown error";

pub struct AnalysisStateMachine;

impl AnalysisStateMachine {
    /// Resolve the state an event leads to, without touching any analysis
    pub fn determine_target_state(
        current_state: AnalysisState,
        event: &AnalysisEvent,
    ) -> StateMachineResult<AnalysisState> {
        let target = match (current_state, event) {
            (AnalysisState::Pending, AnalysisEvent::StartProcessing) => AnalysisState::Processing,
            // Re-delivery of a task whose first attempt crashed mid-way
            (AnalysisState::Processing, AnalysisEvent::StartProcessing) => {
                AnalysisState::Processing
            }

            (AnalysisState::Processing, AnalysisEvent::Complete(_)) => AnalysisState::Completed,
            (AnalysisState::Processing, AnalysisEvent::Fail(_)) => AnalysisState::Failed,

            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    "analysis",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    /// Apply an event to an analysis, updating status, metrics, error text and
    /// timestamps together
    pub fn transition(
        analysis: &mut Analysis,
        event: AnalysisEvent,
    ) -> StateMachineResult<AnalysisState> {
        let from_state = analysis.status;
        let target = Self::determine_target_state(from_state, &event)?;
        let now = Utc::now();

        match event {
            AnalysisEvent::StartProcessing => {}
            AnalysisEvent::Complete(metrics) => {
                analysis.metrics = Some(metrics);
                analysis.error_message = None;
                analysis.completed_at = Some(now);
            }
            AnalysisEvent::Fail(reason) => {
                let reason = if reason.trim().is_empty() {
                    UNKNOWN_FAILURE_REASON.to_string()
                } else {
                    reason
                };
                analysis.metrics = None;
                analysis.error_message = Some(reason);
                analysis.completed_at = None;
            }
        }

        analysis.status = target;
        analysis.updated_at = now;

        debug!(
            analysis_id = %analysis.id,
            from = %from_state,
            to = %target,
            "Analysis state transition"
        );

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CapillaryMetrics;
    use uuid::Uuid;

    fn pending_analysis() -> Analysis {
        Analysis::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn sample_metrics() -> CapillaryMetrics {
        CapillaryMetrics::new(8.5, 12.0, 1.5, 0.85, 0.9)
    }

    #[test]
    fn test_start_processing_is_idempotent() {
        let mut analysis = pending_analysis();

        let state = AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::StartProcessing)
            .unwrap();
        assert_eq!(state, AnalysisState::Processing);

        let state = AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::StartProcessing)
            .unwrap();
        assert_eq!(state, AnalysisState::Processing);
        assert!(analysis.completed_at.is_none());
    }

    #[test]
    fn test_complete_sets_metrics_and_completion_time() {
        let mut analysis = pending_analysis();
        AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::StartProcessing).unwrap();

        AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::Complete(sample_metrics()))
            .unwrap();

        assert_eq!(analysis.status, AnalysisState::Completed);
        assert_eq!(analysis.metrics, Some(sample_metrics()));
        assert!(analysis.completed_at.is_some());
        assert!(analysis.error_message.is_none());
    }

    #[test]
    fn test_fail_records_reason_without_metrics() {
        let mut analysis = pending_analysis();
        AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::StartProcessing).unwrap();

        AnalysisStateMachine::transition(
            &mut analysis,
            AnalysisEvent::Fail("corrupt image".to_string()),
        )
        .unwrap();

        assert_eq!(analysis.status, AnalysisState::Failed);
        assert_eq!(analysis.error_message.as_deref(), Some("corrupt image"));
        assert!(analysis.metrics.is_none());
        assert!(analysis.completed_at.is_none());
    }

    #[test]
    fn test_fail_with_blank_reason_uses_placeholder() {
        let mut analysis = pending_analysis();
        AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::StartProcessing).unwrap();
        AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::Fail("  ".to_string()))
            .unwrap();

        assert_eq!(
            analysis.error_message.as_deref(),
            Some(UNKNOWN_FAILURE_REASON)
        );
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut analysis = pending_analysis();
        let before = analysis.clone();

        let result =
            AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::Complete(sample_metrics()));

        assert!(matches!(
            result,
            Err(StateMachineError::InvalidTransition { .. })
        ));
        assert_eq!(analysis, before);
    }

    #[test]
    fn test_terminal_states_reject_every_event() {
        let events = [
            AnalysisEvent::StartProcessing,
            AnalysisEvent::Complete(sample_metrics()),
            AnalysisEvent::Fail("late".to_string()),
        ];

        for terminal in [AnalysisState::Completed, AnalysisState::Failed] {
            for event in &events {
                assert!(
                    AnalysisStateMachine::determine_target_state(terminal, event).is_err(),
                    "{terminal} accepted {}",
                    event.event_type()
                );
            }
        }
    }
}
