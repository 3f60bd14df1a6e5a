//! # Examination State Machine
//!
//! Transition table for [`Examination`]. The dispatcher owns `start`; the
//! report aggregator owns `complete` and `fail`.

use chrono::Utc;
use tracing::debug;

use super::errors::{StateMachineError, StateMachineResult};
use super::events::ExaminationEvent;
use super::states::ExaminationState;
use crate::models::Examination;

pub struct ExaminationStateMachine;

impl ExaminationStateMachine {
    pub fn determine_target_state(
        current_state: ExaminationState,
        event: ExaminationEvent,
    ) -> StateMachineResult<ExaminationState> {
        let target = match (current_state, event) {
            (ExaminationState::Pending, ExaminationEvent::Start) => ExaminationState::InProgress,
            // Re-analysis after every analysis failed
            (ExaminationState::Failed, ExaminationEvent::Start) => ExaminationState::InProgress,

            (ExaminationState::InProgress, ExaminationEvent::Complete) => {
                ExaminationState::Completed
            }
            (ExaminationState::InProgress, ExaminationEvent::Fail) => ExaminationState::Failed,

            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    "examination",
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    pub fn transition(
        examination: &mut Examination,
        event: ExaminationEvent,
    ) -> StateMachineResult<ExaminationState> {
        let from_state = examination.status;
        let target = Self::determine_target_state(from_state, event)?;
        let now = Utc::now();

        examination.completed_at = match target {
            ExaminationState::Completed => Some(now),
            _ => None,
        };
        examination.status = target;
        examination.updated_at = now;

        debug!(
            examination_id = %examination.id,
            from = %from_state,
            to = %target,
            "Examination state transition"
        );

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn examination() -> Examination {
        Examination::new(Uuid::new_v4(), Uuid::new_v4(), "Nailfold capillaroscopy")
    }

    #[test]
    fn test_full_lifecycle() {
        let mut exam = examination();

        ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Start).unwrap();
        assert_eq!(exam.status, ExaminationState::InProgress);
        assert!(exam.completed_at.is_none());

        ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Complete).unwrap();
        assert_eq!(exam.status, ExaminationState::Completed);
        assert!(exam.completed_at.is_some());
    }

    #[test]
    fn test_restart_after_failure() {
        let mut exam = examination();
        ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Start).unwrap();
        ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Fail).unwrap();

        let state = ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Start).unwrap();
        assert_eq!(state, ExaminationState::InProgress);
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut exam = examination();
        ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Start).unwrap();

        let err = ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Start)
            .unwrap_err();
        assert_eq!(
            err,
            StateMachineError::invalid_transition("examination", "in_progress", "start")
        );
    }

    #[test]
    fn test_completed_is_final() {
        let mut exam = examination();
        ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Start).unwrap();
        ExaminationStateMachine::transition(&mut exam, ExaminationEvent::Complete).unwrap();

        for event in [
            ExaminationEvent::Start,
            ExaminationEvent::Complete,
            ExaminationEvent::Fail,
        ] {
            assert!(ExaminationStateMachine::transition(&mut exam, event).is_err());
        }
        assert_eq!(exam.status, ExaminationState::Completed);
    }
}
