//! proptest strategies for pipeline state and metrics

use proptest::prelude::*;

use capillary_core::models::CapillaryMetrics;
use capillary_core::state_machine::{
    AnalysisEvent, AnalysisState, ExaminationEvent, ExaminationState,
};

pub fn analysis_state_strategy() -> impl Strategy<Value = AnalysisState> {
    prop_oneof![
        Just(AnalysisState::Pending),
        Just(AnalysisState::Processing),
        Just(AnalysisState::Completed),
        Just(AnalysisState::Failed),
    ]
}

pub fn examination_state_strategy() -> impl Strategy<Value = ExaminationState> {
    prop_oneof![
        Just(ExaminationState::Pending),
        Just(ExaminationState::InProgress),
        Just(ExaminationState::Completed),
        Just(ExaminationState::Failed),
    ]
}

/// Measurements spanning and exceeding the simulated ranges
pub fn metrics_strategy() -> impl Strategy<Value = CapillaryMetrics> {
    (
        0.0f64..20.0,
        5.0f64..25.0,
        1.0f64..4.0,
        0.0f64..1.0,
        0.0f64..1.0,
    )
        .prop_map(|(density, diameter, tortuosity, regularity, visibility)| {
            CapillaryMetrics::new(density, diameter, tortuosity, regularity, visibility)
        })
}

pub fn analysis_event_strategy() -> impl Strategy<Value = AnalysisEvent> {
    prop_oneof![
        Just(AnalysisEvent::StartProcessing),
        metrics_strategy().prop_map(AnalysisEvent::Complete),
        "[a-z ]{0,24}".prop_map(AnalysisEvent::Fail),
    ]
}

pub fn examination_event_strategy() -> impl Strategy<Value = ExaminationEvent> {
    prop_oneof![
        Just(ExaminationEvent::Start),
        Just(ExaminationEvent::Complete),
        Just(ExaminationEvent::Fail),
    ]
}
