// State machines for the analysis pipeline
//
// Transition tables are pure functions over (state, event); the `transition`
// helpers apply the accompanying field updates to the entity in one step.

pub mod analysis_state_machine;
pub mod errors;
pub mod events;
pub mod examination_state_machine;
pub mod states;

pub use analysis_state_machine::AnalysisStateMachine;
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{AnalysisEvent, ExaminationEvent};
pub use examination_state_machine::ExaminationStateMachine;
pub use states::{AnalysisState, ExaminationState};
