//! # Orchestration
//!
//! The analysis pipeline proper:
//!
//! - [`ExaminationDispatcher`] creates analyses and publishes their tasks
//! - [`AnalysisWorker`] consumes tasks and records metrics
//! - [`ReportAggregator`] writes the single report once analyses settle
//! - [`MetricsProvider`] is the image-analysis boundary

pub mod analysis_worker;
pub mod errors;
pub mod examination_dispatcher;
pub mod metrics_provider;
pub mod report_aggregator;

pub use analysis_worker::{AnalysisWorker, TaskOutcome};
pub use errors::{AggregationError, DispatchError, MetricsError, WorkerError};
pub use examination_dispatcher::{DispatchSummary, ExaminationDispatcher, NewImage};
pub use metrics_provider::{MetricsProvider, SimulatedMetricsProvider};
pub use report_aggregator::{
    compose_report, diagnose, AggregationOutcome, DensityBand, MetricsSummary, ReportAggregator,
};
