//! # Analysis Worker
//!
//! Handles one [`AnalysisTaskMessage`] at a time: moves the analysis through
//! `pending -> processing -> completed | failed`, persists every step, and
//! then asks the [`ReportAggregator`] whether the examination is ready for its
//! report.
//!
//! Deliveries are at-least-once, so every step tolerates repeats: an unknown
//! analysis id is acknowledged without effect, and a task for an analysis that
//! already settled only re-triggers the (idempotent) aggregation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::errors::WorkerError;
use super::metrics_provider::MetricsProvider;
use super::report_aggregator::{AggregationOutcome, ReportAggregator};
use crate::logging::log_analysis_operation;
use crate::messaging::{AnalysisTaskMessage, MessageHandler};
use crate::models::Analysis;
use crate::repositories::Repositories;
use crate::state_machine::{AnalysisEvent, AnalysisState, AnalysisStateMachine};

/// Result of processing one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// No analysis with the task's id exists
    Skipped,
    /// The analysis had already reached a terminal state
    AlreadySettled { status: AnalysisState },
    Completed,
    /// The metrics provider failed; the analysis records the reason
    Failed { reason: String },
}

pub struct AnalysisWorker {
    repositories: Repositories,
    metrics_provider: Arc<dyn MetricsProvider>,
    aggregator: Arc<ReportAggregator>,
}

impl std::fmt::Debug for AnalysisWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisWorker")
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl AnalysisWorker {
    pub fn new(
        repositories: Repositories,
        metrics_provider: Arc<dyn MetricsProvider>,
        aggregator: Arc<ReportAggregator>,
    ) -> Self {
        Self {
            repositories,
            metrics_provider,
            aggregator,
        }
    }

    /// Process a task end to end
    ///
    /// Repository failures are returned so the task is redelivered; a metrics
    /// failure is recorded on the analysis and is not an error.
    #[instrument(skip(self, task), fields(analysis_id = %task.analysis_id, examination_id = %task.examination_id))]
    pub async fn process_task(&self, task: &AnalysisTaskMessage) -> Result<TaskOutcome, WorkerError> {
        let analysis_id = task.analysis_id.to_string();

        let Some(mut analysis) = self.repositories.analyses.get_by_id(task.analysis_id).await?
        else {
            warn!(analysis_id = %task.analysis_id, "Analysis not found, treating task as stale");
            log_analysis_operation("process", Some(&analysis_id), None, "skipped", None);
            return Ok(TaskOutcome::Skipped);
        };

        if analysis.is_terminal() {
            info!(
                analysis_id = %analysis.id,
                status = %analysis.status,
                "Analysis already settled, duplicate delivery"
            );
            self.trigger_aggregation(analysis.examination_id).await;
            return Ok(TaskOutcome::AlreadySettled {
                status: analysis.status,
            });
        }

        AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::StartProcessing)?;
        self.repositories.analyses.update(&analysis).await?;
        log_analysis_operation(
            "start_processing",
            Some(&analysis_id),
            Some(&analysis.examination_id.to_string()),
            "processing",
            Some(&task.image_path),
        );

        let outcome = match self.metrics_provider.compute_metrics(&task.image_path).await {
            Ok(metrics) => {
                AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::Complete(metrics))?;
                TaskOutcome::Completed
            }
            Err(e) => {
                warn!(analysis_id = %analysis.id, error = %e, "Metrics computation failed");
                AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::Fail(e.to_string()))?;
                TaskOutcome::Failed {
                    reason: analysis.error_message.clone().unwrap_or_default(),
                }
            }
        };

        self.repositories.analyses.update(&analysis).await?;
        log_analysis_operation(
            "settle",
            Some(&analysis_id),
            Some(&analysis.examination_id.to_string()),
            &analysis.status.to_string(),
            analysis.error_message.as_deref(),
        );

        self.trigger_aggregation(analysis.examination_id).await;
        Ok(outcome)
    }

    /// Fail an analysis whose task could not be processed within the
    /// delivery limit
    pub async fn fail_exhausted(
        &self,
        task: &AnalysisTaskMessage,
        last_error: &str,
    ) -> Result<Option<Analysis>, WorkerError> {
        let Some(mut analysis) = self.repositories.analyses.get_by_id(task.analysis_id).await?
        else {
            return Ok(None);
        };

        if analysis.is_terminal() {
            return Ok(Some(analysis));
        }

        if analysis.status == AnalysisState::Pending {
            AnalysisStateMachine::transition(&mut analysis, AnalysisEvent::StartProcessing)?;
        }
        AnalysisStateMachine::transition(
            &mut analysis,
            AnalysisEvent::Fail(format!("delivery attempts exhausted: {last_error}")),
        )?;
        self.repositories.analyses.update(&analysis).await?;

        log_analysis_operation(
            "retries_exhausted",
            Some(&analysis.id.to_string()),
            Some(&analysis.examination_id.to_string()),
            "failed",
            Some(last_error),
        );

        self.trigger_aggregation(analysis.examination_id).await;
        Ok(Some(analysis))
    }

    /// Aggregation problems never fail the task that triggered them
    async fn trigger_aggregation(&self, examination_id: Uuid) {
        match self.aggregator.maybe_generate_report(examination_id).await {
            Ok(AggregationOutcome::Generated { report_id }) => {
                info!(
                    examination_id = %examination_id,
                    report_id = %report_id,
                    "Report generated"
                );
            }
            Ok(outcome) => {
                info!(examination_id = %examination_id, outcome = ?outcome, "Aggregation checked");
            }
            Err(e) => {
                error!(examination_id = %examination_id, error = %e, "Report aggregation failed");
            }
        }
    }
}

#[async_trait]
impl MessageHandler<AnalysisTaskMessage> for AnalysisWorker {
    type Error = WorkerError;

    async fn handle(&self, message: &AnalysisTaskMessage) -> Result<(), WorkerError> {
        self.process_task(message).await.map(|_| ())
    }

    async fn on_retries_exhausted(&self, message: &AnalysisTaskMessage, last_error: &str) {
        if let Err(e) = self.fail_exhausted(message, last_error).await {
            error!(
                analysis_id = %message.analysis_id,
                error = %e,
                "Could not mark exhausted analysis as failed"
            );
        }
    }
}
