//! # Report Aggregator
//!
//! Turns the settled analyses of an examination into exactly one report.
//!
//! Aggregation can be triggered more than once for the same examination: by
//! every analysis that settles, by duplicate task deliveries, and from several
//! workers at the same time. Two guards keep the outcome to a single report:
//!
//! - an in-process lock per examination serializes concurrent triggers;
//! - [`ReportRepository::create_if_absent`](crate::repositories::ReportRepository::create_if_absent)
//!   refuses a second report at the storage level, which also covers triggers
//!   coming from other processes.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::errors::AggregationError;
use crate::config::{AggregationPolicy, ReportConfig};
use crate::logging::log_report_operation;
use crate::models::{Analysis, CapillaryMetrics, Examination, Report, ReportContent};
use crate::repositories::Repositories;
use crate::state_machine::{ExaminationEvent, ExaminationState, ExaminationStateMachine};

/// What a call to [`ReportAggregator::maybe_generate_report`] did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AggregationOutcome {
    /// The examination has no analyses yet
    NoAnalyses,
    /// Some analyses are still outstanding
    Pending { settled: usize, total: usize },
    /// A report was written earlier
    AlreadyExists,
    Generated { report_id: Uuid },
    /// Every analysis failed; the examination was marked failed
    AllFailed,
}

/// Mean measurements across the completed analyses of an examination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSummary {
    pub analyzed: usize,
    pub mean_density: f64,
    pub mean_diameter: f64,
    pub mean_tortuosity: f64,
}

impl MetricsSummary {
    /// Returns `None` for an empty slice
    pub fn from_metrics(metrics: &[&CapillaryMetrics]) -> Option<Self> {
        if metrics.is_empty() {
            return None;
        }

        let count = metrics.len() as f64;
        let mean = |field: fn(&CapillaryMetrics) -> f64| {
            metrics.iter().map(|m| field(m)).sum::<f64>() / count
        };

        Some(Self {
            analyzed: metrics.len(),
            mean_density: mean(|m| m.density),
            mean_diameter: mean(|m| m.diameter),
            mean_tortuosity: mean(|m| m.tortuosity),
        })
    }
}

/// Diagnosis band selected by mean capillary density
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityBand {
    Reduced,
    WithinNormalRange,
    Normal,
}

impl DensityBand {
    pub fn classify(mean_density: f64, config: &ReportConfig) -> Self {
        if mean_density < config.density_low_threshold {
            Self::Reduced
        } else if mean_density > config.density_high_threshold {
            Self::Normal
        } else {
            Self::WithinNormalRange
        }
    }

    fn diagnosis(self) -> &'static str {
        match self {
            Self::Reduced => "Reduced capillary density observed",
            Self::WithinNormalRange => "Capillary density within normal range",
            Self::Normal => "Capillary density is normal",
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            Self::Reduced => {
                "Further examination is recommended to identify the cause of reduced capillary density"
            }
            Self::WithinNormalRange => "A follow-up examination in 6 months is recommended",
            Self::Normal => "Continue routine monitoring",
        }
    }
}

/// Diagnosis and recommendation text for a summary
pub fn diagnose(summary: &MetricsSummary, config: &ReportConfig) -> (String, String) {
    let band = DensityBand::classify(summary.mean_density, config);
    let mut diagnosis = band.diagnosis().to_string();
    let mut recommendations = band.recommendation().to_string();

    if summary.mean_tortuosity > config.tortuosity_high_threshold {
        diagnosis.push_str(". Increased capillary tortuosity");
        recommendations.push_str(". Specialist consultation is required");
    }

    (diagnosis, recommendations)
}

/// Build the report text for an examination
pub fn compose_report(
    examination: &Examination,
    summary: &MetricsSummary,
    failed: usize,
    config: &ReportConfig,
) -> ReportContent {
    let details = format!(
        "Mean capillary measurements:\n\
         - Density: {:.2} capillaries/mm²\n\
         - Diameter: {:.2} µm\n\
         - Tortuosity: {:.2}",
        summary.mean_density, summary.mean_diameter, summary.mean_tortuosity
    );

    let mut analyzed = format!("Images analyzed: {}", summary.analyzed);
    if failed > 0 {
        analyzed.push_str(&format!(" ({failed} failed and excluded)"));
    }

    let (diagnosis, recommendations) = diagnose(summary, config);

    ReportContent {
        title: format!("Examination report: {}", examination.description),
        content: format!("{analyzed}\n\nDetails:\n{details}"),
        summary: details,
        diagnosis,
        recommendations,
    }
}

pub struct ReportAggregator {
    repositories: Repositories,
    config: ReportConfig,
    examination_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for ReportAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportAggregator")
            .field("config", &self.config)
            .field("locked_examinations", &self.examination_locks.len())
            .finish()
    }
}

impl ReportAggregator {
    pub fn new(repositories: Repositories, config: ReportConfig) -> Self {
        Self {
            repositories,
            config,
            examination_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Generate the examination's report if its analyses are settled and no
    /// report exists yet
    #[instrument(skip(self), fields(examination_id = %examination_id))]
    pub async fn maybe_generate_report(
        &self,
        examination_id: Uuid,
    ) -> Result<AggregationOutcome, AggregationError> {
        let lock = self
            .examination_locks
            .entry(examination_id)
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.aggregate_locked(examination_id).await
        };

        drop(lock);
        // Only the map holds the lock once nobody else is waiting on it
        self.examination_locks
            .remove_if(&examination_id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn aggregate_locked(
        &self,
        examination_id: Uuid,
    ) -> Result<AggregationOutcome, AggregationError> {
        let analyses = self
            .repositories
            .analyses
            .get_by_examination_id(examination_id)
            .await?;

        if analyses.is_empty() {
            return Ok(AggregationOutcome::NoAnalyses);
        }

        let total = analyses.len();
        let settled = self.settled_count(&analyses);
        if settled < total {
            info!(
                examination_id = %examination_id,
                settled = settled,
                total = total,
                "Analyses still outstanding, report deferred"
            );
            return Ok(AggregationOutcome::Pending { settled, total });
        }

        if self
            .repositories
            .reports
            .get_by_examination_id(examination_id)
            .await?
            .is_some()
        {
            info!(examination_id = %examination_id, "Report already exists");
            self.complete_reported_examination(examination_id).await?;
            return Ok(AggregationOutcome::AlreadyExists);
        }

        let mut examination = self
            .repositories
            .examinations
            .get_by_id(examination_id)
            .await?
            .ok_or(AggregationError::ExaminationNotFound { examination_id })?;

        let completed: Vec<&CapillaryMetrics> = analyses
            .iter()
            .filter(|a| a.is_completed())
            .filter_map(|a| a.metrics.as_ref())
            .collect();

        let Some(summary) = MetricsSummary::from_metrics(&completed) else {
            warn!(
                examination_id = %examination_id,
                total = total,
                "Every analysis failed, marking examination failed"
            );
            self.settle_examination(&mut examination, ExaminationEvent::Fail)
                .await;
            log_report_operation(
                "aggregate",
                &examination_id.to_string(),
                None,
                "all_failed",
                None,
            );
            return Ok(AggregationOutcome::AllFailed);
        };

        let failed = total - summary.analyzed;
        let content = compose_report(&examination, &summary, failed, &self.config);
        let author = self.resolve_author().await?;
        let report = Report::new(examination_id, author, content);

        if !self.repositories.reports.create_if_absent(&report).await? {
            info!(
                examination_id = %examination_id,
                "Report written concurrently elsewhere"
            );
            self.complete_reported_examination(examination_id).await?;
            return Ok(AggregationOutcome::AlreadyExists);
        }

        self.settle_examination(&mut examination, ExaminationEvent::Complete)
            .await;

        log_report_operation(
            "generate",
            &examination_id.to_string(),
            Some(&report.id.to_string()),
            "generated",
            Some(&report.diagnosis),
        );

        Ok(AggregationOutcome::Generated {
            report_id: report.id,
        })
    }

    fn settled_count(&self, analyses: &[Analysis]) -> usize {
        analyses
            .iter()
            .filter(|a| match self.config.aggregation_policy {
                AggregationPolicy::RequireAllCompleted => a.is_completed(),
                AggregationPolicy::AllowPartial => a.is_terminal(),
            })
            .count()
    }

    /// The configured system user, else any existing user
    async fn resolve_author(&self) -> Result<Uuid, AggregationError> {
        let users = &self.repositories.users;

        if let Some(user) = users.get_by_username(&self.config.system_username).await? {
            return Ok(user.id);
        }

        match users.list(1, 0).await?.into_iter().next() {
            Some(user) => {
                warn!(
                    system_username = %self.config.system_username,
                    fallback_user = %user.username,
                    "System user missing, signing report with first available user"
                );
                Ok(user.id)
            }
            None => Err(AggregationError::NoReportAuthor),
        }
    }

    /// Complete an examination whose report exists but whose status update
    /// was lost, so a redelivered task still converges
    async fn complete_reported_examination(
        &self,
        examination_id: Uuid,
    ) -> Result<(), AggregationError> {
        let mut examination = self
            .repositories
            .examinations
            .get_by_id(examination_id)
            .await?
            .ok_or(AggregationError::ExaminationNotFound { examination_id })?;

        if examination.status == ExaminationState::InProgress {
            info!(
                examination_id = %examination_id,
                "Report present but examination still in progress, completing it"
            );
            self.settle_examination(&mut examination, ExaminationEvent::Complete)
                .await;
        }
        Ok(())
    }

    /// Move the examination to its final state; failures are logged only
    async fn settle_examination(&self, examination: &mut Examination, event: ExaminationEvent) {
        if examination.status != ExaminationState::InProgress {
            warn!(
                examination_id = %examination.id,
                status = %examination.status,
                event = event.event_type(),
                "Examination not in progress, status left unchanged"
            );
            return;
        }

        if let Err(e) = ExaminationStateMachine::transition(examination, event) {
            warn!(examination_id = %examination.id, error = %e, "Examination transition rejected");
            return;
        }

        if let Err(e) = self.repositories.examinations.update(examination).await {
            warn!(
                examination_id = %examination.id,
                error = %e,
                "Failed to persist examination status"
            );
        }
    }
}
