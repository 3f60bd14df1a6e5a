//! # Examination Dispatcher
//!
//! Starts analysis of an examination: one pending [`Analysis`] and one
//! [`AnalysisTaskMessage`] per attached image. A failure for one image is
//! logged and counted without abandoning the rest of the batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::errors::DispatchError;
use crate::logging::log_analysis_operation;
use crate::messaging::{AnalysisTaskMessage, MessagingProvider};
use crate::models::{Analysis, Examination, Image};
use crate::repositories::Repositories;
use crate::state_machine::{ExaminationEvent, ExaminationStateMachine};

/// Result of [`ExaminationDispatcher::start_analysis`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub examination_id: Uuid,
    /// Ids of analyses whose task was published
    pub analysis_ids: Vec<Uuid>,
    pub dispatched: usize,
    pub failed: usize,
    /// Analyses that were recorded but whose task never reached the queue;
    /// they stay pending until dispatched again
    #[serde(default)]
    pub orphaned_analysis_ids: Vec<Uuid>,
}

/// Attributes of an image being attached to an examination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewImage {
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
}

pub struct ExaminationDispatcher {
    repositories: Repositories,
    messaging: Arc<MessagingProvider>,
    queue_name: String,
}

impl std::fmt::Debug for ExaminationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExaminationDispatcher")
            .field("provider", &self.messaging.provider_name())
            .field("queue_name", &self.queue_name)
            .finish()
    }
}

impl ExaminationDispatcher {
    pub fn new(
        repositories: Repositories,
        messaging: Arc<MessagingProvider>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            repositories,
            messaging,
            queue_name: queue_name.into(),
        }
    }

    pub async fn create_examination(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        description: &str,
    ) -> Result<Examination, DispatchError> {
        let examination = Examination::new(patient_id, doctor_id, description);
        self.repositories.examinations.create(&examination).await?;
        info!(examination_id = %examination.id, "Examination created");
        Ok(examination)
    }

    pub async fn attach_image(
        &self,
        examination_id: Uuid,
        new_image: NewImage,
    ) -> Result<Image, DispatchError> {
        let mut examination = self.find_examination(examination_id).await?;

        if new_image.filename.trim().is_empty() {
            return Err(DispatchError::validation("image filename must not be empty"));
        }

        let image = Image::new(
            examination_id,
            new_image.filename,
            new_image.file_path,
            new_image.file_size,
            new_image.mime_type,
        );
        self.repositories.images.create(&image).await?;

        examination.attach_image(image.id);
        self.repositories.examinations.update(&examination).await?;

        Ok(image)
    }

    /// Move the examination to `in_progress` and publish one task per image
    #[instrument(skip(self), fields(examination_id = %examination_id))]
    pub async fn start_analysis(
        &self,
        examination_id: Uuid,
    ) -> Result<DispatchSummary, DispatchError> {
        let mut examination = self.find_examination(examination_id).await?;

        let images = self
            .repositories
            .images
            .get_by_examination_id(examination_id)
            .await?;
        if images.is_empty() {
            return Err(DispatchError::validation(format!(
                "examination {examination_id} has no images to analyze"
            )));
        }

        ExaminationStateMachine::transition(&mut examination, ExaminationEvent::Start)?;
        self.messaging.ensure_queue(&self.queue_name).await?;
        self.repositories.examinations.update(&examination).await?;

        let mut summary = DispatchSummary {
            examination_id,
            ..DispatchSummary::default()
        };

        for image in &images {
            let analysis = Analysis::new(examination_id, image.id);
            if let Err(e) = self.repositories.analyses.create(&analysis).await {
                summary.failed += 1;
                warn!(
                    examination_id = %examination_id,
                    image_id = %image.id,
                    error = %e,
                    "Failed to record analysis, continuing with the rest"
                );
                continue;
            }

            match self.publish_task(&analysis, image).await {
                Ok(()) => {
                    summary.dispatched += 1;
                    summary.analysis_ids.push(analysis.id);
                }
                Err(e) => {
                    summary.failed += 1;
                    summary.orphaned_analysis_ids.push(analysis.id);
                    warn!(
                        examination_id = %examination_id,
                        analysis_id = %analysis.id,
                        image_id = %image.id,
                        error = %e,
                        "Analysis recorded without a queued task, it must be re-dispatched"
                    );
                }
            }
        }

        info!(
            examination_id = %examination_id,
            dispatched = summary.dispatched,
            failed = summary.failed,
            "Examination dispatched"
        );
        Ok(summary)
    }

    async fn publish_task(&self, analysis: &Analysis, image: &Image) -> Result<(), DispatchError> {
        let task = AnalysisTaskMessage::for_analysis(analysis, image);
        self.messaging.send_message(&self.queue_name, &task).await?;

        log_analysis_operation(
            "dispatch",
            Some(&analysis.id.to_string()),
            Some(&analysis.examination_id.to_string()),
            "pending",
            Some(&image.file_path),
        );
        Ok(())
    }

    async fn find_examination(&self, examination_id: Uuid) -> Result<Examination, DispatchError> {
        self.repositories
            .examinations
            .get_by_id(examination_id)
            .await?
            .ok_or(DispatchError::NotFound { examination_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::InMemoryMessagingService;
    use crate::state_machine::{AnalysisState, ExaminationState};

    const QUEUE: &str = "dispatch_test";

    fn dispatcher(repos: &Repositories) -> (ExaminationDispatcher, Arc<MessagingProvider>) {
        let provider = Arc::new(MessagingProvider::from(InMemoryMessagingService::new()));
        (
            ExaminationDispatcher::new(repos.clone(), provider.clone(), QUEUE),
            provider,
        )
    }

    fn image(name: &str) -> NewImage {
        NewImage {
            filename: name.to_string(),
            file_path: format!("/data/{name}"),
            file_size: 2048,
            mime_type: "image/jpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_start_analysis_publishes_one_task_per_image() {
        let repos = Repositories::in_memory();
        let (dispatcher, provider) = dispatcher(&repos);
        let exam = dispatcher
            .create_examination(Uuid::new_v4(), Uuid::new_v4(), "Left ring finger")
            .await
            .unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            dispatcher.attach_image(exam.id, image(name)).await.unwrap();
        }

        let summary = dispatcher.start_analysis(exam.id).await.unwrap();
        assert_eq!(summary.dispatched, 3);
        assert_eq!(summary.failed, 0);

        let analyses = repos.analyses.get_by_examination_id(exam.id).await.unwrap();
        assert_eq!(analyses.len(), 3);
        assert!(analyses.iter().all(|a| a.status == AnalysisState::Pending));
        assert_eq!(provider.as_in_memory().unwrap().queue_length(QUEUE), 3);

        let stored = repos.examinations.get_by_id(exam.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExaminationState::InProgress);
        assert_eq!(stored.image_ids.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_examination_is_not_found() {
        let repos = Repositories::in_memory();
        let (dispatcher, _provider) = dispatcher(&repos);

        let result = dispatcher.start_analysis(Uuid::new_v4()).await;
        assert!(matches!(result, Err(DispatchError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_examination_without_images_is_rejected_untouched() {
        let repos = Repositories::in_memory();
        let (dispatcher, _provider) = dispatcher(&repos);
        let exam = dispatcher
            .create_examination(Uuid::new_v4(), Uuid::new_v4(), "Empty")
            .await
            .unwrap();

        let result = dispatcher.start_analysis(exam.id).await;
        assert!(matches!(result, Err(DispatchError::Validation { .. })));

        let stored = repos.examinations.get_by_id(exam.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExaminationState::Pending);
    }

    #[tokio::test]
    async fn test_publish_failures_are_counted_not_fatal() {
        let repos = Repositories::in_memory();
        let (dispatcher, provider) = dispatcher(&repos);
        let exam = dispatcher
            .create_examination(Uuid::new_v4(), Uuid::new_v4(), "Outage")
            .await
            .unwrap();
        dispatcher.attach_image(exam.id, image("a.jpg")).await.unwrap();
        dispatcher.attach_image(exam.id, image("b.jpg")).await.unwrap();

        provider.ensure_queue(QUEUE).await.unwrap();
        provider.as_in_memory().unwrap().set_available(false);

        let summary = dispatcher.start_analysis(exam.id).await.unwrap();
        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.failed, 2);
        assert!(summary.analysis_ids.is_empty());

        let mut recorded: Vec<Uuid> = repos
            .analyses
            .get_by_examination_id(exam.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        let mut orphaned = summary.orphaned_analysis_ids.clone();
        recorded.sort();
        orphaned.sort();
        assert_eq!(orphaned, recorded);
    }

    #[tokio::test]
    async fn test_restarting_in_progress_examination_is_rejected() {
        let repos = Repositories::in_memory();
        let (dispatcher, _provider) = dispatcher(&repos);
        let exam = dispatcher
            .create_examination(Uuid::new_v4(), Uuid::new_v4(), "Twice")
            .await
            .unwrap();
        dispatcher.attach_image(exam.id, image("a.jpg")).await.unwrap();

        dispatcher.start_analysis(exam.id).await.unwrap();
        let result = dispatcher.start_analysis(exam.id).await;
        assert!(matches!(result, Err(DispatchError::StateMachine(_))));
    }
}
