#![allow(dead_code)]

pub mod builders;
pub mod strategies;

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

use capillary_core::config::ReportConfig;
use capillary_core::messaging::{
    AnalysisTaskMessage, InMemoryMessagingService, MessagingProvider, QueueConsumer,
};
use capillary_core::models::CapillaryMetrics;
use capillary_core::orchestration::{
    AnalysisWorker, ExaminationDispatcher, MetricsError, MetricsProvider, ReportAggregator,
};
use capillary_core::repositories::Repositories;

pub use builders::*;
pub use strategies::*;

pub const TEST_QUEUE: &str = "analysis_tasks_test";

/// Metrics provider returning the same measurements for every image
#[derive(Debug, Clone)]
pub struct FixedMetricsProvider {
    pub metrics: CapillaryMetrics,
}

impl FixedMetricsProvider {
    pub fn healthy() -> Self {
        Self {
            metrics: CapillaryMetrics::new(9.0, 12.0, 1.4, 0.9, 0.95),
        }
    }
}

#[async_trait]
impl MetricsProvider for FixedMetricsProvider {
    async fn compute_metrics(&self, _image_path: &str) -> Result<CapillaryMetrics, MetricsError> {
        Ok(self.metrics.clone())
    }
}

/// Metrics provider that fails for paths containing `marker`
#[derive(Debug, Clone)]
pub struct SelectiveFailureProvider {
    pub marker: String,
    pub metrics: CapillaryMetrics,
}

#[async_trait]
impl MetricsProvider for SelectiveFailureProvider {
    async fn compute_metrics(&self, image_path: &str) -> Result<CapillaryMetrics, MetricsError> {
        if image_path.contains(&self.marker) {
            return Err(MetricsError::ImageUnreadable {
                path: image_path.to_string(),
                reason: "sensor dropout".to_string(),
            });
        }
        Ok(self.metrics.clone())
    }
}

/// Dispatcher, worker and consumer wired over in-memory backends
pub struct Pipeline {
    pub repositories: Repositories,
    pub messaging: Arc<MessagingProvider>,
    pub dispatcher: ExaminationDispatcher,
    pub aggregator: Arc<ReportAggregator>,
    pub worker: AnalysisWorker,
    pub consumer: QueueConsumer<AnalysisTaskMessage>,
}

impl Pipeline {
    pub fn new(metrics_provider: Arc<dyn MetricsProvider>) -> Self {
        Self::with_report_config(metrics_provider, ReportConfig::default(), 3)
    }

    pub fn with_report_config(
        metrics_provider: Arc<dyn MetricsProvider>,
        report_config: ReportConfig,
        max_delivery_attempts: u32,
    ) -> Self {
        let repositories = Repositories::in_memory();
        let messaging = Arc::new(MessagingProvider::InMemory(
            InMemoryMessagingService::with_queues(&[TEST_QUEUE]),
        ));
        let dispatcher =
            ExaminationDispatcher::new(repositories.clone(), messaging.clone(), TEST_QUEUE);
        let aggregator = Arc::new(ReportAggregator::new(repositories.clone(), report_config));
        let worker = AnalysisWorker::new(repositories.clone(), metrics_provider, aggregator.clone());
        let consumer = QueueConsumer::new(
            messaging.clone(),
            TEST_QUEUE,
            std::time::Duration::from_millis(5),
            max_delivery_attempts,
        );

        Self {
            repositories,
            messaging,
            dispatcher,
            aggregator,
            worker,
            consumer,
        }
    }

    pub fn in_memory(&self) -> &InMemoryMessagingService {
        self.messaging
            .as_in_memory()
            .expect("pipeline runs on the in-memory provider")
    }

    /// Consume until the queue is empty; returns how many deliveries were handled
    pub async fn drain(&self) -> usize {
        let mut handled = 0;
        while self
            .consumer
            .consume_one(&self.worker)
            .await
            .expect("consume_one succeeds on the in-memory provider")
        {
            handled += 1;
        }
        handled
    }
}

/// Small JPEG encoded as base64, as a device would send it
pub fn jpeg_base64() -> String {
    let img = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, 128]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(85))
        .expect("encode test jpeg");
    STANDARD.encode(cursor.into_inner())
}
