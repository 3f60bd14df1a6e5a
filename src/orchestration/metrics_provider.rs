//! # Metrics Provider
//!
//! The image-analysis black box. The pipeline only depends on the
//! [`MetricsProvider`] contract; [`SimulatedMetricsProvider`] stands in for a
//! real algorithm by sampling plausible values after a fixed delay.
//!
//! ```rust
//! use std::time::Duration;
//! use capillary_core::orchestration::{MetricsProvider, SimulatedMetricsProvider};
//!
//! # tokio_test::block_on(async {
//! let provider = SimulatedMetricsProvider::new(Duration::ZERO);
//! let metrics = provider.compute_metrics("/data/frame_01.jpg").await.unwrap();
//! assert!((7.0..=10.0).contains(&metrics.density));
//! assert!(metrics.abnormalities.is_empty());
//! # });
//! ```

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use super::errors::MetricsError;
use crate::config::WorkerConfig;
use crate::models::CapillaryMetrics;

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Compute metrics for the image stored at `image_path`
    async fn compute_metrics(&self, image_path: &str) -> Result<CapillaryMetrics, MetricsError>;
}

/// Sampling ranges for simulated measurements
mod ranges {
    pub const DENSITY: (f64, f64) = (7.0, 10.0);
    pub const DIAMETER: (f64, f64) = (10.0, 15.0);
    pub const TORTUOSITY: (f64, f64) = (1.0, 2.5);
    pub const REGULARITY: (f64, f64) = (0.7, 1.0);
    pub const VISIBILITY: (f64, f64) = (0.8, 1.0);
}

#[derive(Debug, Clone)]
pub struct SimulatedMetricsProvider {
    delay: Duration,
}

impl SimulatedMetricsProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.simulated_delay())
    }

    fn sample() -> CapillaryMetrics {
        let mut rng = rand::thread_rng();
        let mut pick = |(low, high): (f64, f64)| rng.gen_range(low..high);

        CapillaryMetrics::new(
            pick(ranges::DENSITY),
            pick(ranges::DIAMETER),
            pick(ranges::TORTUOSITY),
            pick(ranges::REGULARITY),
            pick(ranges::VISIBILITY),
        )
    }
}

#[async_trait]
impl MetricsProvider for SimulatedMetricsProvider {
    async fn compute_metrics(&self, image_path: &str) -> Result<CapillaryMetrics, MetricsError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let metrics = Self::sample();
        debug!(
            image_path = %image_path,
            density = metrics.density,
            tortuosity = metrics.tortuosity,
            "Simulated metrics computed"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_metrics_stay_in_range() {
        let provider = SimulatedMetricsProvider::new(Duration::ZERO);

        for _ in 0..50 {
            let metrics = provider.compute_metrics("/tmp/scan.jpg").await.unwrap();
            assert!((7.0..10.0).contains(&metrics.density));
            assert!((10.0..15.0).contains(&metrics.diameter));
            assert!((1.0..2.5).contains(&metrics.tortuosity));
            assert!((0.7..1.0).contains(&metrics.regularity));
            assert!((0.8..1.0).contains(&metrics.visibility));
            assert!(metrics.abnormalities.is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_delay_is_applied() {
        let provider = SimulatedMetricsProvider::new(Duration::from_secs(2));
        let started = tokio::time::Instant::now();

        provider.compute_metrics("/tmp/scan.jpg").await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
