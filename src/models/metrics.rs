//! # Capillary Metrics
//!
//! Fixed-schema record produced by a metrics provider for one analyzed image.
//! The record carries a `schema_version` so stored bundles can be told apart
//! if the metric set grows.

use serde::{Deserialize, Serialize};

/// Current version of the [`CapillaryMetrics`] layout
pub const METRICS_SCHEMA_VERSION: u32 = 1;

/// Reference range used by [`CapillaryMetrics::is_normal`]
pub mod reference {
    /// Capillaries per millimetre
    pub const DENSITY_RANGE: (f64, f64) = (7.0, 10.0);
    /// Micrometres
    pub const DIAMETER_RANGE: (f64, f64) = (10.0, 15.0);
    pub const TORTUOSITY_MAX: f64 = 2.0;
}

/// Measurements of the capillary bed in a single image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapillaryMetrics {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Capillaries per millimetre
    pub density: f64,
    /// Mean capillary diameter in micrometres
    pub diameter: f64,
    /// Tortuosity index, 1.0 is a straight loop
    pub tortuosity: f64,
    /// Arrangement regularity in `0.0..=1.0`
    pub regularity: f64,
    /// Image visibility score in `0.0..=1.0`
    pub visibility: f64,
    #[serde(default)]
    pub abnormalities: Vec<String>,
}

fn default_schema_version() -> u32 {
    METRICS_SCHEMA_VERSION
}

impl CapillaryMetrics {
    pub fn new(
        density: f64,
        diameter: f64,
        tortuosity: f64,
        regularity: f64,
        visibility: f64,
    ) -> Self {
        Self {
            schema_version: METRICS_SCHEMA_VERSION,
            density,
            diameter,
            tortuosity,
            regularity,
            visibility,
            abnormalities: Vec::new(),
        }
    }

    /// Builder-style helper to record detected abnormalities
    pub fn with_abnormalities(mut self, abnormalities: Vec<String>) -> Self {
        self.abnormalities = abnormalities;
        self
    }

    /// Whether every measurement sits inside the reference range
    pub fn is_normal(&self) -> bool {
        let (density_min, density_max) = reference::DENSITY_RANGE;
        let (diameter_min, diameter_max) = reference::DIAMETER_RANGE;

        (density_min..=density_max).contains(&self.density)
            && (diameter_min..=diameter_max).contains(&self.diameter)
            && self.tortuosity <= reference::TORTUOSITY_MAX
            && self.abnormalities.is_empty()
    }
}
