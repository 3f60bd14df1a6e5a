//! # Domain Models
//!
//! Entities moved through the analysis pipeline. Persistence lives behind the
//! repository traits in [`crate::repositories`]; these types carry no storage
//! concerns of their own.

pub mod analysis;
pub mod examination;
pub mod image;
pub mod metrics;
pub mod report;
pub mod user;

pub use analysis::Analysis;
pub use examination::Examination;
pub use image::Image;
pub use metrics::{CapillaryMetrics, METRICS_SCHEMA_VERSION};
pub use report::{Report, ReportContent};
pub use user::User;
