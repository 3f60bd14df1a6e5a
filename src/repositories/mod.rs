//! # Repositories
//!
//! Persistence seams consumed by the pipeline. The worker, aggregator and
//! dispatcher depend only on these traits and on the entity shapes they
//! return; storage mechanics live in [`in_memory`] and [`postgres`].
//!
//! Handles are bundled in [`Repositories`] and passed to each component
//! explicitly.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Analysis, Examination, Image, Report, User};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{
    InMemoryAnalysisRepository, InMemoryExaminationRepository, InMemoryImageRepository,
    InMemoryReportRepository, InMemoryUserRepository,
};

/// Errors surfaced by repository implementations
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict on {entity}: {message}")]
    Conflict {
        entity: &'static str,
        message: String,
    },

    #[error("Database error during {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            message: message.into(),
        }
    }

    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn create(&self, analysis: &Analysis) -> RepositoryResult<()>;

    /// `Ok(None)` when no analysis has this id
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<Analysis>>;

    /// Fails with `NotFound` when the analysis was never created
    async fn update(&self, analysis: &Analysis) -> RepositoryResult<()>;

    /// Analyses of an examination in creation order
    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Vec<Analysis>>;
}

#[async_trait]
pub trait ExaminationRepository: Send + Sync {
    async fn create(&self, examination: &Examination) -> RepositoryResult<()>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<Examination>>;

    async fn update(&self, examination: &Examination) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Option<Report>>;

    /// Insert the report unless one already exists for its examination.
    ///
    /// Returns `true` when this call stored the report. The check and the
    /// insert are a single atomic step, so concurrent callers for the same
    /// examination see exactly one `true`.
    async fn create_if_absent(&self, report: &Report) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn create(&self, image: &Image) -> RepositoryResult<()>;

    /// Images of an examination in capture order
    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Vec<Image>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> RepositoryResult<()>;

    async fn get_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    async fn list(&self, limit: usize, offset: usize) -> RepositoryResult<Vec<User>>;
}

/// Shared repository handles for the pipeline components
#[derive(Clone)]
pub struct Repositories {
    pub analyses: Arc<dyn AnalysisRepository>,
    pub examinations: Arc<dyn ExaminationRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

impl Repositories {
    /// Fresh, empty in-memory storage
    pub fn in_memory() -> Self {
        Self {
            analyses: Arc::new(InMemoryAnalysisRepository::default()),
            examinations: Arc::new(InMemoryExaminationRepository::default()),
            reports: Arc::new(InMemoryReportRepository::default()),
            images: Arc::new(InMemoryImageRepository::default()),
            users: Arc::new(InMemoryUserRepository::default()),
        }
    }

    /// PostgreSQL-backed storage sharing one pool
    #[cfg(feature = "postgres")]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use self::postgres::{
            PgAnalysisRepository, PgExaminationRepository, PgImageRepository, PgReportRepository,
            PgUserRepository,
        };

        Self {
            analyses: Arc::new(PgAnalysisRepository::new(pool.clone())),
            examinations: Arc::new(PgExaminationRepository::new(pool.clone())),
            reports: Arc::new(PgReportRepository::new(pool.clone())),
            images: Arc::new(PgImageRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool)),
        }
    }
}
