//! # PostgreSQL Repositories
//!
//! `sqlx` implementations using runtime-checked queries. Rows are read into
//! private `*Row` structs and converted into domain models, which keeps the
//! models free of storage attributes.
//!
//! Schema lives in `migrations/` and is applied by
//! [`DatabaseMigrations`](crate::database::DatabaseMigrations).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    AnalysisRepository, ExaminationRepository, ImageRepository, ReportRepository,
    RepositoryError, RepositoryResult, UserRepository,
};
use crate::models::{Analysis, CapillaryMetrics, Examination, Image, Report, User};
use crate::state_machine::{AnalysisState, ExaminationState};

fn db_error(operation: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| RepositoryError::database(operation, e.to_string())
}

#[derive(Debug, FromRow)]
struct AnalysisRow {
    id: Uuid,
    examination_id: Uuid,
    image_id: Uuid,
    status: String,
    metrics: Option<Json<CapillaryMetrics>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AnalysisRow> for Analysis {
    type Error = RepositoryError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let status: AnalysisState = row.status.parse().map_err(RepositoryError::serialization)?;
        Ok(Self {
            id: row.id,
            examination_id: row.examination_id,
            image_id: row.image_id,
            status,
            metrics: row.metrics.map(|Json(m)| m),
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

const ANALYSIS_COLUMNS: &str = "id, examination_id, image_id, status, metrics, error_message, \
                                created_at, updated_at, completed_at";

#[derive(Debug, Clone)]
pub struct PgAnalysisRepository {
    pool: PgPool,
}

impl PgAnalysisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisRepository for PgAnalysisRepository {
    async fn create(&self, analysis: &Analysis) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO analyses (id, examination_id, image_id, status, metrics, error_message, \
             created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(analysis.id)
        .bind(analysis.examination_id)
        .bind(analysis.image_id)
        .bind(analysis.status.to_string())
        .bind(analysis.metrics.clone().map(Json))
        .bind(&analysis.error_message)
        .bind(analysis.created_at)
        .bind(analysis.updated_at)
        .bind(analysis.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create analysis"))?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<Analysis>> {
        let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id = $1");
        sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get analysis"))?
            .map(Analysis::try_from)
            .transpose()
    }

    async fn update(&self, analysis: &Analysis) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE analyses SET status = $2, metrics = $3, error_message = $4, \
             updated_at = $5, completed_at = $6 WHERE id = $1",
        )
        .bind(analysis.id)
        .bind(analysis.status.to_string())
        .bind(analysis.metrics.clone().map(Json))
        .bind(&analysis.error_message)
        .bind(analysis.updated_at)
        .bind(analysis.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("update analysis"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("analysis", analysis.id));
        }
        Ok(())
    }

    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Vec<Analysis>> {
        let sql = format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE examination_id = $1 \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(examination_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list analyses"))?
            .into_iter()
            .map(Analysis::try_from)
            .collect()
    }
}

#[derive(Debug, FromRow)]
struct ExaminationRow {
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    status: String,
    description: String,
    image_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ExaminationRow> for Examination {
    type Error = RepositoryError;

    fn try_from(row: ExaminationRow) -> Result<Self, Self::Error> {
        let status: ExaminationState =
            row.status.parse().map_err(RepositoryError::serialization)?;
        Ok(Self {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            status,
            description: row.description,
            image_ids: row.image_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgExaminationRepository {
    pool: PgPool,
}

impl PgExaminationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExaminationRepository for PgExaminationRepository {
    async fn create(&self, examination: &Examination) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO examinations (id, patient_id, doctor_id, status, description, image_ids, \
             created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(examination.id)
        .bind(examination.patient_id)
        .bind(examination.doctor_id)
        .bind(examination.status.to_string())
        .bind(&examination.description)
        .bind(&examination.image_ids)
        .bind(examination.created_at)
        .bind(examination.updated_at)
        .bind(examination.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create examination"))?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<Examination>> {
        sqlx::query_as::<_, ExaminationRow>(
            "SELECT id, patient_id, doctor_id, status, description, image_ids, \
             created_at, updated_at, completed_at FROM examinations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get examination"))?
        .map(Examination::try_from)
        .transpose()
    }

    async fn update(&self, examination: &Examination) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE examinations SET status = $2, description = $3, image_ids = $4, \
             updated_at = $5, completed_at = $6 WHERE id = $1",
        )
        .bind(examination.id)
        .bind(examination.status.to_string())
        .bind(&examination.description)
        .bind(&examination.image_ids)
        .bind(examination.updated_at)
        .bind(examination.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("update examination"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("examination", examination.id));
        }
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    examination_id: Uuid,
    title: String,
    content: String,
    summary: String,
    diagnosis: String,
    recommendations: String,
    generated_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            examination_id: row.examination_id,
            title: row.title,
            content: row.content,
            summary: row.summary,
            diagnosis: row.diagnosis,
            recommendations: row.recommendations,
            generated_by: row.generated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Option<Report>> {
        let row = sqlx::query_as::<_, ReportRow>(
            "SELECT id, examination_id, title, content, summary, diagnosis, recommendations, \
             generated_by, created_at, updated_at FROM reports WHERE examination_id = $1",
        )
        .bind(examination_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get report"))?;
        Ok(row.map(Report::from))
    }

    async fn create_if_absent(&self, report: &Report) -> RepositoryResult<bool> {
        // reports_examination_id_key makes the insert a no-op for a second report
        let result = sqlx::query(
            "INSERT INTO reports (id, examination_id, title, content, summary, diagnosis, \
             recommendations, generated_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (examination_id) DO NOTHING",
        )
        .bind(report.id)
        .bind(report.examination_id)
        .bind(&report.title)
        .bind(&report.content)
        .bind(&report.summary)
        .bind(&report.diagnosis)
        .bind(&report.recommendations)
        .bind(report.generated_by)
        .bind(report.created_at)
        .bind(report.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create report"))?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, FromRow)]
struct ImageRow {
    id: Uuid,
    examination_id: Uuid,
    filename: String,
    file_path: String,
    file_size: i64,
    mime_type: String,
    width: Option<i32>,
    height: Option<i32>,
    captured_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<ImageRow> for Image {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            examination_id: row.examination_id,
            filename: row.filename,
            file_path: row.file_path,
            file_size: row.file_size,
            mime_type: row.mime_type,
            width: row.width,
            height: row.height,
            captured_at: row.captured_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgImageRepository {
    pool: PgPool,
}

impl PgImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn create(&self, image: &Image) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO images (id, examination_id, filename, file_path, file_size, mime_type, \
             width, height, captured_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(image.id)
        .bind(image.examination_id)
        .bind(&image.filename)
        .bind(&image.file_path)
        .bind(image.file_size)
        .bind(&image.mime_type)
        .bind(image.width)
        .bind(image.height)
        .bind(image.captured_at)
        .bind(image.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create image"))?;
        Ok(())
    }

    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Vec<Image>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            "SELECT id, examination_id, filename, file_path, file_size, mime_type, width, height, \
             captured_at, created_at FROM images WHERE examination_id = $1 \
             ORDER BY captured_at, created_at",
        )
        .bind(examination_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list images"))?;
        Ok(rows.into_iter().map(Image::from).collect())
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    full_name: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, full_name, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create user"))?;
        Ok(())
    }

    async fn get_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, full_name, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get user"))?;
        Ok(row.map(User::from))
    }

    async fn list(&self, limit: usize, offset: usize) -> RepositoryResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, full_name, created_at FROM users \
             ORDER BY created_at, username LIMIT $1 OFFSET $2",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list users"))?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
