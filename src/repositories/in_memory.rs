//! # In-Memory Repositories
//!
//! Thread-safe implementations for tests and single-process development runs.
//! Ordered collections keep insertion order so that "in creation order"
//! queries behave like their PostgreSQL counterparts.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    AnalysisRepository, ExaminationRepository, ImageRepository, ReportRepository,
    RepositoryError, RepositoryResult, UserRepository,
};
use crate::models::{Analysis, Examination, Image, Report, User};

#[derive(Debug, Default)]
pub struct InMemoryAnalysisRepository {
    analyses: RwLock<Vec<Analysis>>,
}

impl InMemoryAnalysisRepository {
    /// Number of stored analyses (for testing)
    pub fn len(&self) -> usize {
        self.analyses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyses.read().is_empty()
    }
}

#[async_trait]
impl AnalysisRepository for InMemoryAnalysisRepository {
    async fn create(&self, analysis: &Analysis) -> RepositoryResult<()> {
        let mut analyses = self.analyses.write();
        if analyses.iter().any(|a| a.id == analysis.id) {
            return Err(RepositoryError::conflict(
                "analysis",
                format!("duplicate id {}", analysis.id),
            ));
        }
        analyses.push(analysis.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<Analysis>> {
        Ok(self.analyses.read().iter().find(|a| a.id == id).cloned())
    }

    async fn update(&self, analysis: &Analysis) -> RepositoryResult<()> {
        let mut analyses = self.analyses.write();
        let stored = analyses
            .iter_mut()
            .find(|a| a.id == analysis.id)
            .ok_or_else(|| RepositoryError::not_found("analysis", analysis.id))?;
        *stored = analysis.clone();
        Ok(())
    }

    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Vec<Analysis>> {
        Ok(self
            .analyses
            .read()
            .iter()
            .filter(|a| a.examination_id == examination_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryExaminationRepository {
    examinations: DashMap<Uuid, Examination>,
}

#[async_trait]
impl ExaminationRepository for InMemoryExaminationRepository {
    async fn create(&self, examination: &Examination) -> RepositoryResult<()> {
        match self.examinations.entry(examination.id) {
            Entry::Occupied(_) => Err(RepositoryError::conflict(
                "examination",
                format!("duplicate id {}", examination.id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(examination.clone());
                Ok(())
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<Examination>> {
        Ok(self.examinations.get(&id).map(|e| e.value().clone()))
    }

    async fn update(&self, examination: &Examination) -> RepositoryResult<()> {
        let mut stored = self
            .examinations
            .get_mut(&examination.id)
            .ok_or_else(|| RepositoryError::not_found("examination", examination.id))?;
        *stored = examination.clone();
        Ok(())
    }
}

/// Reports keyed by examination id, which makes at-most-one-per-examination
/// a property of the map itself
#[derive(Debug, Default)]
pub struct InMemoryReportRepository {
    reports: DashMap<Uuid, Report>,
}

impl InMemoryReportRepository {
    /// Number of stored reports (for testing)
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Option<Report>> {
        Ok(self
            .reports
            .get(&examination_id)
            .map(|r| r.value().clone()))
    }

    async fn create_if_absent(&self, report: &Report) -> RepositoryResult<bool> {
        match self.reports.entry(report.examination_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(report.clone());
                Ok(true)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryImageRepository {
    images: RwLock<Vec<Image>>,
}

#[async_trait]
impl ImageRepository for InMemoryImageRepository {
    async fn create(&self, image: &Image) -> RepositoryResult<()> {
        let mut images = self.images.write();
        if images.iter().any(|i| i.id == image.id) {
            return Err(RepositoryError::conflict(
                "image",
                format!("duplicate id {}", image.id),
            ));
        }
        images.push(image.clone());
        Ok(())
    }

    async fn get_by_examination_id(&self, examination_id: Uuid) -> RepositoryResult<Vec<Image>> {
        Ok(self
            .images
            .read()
            .iter()
            .filter(|i| i.examination_id == examination_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::conflict(
                "user",
                format!("username {} already taken", user.username),
            ));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn get_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list(&self, limit: usize, offset: usize) -> RepositoryResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
