//! # Database Migrations
//!
//! Migrations are embedded at compile time from the `migrations/` directory and
//! applied in version order. A PostgreSQL advisory lock serialises concurrent
//! runners, so the worker and the API process can both start against a fresh
//! database.
//!
//! File names follow `YYYYMMDDHHMMSS_description.sql`.

use std::collections::{BTreeMap, HashSet};

use sqlx::{PgPool, Row};
use tracing::info;

/// Advisory lock key shared by every process running migrations
const MIGRATION_LOCK_KEY: i64 = 7_310_442_019_877_211;

const EMBEDDED_MIGRATIONS: &[(&str, &str)] = &[(
    "20261001000000_create_pipeline_tables",
    include_str!("../../migrations/20261001000000_create_pipeline_tables.sql"),
)];

/// A single embedded migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version timestamp (YYYYMMDDHHMMSS format)
    pub version: String,
    /// Human-readable migration name
    pub name: String,
    pub sql: &'static str,
}

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every migration not yet recorded in `schema_migrations`
    pub async fn run_all(pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let result = Self::run_outstanding_migrations(pool).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        result
    }

    async fn run_outstanding_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        Self::ensure_migration_table(pool).await?;
        let applied = Self::get_applied_migrations(pool).await?;

        for migration in Self::embedded_migrations().values() {
            if applied.contains(&migration.version) {
                continue;
            }

            info!(
                version = %migration.version,
                name = %migration.name,
                "Applying migration"
            );

            let mut tx = pool.begin().await?;
            sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (version) VALUES ($1)")
                .bind(&migration.version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }

        Ok(())
    }

    /// Embedded migrations keyed and ordered by version
    pub fn embedded_migrations() -> BTreeMap<String, Migration> {
        EMBEDDED_MIGRATIONS
            .iter()
            .filter_map(|(filename, sql)| {
                Self::parse_migration_filename(filename).map(|(version, name)| {
                    (
                        version.clone(),
                        Migration {
                            version,
                            name,
                            sql,
                        },
                    )
                })
            })
            .collect()
    }

    /// Split `YYYYMMDDHHMMSS_description` into version and readable name
    fn parse_migration_filename(filename: &str) -> Option<(String, String)> {
        if filename.len() < 15 {
            return None;
        }

        let (version_part, name_part) = filename.split_at(14);
        if !version_part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let name = name_part
            .strip_prefix('_')
            .unwrap_or(name_part)
            .replace('_', " ");

        Some((version_part.to_string(), name))
    }

    async fn ensure_migration_table(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version VARCHAR(14) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn get_applied_migrations(pool: &PgPool) -> Result<HashSet<String>, sqlx::Error> {
        let rows = sqlx::query("SELECT version FROM schema_migrations")
            .fetch_all(pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("version"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migration_filename() {
        let parsed = DatabaseMigrations::parse_migration_filename("20261001000000_create_tables");
        assert_eq!(
            parsed,
            Some(("20261001000000".to_string(), "create tables".to_string()))
        );

        assert!(DatabaseMigrations::parse_migration_filename("init").is_none());
        assert!(DatabaseMigrations::parse_migration_filename("2026100100000x_bad_version").is_none());
    }

    #[test]
    fn test_embedded_migrations_are_ordered_and_unique() {
        let migrations = DatabaseMigrations::embedded_migrations();
        assert_eq!(migrations.len(), EMBEDDED_MIGRATIONS.len());
        assert!(migrations
            .values()
            .all(|m| m.sql.contains("CREATE TABLE IF NOT EXISTS")));
    }
}
