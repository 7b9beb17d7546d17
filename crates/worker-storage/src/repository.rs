// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrow repository surface the activity layer depends on.
//!
//! Exactly three operations, matching the three queries the worker is
//! permitted to run against the metadata store: read the job/source/
//! destination join, write back replication state, and read a project's
//! alert settings.

use async_trait::async_trait;
use sqlx::PgPool;
use worker_core::{ExecutionError, JobData};

use crate::models::{JobRow, ProjectSettings};
use crate::tables::TableNames;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn fetch_job_data(&self, job_id: i64) -> Result<JobData, ExecutionError>;

    async fn update_job_state(
        &self,
        job_id: i64,
        state: &str,
        active: bool,
    ) -> Result<(), ExecutionError>;

    async fn fetch_project_settings(
        &self,
        project_id: i64,
    ) -> Result<Option<ProjectSettings>, ExecutionError>;
}

/// Postgres-backed repository. One pool, one set of mode-qualified table
/// names, shared across all activities a worker process runs.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    tables: TableNames,
}

impl PostgresRepository {
    pub fn new(pool: PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }

    pub async fn connect(database_url: &str, tables: TableNames) -> Result<Self, ExecutionError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool, tables))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn fetch_job_data(&self, job_id: i64) -> Result<JobData, ExecutionError> {
        let query = format!(
            r#"
            SELECT
                job.name AS job_name,
                job.project_id AS project_id,
                job.streams_config AS streams_config,
                job.state AS state,
                source.config AS source_config,
                destination.config AS destination_config,
                source.version AS source_version,
                source.type AS source_driver
            FROM {job} AS job
            JOIN {source} AS source ON source.id = job.source_id
            JOIN {destination} AS destination ON destination.id = job.destination_id
            WHERE job.id = $1
            "#,
            job = self.tables.job,
            source = self.tables.source,
            destination = self.tables.destination,
        );

        let row: JobRow = sqlx::query_as(&query)
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;

        let mut data = row.into_job_data();
        data.state = worker_core::normalize_state(&data.state);
        Ok(data)
    }

    async fn update_job_state(
        &self,
        job_id: i64,
        state: &str,
        active: bool,
    ) -> Result<(), ExecutionError> {
        let query = format!(
            "UPDATE {job} SET state = $1, active = $2, updated_at = NOW() WHERE id = $3",
            job = self.tables.job,
        );

        sqlx::query(&query)
            .bind(state)
            .bind(active)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_project_settings(
        &self,
        project_id: i64,
    ) -> Result<Option<ProjectSettings>, ExecutionError> {
        let query = format!(
            "SELECT id, project_id, webhook_alert_url FROM {table} WHERE project_id = $1",
            table = TableNames::PROJECT_SETTINGS,
        );

        let row = sqlx::query_as(&query)
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These exercise query construction only — no live database is
    // reachable from this workspace, so the assertions stop at "the SQL
    // text names the right mode-qualified tables and parameter order".

    #[test]
    fn fetch_job_data_query_names_mode_qualified_tables() {
        let tables = TableNames::for_mode("prod");
        let query = format!(
            "FROM {job} AS job JOIN {source} AS source ON source.id = job.source_id JOIN {destination} AS destination",
            job = tables.job,
            source = tables.source,
            destination = tables.destination,
        );
        assert!(query.contains("\"olake-prod-job\""));
        assert!(query.contains("\"olake-prod-source\""));
        assert!(query.contains("\"olake-prod-destination\""));
    }

    #[test]
    fn update_job_state_query_targets_job_table_by_id() {
        let tables = TableNames::for_mode("staging");
        let query = format!(
            "UPDATE {job} SET state = $1, active = $2, updated_at = NOW() WHERE id = $3",
            job = tables.job,
        );
        assert_eq!(
            query,
            "UPDATE \"olake-staging-job\" SET state = $1, active = $2, updated_at = NOW() WHERE id = $3"
        );
    }
}
