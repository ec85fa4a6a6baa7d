//! Job queue implementation using PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relsync_core::job::{DispatchJob, JobConfig, JobId, JobQueue, JobStatus, NewJob, Schedule};
use relsync_core::{Error, Result};
use sqlx::PgPool;
use std::time::Duration;

/// A queued job row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRecord {
    pub id: String,
    pub status: String,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff_secs: i64,
    pub timeout_secs: Option<i64>,
    pub run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn non_negative(value: i64, field: &str, id: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Queue(format!("job {} has {} = {}", id, field, value)))
}

impl TryFrom<JobRecord> for DispatchJob {
    type Error = Error;

    fn try_from(record: JobRecord) -> Result<Self> {
        let status: JobStatus = record.status.parse().map_err(Error::Queue)?;
        let attempts_made = non_negative(record.attempts_made.into(), "attempts_made", &record.id)?;
        let attempts = non_negative(record.max_attempts.into(), "max_attempts", &record.id)?;
        let backoff = non_negative(record.backoff_secs, "backoff_secs", &record.id)?;
        let timeout = record
            .timeout_secs
            .map(|t| non_negative(t, "timeout_secs", &record.id))
            .transpose()?;

        Ok(DispatchJob {
            id: JobId::from(record.id),
            status,
            attempts_made: attempts_made as u32,
            config: JobConfig {
                attempts: attempts as u32,
                backoff: Duration::from_secs(backoff),
                timeout: timeout.map(Duration::from_secs),
            },
            run_at: record.run_at,
            created_at: record.created_at,
        })
    }
}

fn queue_error(e: sqlx::Error) -> Error {
    Error::Queue(e.to_string())
}

fn secs(field: &str, d: Duration) -> Result<i64> {
    i64::try_from(d.as_secs()).map_err(|_| Error::InvalidInput(format!("{} out of range", field)))
}

/// Job queue backed by PostgreSQL.
///
/// The primary key on the job id rejects a second job for the same release.
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn get_job(&self, id: &JobId) -> Result<Option<DispatchJob>> {
        let record = sqlx::query_as::<_, JobRecord>("SELECT * FROM release_jobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(queue_error)?;
        record.map(DispatchJob::try_from).transpose()
    }

    async fn remove_job(&self, id: &JobId) -> Result<()> {
        sqlx::query("DELETE FROM release_jobs WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(queue_error)?;
        Ok(())
    }

    async fn add_job(&self, job: NewJob) -> Result<DispatchJob> {
        let status = match job.schedule {
            Schedule::Now => JobStatus::Waiting,
            Schedule::At(_) => JobStatus::Delayed,
        };
        let attempts = i32::try_from(job.config.attempts)
            .map_err(|_| Error::InvalidInput("attempts out of range".to_string()))?;
        let timeout = job.config.timeout.map(|t| secs("timeout", t)).transpose()?;

        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            INSERT INTO release_jobs (id, status, attempts_made, max_attempts, backoff_secs, timeout_secs, run_at, created_at)
            VALUES ($1, $2, 0, $3, $4, $5, $6, NOW())
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(job.id.as_str())
        .bind(status.as_str())
        .bind(attempts)
        .bind(secs("backoff", job.config.backoff)?)
        .bind(timeout)
        .bind(job.schedule.run_at())
        .fetch_optional(&self.pool)
        .await
        .map_err(queue_error)?
        .ok_or_else(|| Error::Conflict(format!("job {}", job.id)))?;

        DispatchJob::try_from(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str, attempts_made: i32) -> JobRecord {
        JobRecord {
            id: "build-release:0191".to_string(),
            status: status.to_string(),
            attempts_made,
            max_attempts: 3,
            backoff_secs: 300,
            timeout_secs: Some(1800),
            run_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_converts_to_job() {
        let job = DispatchJob::try_from(record("failed", 3)).unwrap();
        assert_eq!(job.id.as_str(), "build-release:0191");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.config.attempts, 3);
        assert_eq!(job.config.backoff, Duration::from_secs(300));
        assert_eq!(job.config.timeout, Some(Duration::from_secs(1800)));
        assert!(job.is_failed_completely());
    }

    #[test]
    fn test_bad_rows_are_rejected() {
        assert!(matches!(
            DispatchJob::try_from(record("stuck", 0)),
            Err(Error::Queue(_))
        ));
        assert!(matches!(
            DispatchJob::try_from(record("waiting", -1)),
            Err(Error::Queue(_))
        ));
    }
}
