//! Dispatch jobs and the job queue they live in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ResourceId, Result};

/// Deterministic key of the build job for one release: `<prefix>:<release id>`.
///
/// Since the key depends only on the release, a queue that rejects duplicate
/// keys guarantees at most one job per release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn for_release(prefix: &str, release_id: ResourceId) -> Self {
        Self(format!("{}:{}", prefix, release_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Settings every build job is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Retry budget: total attempts before the job is completely failed.
    pub attempts: u32,
    /// Wait between attempts.
    pub backoff: Duration,
    pub timeout: Option<Duration>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(300),
            timeout: None,
        }
    }
}

/// When a new job becomes runnable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schedule {
    Now,
    At(DateTime<Utc>),
}

impl Schedule {
    pub fn run_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Now => None,
            Schedule::At(at) => Some(*at),
        }
    }
}

/// Lifecycle of a job inside the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Delayed => "delayed",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "delayed" => Ok(JobStatus::Delayed),
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// A job as seen by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub id: JobId,
    pub status: JobStatus,
    pub attempts_made: u32,
    pub config: JobConfig,
    pub run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DispatchJob {
    /// Failed with its retry budget exhausted; the queue will not run it again.
    pub fn is_failed_completely(&self) -> bool {
        self.status == JobStatus::Failed && self.attempts_made >= self.config.attempts
    }
}

/// Request to enqueue a job under a caller-chosen id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub id: JobId,
    pub config: JobConfig,
    pub schedule: Schedule,
}

/// Queue of build jobs addressed by deterministic id.
///
/// `add_job` must fail with [`crate::Error::Conflict`] when a job with the
/// same id already exists, never create a second one.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn get_job(&self, id: &JobId) -> Result<Option<DispatchJob>>;
    async fn remove_job(&self, id: &JobId) -> Result<()>;
    async fn add_job(&self, job: NewJob) -> Result<DispatchJob>;
}
