//! In-memory release store and job queue.
//!
//! Both honour the same duplicate-key contract as the PostgreSQL
//! implementations, which makes them suitable for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use relsync_core::job::{DispatchJob, JobId, JobQueue, JobStatus, NewJob, Schedule};
use relsync_core::release::{NewRelease, Release, ReleaseReason, ReleaseState, ReleaseStore};
use relsync_core::tag::Version;
use relsync_core::{Error, ResourceId, Result};
use tokio::sync::Mutex;

/// Release store backed by a vector, in creation order.
#[derive(Default)]
pub struct InMemoryReleaseStore {
    releases: Mutex<Vec<Release>>,
}

impl InMemoryReleaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all releases in creation order.
    pub async fn releases(&self) -> Vec<Release> {
        self.releases.lock().await.clone()
    }

    /// Record a build outcome, as the build pipeline would.
    pub async fn set_state(&self, id: ResourceId, state: ReleaseState, reason: ReleaseReason) -> Result<()> {
        let mut releases = self.releases.lock().await;
        let release = releases
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::Store(format!("release {} not found", id)))?;
        release.state = state;
        release.reason = reason;
        release.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ReleaseStore for InMemoryReleaseStore {
    async fn fetch_one(&self, package_name: &str, version: &Version) -> Result<Option<Release>> {
        let releases = self.releases.lock().await;
        Ok(releases
            .iter()
            .find(|r| r.package_name == package_name && &r.version == version)
            .cloned())
    }

    async fn create(&self, release: NewRelease) -> Result<Release> {
        let mut releases = self.releases.lock().await;
        let exists = releases
            .iter()
            .any(|r| r.package_name == release.package_name && r.version == release.version);
        if exists {
            return Err(Error::Conflict(format!(
                "release {}@{}",
                release.package_name, release.version
            )));
        }

        let now = Utc::now();
        let created = Release {
            id: ResourceId::new(),
            package_name: release.package_name,
            version: release.version,
            commit: release.commit,
            tag: release.tag,
            state: ReleaseState::Pending,
            reason: ReleaseReason::None,
            created_at: now,
            updated_at: now,
        };
        releases.push(created.clone());
        Ok(created)
    }
}

/// Job queue backed by a vector, in insertion order.
#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<DispatchJob>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all jobs in insertion order.
    pub async fn jobs(&self) -> Vec<DispatchJob> {
        self.jobs.lock().await.clone()
    }

    /// Record the outcome of running a job, as a worker would.
    pub async fn set_status(&self, id: &JobId, status: JobStatus, attempts_made: u32) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| Error::Queue(format!("job {} not found", id)))?;
        job.status = status;
        job.attempts_made = attempts_made;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn get_job(&self, id: &JobId) -> Result<Option<DispatchJob>> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.iter().find(|j| &j.id == id).cloned())
    }

    async fn remove_job(&self, id: &JobId) -> Result<()> {
        self.jobs.lock().await.retain(|j| &j.id != id);
        Ok(())
    }

    async fn add_job(&self, job: NewJob) -> Result<DispatchJob> {
        let mut jobs = self.jobs.lock().await;
        if jobs.iter().any(|j| j.id == job.id) {
            return Err(Error::Conflict(format!("job {}", job.id)));
        }

        let status = match job.schedule {
            Schedule::Now => JobStatus::Waiting,
            Schedule::At(_) => JobStatus::Delayed,
        };
        let created = DispatchJob {
            id: job.id,
            status,
            attempts_made: 0,
            config: job.config,
            run_at: job.schedule.run_at(),
            created_at: Utc::now(),
        };
        jobs.push(created.clone());
        Ok(created)
    }
}
