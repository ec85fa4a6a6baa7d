//! Build job dispatch for release records.

use chrono::{DateTime, TimeDelta, Utc};
use futures::{TryStreamExt, stream};
use relsync_config::BuildReleaseConfig;
use relsync_core::job::{DispatchJob, JobId, JobQueue, JobStatus, NewJob, Schedule};
use relsync_core::release::{Release, ReleaseReason, ReleaseState};
use relsync_core::tag::Version;
use relsync_core::{Error, ResourceId, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Why a release got no new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A job for the release is still in the queue.
    JobExists(JobStatus),
    Succeeded,
    FailedNotRetryable(ReleaseReason),
}

/// Decide whether a release must be skipped, given the job left in the
/// queue after completely failed jobs were cleaned.
pub fn skip_reason(existing: Option<&DispatchJob>, release: &Release) -> Option<SkipReason> {
    if let Some(job) = existing {
        return Some(SkipReason::JobExists(job.status));
    }
    match release.state {
        ReleaseState::Succeeded => Some(SkipReason::Succeeded),
        ReleaseState::Failed if !release.reason.is_retryable() => {
            Some(SkipReason::FailedNotRetryable(release.reason))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedJob {
    pub job_id: JobId,
    pub release_id: ResourceId,
    pub version: Version,
    /// Offset from the start of the run.
    pub delay: TimeDelta,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRelease {
    pub release_id: ResourceId,
    pub version: Version,
    pub reason: SkipReason,
}

/// Outcome of one scheduling run. Threaded through the loop as the fold
/// accumulator; the number of dispatched jobs so far sets the next delay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub dispatched: Vec<DispatchedJob>,
    pub skipped: Vec<SkippedRelease>,
    /// Completely failed jobs removed so their releases could be re-dispatched.
    pub cleaned: Vec<JobId>,
}

impl DispatchReport {
    pub fn dispatched_count(&self) -> usize {
        self.dispatched.len()
    }
}

/// Enqueues build jobs for releases that still need building.
pub struct ReleaseJobScheduler {
    queue: Arc<dyn JobQueue>,
    settings: BuildReleaseConfig,
    delay_step: TimeDelta,
}

impl ReleaseJobScheduler {
    pub fn new(queue: Arc<dyn JobQueue>, settings: BuildReleaseConfig) -> Result<Self> {
        let delay_step = TimeDelta::from_std(settings.delay_step)
            .map_err(|e| Error::InvalidInput(format!("delay step: {}", e)))?;
        Ok(Self {
            queue,
            settings,
            delay_step,
        })
    }

    pub fn job_id(&self, release: &Release) -> JobId {
        JobId::for_release(&self.settings.key, release.id)
    }

    /// Delay of the `n`-th job dispatched in a run (0-indexed).
    pub fn delay_for(&self, n: usize) -> Result<TimeDelta> {
        i32::try_from(n)
            .ok()
            .and_then(|n| self.delay_step.checked_mul(n))
            .ok_or_else(|| Error::Internal(format!("delay for dispatch #{} overflows", n)))
    }

    /// Walk releases in order and enqueue a job for each one that needs it.
    ///
    /// Stops at the first queue error; jobs enqueued before it stay scheduled.
    pub async fn schedule(&self, releases: &[Release], now: DateTime<Utc>) -> Result<DispatchReport> {
        stream::iter(releases.iter().map(Ok::<_, Error>))
            .try_fold(DispatchReport::default(), |report, release| {
                self.dispatch_one(report, release, now)
            })
            .await
    }

    async fn dispatch_one(
        &self,
        mut report: DispatchReport,
        release: &Release,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport> {
        let job_id = self.job_id(release);
        let mut existing = self.queue.get_job(&job_id).await?;

        if existing.as_ref().is_some_and(DispatchJob::is_failed_completely) {
            self.queue.remove_job(&job_id).await?;
            info!(
                release_id = %release.id,
                job_id = %job_id,
                "Cleaned completely failed job {}@{}",
                release.package_name,
                release.version
            );
            report.cleaned.push(job_id.clone());
            existing = None;
        }

        if let Some(reason) = skip_reason(existing.as_ref(), release) {
            debug!(release_id = %release.id, version = %release.version, ?reason, "Skipping release");
            report.skipped.push(SkippedRelease {
                release_id: release.id,
                version: release.version.clone(),
                reason,
            });
            return Ok(report);
        }

        let n = report.dispatched_count();
        let delay = self.delay_for(n)?;
        let schedule = if n == 0 {
            Schedule::Now
        } else {
            let run_at = now
                .checked_add_signed(delay)
                .ok_or_else(|| Error::Internal(format!("run time for dispatch #{} overflows", n)))?;
            Schedule::At(run_at)
        };

        self.queue
            .add_job(NewJob {
                id: job_id.clone(),
                config: self.settings.job.clone(),
                schedule,
            })
            .await?;
        info!(
            release_id = %release.id,
            job_id = %job_id,
            delay_secs = delay.num_seconds(),
            "Added build job for {}@{}",
            release.package_name,
            release.version
        );

        report.dispatched.push(DispatchedJob {
            job_id,
            release_id: release.id,
            version: release.version.clone(),
            delay,
            schedule,
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryJobQueue, InMemoryReleaseStore};
    use async_trait::async_trait;
    use relsync_core::job::JobConfig;
    use relsync_core::release::{NewRelease, ReleaseStore};
    use std::time::Duration;

    const STEP_SECS: i64 = 60;

    fn settings() -> BuildReleaseConfig {
        BuildReleaseConfig {
            key: "build-release".to_string(),
            delay_step: Duration::from_secs(STEP_SECS as u64),
            job: JobConfig {
                attempts: 3,
                backoff: Duration::from_secs(10),
                timeout: None,
            },
        }
    }

    async fn releases(store: &InMemoryReleaseStore, versions: &[&str]) -> Vec<Release> {
        let mut out = Vec::new();
        for v in versions {
            out.push(
                store
                    .create(NewRelease {
                        package_name: "p".to_string(),
                        version: Version::from_tag(v).unwrap(),
                        commit: format!("c-{}", v),
                        tag: v.to_string(),
                    })
                    .await
                    .unwrap(),
            );
        }
        out
    }

    fn with_state(mut release: Release, state: ReleaseState, reason: ReleaseReason) -> Release {
        release.state = state;
        release.reason = reason;
        release
    }

    #[tokio::test]
    async fn test_staggers_all_new_releases() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0", "1.1.0", "1.2.0", "2.0.0"]).await;
        let now = Utc::now();

        let report = scheduler.schedule(&rels, now).await.unwrap();

        assert_eq!(report.dispatched_count(), 4);
        for (k, job) in report.dispatched.iter().enumerate() {
            assert_eq!(job.release_id, rels[k].id);
            assert_eq!(job.delay, TimeDelta::seconds(STEP_SECS * k as i64));
        }
        assert_eq!(report.dispatched[0].schedule, Schedule::Now);
        assert_eq!(
            report.dispatched[3].schedule,
            Schedule::At(now + TimeDelta::seconds(3 * STEP_SECS))
        );

        let jobs = queue.jobs().await;
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[0].status, JobStatus::Waiting);
        assert_eq!(jobs[0].run_at, None);
        assert_eq!(jobs[1].status, JobStatus::Delayed);
        assert_eq!(jobs[1].run_at, Some(now + TimeDelta::seconds(STEP_SECS)));
        assert_eq!(jobs[1].config.attempts, 3);
        assert_eq!(jobs[2].id.as_str(), format!("build-release:{}", rels[2].id));
    }

    #[tokio::test]
    async fn test_skipped_releases_do_not_advance_delay() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0", "1.1.0", "1.2.0", "1.3.0"]).await;
        let rels = vec![
            with_state(rels[0].clone(), ReleaseState::Succeeded, ReleaseReason::None),
            rels[1].clone(),
            with_state(rels[2].clone(), ReleaseState::Failed, ReleaseReason::VersionNotMatch),
            rels[3].clone(),
        ];

        let report = scheduler.schedule(&rels, Utc::now()).await.unwrap();

        let dispatched: Vec<&str> = report.dispatched.iter().map(|d| d.version.as_str()).collect();
        assert_eq!(dispatched, vec!["1.1.0", "1.3.0"]);
        assert_eq!(report.dispatched[0].delay, TimeDelta::zero());
        assert_eq!(report.dispatched[1].delay, TimeDelta::seconds(STEP_SECS));
        assert_eq!(
            report.skipped.iter().map(|s| s.reason).collect::<Vec<_>>(),
            vec![
                SkipReason::Succeeded,
                SkipReason::FailedNotRetryable(ReleaseReason::VersionNotMatch)
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_with_retryable_reason_is_dispatched() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0"]).await;
        let rels = vec![with_state(
            rels[0].clone(),
            ReleaseState::Failed,
            ReleaseReason::GatewayTimeout,
        )];

        let report = scheduler.schedule(&rels, Utc::now()).await.unwrap();
        assert_eq!(report.dispatched_count(), 1);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_existing_job_blocks_duplicate() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0", "2.0.0"]).await;

        scheduler.schedule(&rels, Utc::now()).await.unwrap();
        queue
            .set_status(&scheduler.job_id(&rels[0]), JobStatus::Active, 1)
            .await
            .unwrap();
        // Failed but with retries left.
        queue
            .set_status(&scheduler.job_id(&rels[1]), JobStatus::Failed, 1)
            .await
            .unwrap();

        let report = scheduler.schedule(&rels, Utc::now()).await.unwrap();
        assert_eq!(report.dispatched_count(), 0);
        assert!(report.cleaned.is_empty());
        assert_eq!(
            report.skipped.iter().map(|s| s.reason).collect::<Vec<_>>(),
            vec![
                SkipReason::JobExists(JobStatus::Active),
                SkipReason::JobExists(JobStatus::Failed)
            ]
        );
        assert_eq!(queue.jobs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_completely_failed_job_is_replaced() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0", "2.0.0"]).await;

        scheduler.schedule(&rels, Utc::now()).await.unwrap();
        let stale = scheduler.job_id(&rels[1]);
        queue.set_status(&stale, JobStatus::Failed, 3).await.unwrap();

        let now = Utc::now();
        let report = scheduler.schedule(&rels, now).await.unwrap();

        assert_eq!(report.cleaned, vec![stale.clone()]);
        assert_eq!(report.dispatched_count(), 1);
        // First real dispatch of this run, so no delay.
        assert_eq!(report.dispatched[0].job_id, stale);
        assert_eq!(report.dispatched[0].schedule, Schedule::Now);

        let job = queue.get_job(&stale).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Waiting);
        assert_eq!(job.attempts_made, 0);
    }

    #[tokio::test]
    async fn test_replaced_job_after_new_dispatch_is_staggered() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["2.0.0", "1.0.0"]).await;

        // Only 1.0.0 was known on the previous run, and its job ran out of attempts.
        scheduler.schedule(&rels[1..], Utc::now()).await.unwrap();
        let stale = scheduler.job_id(&rels[1]);
        queue.set_status(&stale, JobStatus::Failed, 3).await.unwrap();

        let now = Utc::now();
        let report = scheduler.schedule(&rels, now).await.unwrap();

        assert_eq!(report.cleaned, vec![stale.clone()]);
        assert_eq!(report.dispatched_count(), 2);
        assert_eq!(report.dispatched[0].release_id, rels[0].id);
        assert_eq!(report.dispatched[0].schedule, Schedule::Now);
        assert_eq!(report.dispatched[1].job_id, stale);
        assert_eq!(report.dispatched[1].delay, TimeDelta::seconds(STEP_SECS));
        assert_eq!(
            report.dispatched[1].schedule,
            Schedule::At(now + TimeDelta::seconds(STEP_SECS))
        );

        let job = queue.get_job(&stale).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Delayed);
        assert_eq!(job.run_at, Some(now + TimeDelta::seconds(STEP_SECS)));
    }

    #[tokio::test]
    async fn test_cleaned_job_of_finished_release_is_not_recreated() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0"]).await;

        scheduler.schedule(&rels, Utc::now()).await.unwrap();
        let stale = scheduler.job_id(&rels[0]);
        queue.set_status(&stale, JobStatus::Failed, 3).await.unwrap();
        let rels = vec![with_state(
            rels[0].clone(),
            ReleaseState::Failed,
            ReleaseReason::PackageNameNotMatch,
        )];

        let report = scheduler.schedule(&rels, Utc::now()).await.unwrap();
        assert_eq!(report.cleaned, vec![stale.clone()]);
        assert_eq!(report.dispatched_count(), 0);
        assert!(queue.get_job(&stale).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rerun_dispatches_nothing_new() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(InMemoryJobQueue::new());
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0", "2.0.0", "3.0.0"]).await;

        scheduler.schedule(&rels, Utc::now()).await.unwrap();
        let report = scheduler.schedule(&rels, Utc::now()).await.unwrap();

        assert_eq!(report.dispatched_count(), 0);
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(queue.jobs().await.len(), 3);
    }

    /// Queue whose `add_job` fails after `limit` successful adds.
    struct FlakyQueue {
        inner: InMemoryJobQueue,
        limit: usize,
    }

    #[async_trait]
    impl JobQueue for FlakyQueue {
        async fn get_job(&self, id: &JobId) -> Result<Option<DispatchJob>> {
            self.inner.get_job(id).await
        }

        async fn remove_job(&self, id: &JobId) -> Result<()> {
            self.inner.remove_job(id).await
        }

        async fn add_job(&self, job: NewJob) -> Result<DispatchJob> {
            if self.inner.jobs().await.len() >= self.limit {
                return Err(Error::Queue("queue unavailable".to_string()));
            }
            self.inner.add_job(job).await
        }
    }

    #[tokio::test]
    async fn test_queue_failure_stops_the_run() {
        let store = InMemoryReleaseStore::new();
        let queue = Arc::new(FlakyQueue {
            inner: InMemoryJobQueue::new(),
            limit: 2,
        });
        let scheduler = ReleaseJobScheduler::new(queue.clone(), settings()).unwrap();
        let rels = releases(&store, &["1.0.0", "2.0.0", "3.0.0", "4.0.0"]).await;

        let result = scheduler.schedule(&rels, Utc::now()).await;
        assert!(matches!(result, Err(Error::Queue(_))));

        let jobs = queue.inner.jobs().await;
        let ids: Vec<JobId> = jobs.iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec![scheduler.job_id(&rels[0]), scheduler.job_id(&rels[1])]);
    }

    #[test]
    fn test_skip_reason_precedence() {
        let now = Utc::now();
        let release = Release {
            id: ResourceId::new(),
            package_name: "p".to_string(),
            version: Version::from_tag("1.0.0").unwrap(),
            commit: "a".to_string(),
            tag: "1.0.0".to_string(),
            state: ReleaseState::Pending,
            reason: ReleaseReason::None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(skip_reason(None, &release), None);

        let building = with_state(release.clone(), ReleaseState::Building, ReleaseReason::None);
        assert_eq!(skip_reason(None, &building), None);

        let job = DispatchJob {
            id: JobId::for_release("build-release", release.id),
            status: JobStatus::Delayed,
            attempts_made: 0,
            config: JobConfig::default(),
            run_at: Some(now),
            created_at: now,
        };
        let succeeded = with_state(release, ReleaseState::Succeeded, ReleaseReason::None);
        assert_eq!(
            skip_reason(Some(&job), &succeeded),
            Some(SkipReason::JobExists(JobStatus::Delayed))
        );
    }
}
