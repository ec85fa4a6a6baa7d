//! Package sync orchestrator - runs the sync pipeline for one package.

use chrono::{DateTime, Utc};
use relsync_config::SyncConfig;
use relsync_core::job::JobQueue;
use relsync_core::package::{PackageSource, RepoUrlFormat};
use relsync_core::release::{Release, ReleaseStore};
use relsync_core::tag::{TagLister, TagNormalizer};
use std::sync::Arc;
use tracing::{error, info};

use crate::dispatch::{DispatchReport, ReleaseJobScheduler};
use crate::error::{SyncError, SyncStage};
use crate::reconcile::ReleaseReconciler;

/// Result of a successful package sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub package: String,
    /// Canonical repository URL the tags were listed from.
    pub repo_url: String,
    pub remote_tags: usize,
    pub semver_tags: usize,
    /// Release records in normalized tag order.
    pub releases: Vec<Release>,
    pub dispatch: DispatchReport,
}

/// Composes package loading, tag listing, reconciliation and job dispatch.
pub struct PackageSyncOrchestrator {
    packages: Arc<dyn PackageSource>,
    lister: Arc<dyn TagLister>,
    normalizer: TagNormalizer,
    reconciler: ReleaseReconciler,
    scheduler: ReleaseJobScheduler,
    remote_format: RepoUrlFormat,
}

impl PackageSyncOrchestrator {
    pub fn new(
        packages: Arc<dyn PackageSource>,
        lister: Arc<dyn TagLister>,
        store: Arc<dyn ReleaseStore>,
        queue: Arc<dyn JobQueue>,
        config: &SyncConfig,
    ) -> relsync_core::Result<Self> {
        Ok(Self {
            packages,
            lister,
            normalizer: TagNormalizer,
            reconciler: ReleaseReconciler::new(store),
            scheduler: ReleaseJobScheduler::new(queue, config.build_release.clone())?,
            remote_format: config.remote_format,
        })
    }

    /// Sync a package against its upstream tags.
    pub async fn sync(&self, name: &str) -> Result<SyncReport, SyncError> {
        self.sync_at(name, Utc::now()).await
    }

    /// Sync with an explicit start time; job delays are offsets from `now`.
    pub async fn sync_at(&self, name: &str, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let result = self.run(name, now).await;
        if let Err(e) = &result {
            error!(
                package = %name,
                stage = %e.stage,
                category = e.category(),
                partial = e.may_have_partial_effects(),
                error = %e.source,
                "Package sync failed"
            );
        }
        result
    }

    async fn run(&self, name: &str, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let fail = |stage: SyncStage| move |source: relsync_core::Error| SyncError::new(name, stage, source);

        info!(package = %name, "Loading package definition");
        let package = self
            .packages
            .load(name)
            .await
            .map_err(fail(SyncStage::LoadPackage))?;
        let repo_url = package
            .repo()
            .map_err(fail(SyncStage::LoadPackage))?
            .format(self.remote_format);

        info!(package = %name, repo_url = %repo_url, "Listing remote tags");
        let remote = self
            .lister
            .list_tags(&repo_url)
            .await
            .map_err(fail(SyncStage::ListTags))?;
        let tags = self.normalizer.normalize(&remote);

        info!(
            package = %name,
            remote_tags = remote.len(),
            semver_tags = tags.len(),
            "Updating release records"
        );
        let releases = self
            .reconciler
            .reconcile(&package.name, &tags)
            .await
            .map_err(fail(SyncStage::Reconcile))?;

        info!(package = %name, releases = releases.len(), "Adding release jobs");
        let dispatch = self
            .scheduler
            .schedule(&releases, now)
            .await
            .map_err(fail(SyncStage::Schedule))?;

        info!(
            package = %name,
            dispatched = dispatch.dispatched.len(),
            skipped = dispatch.skipped.len(),
            cleaned = dispatch.cleaned.len(),
            "Package sync completed"
        );

        Ok(SyncReport {
            package: package.name,
            repo_url,
            remote_tags: remote.len(),
            semver_tags: tags.len(),
            releases,
            dispatch,
        })
    }
}
