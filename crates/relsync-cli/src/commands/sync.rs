//! `relsync sync`

use anyhow::Result;
use relsync_config::{FilePackageSource, SyncConfig};
use relsync_db::PgReleaseRepo;
use relsync_scheduler::{GitTagLister, PackageSyncOrchestrator, PgJobQueue};
use std::sync::Arc;
use tracing::info;

pub async fn sync(config: &SyncConfig, database_url: &str, name: &str) -> Result<()> {
    info!("Connecting to database...");
    let pool = relsync_db::create_pool(database_url).await?;

    let orchestrator = PackageSyncOrchestrator::new(
        Arc::new(FilePackageSource::new(&config.packages_dir)),
        Arc::new(GitTagLister::new()),
        Arc::new(PgReleaseRepo::new(pool.clone())),
        Arc::new(PgJobQueue::new(pool)),
        config,
    )?;

    let report = orchestrator.sync(name).await?;

    for job in &report.dispatch.dispatched {
        info!(
            job_id = %job.job_id,
            delay_secs = job.delay.num_seconds(),
            "Scheduled {}@{}",
            report.package,
            job.version
        );
    }
    info!(
        package = %report.package,
        releases = report.releases.len(),
        dispatched = report.dispatch.dispatched.len(),
        skipped = report.dispatch.skipped.len(),
        cleaned = report.dispatch.cleaned.len(),
        "Sync finished"
    );
    Ok(())
}
