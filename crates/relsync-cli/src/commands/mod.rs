//! CLI command implementations.

pub mod sync;

use anyhow::{Context, Result, bail};
use relsync_config::{FilePackageSource, SyncConfig};
use relsync_core::package::PackageSource;
use relsync_db::PgReleaseRepo;
use std::path::Path;
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "relsync.kdl";

/// Load the sync configuration.
///
/// An explicit path must exist. Without one, `relsync.kdl` in the working
/// directory is used if present, otherwise the defaults.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
        None => return Ok(SyncConfig::default()),
    };
    SyncConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

pub async fn list(config: &SyncConfig) -> Result<()> {
    let source = FilePackageSource::new(&config.packages_dir);
    let names = source
        .list_names()
        .await
        .with_context(|| format!("failed to read {}", source.dir().display()))?;

    for name in names {
        println!("{}", name);
    }
    Ok(())
}

pub async fn validate(config: &SyncConfig, name: &str) -> Result<()> {
    let source = FilePackageSource::new(&config.packages_dir);
    let package = source.load(name).await?;
    let repo = package.repo()?;

    println!("Package {} is valid", package.name);
    println!("  repository: {}", repo.format(config.remote_format));
    println!("  owner:      {}", repo.owner_url());
    println!("  hunter:     {}", package.hunter());
    if let Some(id) = &package.license_spdx_id {
        println!("  license:    {}", package.license_name().unwrap_or(id.as_str()));
    }
    Ok(())
}

pub async fn releases(database_url: &str, name: &str, json: bool) -> Result<()> {
    let pool = relsync_db::create_pool(database_url).await?;
    let releases = PgReleaseRepo::new(pool).list_by_package(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&releases)?);
        return Ok(());
    }
    if releases.is_empty() {
        bail!("no releases recorded for {}", name);
    }
    for release in releases {
        println!(
            "{:<16} {:<10} {:<20} {}",
            release.version.as_str(),
            release.state.as_str(),
            release.reason.as_str(),
            release.tag
        );
    }
    Ok(())
}

pub async fn migrate(database_url: &str) -> Result<()> {
    let pool = relsync_db::create_pool(database_url).await?;
    relsync_db::run_migrations(&pool).await?;
    info!("Migrations applied");
    Ok(())
}
