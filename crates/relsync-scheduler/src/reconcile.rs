//! Release reconciliation: one release record per normalized tag.

use relsync_core::Result;
use relsync_core::release::{NewRelease, Release, ReleaseStore};
use relsync_core::tag::VersionedTag;
use std::sync::Arc;
use tracing::{debug, info};

/// Ensures a release record exists for every normalized tag of a package.
pub struct ReleaseReconciler {
    store: Arc<dyn ReleaseStore>,
}

impl ReleaseReconciler {
    pub fn new(store: Arc<dyn ReleaseStore>) -> Self {
        Self { store }
    }

    /// Look up or create the release of each tag, in tag order.
    ///
    /// Existing records are returned unchanged, even if the tag now points at
    /// another commit. The first store failure aborts the run; records created
    /// before it stay, and a re-run picks them up through the lookup.
    pub async fn reconcile(&self, package_name: &str, tags: &[VersionedTag]) -> Result<Vec<Release>> {
        let mut releases = Vec::with_capacity(tags.len());

        for tag in tags {
            let release = match self.store.fetch_one(package_name, &tag.version).await? {
                Some(existing) => {
                    debug!(package = %package_name, version = %tag.version, release_id = %existing.id, "Release exists");
                    existing
                }
                None => {
                    let created = self
                        .store
                        .create(NewRelease {
                            package_name: package_name.to_string(),
                            version: tag.version.clone(),
                            commit: tag.remote.commit.clone(),
                            tag: tag.remote.tag.clone(),
                        })
                        .await?;
                    info!(package = %package_name, version = %created.version, release_id = %created.id, "Created release");
                    created
                }
            };
            releases.push(release);
        }

        Ok(releases)
    }
}
