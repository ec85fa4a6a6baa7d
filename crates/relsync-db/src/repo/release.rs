//! Release repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relsync_core::release::{NewRelease, Release, ReleaseStore};
use relsync_core::tag::Version;
use relsync_core::ResourceId;
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// A release row as stored in the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReleaseRecord {
    pub id: uuid::Uuid,
    pub package_name: String,
    pub version: String,
    pub commit_sha: String,
    pub tag: String,
    pub state: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ReleaseRecord> for Release {
    type Error = DbError;

    fn try_from(record: ReleaseRecord) -> DbResult<Self> {
        let version = Version::from_tag(&record.version).ok_or_else(|| {
            DbError::Corrupt(format!("release {} has version '{}'", record.id, record.version))
        })?;
        let state = record.state.parse().map_err(DbError::Corrupt)?;
        let reason = record.reason.parse().map_err(DbError::Corrupt)?;

        Ok(Release {
            id: ResourceId::from(record.id),
            package_name: record.package_name,
            version,
            commit: record.commit_sha,
            tag: record.tag,
            state,
            reason,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// PostgreSQL implementation of ReleaseStore.
pub struct PgReleaseRepo {
    pool: PgPool,
}

impl PgReleaseRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find(&self, package_name: &str, version: &Version) -> DbResult<Option<Release>> {
        let record = sqlx::query_as::<_, ReleaseRecord>(
            "SELECT * FROM releases WHERE package_name = $1 AND version = $2",
        )
        .bind(package_name)
        .bind(version.as_str())
        .fetch_optional(&self.pool)
        .await?;
        record.map(Release::try_from).transpose()
    }

    async fn insert(&self, release: NewRelease) -> DbResult<Release> {
        let record = sqlx::query_as::<_, ReleaseRecord>(
            r#"
            INSERT INTO releases (id, package_name, version, commit_sha, tag, state, reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', 'none', NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(&release.package_name)
        .bind(release.version.as_str())
        .bind(&release.commit)
        .bind(&release.tag)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DbError::from_insert(e, || {
                format!("release {}@{}", release.package_name, release.version)
            })
        })?;
        Release::try_from(record)
    }

    /// All releases of a package, oldest first.
    pub async fn list_by_package(&self, package_name: &str) -> DbResult<Vec<Release>> {
        let records = sqlx::query_as::<_, ReleaseRecord>(
            "SELECT * FROM releases WHERE package_name = $1 ORDER BY created_at",
        )
        .bind(package_name)
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(Release::try_from).collect()
    }
}

#[async_trait]
impl ReleaseStore for PgReleaseRepo {
    async fn fetch_one(
        &self,
        package_name: &str,
        version: &Version,
    ) -> relsync_core::Result<Option<Release>> {
        Ok(self.find(package_name, version).await?)
    }

    async fn create(&self, release: NewRelease) -> relsync_core::Result<Release> {
        Ok(self.insert(release).await?)
    }
}
