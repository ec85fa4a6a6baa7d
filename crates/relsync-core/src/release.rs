//! Release records: one per package version intended for build.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::Version;
use crate::{ResourceId, Result};

/// Build state of a release. Owned by the build pipeline; the sync only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    #[default]
    Pending,
    Building,
    Succeeded,
    Failed,
}

impl ReleaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseState::Pending => "pending",
            ReleaseState::Building => "building",
            ReleaseState::Succeeded => "succeeded",
            ReleaseState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleaseState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReleaseState::Pending),
            "building" => Ok(ReleaseState::Building),
            "succeeded" => Ok(ReleaseState::Succeeded),
            "failed" => Ok(ReleaseState::Failed),
            _ => Err(format!("Unknown release state: {}", s)),
        }
    }
}

/// Classification of a failed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    #[default]
    None,
    BadRequest,
    Unauthorized,
    Forbidden,
    EntityNotFound,
    Conflict,
    InternalError,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    PackageNameNotMatch,
    VersionNotMatch,
    PackageJsonMissing,
    BuildTimeout,
    BuildCancellation,
    QueueTimeout,
}

/// Reasons for which rebuilding a failed release is worthwhile.
pub const RETRYABLE_REASONS: &[ReleaseReason] = &[
    ReleaseReason::InternalError,
    ReleaseReason::BadGateway,
    ReleaseReason::ServiceUnavailable,
    ReleaseReason::GatewayTimeout,
    ReleaseReason::BuildTimeout,
    ReleaseReason::BuildCancellation,
    ReleaseReason::QueueTimeout,
];

impl ReleaseReason {
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_REASONS.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::None => "none",
            ReleaseReason::BadRequest => "bad_request",
            ReleaseReason::Unauthorized => "unauthorized",
            ReleaseReason::Forbidden => "forbidden",
            ReleaseReason::EntityNotFound => "entity_not_found",
            ReleaseReason::Conflict => "conflict",
            ReleaseReason::InternalError => "internal_error",
            ReleaseReason::BadGateway => "bad_gateway",
            ReleaseReason::ServiceUnavailable => "service_unavailable",
            ReleaseReason::GatewayTimeout => "gateway_timeout",
            ReleaseReason::PackageNameNotMatch => "package_name_not_match",
            ReleaseReason::VersionNotMatch => "version_not_match",
            ReleaseReason::PackageJsonMissing => "package_json_missing",
            ReleaseReason::BuildTimeout => "build_timeout",
            ReleaseReason::BuildCancellation => "build_cancellation",
            ReleaseReason::QueueTimeout => "queue_timeout",
        }
    }
}

impl std::fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleaseReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let reason = match s {
            "none" => ReleaseReason::None,
            "bad_request" => ReleaseReason::BadRequest,
            "unauthorized" => ReleaseReason::Unauthorized,
            "forbidden" => ReleaseReason::Forbidden,
            "entity_not_found" => ReleaseReason::EntityNotFound,
            "conflict" => ReleaseReason::Conflict,
            "internal_error" => ReleaseReason::InternalError,
            "bad_gateway" => ReleaseReason::BadGateway,
            "service_unavailable" => ReleaseReason::ServiceUnavailable,
            "gateway_timeout" => ReleaseReason::GatewayTimeout,
            "package_name_not_match" => ReleaseReason::PackageNameNotMatch,
            "version_not_match" => ReleaseReason::VersionNotMatch,
            "package_json_missing" => ReleaseReason::PackageJsonMissing,
            "build_timeout" => ReleaseReason::BuildTimeout,
            "build_cancellation" => ReleaseReason::BuildCancellation,
            "queue_timeout" => ReleaseReason::QueueTimeout,
            _ => return Err(format!("Unknown release reason: {}", s)),
        };
        Ok(reason)
    }
}

/// A persisted release, unique per `(package_name, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: ResourceId,
    pub package_name: String,
    pub version: Version,
    /// Commit the tag pointed at when the release was first recorded.
    pub commit: String,
    pub tag: String,
    pub state: ReleaseState,
    pub reason: ReleaseReason,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Release {
    /// Whether the build pipeline gave up on this release for good.
    pub fn is_failed_permanently(&self) -> bool {
        self.state == ReleaseState::Failed && !self.reason.is_retryable()
    }
}

/// Fields supplied when recording a new release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease {
    pub package_name: String,
    pub version: Version,
    pub commit: String,
    pub tag: String,
}

/// Durable store of release records.
///
/// `create` must reject a second record for an existing
/// `(package_name, version)` with [`crate::Error::Conflict`].
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    async fn fetch_one(&self, package_name: &str, version: &Version) -> Result<Option<Release>>;
    async fn create(&self, release: NewRelease) -> Result<Release>;
}
