//! Sync errors.

use thiserror::Error;

/// Pipeline stage a sync was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    LoadPackage,
    ListTags,
    Reconcile,
    Schedule,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStage::LoadPackage => write!(f, "loading package"),
            SyncStage::ListTags => write!(f, "listing remote tags"),
            SyncStage::Reconcile => write!(f, "updating release records"),
            SyncStage::Schedule => write!(f, "adding release jobs"),
        }
    }
}

/// A failed package sync. Work completed by earlier stages is kept.
#[derive(Debug, Error)]
#[error("sync of {package} failed while {stage}: {source}")]
pub struct SyncError {
    pub package: String,
    pub stage: SyncStage,
    #[source]
    pub source: relsync_core::Error,
}

impl SyncError {
    pub fn new(package: &str, stage: SyncStage, source: relsync_core::Error) -> Self {
        Self {
            package: package.to_string(),
            stage,
            source,
        }
    }

    /// Failure category reported in logs: `input`, `upstream`, `persistence` or `internal`.
    pub fn category(&self) -> &'static str {
        match &self.source {
            e if e.is_input_error() => "input",
            e if e.is_persistence_error() => "persistence",
            relsync_core::Error::Upstream(_) => "upstream",
            _ => "internal",
        }
    }

    /// Whether anything may have been written before the failure.
    pub fn may_have_partial_effects(&self) -> bool {
        matches!(self.stage, SyncStage::Reconcile | SyncStage::Schedule)
    }
}
