//! Release reconciliation and build job scheduling for relsync.
//!
//! A package sync runs as one sequential pipeline:
//! load package -> list remote tags -> normalize -> reconcile releases -> schedule jobs.
//! No stage holds state of its own; the release store and job queue are the
//! only persistent state, and re-running a sync is always safe.

pub mod dispatch;
pub mod error;
pub mod git;
pub mod memory;
pub mod orchestrator;
pub mod queue;
pub mod reconcile;

pub use dispatch::{DispatchReport, DispatchedJob, ReleaseJobScheduler, SkipReason, SkippedRelease};
pub use error::{SyncError, SyncStage};
pub use git::GitTagLister;
pub use memory::{InMemoryJobQueue, InMemoryReleaseStore};
pub use orchestrator::{PackageSyncOrchestrator, SyncReport};
pub use queue::PgJobQueue;
pub use reconcile::ReleaseReconciler;
