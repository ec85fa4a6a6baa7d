//! KDL configuration parsing for relsync.
//!
//! This crate handles parsing of:
//! - The sync configuration (relsync.kdl)
//! - Package definition files (`<packages-dir>/<name>.kdl`)

pub mod error;
mod node;
pub mod package;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use package::{FilePackageSource, parse_package};
pub use system::{BuildReleaseConfig, SyncConfig, parse_sync_config};
