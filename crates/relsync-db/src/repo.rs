//! Repository implementations.

pub mod release;

pub use release::{PgReleaseRepo, ReleaseRecord};
