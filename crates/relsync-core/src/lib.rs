//! Core domain types and traits for relsync.
//!
//! This crate contains:
//! - Resource identifiers and the shared error type
//! - Remote tags, semantic versions and tag normalization
//! - Release records and the release store trait
//! - Dispatch jobs and the job queue trait
//! - Package definitions, repository URLs and the collaborator traits
//!   used to load packages and list remote tags

pub mod error;
pub mod id;
pub mod job;
pub mod package;
pub mod release;
pub mod tag;

pub use error::{Error, Result};
pub use id::ResourceId;
