//! Remote tag listing through the git CLI.

use async_trait::async_trait;
use relsync_core::tag::{RemoteTag, TagLister};
use relsync_core::{Error, Result};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

const TAG_REF_PREFIX: &str = "refs/tags/";
const PEELED_SUFFIX: &str = "^{}";

/// Lists tags with `git ls-remote --tags`.
#[derive(Debug, Clone)]
pub struct GitTagLister {
    program: String,
}

impl Default for GitTagLister {
    fn default() -> Self {
        Self::new()
    }
}

impl GitTagLister {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a specific git binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// Parse `git ls-remote --tags` output into tags, in first-appearance order.
///
/// Annotated tags appear twice: once for the tag object and once peeled
/// (`<name>^{}`). The peeled line carries the commit, so it replaces the
/// object id of the earlier line.
pub fn parse_ls_remote(output: &str) -> Vec<RemoteTag> {
    let mut tags: Vec<RemoteTag> = Vec::new();
    // Tag name -> position in `tags`.
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(sha), Some(reference)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Some(name) = reference.strip_prefix(TAG_REF_PREFIX) else {
            continue;
        };
        let (name, peeled) = match name.strip_suffix(PEELED_SUFFIX) {
            Some(name) => (name, true),
            None => (name, false),
        };

        match index.get(name).copied() {
            Some(i) if peeled => tags[i].commit = sha.to_string(),
            Some(_) => {}
            None => {
                index.insert(name.to_string(), tags.len());
                tags.push(RemoteTag::new(name, sha));
            }
        }
    }

    tags
}

#[async_trait]
impl TagLister for GitTagLister {
    async fn list_tags(&self, repo_url: &str) -> Result<Vec<RemoteTag>> {
        debug!(repo_url = %repo_url, "Running git ls-remote");

        let output = Command::new(&self.program)
            .args(["ls-remote", "--tags", repo_url])
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Upstream(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(repo_url = %repo_url, status = %output.status, "git ls-remote failed");
            return Err(Error::Upstream(format!(
                "git ls-remote {}: {}",
                repo_url,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ls_remote(&stdout))
    }
}
