//! Sync configuration parsing.

use kdl::KdlDocument;
use relsync_core::job::JobConfig;
use relsync_core::package::RepoUrlFormat;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::node::{child_string, get_first_string_arg, get_first_u64_arg};
use crate::{ConfigError, ConfigResult};

const DEFAULT_PACKAGES_DIR: &str = "data/packages";
const DEFAULT_JOB_KEY: &str = "build-release";
const DEFAULT_DELAY_STEP_SECS: u64 = 60;

/// Process-wide settings for syncing packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Directory holding `<name>.kdl` package definitions.
    pub packages_dir: PathBuf,
    /// Form of the repository URL handed to `git ls-remote`.
    pub remote_format: RepoUrlFormat,
    pub build_release: BuildReleaseConfig,
}

/// Settings of the build-release jobs created by a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReleaseConfig {
    /// Prefix of every job id; the full id is `<key>:<release id>`.
    pub key: String,
    /// Offset between consecutive dispatches of one run.
    pub delay_step: Duration,
    pub job: JobConfig,
}

impl Default for BuildReleaseConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_JOB_KEY.to_string(),
            delay_step: Duration::from_secs(DEFAULT_DELAY_STEP_SECS),
            job: JobConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            packages_dir: PathBuf::from(DEFAULT_PACKAGES_DIR),
            remote_format: RepoUrlFormat::default(),
            build_release: BuildReleaseConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        parse_sync_config(&content)
    }
}

/// Parse the sync configuration from KDL text.
pub fn parse_sync_config(kdl: &str) -> ConfigResult<SyncConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = SyncConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "packages-dir" => {
                config.packages_dir = get_first_string_arg(node)
                    .map(PathBuf::from)
                    .ok_or_else(|| ConfigError::MissingField("packages-dir".to_string()))?;
            }
            "remote-format" => {
                let format = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("remote-format".to_string()))?;
                config.remote_format = format
                    .parse()
                    .map_err(|e: String| ConfigError::invalid("remote-format", e))?;
            }
            "build-release" => {
                if let Some(children) = node.children() {
                    config.build_release = parse_build_release(children)?;
                }
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_build_release(doc: &KdlDocument) -> ConfigResult<BuildReleaseConfig> {
    let mut build = BuildReleaseConfig::default();

    if let Some(key) = child_string(doc, "key") {
        if key.trim().is_empty() || key.contains(':') {
            return Err(ConfigError::invalid(
                "key",
                "must be non-empty and must not contain ':'",
            ));
        }
        build.key = key;
    }

    for node in doc.nodes() {
        match node.name().value() {
            "delay-step" => {
                build.delay_step = Duration::from_secs(get_first_u64_arg(node)?);
            }
            "attempts" => {
                let attempts = get_first_u64_arg(node)?;
                if attempts == 0 {
                    return Err(ConfigError::invalid("attempts", "must be at least 1"));
                }
                build.job.attempts = u32::try_from(attempts)
                    .map_err(|_| ConfigError::invalid("attempts", "too large"))?;
            }
            "backoff" => {
                build.job.backoff = Duration::from_secs(get_first_u64_arg(node)?);
            }
            "timeout" => {
                build.job.timeout = Some(Duration::from_secs(get_first_u64_arg(node)?));
            }
            _ => {}
        }
    }

    Ok(build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            packages-dir "/srv/registry/packages"
            remote-format "https"

            build-release {
                key "build-rel"
                delay-step 30
                attempts 5
                backoff 120
                timeout 1800
            }
        "#;

        let config = parse_sync_config(kdl).unwrap();
        assert_eq!(config.packages_dir, PathBuf::from("/srv/registry/packages"));
        assert_eq!(config.remote_format, RepoUrlFormat::Https);
        assert_eq!(config.build_release.key, "build-rel");
        assert_eq!(config.build_release.delay_step, Duration::from_secs(30));
        assert_eq!(config.build_release.job.attempts, 5);
        assert_eq!(config.build_release.job.backoff, Duration::from_secs(120));
        assert_eq!(config.build_release.job.timeout, Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_defaults_for_missing_nodes() {
        let config = parse_sync_config("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.build_release.key, "build-release");
        assert_eq!(config.build_release.delay_step, Duration::from_secs(60));
        assert_eq!(config.remote_format, RepoUrlFormat::Git);
    }

    #[test]
    fn test_partial_build_release_keeps_defaults() {
        let kdl = r#"
            build-release {
                delay-step 10
            }
        "#;

        let config = parse_sync_config(kdl).unwrap();
        assert_eq!(config.build_release.key, "build-release");
        assert_eq!(config.build_release.delay_step, Duration::from_secs(10));
        assert_eq!(config.build_release.job, JobConfig::default());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let kdl = r#"
            build-release {
                attempts 0
            }
        "#;

        let result = parse_sync_config(kdl);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_negative_delay() {
        let kdl = r#"
            build-release {
                delay-step -5
            }
        "#;

        let result = parse_sync_config(kdl);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_key_with_separator() {
        let kdl = r#"
            build-release {
                key "build:release"
            }
        "#;

        assert!(parse_sync_config(kdl).is_err());
    }

    #[test]
    fn test_rejects_unknown_remote_format() {
        let result = parse_sync_config(r#"remote-format "ftp""#);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_error() {
        let result = parse_sync_config("build-release {");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
