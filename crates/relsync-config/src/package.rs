//! Package definition files.

use async_trait::async_trait;
use kdl::KdlDocument;
use relsync_core::package::{PackageDefinition, PackageSource, RepoUrl};
use relsync_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::node::{child_string, get_all_string_args, required_child_string};
use crate::{ConfigError, ConfigResult};

const PACKAGE_EXTENSION: &str = "kdl";

/// Parse a package definition from KDL text.
pub fn parse_package(kdl: &str) -> ConfigResult<PackageDefinition> {
    let doc: KdlDocument = kdl.parse()?;

    let name = required_child_string(&doc, "name")?;
    let repo_url = required_child_string(&doc, "repo-url")?;
    RepoUrl::parse(&repo_url).map_err(|e| ConfigError::invalid("repo-url", e.to_string()))?;

    let topics = doc.get("topics").map(get_all_string_args).unwrap_or_default();

    Ok(PackageDefinition {
        name,
        repo_url,
        display_name: child_string(&doc, "display-name"),
        description: child_string(&doc, "description"),
        license_spdx_id: child_string(&doc, "license"),
        hunter: child_string(&doc, "hunter").filter(|h| !h.is_empty()),
        topics,
    })
}

/// Loads package definitions from `<dir>/<name>.kdl`.
#[derive(Debug, Clone)]
pub struct FilePackageSource {
    dir: PathBuf,
}

impl FilePackageSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        if !valid {
            return Err(Error::InvalidInput(format!("invalid package name: {}", name)));
        }
        Ok(self.dir.join(format!("{}.{}", name, PACKAGE_EXTENSION)))
    }

    /// Names of all packages with a definition file, sorted.
    pub async fn list_names(&self) -> ConfigResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PACKAGE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl PackageSource for FilePackageSource {
    async fn load(&self, name: &str) -> Result<PackageDefinition> {
        let path = self.path_for(name)?;
        debug!(path = %path.display(), "Reading package definition");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::PackageNotFound(name.to_string()));
            }
            Err(e) => return Err(ConfigError::Io(e).into()),
        };

        let package = parse_package(&content).map_err(|e| {
            Error::InvalidInput(format!("{}: {}", path.display(), e))
        })?;

        if package.name != name {
            return Err(Error::InvalidInput(format!(
                "{} declares package '{}'",
                path.display(),
                package.name
            )));
        }

        Ok(package)
    }
}
