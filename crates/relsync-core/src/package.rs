//! Package definitions and repository URLs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

const DEFAULT_HOST: &str = "github.com";
const ANONYMOUS_HUNTER: &str = "anonymous";

// Full names of the SPDX licenses packages commonly declare.
const SPDX_LICENSE_NAMES: &[(&str, &str)] = &[
    ("0BSD", "BSD Zero Clause License"),
    ("AGPL-3.0-only", "GNU Affero General Public License v3.0 only"),
    ("AGPL-3.0-or-later", "GNU Affero General Public License v3.0 or later"),
    ("Apache-2.0", "Apache License 2.0"),
    ("BSD-2-Clause", "BSD 2-Clause \"Simplified\" License"),
    ("BSD-3-Clause", "BSD 3-Clause \"New\" or \"Revised\" License"),
    ("BSL-1.0", "Boost Software License 1.0"),
    ("CC0-1.0", "Creative Commons Zero v1.0 Universal"),
    ("CC-BY-4.0", "Creative Commons Attribution 4.0 International"),
    ("CC-BY-SA-4.0", "Creative Commons Attribution Share Alike 4.0 International"),
    ("GPL-2.0-only", "GNU General Public License v2.0 only"),
    ("GPL-2.0-or-later", "GNU General Public License v2.0 or later"),
    ("GPL-3.0-only", "GNU General Public License v3.0 only"),
    ("GPL-3.0-or-later", "GNU General Public License v3.0 or later"),
    ("ISC", "ISC License"),
    ("LGPL-2.1-only", "GNU Lesser General Public License v2.1 only"),
    ("LGPL-2.1-or-later", "GNU Lesser General Public License v2.1 or later"),
    ("LGPL-3.0-only", "GNU Lesser General Public License v3.0 only"),
    ("LGPL-3.0-or-later", "GNU Lesser General Public License v3.0 or later"),
    ("MIT", "MIT License"),
    ("MPL-2.0", "Mozilla Public License 2.0"),
    ("Unlicense", "The Unlicense"),
    ("Zlib", "zlib License"),
];

/// Which clone URL form to hand to git.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoUrlFormat {
    /// `git@host:owner/repo.git`
    #[default]
    Git,
    /// `https://host/owner/repo`
    Https,
}

impl std::str::FromStr for RepoUrlFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "git" | "ssh" => Ok(RepoUrlFormat::Git),
            "https" => Ok(RepoUrlFormat::Https),
            _ => Err(format!("Unknown repository url format: {}", s)),
        }
    }
}

/// A repository location reduced to host, owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoUrl {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepoUrl {
    /// Parse the URL forms people paste into package files:
    /// `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo.git`,
    /// `git@host:owner/repo.git` and the `owner/repo` shorthand.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidRepoUrl(input.to_string());
        let trimmed = input.trim().trim_end_matches('/');

        let (host, path) = if trimmed.contains("://") {
            let url = Url::parse(trimmed).map_err(|_| invalid())?;
            let host = url.host_str().ok_or_else(invalid)?.to_string();
            (host, url.path().trim_start_matches('/').to_string())
        } else if let Some((user_host, path)) = trimmed.split_once(':') {
            // scp-like syntax
            let host = user_host.rsplit('@').next().unwrap_or(user_host);
            (host.to_string(), path.to_string())
        } else {
            match trimmed.split_once('/') {
                // `host/owner/repo` without a scheme
                Some((host, rest))
                    if host.contains('.') && rest.split('/').filter(|s| !s.is_empty()).count() >= 2 =>
                {
                    (host.to_string(), rest.to_string())
                }
                _ => (DEFAULT_HOST.to_string(), trimmed.to_string()),
            }
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next().ok_or_else(invalid)?;
        let name = segments.next().ok_or_else(invalid)?;
        let name = name.strip_suffix(".git").unwrap_or(name);

        if host.is_empty() || !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_lowercase(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn to_git(&self) -> String {
        format!("git@{}:{}/{}.git", self.host, self.owner, self.name)
    }

    pub fn to_https(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.name)
    }

    pub fn format(&self, format: RepoUrlFormat) -> String {
        match format {
            RepoUrlFormat::Git => self.to_git(),
            RepoUrlFormat::Https => self.to_https(),
        }
    }

    pub fn owner_url(&self) -> String {
        format!("https://{}/{}", self.host, self.owner)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// A package as declared in its definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDefinition {
    pub name: String,
    pub repo_url: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub license_spdx_id: Option<String>,
    /// Who submitted the package; `None` means anonymous.
    pub hunter: Option<String>,
    pub topics: Vec<String>,
}

impl PackageDefinition {
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_url: repo_url.into(),
            display_name: None,
            description: None,
            license_spdx_id: None,
            hunter: None,
            topics: Vec::new(),
        }
    }

    pub fn repo(&self) -> Result<RepoUrl> {
        RepoUrl::parse(&self.repo_url)
    }

    pub fn owner(&self) -> Result<String> {
        Ok(self.repo()?.owner)
    }

    pub fn owner_url(&self) -> Result<String> {
        Ok(self.repo()?.owner_url())
    }

    pub fn hunter(&self) -> &str {
        self.hunter.as_deref().unwrap_or(ANONYMOUS_HUNTER)
    }

    /// Full name of the declared license, when it is a known SPDX identifier.
    pub fn license_name(&self) -> Option<&'static str> {
        let id = self.license_spdx_id.as_deref()?;
        SPDX_LICENSE_NAMES
            .iter()
            .find(|(spdx_id, _)| *spdx_id == id)
            .map(|(_, name)| *name)
    }

    /// Profile URL of the hunter on the repository host, if one is named.
    pub fn hunter_url(&self) -> Result<Option<String>> {
        let Some(hunter) = &self.hunter else {
            return Ok(None);
        };
        let repo = self.repo()?;
        Ok(Some(format!("https://{}/{}", repo.host, hunter)))
    }
}

/// Source of package definitions.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Load a package by name, failing with [`Error::PackageNotFound`] if absent.
    async fn load(&self, name: &str) -> Result<PackageDefinition>;
}
