use crate::utils::error::{Result, WedError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Dockerfile used by build-locked units regardless of architecture.
pub const CANONICAL_DOCKERFILE: &str = "Dockerfile";

/// One buildable and runnable artifact of a service.
///
/// Built through the validated conversion from
/// [`UnitSpec`](crate::config::invite::UnitSpec); never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    pub(crate) name: String,
    pub(crate) git_url: Option<String>,
    pub(crate) image_url: String,
    pub(crate) branch: Option<String>,
    pub(crate) default_image_tag: String,
    pub(crate) default_container_name: String,
    pub(crate) build_root: String,
    pub(crate) build_files: BTreeMap<String, String>,
    pub(crate) build_lock: bool,
    pub(crate) config: BTreeMap<String, String>,
    pub(crate) outside_port: Option<u16>,
    pub(crate) inside_port: Option<u16>,
}

impl UnitDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn git_url(&self) -> Option<&str> {
        self.git_url.as_deref()
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn default_image_tag(&self) -> &str {
        &self.default_image_tag
    }

    pub fn default_container_name(&self) -> &str {
        &self.default_container_name
    }

    pub fn build_root(&self) -> &str {
        &self.build_root
    }

    pub fn build_lock(&self) -> bool {
        self.build_lock
    }

    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.config
    }

    /// Units without a repository can only ever be pulled.
    pub fn is_buildable(&self) -> bool {
        self.git_url.is_some()
    }

    pub fn build_context(&self, build_context_root: &Path) -> PathBuf {
        build_context_root.join(&self.build_root)
    }

    /// Dockerfile for `architecture`, relative to the build context.
    pub fn resolve_dockerfile(&self, architecture: &str) -> Result<&str> {
        if self.build_lock {
            return Ok(CANONICAL_DOCKERFILE);
        }

        architecture_aliases(architecture)
            .iter()
            .find_map(|arch| self.build_files.get(*arch))
            .map(String::as_str)
            .ok_or_else(|| WedError::UnsupportedArchitecture {
                unit: self.name.clone(),
                architecture: architecture.to_string(),
            })
    }

    /// `(outside, inside)` when the unit publishes a port.
    pub fn port_binding(&self) -> Option<(u16, u16)> {
        match (self.outside_port, self.inside_port) {
            (Some(outside), Some(inside)) => Some((outside, inside)),
            _ => None,
        }
    }
}

/// Names the same CPU family may be keyed under in `build_files`.
fn architecture_aliases(architecture: &str) -> Vec<&str> {
    let mut names = vec![architecture];
    let family: &[&str] = match architecture {
        "x86_64" | "amd64" | "i386" => &["x86_64", "amd64", "i386"],
        "aarch64" | "arm64" | "arm" => &["aarch64", "arm64", "arm"],
        _ => &[],
    };
    names.extend(family.iter().copied().filter(|name| *name != architecture));
    names
}

pub fn current_architecture() -> String {
    std::env::consts::ARCH.to_string()
}

/// Which units of a manifest a command touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSelection {
    #[default]
    All,
    /// Dev mode: the primary services are run by the developer.
    InitOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Pull every image instead of building from source.
    pub remote: bool,
    pub architecture: String,
}

impl BuildSettings {
    pub fn new(remote: bool, architecture: impl Into<String>) -> Self {
        Self {
            remote,
            architecture: architecture.into(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self::new(false, current_architecture())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildOutcome {
    Pulled { unit: String, image: String },
    Built { unit: String, tag: String },
}

impl BuildOutcome {
    pub fn unit(&self) -> &str {
        match self {
            BuildOutcome::Pulled { unit, .. } | BuildOutcome::Built { unit, .. } => unit,
        }
    }
}

/// Result of a best-effort removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    Removed,
    Absent,
}

/// Summary of one plan command, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub affected: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>, started_at: DateTime<Utc>, affected: Vec<String>) -> Self {
        let elapsed = Utc::now().signed_duration_since(started_at);
        Self {
            command: command.into(),
            started_at,
            duration_ms: elapsed.num_milliseconds().max(0) as u64,
            affected,
        }
    }
}
