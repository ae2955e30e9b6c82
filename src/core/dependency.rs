use crate::config::invite::INVITE_FILE_NAME;
use crate::config::plan::AttendeeConfig;
use crate::core::invite::ServiceManifest;
use crate::domain::ports::SourceFetcher;
use crate::utils::error::{Result, WedError};
use std::path::{Path, PathBuf};

/// An external service repository listed in the seating plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub name: String,
    pub default_image_name: String,
    pub git_url: Option<String>,
    pub branch: Option<String>,
    pub image_url: Option<String>,
}

/// What [`DependencyDescriptor::clone_repo`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneStatus {
    /// Image-only dependency, nothing to fetch.
    Skipped,
    Cloned { path: PathBuf, branch: Option<String> },
}

impl DependencyDescriptor {
    pub fn source_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }

    /// `<root>/<name>/wedding_invite.yml`
    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        self.source_dir(root).join(INVITE_FILE_NAME)
    }

    /// Fresh checkout into `<root>/<name>`; any previous clone is removed first.
    pub async fn clone_repo(&self, fetcher: &dyn SourceFetcher, root: &Path) -> Result<CloneStatus> {
        let Some(git_url) = &self.git_url else {
            tracing::debug!("{} has no git_url, skipping clone", self.name);
            return Ok(CloneStatus::Skipped);
        };

        let clone_path = self.source_dir(root);
        if tokio::fs::try_exists(&clone_path).await? {
            tracing::debug!("Removing previous clone at {}", clone_path.display());
            tokio::fs::remove_dir_all(&clone_path).await?;
        }
        tokio::fs::create_dir_all(root).await?;

        let output = fetcher.clone_repo(git_url, &clone_path).await?;
        if !output.success {
            return Err(WedError::FetchError {
                dependency: self.name.clone(),
                step: "clone".to_string(),
                stderr: output.stderr,
            });
        }
        tracing::info!("✅ Successfully cloned {} to {}", self.name, root.display());

        if let Some(branch) = &self.branch {
            let output = fetcher.checkout(&clone_path, branch).await?;
            if !output.success {
                return Err(WedError::FetchError {
                    dependency: self.name.clone(),
                    step: format!("checkout {}", branch),
                    stderr: output.stderr,
                });
            }
            tracing::info!("✅ Successfully checked out {} branch for {}", branch, self.name);
        }

        Ok(CloneStatus::Cloned {
            path: clone_path,
            branch: self.branch.clone(),
        })
    }

    pub fn get_manifest(&self, root: &Path) -> Result<ServiceManifest> {
        ServiceManifest::from_file(self.manifest_path(root))
    }
}

impl From<AttendeeConfig> for DependencyDescriptor {
    fn from(attendee: AttendeeConfig) -> Self {
        Self {
            name: attendee.name,
            default_image_name: attendee.default_image_name,
            git_url: attendee.git_url,
            branch: attendee.branch,
            image_url: attendee.image_url,
        }
    }
}
