use crate::domain::model::{BuildOutcome, BuildSettings, Removal, UnitDescriptor};
use crate::domain::ports::{BuildRequest, ContainerEngine, RunRequest};
use crate::utils::error::Result;
use std::path::Path;

/// Pull/build and run/remove for exactly one unit.
#[derive(Debug, Clone)]
pub struct BuildRunner {
    unit: UnitDescriptor,
}

impl BuildRunner {
    pub fn new(unit: UnitDescriptor) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> &UnitDescriptor {
        &self.unit
    }

    pub fn name(&self) -> &str {
        self.unit.name()
    }

    pub async fn pull_image(&self, engine: &dyn ContainerEngine) -> Result<BuildOutcome> {
        tracing::debug!("📥 Pulling {} for {}", self.unit.image_url(), self.unit.name());
        engine.pull_image(self.unit.image_url()).await?;
        Ok(BuildOutcome::Pulled {
            unit: self.unit.name().to_string(),
            image: self.unit.image_url().to_string(),
        })
    }

    /// Builds from source, or pulls when the unit has no repository or the
    /// settings ask for remote images. Never both.
    pub async fn build_image(
        &self,
        engine: &dyn ContainerEngine,
        build_context_root: &Path,
        tag: Option<&str>,
        settings: &BuildSettings,
    ) -> Result<BuildOutcome> {
        if !self.unit.is_buildable() || settings.remote {
            return self.pull_image(engine).await;
        }

        let dockerfile = self.unit.resolve_dockerfile(&settings.architecture)?;
        let request = BuildRequest {
            context: self.unit.build_context(build_context_root),
            dockerfile: dockerfile.to_string(),
            tag: tag.unwrap_or(self.unit.default_image_tag()).to_string(),
        };

        tracing::debug!(
            "🔨 Building {} from {} ({}), source {}@{}",
            request.tag,
            request.context.display(),
            request.dockerfile,
            self.unit.git_url().unwrap_or_default(),
            self.unit.branch().unwrap_or("default")
        );
        engine.build_image(&request).await?;

        Ok(BuildOutcome::Built {
            unit: self.unit.name().to_string(),
            tag: request.tag,
        })
    }

    /// Starts a detached container. A second call with the same name fails
    /// at the engine with a name collision.
    pub async fn run_container(
        &self,
        engine: &dyn ContainerEngine,
        network_name: &str,
        remote: bool,
    ) -> Result<String> {
        let image = if remote {
            self.unit.image_url()
        } else {
            self.unit.default_image_tag()
        };

        let request = RunRequest {
            image: image.to_string(),
            name: self.unit.default_container_name().to_string(),
            network: network_name.to_string(),
            environment: self.unit.config().clone(),
            port: self.unit.port_binding(),
        };

        let id = engine.run_container(&request).await?;
        tracing::info!(
            "▶️ Started {} ({}) on {}",
            request.name,
            request.image,
            network_name
        );
        Ok(id)
    }

    pub async fn delete_container(&self, engine: &dyn ContainerEngine) -> Result<Removal> {
        let name = self.unit.default_container_name();
        let Some(container) = engine.find_container(name).await? else {
            tracing::warn!("Container {} not found, nothing to delete", name);
            return Ok(Removal::Absent);
        };

        match engine.remove_container(&container.id, true).await {
            Ok(()) => {
                tracing::info!("🗑️ {} destroyed successfully", name);
                Ok(Removal::Removed)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Container {} disappeared before removal", name);
                Ok(Removal::Absent)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete_image(&self, engine: &dyn ContainerEngine) -> Result<Removal> {
        let tag = self.unit.default_image_tag();
        match engine.remove_image(tag, true).await {
            Ok(()) => {
                tracing::info!("🗑️ Image {} deleted successfully", tag);
                Ok(Removal::Removed)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("Image {} not found, nothing to delete", tag);
                Ok(Removal::Absent)
            }
            Err(e) => Err(e),
        }
    }
}

impl From<UnitDescriptor> for BuildRunner {
    fn from(unit: UnitDescriptor) -> Self {
        Self::new(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{EngineCall, InMemoryEngine};
    use crate::config::invite::UnitSpec;

    fn runner(git_url: Option<&str>) -> BuildRunner {
        let spec = UnitSpec {
            name: Some("worker".to_string()),
            git_url: git_url.map(str::to_string),
            image_url: Some("org/worker:1".to_string()),
            default_image_tag: Some("worker:local".to_string()),
            default_container_name: Some("worker".to_string()),
            build_lock: Some(true),
            ..Default::default()
        };
        BuildRunner::new(UnitDescriptor::try_from(spec).unwrap())
    }

    #[tokio::test]
    async fn test_unit_without_repository_is_always_pulled() {
        for remote in [false, true] {
            let engine = InMemoryEngine::new();
            let settings = BuildSettings::new(remote, "x86_64");

            let outcome = runner(None)
                .build_image(&engine, Path::new("/src"), None, &settings)
                .await
                .unwrap();

            assert!(matches!(outcome, BuildOutcome::Pulled { .. }));
            assert_eq!(
                engine.calls(),
                vec![EngineCall::Pull {
                    image: "org/worker:1".to_string()
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_explicit_tag_overrides_default() {
        let engine = InMemoryEngine::new();
        let outcome = runner(Some("https://github.com/org/worker.git"))
            .build_image(&engine, Path::new("/src"), Some("worker:ci"), &BuildSettings::default())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            BuildOutcome::Built {
                unit: "worker".to_string(),
                tag: "worker:ci".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_deleting_absent_resources() {
        let engine = InMemoryEngine::new();
        let worker = runner(None);

        assert_eq!(worker.delete_container(&engine).await.unwrap(), Removal::Absent);
        assert_eq!(worker.delete_image(&engine).await.unwrap(), Removal::Absent);
    }
}
