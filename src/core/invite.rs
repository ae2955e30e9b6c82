use crate::config::document::{parse_document, read_document, DocumentFormat};
use crate::config::invite::InviteFile;
use crate::core::build::BuildRunner;
use crate::core::scheduler::{run_bounded, DEFAULT_BUILD_CONCURRENCY};
use crate::domain::model::{BuildOutcome, BuildSettings, Removal, UnitDescriptor, UnitSelection};
use crate::domain::ports::{ContainerEngine, ReadinessGate};
use crate::utils::error::{BuildFailures, Result, WedError};
use crate::utils::validation::validate_required_field;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Options for [`ServiceManifest::run_containers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run from the remote image reference instead of the local tag.
    pub remote: bool,
    pub selection: UnitSelection,
}

/// A service's wedding invite: its primary units, its run-once init units
/// and the package they belong to.
#[derive(Debug, Clone)]
pub struct ServiceManifest {
    package_name: String,
    builds: Vec<BuildRunner>,
    init_builds: Vec<BuildRunner>,
    build_concurrency: usize,
}

impl ServiceManifest {
    pub fn new(
        package_name: impl Into<String>,
        builds: Vec<UnitDescriptor>,
        init_builds: Vec<UnitDescriptor>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            builds: builds.into_iter().map(BuildRunner::new).collect(),
            init_builds: init_builds.into_iter().map(BuildRunner::new).collect(),
            build_concurrency: DEFAULT_BUILD_CONCURRENCY,
        }
    }

    /// Reads an invite, mapping a missing or unparsable file to
    /// [`WedError::ManifestNotFound`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(WedError::ManifestNotFound {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let file: InviteFile = read_document(path).map_err(|e| manifest_error(path, e))?;
        Self::try_from(file)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: InviteFile = parse_document(content, DocumentFormat::Yaml)
            .map_err(|e| manifest_error(Path::new("<inline>"), e))?;
        Self::try_from(file)
    }

    pub fn with_build_concurrency(mut self, concurrency: usize) -> Self {
        self.build_concurrency = concurrency.max(1);
        self
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn builds(&self) -> &[BuildRunner] {
        &self.builds
    }

    pub fn init_builds(&self) -> &[BuildRunner] {
        &self.init_builds
    }

    pub fn build_concurrency(&self) -> usize {
        self.build_concurrency
    }

    fn selected(&self, selection: UnitSelection) -> impl Iterator<Item = &BuildRunner> {
        let primary: &[BuildRunner] = match selection {
            UnitSelection::All => &self.builds,
            UnitSelection::InitOnly => &[],
        };
        primary.iter().chain(self.init_builds.iter())
    }

    /// Builds (or pulls) every selected unit on the bounded pool. All jobs run
    /// to completion; failures are reported together afterwards.
    pub async fn build_images(
        &self,
        engine: Arc<dyn ContainerEngine>,
        build_context_root: &Path,
        settings: &BuildSettings,
        selection: UnitSelection,
    ) -> Result<Vec<BuildOutcome>> {
        let start = Instant::now();
        let jobs: Vec<_> = self
            .selected(selection)
            .map(|runner| {
                let runner = runner.clone();
                let engine = Arc::clone(&engine);
                let root = build_context_root.to_path_buf();
                let settings = settings.clone();
                let label = runner.name().to_string();
                let job = async move {
                    runner
                        .build_image(engine.as_ref(), &root, None, &settings)
                        .await
                };
                (label, job)
            })
            .collect();

        let total = jobs.len();
        tracing::info!(
            "📦 {} builds: {} unit(s), {} at a time",
            self.package_name,
            total,
            self.build_concurrency
        );

        let results = run_bounded(self.build_concurrency, jobs).await;

        if !results.failed.is_empty() {
            return Err(WedError::BuildsFailed {
                package: self.package_name.clone(),
                total,
                failures: BuildFailures(results.failed),
            });
        }

        tracing::info!(
            "✅ {} builds finished in {:?}",
            self.package_name,
            start.elapsed()
        );
        Ok(results.succeeded)
    }

    /// Primary units in order, then the readiness gate, then init units in
    /// order. The gate runs even when no primary unit is selected.
    pub async fn run_containers(
        &self,
        engine: &dyn ContainerEngine,
        network_name: &str,
        gate: &dyn ReadinessGate,
        options: RunOptions,
    ) -> Result<Vec<String>> {
        let mut started = Vec::new();

        if options.selection == UnitSelection::All {
            tracing::info!(
                "{} running {} container(s)",
                self.package_name,
                self.builds.len()
            );
            for runner in &self.builds {
                runner
                    .run_container(engine, network_name, options.remote)
                    .await?;
                started.push(runner.unit().default_container_name().to_string());
            }
        }

        gate.wait(&self.package_name).await;

        tracing::info!(
            "{} running {} init container(s)",
            self.package_name,
            self.init_builds.len()
        );
        for runner in &self.init_builds {
            runner
                .run_container(engine, network_name, options.remote)
                .await?;
            started.push(runner.unit().default_container_name().to_string());
        }

        Ok(started)
    }

    pub async fn destroy_init_containers(&self, engine: &dyn ContainerEngine) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for runner in &self.init_builds {
            if runner.delete_container(engine).await? == Removal::Removed {
                removed.push(runner.unit().default_container_name().to_string());
            }
        }
        Ok(removed)
    }

    /// One image deletion per unit, primary then init; missing images are skipped.
    pub async fn wipe_images(&self, engine: &dyn ContainerEngine) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for runner in self.builds.iter().chain(self.init_builds.iter()) {
            if runner.delete_image(engine).await? == Removal::Removed {
                removed.push(runner.unit().default_image_tag().to_string());
            }
        }
        Ok(removed)
    }
}

impl TryFrom<InviteFile> for ServiceManifest {
    type Error = WedError;

    fn try_from(file: InviteFile) -> Result<Self> {
        let package_name = validate_required_field("package_name", &file.package_name)?.clone();

        let builds = file
            .builds
            .into_iter()
            .map(UnitDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;
        let init_builds = file
            .init_builds
            .into_iter()
            .map(UnitDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(package_name, builds, init_builds))
    }
}

fn manifest_error(path: &Path, err: WedError) -> WedError {
    match err {
        WedError::IoError(e) => WedError::ManifestNotFound {
            path: PathBuf::from(path),
            reason: e.to_string(),
        },
        WedError::YamlError(e) => WedError::ManifestNotFound {
            path: PathBuf::from(path),
            reason: format!("malformed invite: {}", e),
        },
        WedError::TomlError(e) => WedError::ManifestNotFound {
            path: PathBuf::from(path),
            reason: format!("malformed invite: {}", e),
        },
        other => other,
    }
}
