use crate::config::invite::INVITE_FILE_NAME;
use crate::config::plan::PlanConfig;
use crate::core::dependency::{CloneStatus, DependencyDescriptor};
use crate::core::invite::{RunOptions, ServiceManifest};
use crate::core::scheduler::DEFAULT_BUILD_CONCURRENCY;
use crate::domain::model::{
    current_architecture, BuildOutcome, BuildSettings, CommandReport, UnitSelection,
};
use crate::domain::ports::{ContainerEngine, NetworkInfo, ReadinessGate, SettleDelay, SourceFetcher};
use crate::utils::error::{Result, WedError};
use crate::utils::validation::Validate;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallFailure {
    pub dependency: String,
    pub message: String,
}

/// Per-dependency results of [`OrchestrationPlan::install`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub cloned: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<InstallFailure>,
}

impl InstallReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(WedError::InstallFailed {
                dependencies: self.failures.into_iter().map(|f| f.dependency).collect(),
            })
        }
    }
}

/// The seating plan: every dependency, the local service and the shared
/// network they meet on.
pub struct OrchestrationPlan {
    network_name: String,
    venue_path: PathBuf,
    post_office_path: Option<PathBuf>,
    project_root: PathBuf,
    dependencies: Vec<DependencyDescriptor>,
    local_manifest: Option<ServiceManifest>,
    engine: Arc<dyn ContainerEngine>,
    fetcher: Arc<dyn SourceFetcher>,
    gate: Arc<dyn ReadinessGate>,
    build_concurrency: usize,
    architecture: String,
}

impl OrchestrationPlan {
    pub fn new(
        config: PlanConfig,
        project_root: impl Into<PathBuf>,
        engine: Arc<dyn ContainerEngine>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Result<Self> {
        config.validate()?;

        let project_root = project_root.into();
        let venue_path = project_root.join(&config.venue);
        let post_office_path = config.post_office.as_ref().map(|p| project_root.join(p));

        Ok(Self {
            network_name: config.network_name,
            venue_path,
            post_office_path,
            project_root,
            dependencies: config.attendees.into_iter().map(Into::into).collect(),
            local_manifest: None,
            engine,
            fetcher,
            gate: Arc::new(SettleDelay::default()),
            build_concurrency: DEFAULT_BUILD_CONCURRENCY,
            architecture: current_architecture(),
        })
    }

    /// Loads `plan_path` and, when present, the local invite at `invite_path`.
    pub fn load(
        project_root: impl Into<PathBuf>,
        plan_path: &Path,
        invite_path: &Path,
        engine: Arc<dyn ContainerEngine>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Result<Self> {
        let config = PlanConfig::from_file(plan_path)?;
        let plan = Self::new(config, project_root, engine, fetcher)?;

        let local_manifest = if invite_path.is_file() {
            Some(ServiceManifest::from_file(invite_path)?)
        } else {
            tracing::info!(
                "No local {} at {}, orchestrating dependencies only",
                INVITE_FILE_NAME,
                invite_path.display()
            );
            None
        };

        Ok(plan.with_local_manifest(local_manifest))
    }

    pub fn with_local_manifest(mut self, manifest: Option<ServiceManifest>) -> Self {
        self.local_manifest = manifest;
        self
    }

    pub fn with_readiness_gate(mut self, gate: Arc<dyn ReadinessGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_build_concurrency(mut self, concurrency: usize) -> Self {
        self.build_concurrency = concurrency.max(1);
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn venue_path(&self) -> &Path {
        &self.venue_path
    }

    pub fn post_office_path(&self) -> Option<&Path> {
        self.post_office_path.as_deref()
    }

    pub fn dependencies(&self) -> &[DependencyDescriptor] {
        &self.dependencies
    }

    pub fn local_manifest(&self) -> Option<&ServiceManifest> {
        self.local_manifest.as_ref()
    }

    /// Remote commands read invites from the post office when one is configured.
    fn manifest_root(&self, remote: bool) -> &Path {
        match (&self.post_office_path, remote) {
            (Some(post_office), true) => post_office,
            _ => &self.venue_path,
        }
    }

    fn load_manifest(&self, dependency: &DependencyDescriptor, root: &Path) -> Result<ServiceManifest> {
        Ok(dependency
            .get_manifest(root)?
            .with_build_concurrency(self.build_concurrency))
    }

    /// Invites of every dependency, skipping ones that were never fetched.
    /// Only for teardown paths, which must work on partial environments.
    fn available_manifests(&self) -> Vec<ServiceManifest> {
        let mut manifests = Vec::new();
        for dependency in &self.dependencies {
            match self.load_manifest(dependency, &self.venue_path) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => tracing::warn!("⏭️ Skipping {}: {}", dependency.name, e),
            }
        }
        manifests
    }

    /// Clones every dependency into the venue. Failures are recorded per
    /// dependency and never stop the others.
    pub async fn install(&self) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        for dependency in &self.dependencies {
            match dependency
                .clone_repo(self.fetcher.as_ref(), &self.venue_path)
                .await
            {
                Ok(CloneStatus::Cloned { .. }) => report.cloned.push(dependency.name.clone()),
                Ok(CloneStatus::Skipped) => report.skipped.push(dependency.name.clone()),
                Err(e) => {
                    tracing::error!("❌ Error installing {}: {}", dependency.name, e);
                    report.failures.push(InstallFailure {
                        dependency: dependency.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Local images first (always built from source, honoring `selection`),
    /// then every dependency's images, pulled instead when `remote`.
    pub async fn build(&self, remote: bool, selection: UnitSelection) -> Result<CommandReport> {
        let started_at = Utc::now();
        let mut outcomes: Vec<BuildOutcome> = Vec::new();

        if let Some(local) = &self.local_manifest {
            let local = local.clone().with_build_concurrency(self.build_concurrency);
            let settings = BuildSettings::new(false, self.architecture.clone());
            outcomes.extend(
                local
                    .build_images(Arc::clone(&self.engine), &self.project_root, &settings, selection)
                    .await?,
            );
        }

        let root = self.manifest_root(remote);
        let settings = BuildSettings::new(remote, self.architecture.clone());
        for dependency in &self.dependencies {
            let manifest = self.load_manifest(dependency, root)?;
            outcomes.extend(
                manifest
                    .build_images(
                        Arc::clone(&self.engine),
                        &dependency.source_dir(&self.venue_path),
                        &settings,
                        UnitSelection::All,
                    )
                    .await?,
            );
        }

        let affected = outcomes.iter().map(|o| o.unit().to_string()).collect();
        Ok(CommandReport::new("build", started_at, affected))
    }

    /// Looks the network up by name and creates it when absent.
    pub async fn network(&self) -> Result<NetworkInfo> {
        if let Some(network) = self.engine.find_network(&self.network_name).await? {
            return Ok(network);
        }
        tracing::info!("🌐 Creating network {}", self.network_name);
        self.engine.create_network(&self.network_name).await
    }

    /// Local containers first, then each dependency in plan order.
    pub async fn run(&self, remote: bool, selection: UnitSelection) -> Result<CommandReport> {
        let started_at = Utc::now();
        self.network().await?;

        let mut started = Vec::new();
        if let Some(local) = &self.local_manifest {
            let options = RunOptions {
                remote: false,
                selection,
            };
            started.extend(
                local
                    .run_containers(
                        self.engine.as_ref(),
                        &self.network_name,
                        self.gate.as_ref(),
                        options,
                    )
                    .await?,
            );
        }

        let root = self.manifest_root(remote);
        for dependency in &self.dependencies {
            let manifest = self.load_manifest(dependency, root)?;
            let options = RunOptions {
                remote,
                selection: UnitSelection::All,
            };
            started.extend(
                manifest
                    .run_containers(
                        self.engine.as_ref(),
                        &self.network_name,
                        self.gate.as_ref(),
                        options,
                    )
                    .await?,
            );
        }

        Ok(CommandReport::new("run", started_at, started))
    }

    pub async fn stop(&self) -> Result<CommandReport> {
        let started_at = Utc::now();
        let mut stopped = Vec::new();

        if self.engine.find_network(&self.network_name).await?.is_none() {
            tracing::warn!("Network {} does not exist, nothing to stop", self.network_name);
            return Ok(CommandReport::new("stop", started_at, stopped));
        }

        for container in self.engine.network_containers(&self.network_name).await? {
            match self.engine.stop_container(&container.id).await {
                Ok(()) => {
                    tracing::info!("⏹️ {} stopped", container.name);
                    stopped.push(container.name);
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!("{} already gone", container.name)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(CommandReport::new("stop", started_at, stopped))
    }

    /// Force-removes everything on the network, then every init container.
    pub async fn destroy(&self) -> Result<CommandReport> {
        let started_at = Utc::now();
        let mut destroyed = Vec::new();

        if self.engine.find_network(&self.network_name).await?.is_some() {
            for container in self.engine.network_containers(&self.network_name).await? {
                if let Err(e) = self.engine.stop_container(&container.id).await {
                    if !e.is_not_found() {
                        return Err(e);
                    }
                }
                match self.engine.remove_container(&container.id, true).await {
                    Ok(()) => {
                        tracing::info!("🗑️ {} destroyed successfully", container.name);
                        destroyed.push(container.name);
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::warn!("{} already removed", container.name)
                    }
                    Err(e) => return Err(e),
                }
            }
        } else {
            tracing::warn!("Network {} does not exist, no containers to sweep", self.network_name);
        }

        if let Some(local) = &self.local_manifest {
            destroyed.extend(local.destroy_init_containers(self.engine.as_ref()).await?);
        }
        for manifest in self.available_manifests() {
            destroyed.extend(manifest.destroy_init_containers(self.engine.as_ref()).await?);
        }

        Ok(CommandReport::new("destroy", started_at, destroyed))
    }

    /// The engine refuses while containers are still attached; that error is
    /// returned as is.
    pub async fn destroy_network(&self) -> Result<CommandReport> {
        let started_at = Utc::now();

        if self.engine.find_network(&self.network_name).await?.is_none() {
            tracing::warn!("Network {} does not exist", self.network_name);
            return Ok(CommandReport::new("destroy-network", started_at, Vec::new()));
        }

        self.engine.remove_network(&self.network_name).await?;
        tracing::info!("🌐 Network {} removed", self.network_name);
        Ok(CommandReport::new(
            "destroy-network",
            started_at,
            vec![self.network_name.clone()],
        ))
    }

    pub async fn teardown(&self) -> Result<CommandReport> {
        let started_at = Utc::now();
        let mut affected = self.destroy().await?.affected;
        affected.extend(self.destroy_network().await?.affected);
        Ok(CommandReport::new("teardown", started_at, affected))
    }

    pub async fn wipe(&self) -> Result<CommandReport> {
        let started_at = Utc::now();
        let mut wiped = Vec::new();

        if let Some(local) = &self.local_manifest {
            wiped.extend(local.wipe_images(self.engine.as_ref()).await?);
        }
        for manifest in self.available_manifests() {
            wiped.extend(manifest.wipe_images(self.engine.as_ref()).await?);
        }

        Ok(CommandReport::new("wipe", started_at, wiped))
    }

    /// Copies every fetched dependency invite to
    /// `<post_office>/<name>/wedding_invite.yml`.
    pub async fn post(&self) -> Result<CommandReport> {
        let started_at = Utc::now();
        let post_office = self
            .post_office_path
            .as_ref()
            .ok_or_else(|| WedError::MissingConfigError {
                field: "post_office".to_string(),
            })?;

        let mut posted = Vec::new();
        for dependency in &self.dependencies {
            let source = dependency.manifest_path(&self.venue_path);
            if !tokio::fs::try_exists(&source).await? {
                return Err(WedError::ManifestNotFound {
                    path: source,
                    reason: format!("{} has not been installed", dependency.name),
                });
            }

            let destination = dependency.manifest_path(post_office);
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&source, &destination).await?;
            tracing::info!("📮 Posted {} invite to {}", dependency.name, destination.display());
            posted.push(dependency.name.clone());
        }

        Ok(CommandReport::new("post", started_at, posted))
    }
}
