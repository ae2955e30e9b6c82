use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Image build request handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub context: PathBuf,
    pub dockerfile: String,
    pub tag: String,
}

/// Detached container start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image: String,
    pub name: String,
    pub network: String,
    pub environment: BTreeMap<String, String>,
    /// `(outside, inside)`, published on 0.0.0.0 over tcp.
    pub port: Option<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
}

/// The container runtime as seen by the orchestrator.
///
/// Lookups return `Ok(None)` for missing resources; removals return
/// [`WedError::ResourceNotFound`](crate::utils::error::WedError::ResourceNotFound)
/// so callers can decide whether absence matters.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn pull_image(&self, reference: &str) -> Result<()>;

    async fn build_image(&self, request: &BuildRequest) -> Result<()>;

    /// Returns the id of the started container.
    async fn run_container(&self, request: &RunRequest) -> Result<String>;

    async fn find_container(&self, name: &str) -> Result<Option<ContainerInfo>>;

    async fn stop_container(&self, id: &str) -> Result<()>;

    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    async fn remove_image(&self, reference: &str, force: bool) -> Result<()>;

    async fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>>;

    async fn create_network(&self, name: &str) -> Result<NetworkInfo>;

    async fn remove_network(&self, name: &str) -> Result<()>;

    async fn network_containers(&self, network: &str) -> Result<Vec<ContainerInfo>>;
}

/// Captured result of one version-control step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl FetchOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<FetchOutput>;

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<FetchOutput>;
}

/// Barrier between primary and init containers.
#[async_trait]
pub trait ReadinessGate: Send + Sync {
    async fn wait(&self, package_name: &str);
}

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Fixed real-time wait. It does not probe the primary services, so slow
/// starters can still be unreachable when init units begin.
#[derive(Debug, Clone, Copy)]
pub struct SettleDelay(pub Duration);

impl Default for SettleDelay {
    fn default() -> Self {
        Self(DEFAULT_SETTLE_DELAY)
    }
}

#[async_trait]
impl ReadinessGate for SettleDelay {
    async fn wait(&self, package_name: &str) {
        tracing::debug!("⏳ Settling {} for {:?}", package_name, self.0);
        tokio::time::sleep(self.0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_default_settle_delay_waits_ten_seconds() {
        let start = Instant::now();
        SettleDelay::default().wait("svc").await;

        let elapsed = start.elapsed();
        assert!(elapsed >= DEFAULT_SETTLE_DELAY);
        assert!(elapsed < DEFAULT_SETTLE_DELAY + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_settle_delay() {
        let start = Instant::now();
        SettleDelay(Duration::from_secs(2)).wait("svc").await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < DEFAULT_SETTLE_DELAY);
    }
}
