use crate::domain::ports::{BuildRequest, ContainerEngine, ContainerInfo, NetworkInfo, RunRequest};
use crate::utils::error::{Result, WedError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Every engine operation, in the order it was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineCall {
    Pull { image: String },
    Build { tag: String, context: PathBuf, dockerfile: String },
    Run { name: String, image: String, network: String },
    Stop { name: String },
    RemoveContainer { name: String },
    RemoveImage { image: String },
    CreateNetwork { name: String },
    RemoveNetwork { name: String },
}

#[derive(Debug, Clone)]
struct Container {
    name: String,
    network: String,
    running: bool,
}

#[derive(Debug, Default)]
struct State {
    images: BTreeSet<String>,
    containers: BTreeMap<String, Container>,
    networks: BTreeMap<String, String>,
    failing: BTreeSet<String>,
    calls: Vec<EngineCall>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:012x}", prefix, self.next_id)
    }

    fn container_id(&self, id_or_name: &str) -> Option<String> {
        if self.containers.contains_key(id_or_name) {
            return Some(id_or_name.to_string());
        }
        self.containers
            .iter()
            .find(|(_, c)| c.name == id_or_name)
            .map(|(id, _)| id.clone())
    }
}

/// A container engine that keeps everything in memory.
///
/// Backs `--dry-run` and the test suite. It enforces the engine rules the
/// orchestrator relies on: container names are unique, runs need an existing
/// network and a network with attached containers cannot be removed.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: Mutex<State>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls and builds take this long.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Pulling or building `reference` fails.
    pub fn with_failure(self, reference: impl Into<String>) -> Self {
        self.lock().failing.insert(reference.into());
        self
    }

    pub fn with_image(self, reference: impl Into<String>) -> Self {
        self.lock().images.insert(reference.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: EngineCall) {
        tracing::info!("[{}] {:?}", self.name(), call);
        self.lock().calls.push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn images(&self) -> Vec<String> {
        self.lock().images.iter().cloned().collect()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.lock().containers.values().map(|c| c.name.clone()).collect()
    }

    pub fn running_container_names(&self) -> Vec<String> {
        self.lock()
            .containers
            .values()
            .filter(|c| c.running)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn network_names(&self) -> Vec<String> {
        self.lock().networks.keys().cloned().collect()
    }

    /// Highest number of pulls and builds that were in progress at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn slow_operation(&self, reference: &str, operation: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.lock();
        if state.failing.contains(reference) {
            return Err(WedError::engine(operation, reference, "simulated failure"));
        }
        state.images.insert(reference.to_string());
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for InMemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        self.record(EngineCall::Pull {
            image: reference.to_string(),
        });
        self.slow_operation(reference, "pull").await
    }

    async fn build_image(&self, request: &BuildRequest) -> Result<()> {
        self.record(EngineCall::Build {
            tag: request.tag.clone(),
            context: request.context.clone(),
            dockerfile: request.dockerfile.clone(),
        });
        self.slow_operation(&request.tag, "build").await
    }

    async fn run_container(&self, request: &RunRequest) -> Result<String> {
        self.record(EngineCall::Run {
            name: request.name.clone(),
            image: request.image.clone(),
            network: request.network.clone(),
        });

        let mut state = self.lock();
        if state.container_id(&request.name).is_some() {
            return Err(WedError::engine(
                "run",
                &request.name,
                "Conflict. The container name is already in use",
            ));
        }
        if !state.networks.contains_key(&request.network) {
            return Err(WedError::engine(
                "run",
                &request.name,
                format!("network {} not found", request.network),
            ));
        }

        let id = state.next_id("c");
        state.containers.insert(
            id.clone(),
            Container {
                name: request.name.clone(),
                network: request.network.clone(),
                running: true,
            },
        );
        Ok(id)
    }

    async fn find_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let state = self.lock();
        Ok(state
            .container_id(name)
            .map(|id| ContainerInfo {
                id,
                name: name.to_string(),
            }))
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let key = state
            .container_id(id)
            .ok_or_else(|| WedError::not_found("container", id))?;
        let container = state
            .containers
            .get_mut(&key)
            .ok_or_else(|| WedError::not_found("container", id))?;
        container.running = false;
        let name = container.name.clone();
        drop(state);
        self.record(EngineCall::Stop { name });
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut state = self.lock();
        let key = state
            .container_id(id)
            .ok_or_else(|| WedError::not_found("container", id))?;
        if let Some(container) = state.containers.get(&key) {
            if container.running && !force {
                return Err(WedError::engine(
                    "remove",
                    &container.name,
                    "container is running, stop it first or force removal",
                ));
            }
        }
        let removed = state.containers.remove(&key);
        drop(state);
        if let Some(container) = removed {
            self.record(EngineCall::RemoveContainer {
                name: container.name,
            });
        }
        Ok(())
    }

    async fn remove_image(&self, reference: &str, _force: bool) -> Result<()> {
        self.record(EngineCall::RemoveImage {
            image: reference.to_string(),
        });
        if !self.lock().images.remove(reference) {
            return Err(WedError::not_found("image", reference));
        }
        Ok(())
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>> {
        Ok(self.lock().networks.get(name).map(|id| NetworkInfo {
            id: id.clone(),
            name: name.to_string(),
        }))
    }

    async fn create_network(&self, name: &str) -> Result<NetworkInfo> {
        self.record(EngineCall::CreateNetwork {
            name: name.to_string(),
        });
        let mut state = self.lock();
        if state.networks.contains_key(name) {
            return Err(WedError::engine("create", name, "network already exists"));
        }
        let id = state.next_id("n");
        state.networks.insert(name.to_string(), id.clone());
        Ok(NetworkInfo {
            id,
            name: name.to_string(),
        })
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.networks.contains_key(name) {
            return Err(WedError::not_found("network", name));
        }
        if state.containers.values().any(|c| c.network == name) {
            return Err(WedError::engine(
                "remove",
                name,
                "network has active endpoints",
            ));
        }
        state.networks.remove(name);
        drop(state);
        self.record(EngineCall::RemoveNetwork {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn network_containers(&self, network: &str) -> Result<Vec<ContainerInfo>> {
        let state = self.lock();
        if !state.networks.contains_key(network) {
            return Err(WedError::not_found("network", network));
        }
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| c.network == network)
            .map(|(id, c)| ContainerInfo {
                id: id.clone(),
                name: c.name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_request(name: &str, network: &str) -> RunRequest {
        RunRequest {
            image: "org/api".to_string(),
            name: name.to_string(),
            network: network.to_string(),
            environment: BTreeMap::new(),
            port: None,
        }
    }

    #[tokio::test]
    async fn test_container_names_are_unique() {
        let engine = InMemoryEngine::new();
        engine.create_network("wedding").await.unwrap();

        engine.run_container(&run_request("api", "wedding")).await.unwrap();
        let err = engine
            .run_container(&run_request("api", "wedding"))
            .await
            .unwrap_err();

        assert!(matches!(err, WedError::EngineError { .. }));
        assert_eq!(engine.container_names(), vec!["api"]);
    }

    #[tokio::test]
    async fn test_network_with_endpoints_cannot_be_removed() {
        let engine = InMemoryEngine::new();
        engine.create_network("wedding").await.unwrap();
        engine.run_container(&run_request("api", "wedding")).await.unwrap();

        assert!(engine.remove_network("wedding").await.is_err());

        let id = engine.find_container("api").await.unwrap().unwrap().id;
        engine.remove_container(&id, true).await.unwrap();
        engine.remove_network("wedding").await.unwrap();
        assert!(engine.network_names().is_empty());
    }

    #[tokio::test]
    async fn test_missing_resources_are_not_found() {
        let engine = InMemoryEngine::new();
        assert!(engine.remove_image("ghost:latest", true).await.unwrap_err().is_not_found());
        assert!(engine.remove_container("ghost", true).await.unwrap_err().is_not_found());
        assert!(engine.remove_network("ghost").await.unwrap_err().is_not_found());
        assert!(engine.find_container("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let engine = InMemoryEngine::new().with_failure("org/broken");
        assert!(engine.pull_image("org/broken").await.is_err());
        engine.pull_image("org/fine").await.unwrap();
        assert_eq!(engine.images(), vec!["org/fine"]);
    }
}
