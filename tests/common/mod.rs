#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wedding_planner::config::invite::INVITE_FILE_NAME;
use wedding_planner::domain::ports::{FetchOutput, ReadinessGate, SourceFetcher};
use wedding_planner::{InMemoryEngine, Result};

/// Scripted git: a clone materializes the directory and, when one is
/// registered for the URL, a wedding invite inside it.
#[derive(Default)]
pub struct FakeFetcher {
    invites: HashMap<String, String>,
    failing_urls: Vec<String>,
    failing_branches: Vec<String>,
    latency: Duration,
    log: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invite(mut self, url: &str, invite: &str) -> Self {
        self.invites.insert(url.to_string(), invite.to_string());
        self
    }

    pub fn with_failing_url(mut self, url: &str) -> Self {
        self.failing_urls.push(url.to_string());
        self
    }

    pub fn with_failing_branch(mut self, branch: &str) -> Self {
        self.failing_branches.push(branch.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<FetchOutput> {
        self.log
            .lock()
            .unwrap()
            .push(format!("clone {} {}", url, dest.display()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing_urls.iter().any(|u| u == url) {
            return Ok(FetchOutput::failed(format!(
                "fatal: repository '{}' not found",
                url
            )));
        }

        tokio::fs::create_dir_all(dest).await?;
        if let Some(invite) = self.invites.get(url) {
            tokio::fs::write(dest.join(INVITE_FILE_NAME), invite).await?;
        }
        Ok(FetchOutput::ok())
    }

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<FetchOutput> {
        self.log
            .lock()
            .unwrap()
            .push(format!("checkout {} {}", dir.display(), branch));
        if self.failing_branches.iter().any(|b| b == branch) {
            return Ok(FetchOutput::failed(format!(
                "error: pathspec '{}' did not match any file(s) known to git",
                branch
            )));
        }
        Ok(FetchOutput::ok())
    }
}

/// Records how many engine calls had been made each time the gate opened.
pub struct RecordingGate {
    engine: Arc<InMemoryEngine>,
    openings: Mutex<Vec<(String, usize)>>,
}

impl RecordingGate {
    pub fn new(engine: Arc<InMemoryEngine>) -> Self {
        Self {
            engine,
            openings: Mutex::new(Vec::new()),
        }
    }

    pub fn openings(&self) -> Vec<(String, usize)> {
        self.openings.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReadinessGate for RecordingGate {
    async fn wait(&self, package_name: &str) {
        let seen = self.engine.calls().len();
        self.openings
            .lock()
            .unwrap()
            .push((package_name.to_string(), seen));
    }
}

pub fn write_file(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// Invite with one buildable primary unit, one pulled primary unit and one
/// init unit, all prefixed with `package`.
pub fn invite(package: &str) -> String {
    format!(
        r#"package_name: {package}
builds:
  - name: {package}-api
    git_url: https://github.com/org/{package}.git
    image_url: org/{package}-api:latest
    default_image_tag: {package}-api:local
    default_container_name: {package}-api
    build_root: api
    build_lock: true
    outside_port: 8080
    inside_port: 80
    config:
      PORT: 80
  - name: {package}-db
    image_url: postgres:16
    default_image_tag: postgres:16
    default_container_name: {package}-db
init_builds:
  - name: {package}-migrate
    git_url: https://github.com/org/{package}.git
    image_url: org/{package}-migrate:latest
    default_image_tag: {package}-migrate:local
    default_container_name: {package}-migrate
    build_root: migrations
    build_files:
      x86_64: Dockerfile.x86
      aarch64: Dockerfile.arm
"#
    )
}

pub fn repo_url(name: &str) -> String {
    format!("https://github.com/org/{}.git", name)
}
