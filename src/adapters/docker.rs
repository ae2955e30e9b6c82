use crate::domain::ports::{BuildRequest, ContainerEngine, ContainerInfo, NetworkInfo, RunRequest};
use crate::utils::error::{Result, WedError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// [`ContainerEngine`] backed by the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
}

#[derive(Debug, Deserialize)]
struct NetworkLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(rename = "Name")]
    name: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, args: &[String]) -> Result<Output> {
        tracing::debug!("$ {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(output)
    }

    /// Runs `args`, mapping a non-zero exit to a typed error.
    async fn exec_checked(
        &self,
        args: Vec<String>,
        operation: &str,
        kind: &str,
        target: &str,
    ) -> Result<String> {
        let output = self.exec(&args).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(operation, kind, target, &stderr))
    }
}

/// Operations on an existing resource whose absence teardown may tolerate.
const ABSENCE_TOLERANT: &[&str] = &["stop", "remove", "inspect"];

/// Only removals and lookups of a named resource report `ResourceNotFound`;
/// every other failure keeps the engine's stderr.
fn classify_failure(operation: &str, kind: &str, target: &str, stderr: &str) -> WedError {
    let lowered = stderr.to_lowercase();
    let missing = lowered.contains("no such") || lowered.contains("not found");
    if missing && ABSENCE_TOLERANT.iter().any(|op| *op == operation) {
        WedError::not_found(kind, target)
    } else {
        WedError::engine(operation, target, stderr)
    }
}

fn strings<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

pub(crate) fn build_args(request: &BuildRequest) -> Vec<String> {
    let dockerfile = request.context.join(&request.dockerfile);
    vec![
        "build".to_string(),
        "-t".to_string(),
        request.tag.clone(),
        "-f".to_string(),
        dockerfile.display().to_string(),
        request.context.display().to_string(),
    ]
}

pub(crate) fn run_args(request: &RunRequest) -> Vec<String> {
    let mut args = strings(["run", "-d", "--name"]);
    args.push(request.name.clone());
    args.push("--network".to_string());
    args.push(request.network.clone());

    for (key, value) in &request.environment {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    if let Some((outside, inside)) = request.port {
        args.push("-p".to_string());
        args.push(format!("0.0.0.0:{}:{}/tcp", outside, inside));
    }

    args.push(request.image.clone());
    args
}

fn parse_json_lines<T: for<'de> Deserialize<'de>>(stdout: &str) -> Result<Vec<T>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(WedError::from))
        .collect()
}

pub(crate) fn parse_endpoints(stdout: &str) -> Result<Vec<ContainerInfo>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let endpoints: HashMap<String, Endpoint> = serde_json::from_str(trimmed)?;
    let mut containers: Vec<ContainerInfo> = endpoints
        .into_iter()
        .map(|(id, endpoint)| ContainerInfo {
            id,
            name: endpoint.name,
        })
        .collect();
    containers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(containers)
}

#[async_trait]
impl ContainerEngine for DockerCli {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        tracing::info!("📥 Pulling {}", reference);
        let mut args = strings(["pull"]);
        args.push(reference.to_string());
        self.exec_checked(args, "pull", "image", reference).await?;
        Ok(())
    }

    async fn build_image(&self, request: &BuildRequest) -> Result<()> {
        tracing::info!("🔨 Building {}", request.tag);
        let args = build_args(request);
        self.exec_checked(args, "build", "image", &request.tag).await?;
        Ok(())
    }

    async fn run_container(&self, request: &RunRequest) -> Result<String> {
        let args = run_args(request);
        self.exec_checked(args, "run", "container", &request.name)
            .await
    }

    async fn find_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let mut args = strings(["ps", "-a", "--filter"]);
        args.push(format!("name=^/?{}$", name));
        args.extend(strings(["--format", "{{json .}}"]));

        let stdout = self.exec_checked(args, "list", "container", name).await?;
        let lines: Vec<PsLine> = parse_json_lines(&stdout)?;
        Ok(lines
            .into_iter()
            .find(|line| line.names.split(',').any(|n| n == name))
            .map(|line| ContainerInfo {
                id: line.id,
                name: name.to_string(),
            }))
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut args = strings(["stop"]);
        args.push(id.to_string());
        self.exec_checked(args, "stop", "container", id).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut args = strings(["rm"]);
        if force {
            args.push("-f".to_string());
        }
        args.push(id.to_string());
        self.exec_checked(args, "remove", "container", id).await?;
        Ok(())
    }

    async fn remove_image(&self, reference: &str, force: bool) -> Result<()> {
        let mut args = strings(["rmi"]);
        if force {
            args.push("-f".to_string());
        }
        args.push(reference.to_string());
        self.exec_checked(args, "remove", "image", reference).await?;
        Ok(())
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>> {
        let mut args = strings(["network", "ls", "--filter"]);
        args.push(format!("name={}", name));
        args.extend(strings(["--format", "{{json .}}"]));

        let stdout = self.exec_checked(args, "list", "network", name).await?;
        let lines: Vec<NetworkLine> = parse_json_lines(&stdout)?;
        Ok(lines
            .into_iter()
            .find(|line| line.name == name)
            .map(|line| NetworkInfo {
                id: line.id,
                name: line.name,
            }))
    }

    async fn create_network(&self, name: &str) -> Result<NetworkInfo> {
        let mut args = strings(["network", "create"]);
        args.push(name.to_string());
        let id = self.exec_checked(args, "create", "network", name).await?;
        Ok(NetworkInfo {
            id,
            name: name.to_string(),
        })
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        let mut args = strings(["network", "rm"]);
        args.push(name.to_string());
        self.exec_checked(args, "remove", "network", name).await?;
        Ok(())
    }

    async fn network_containers(&self, network: &str) -> Result<Vec<ContainerInfo>> {
        let mut args = strings(["network", "inspect"]);
        args.push(network.to_string());
        args.extend(strings(["--format", "{{json .Containers}}"]));

        let stdout = self.exec_checked(args, "inspect", "network", network).await?;
        parse_endpoints(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_build_args_resolve_dockerfile_inside_context() {
        let request = BuildRequest {
            context: PathBuf::from("/venue/billing/api"),
            dockerfile: "Dockerfile.arm".to_string(),
            tag: "billing-api:latest".to_string(),
        };

        assert_eq!(
            build_args(&request),
            vec![
                "build",
                "-t",
                "billing-api:latest",
                "-f",
                "/venue/billing/api/Dockerfile.arm",
                "/venue/billing/api"
            ]
        );
    }

    #[test]
    fn test_run_args_publish_port_and_environment() {
        let mut environment = BTreeMap::new();
        environment.insert("DB_HOST".to_string(), "billing-db".to_string());
        let request = RunRequest {
            image: "billing-api:latest".to_string(),
            name: "billing-api".to_string(),
            network: "wedding".to_string(),
            environment,
            port: Some((8080, 80)),
        };

        let args = run_args(&request);
        assert_eq!(&args[..6], &["run", "-d", "--name", "billing-api", "--network", "wedding"]);
        assert!(args.windows(2).any(|w| w == ["-e", "DB_HOST=billing-db"]));
        assert!(args.windows(2).any(|w| w == ["-p", "0.0.0.0:8080:80/tcp"]));
        assert_eq!(args.last().map(String::as_str), Some("billing-api:latest"));
    }

    #[test]
    fn test_run_args_without_port() {
        let request = RunRequest {
            image: "org/worker".to_string(),
            name: "worker".to_string(),
            network: "wedding".to_string(),
            environment: BTreeMap::new(),
            port: None,
        };
        assert!(!run_args(&request).contains(&"-p".to_string()));
    }

    #[test]
    fn test_parse_endpoints() {
        assert!(parse_endpoints("null\n").unwrap().is_empty());
        assert!(parse_endpoints("{}").unwrap().is_empty());

        let stdout = r#"{"abc123":{"Name":"svc-db","IPv4Address":"172.18.0.2/16"},"def456":{"Name":"svc-api"}}"#;
        let containers = parse_endpoints(stdout).unwrap();
        let names: Vec<_> = containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["svc-api", "svc-db"]);
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure("remove", "image", "x", "Error: No such image: x").is_not_found());
        assert!(classify_failure("stop", "container", "c1", "Error: No such container: c1")
            .is_not_found());
        assert!(!classify_failure("remove", "network", "n", "error: network n has active endpoints")
            .is_not_found());
    }

    #[test]
    fn test_build_failure_keeps_stderr() {
        let stderr = "ERROR: failed to solve: docker.io/library/node:99: not found";
        let err = classify_failure("build", "image", "svc-api:local", stderr);

        assert!(!err.is_not_found());
        match err {
            WedError::EngineError {
                operation,
                target,
                message,
            } => {
                assert_eq!(operation, "build");
                assert_eq!(target, "svc-api:local");
                assert_eq!(message, stderr);
            }
            other => panic!("expected EngineError, got {:?}", other),
        }

        let missing_dockerfile = "unable to prepare context: No such file or directory";
        assert!(!classify_failure("build", "image", "svc-api:local", missing_dockerfile).is_not_found());
        assert!(!classify_failure("pull", "image", "org/x", "manifest for org/x not found").is_not_found());
    }

    #[test]
    fn test_run_failure_reports_engine_message() {
        let stderr = "docker: Error response from daemon: network wedding not found.";
        let err = classify_failure("run", "container", "svc-api", stderr);

        assert!(matches!(
            err,
            WedError::EngineError { ref message, .. } if message.contains("network wedding not found")
        ));
    }
}
