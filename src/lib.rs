pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command, LogFormat};

pub use adapters::{DockerCli, GitCli, InMemoryEngine};
pub use crate::core::{
    dependency::DependencyDescriptor,
    invite::ServiceManifest,
    plan::{InstallReport, OrchestrationPlan},
};
pub use utils::error::{Result, WedError};
