//! Concrete engines and fetchers behind the domain ports.

pub mod docker;
pub mod git;
pub mod memory;

pub use docker::DockerCli;
pub use git::GitCli;
pub use memory::{EngineCall, InMemoryEngine};
