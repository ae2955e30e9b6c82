pub mod document;
pub mod invite;
pub mod plan;

#[cfg(feature = "cli")]
use crate::core::scheduler::DEFAULT_BUILD_CONCURRENCY;
#[cfg(feature = "cli")]
use crate::domain::model::{current_architecture, UnitSelection};
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, Validate,
};
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "wed")]
#[command(about = "Builds, runs and tears down a service together with its dependency repositories")]
pub struct CliConfig {
    /// Seating plan, relative to the project root
    #[arg(long, global = true, default_value = plan::PLAN_FILE_NAME)]
    pub plan: PathBuf,

    /// Local wedding invite, relative to the project root
    #[arg(long, global = true, default_value = invite::INVITE_FILE_NAME)]
    pub invite: PathBuf,

    #[arg(long, global = true, default_value = ".")]
    pub project_root: PathBuf,

    /// Override the detected CPU architecture used to pick build files
    #[arg(long, global = true)]
    pub arch: Option<String>,

    /// Maximum number of image builds in flight
    #[arg(long, global = true, default_value_t = DEFAULT_BUILD_CONCURRENCY)]
    pub concurrency: usize,

    /// Seconds to wait between primary and init containers
    #[arg(long, global = true, default_value_t = 10)]
    pub settle_secs: u64,

    /// Container engine client, e.g. `podman`
    #[arg(long, global = true, default_value = "docker")]
    pub docker_bin: String,

    /// Simulate engine calls instead of touching the container engine
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Clone every dependency into the venue
    Install,
    /// Build (or pull) all images
    Build(ModeArgs),
    /// Create the network and start all containers
    Run(ModeArgs),
    Stop,
    /// Remove every container on the network and all init containers
    Destroy,
    DestroyNetwork,
    /// Destroy, then remove the network
    Teardown,
    /// Delete every image
    Wipe,
    /// Publish dependency invites to the post office
    Post,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct ModeArgs {
    /// Use published images instead of building from source
    #[arg(long)]
    pub remote: bool,

    /// Only touch the local init units; primary services run elsewhere
    #[arg(long)]
    pub dev: bool,
}

#[cfg(feature = "cli")]
impl ModeArgs {
    pub fn selection(&self) -> UnitSelection {
        if self.dev {
            UnitSelection::InitOnly
        } else {
            UnitSelection::All
        }
    }
}

#[cfg(feature = "cli")]
impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Install => "install",
            Command::Build(_) => "build",
            Command::Run(_) => "run",
            Command::Stop => "stop",
            Command::Destroy => "destroy",
            Command::DestroyNetwork => "destroy-network",
            Command::Teardown => "teardown",
            Command::Wipe => "wipe",
            Command::Post => "post",
        }
    }
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn plan_path(&self) -> PathBuf {
        self.project_root.join(&self.plan)
    }

    pub fn invite_path(&self) -> PathBuf {
        self.project_root.join(&self.invite)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn architecture(&self) -> String {
        self.arch.clone().unwrap_or_else(current_architecture)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("concurrency", self.concurrency, 1)?;
        validate_range("settle_secs", self.settle_secs, 0, 3600)?;
        validate_non_empty_string("docker_bin", &self.docker_bin)?;
        if let Some(arch) = &self.arch {
            validate_non_empty_string("arch", arch)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::utils::error::WedError;

    #[test]
    fn test_parse_run_dev_mode() {
        let config = CliConfig::parse_from(["wed", "--concurrency", "2", "run", "--dev"]);

        assert_eq!(config.concurrency, 2);
        match config.command {
            Command::Run(mode) => {
                assert!(!mode.remote);
                assert_eq!(mode.selection(), UnitSelection::InitOnly);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_paths_are_relative_to_project_root() {
        let config = CliConfig::parse_from(["wed", "--project-root", "/srv/app", "build", "--remote"]);
        assert_eq!(config.plan_path(), PathBuf::from("/srv/app/seating_plan.yml"));
        assert_eq!(config.invite_path(), PathBuf::from("/srv/app/wedding_invite.yml"));
        assert_eq!(config.settle_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = CliConfig::parse_from(["wed", "--concurrency", "0", "install"]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, WedError::InvalidConfigValueError { ref field, .. } if field == "concurrency"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let config = CliConfig::parse_from(["wed", "teardown", "--dry-run", "--log-format", "json"]);
        assert!(config.dry_run);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.command.name(), "teardown");
    }
}
