use crate::domain::ports::{FetchOutput, SourceFetcher};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// [`SourceFetcher`] that shells out to `git`.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            binary: "git".to_string(),
        }
    }
}

impl GitCli {
    async fn git(&self, args: &[String]) -> Result<FetchOutput> {
        tracing::debug!("$ {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(FetchOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// `--` keeps a hostile URL or path from being read as a git option.
fn clone_args(url: &str, dest: &Path) -> Vec<String> {
    vec![
        "clone".to_string(),
        "--".to_string(),
        url.to_string(),
        dest.to_string_lossy().into_owned(),
    ]
}

/// The trailing `--` makes git treat `branch` as a revision, never a path.
fn checkout_args(dir: &Path, branch: &str) -> Vec<String> {
    vec![
        "-C".to_string(),
        dir.to_string_lossy().into_owned(),
        "checkout".to_string(),
        branch.to_string(),
        "--".to_string(),
    ]
}

#[async_trait]
impl SourceFetcher for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<FetchOutput> {
        self.git(&clone_args(url, dest)).await
    }

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<FetchOutput> {
        self.git(&checkout_args(dir, branch)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_separates_options_from_url() {
        let args = clone_args("--upload-pack=touch /tmp/x", Path::new("/venue/auth"));
        assert_eq!(args, vec!["clone", "--", "--upload-pack=touch /tmp/x", "/venue/auth"]);
    }

    #[test]
    fn test_checkout_ends_with_separator() {
        let args = checkout_args(Path::new("/venue/auth"), "release/1.2");
        assert_eq!(args, vec!["-C", "/venue/auth", "checkout", "release/1.2", "--"]);
    }
}
