use crate::config::document::{parse_document, read_document, DocumentFormat};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_dir_name, validate_git_ref, validate_git_url, validate_non_empty_string, validate_path,
    validate_unique_names, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const PLAN_FILE_NAME: &str = "seating_plan.yml";

/// Contents of `seating_plan.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub network_name: String,
    /// Directory, relative to the project root, where dependencies are cloned.
    pub venue: String,
    #[serde(default)]
    pub attendees: Vec<AttendeeConfig>,
    /// Directory collecting published dependency invites.
    #[serde(default)]
    pub post_office: Option<String>,
}

/// One external dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendeeConfig {
    pub name: String,
    pub default_image_name: String,
    #[serde(default)]
    pub git_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PlanConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_document(path.as_ref())
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        parse_document(content, DocumentFormat::Yaml)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("network_name", &self.network_name)?;
        validate_path("venue", &self.venue)?;

        if let Some(post_office) = &self.post_office {
            validate_path("post_office", post_office)?;
        }

        validate_unique_names("attendees", self.attendees.iter().map(|a| a.name.as_str()))?;

        for attendee in &self.attendees {
            validate_non_empty_string("attendees.name", &attendee.name)?;
            validate_dir_name(&format!("attendees.{}.name", attendee.name), &attendee.name)?;
            if let Some(git_url) = &attendee.git_url {
                validate_git_url(&format!("attendees.{}.git_url", attendee.name), git_url)?;
            }
            if let Some(branch) = &attendee.branch {
                validate_git_ref(&format!("attendees.{}.branch", attendee.name), branch)?;
            }
        }

        Ok(())
    }
}

impl Validate for PlanConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{ErrorCategory, WedError};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PLAN: &str = r#"
network_name: wedding-net
venue: venue
post_office: post_office
attendees:
  - name: auth
    default_image_name: auth
    git_url: git@github.com:org/auth.git
    branch: main
    image_url: org/auth:latest
  - name: redis
    default_image_name: redis
    git_url: null
    branch: null
    image_url: redis:7
"#;

    #[test]
    fn test_parse_plan() {
        let plan = PlanConfig::from_yaml_str(PLAN).unwrap();

        assert_eq!(plan.network_name, "wedding-net");
        assert_eq!(plan.venue, "venue");
        assert_eq!(plan.post_office.as_deref(), Some("post_office"));
        assert_eq!(plan.attendees.len(), 2);
        assert_eq!(plan.attendees[0].branch.as_deref(), Some("main"));
        assert!(plan.attendees[1].git_url.is_none());
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_missing_network_name_is_configuration_error() {
        let err = PlanConfig::from_yaml_str("venue: venue\nattendees: []\n").unwrap_err();
        assert!(matches!(err, WedError::YamlError(_)));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_duplicate_attendees_rejected() {
        let plan = PlanConfig::from_yaml_str(
            r#"
network_name: net
venue: venue
attendees:
  - { name: auth, default_image_name: auth }
  - { name: auth, default_image_name: auth2 }
"#,
        )
        .unwrap();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_invalid_git_url_rejected() {
        let plan = PlanConfig::from_yaml_str(
            r#"
network_name: net
venue: venue
attendees:
  - { name: auth, default_image_name: auth, git_url: "ftp://example.com/auth" }
"#,
        )
        .unwrap();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_option_like_url_and_branch_rejected() {
        let plan = PlanConfig::from_yaml_str(
            r#"
network_name: net
venue: venue
attendees:
  - { name: auth, default_image_name: auth, git_url: "--upload-pack=cmd:x" }
"#,
        )
        .unwrap();
        assert!(plan.validate().is_err());

        let plan = PlanConfig::from_yaml_str(
            r#"
network_name: net
venue: venue
attendees:
  - { name: auth, default_image_name: auth, git_url: "https://github.com/org/auth.git", branch: "--orphan=x" }
"#,
        )
        .unwrap();
        let err = plan.validate().unwrap_err();
        assert!(matches!(err, WedError::InvalidConfigValueError { ref field, .. } if field == "attendees.auth.branch"));
    }

    #[test]
    fn test_plan_from_toml_file() {
        let mut temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        temp_file
            .write_all(
                br#"
network_name = "net"
venue = "venue"

[[attendees]]
name = "auth"
default_image_name = "auth"
git_url = "https://github.com/org/auth.git"
branch = "develop"
"#,
            )
            .unwrap();

        let plan = PlanConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(plan.attendees[0].branch.as_deref(), Some("develop"));
    }

    #[test]
    fn test_plan_from_yaml_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(PLAN.as_bytes()).unwrap();

        let plan = PlanConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(plan.network_name, "wedding-net");
    }
}
