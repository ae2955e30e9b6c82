use crate::domain::model::UnitDescriptor;
use crate::utils::error::{Result, WedError};
use crate::utils::validation::{
    validate_git_url, validate_non_empty_string, validate_range, validate_required_field,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const INVITE_FILE_NAME: &str = "wedding_invite.yml";

/// Raw contents of `wedding_invite.yml`, before unit validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InviteFile {
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub builds: Vec<UnitSpec>,
    #[serde(default)]
    pub init_builds: Vec<UnitSpec>,
}

/// One entry of `builds` or `init_builds`. Every field is optional here so a
/// missing key is reported by name instead of as a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: Option<String>,
    pub git_url: Option<String>,
    pub image_url: Option<String>,
    pub branch: Option<String>,
    pub default_image_tag: Option<String>,
    pub build_root: Option<String>,
    pub build_files: Option<BTreeMap<String, String>>,
    pub build_lock: Option<bool>,
    pub config: Option<BTreeMap<String, serde_yaml::Value>>,
    pub outside_port: Option<i64>,
    pub inside_port: Option<i64>,
    pub default_container_name: Option<String>,
}

impl TryFrom<UnitSpec> for UnitDescriptor {
    type Error = WedError;

    fn try_from(spec: UnitSpec) -> Result<Self> {
        let name = validate_required_field("name", &spec.name)?.clone();
        validate_non_empty_string("name", &name)?;

        let field = |key: &str| format!("{}.{}", name, key);

        let image_url = validate_required_field(&field("image_url"), &spec.image_url)?.clone();
        let default_image_tag =
            validate_required_field(&field("default_image_tag"), &spec.default_image_tag)?.clone();
        let default_container_name =
            validate_required_field(&field("default_container_name"), &spec.default_container_name)?
                .clone();

        if let Some(git_url) = &spec.git_url {
            validate_git_url(&field("git_url"), git_url)?;
        }

        let outside_port = port(&field("outside_port"), spec.outside_port)?;
        let inside_port = port(&field("inside_port"), spec.inside_port)?;
        if outside_port.is_some() && inside_port.is_none() {
            return Err(WedError::MissingConfigError {
                field: field("inside_port"),
            });
        }

        let config = spec
            .config
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let value = env_value(&field(&format!("config.{}", key)), value)?;
                Ok((key, value))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(UnitDescriptor {
            git_url: spec.git_url,
            image_url,
            branch: spec.branch,
            default_image_tag,
            default_container_name,
            build_root: spec.build_root.unwrap_or_else(|| ".".to_string()),
            build_files: spec.build_files.unwrap_or_default(),
            build_lock: spec.build_lock.unwrap_or(false),
            config,
            outside_port,
            inside_port,
            name,
        })
    }
}

fn port(field_name: &str, value: Option<i64>) -> Result<Option<u16>> {
    match value {
        Some(value) => {
            validate_range(field_name, value, 1, i64::from(u16::MAX))?;
            Ok(Some(value as u16))
        }
        None => Ok(None),
    }
}

/// Container environment values are strings; scalars are rendered as written.
fn env_value(field_name: &str, value: serde_yaml::Value) -> Result<String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        other => Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("{:?}", other),
            reason: "Environment values must be scalars".to_string(),
        }),
    }
}
