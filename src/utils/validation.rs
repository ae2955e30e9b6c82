use crate::utils::error::{Result, WedError};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Accepts scheme URLs git understands plus the scp-like `user@host:path` form.
pub fn validate_git_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    if url_str.starts_with('-') {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot start with '-'".to_string(),
        });
    }

    if is_scp_like(url_str) {
        return Ok(());
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" | "ssh" | "git" | "file" => Ok(()),
            scheme => Err(WedError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

/// Branch names end up on the git command line.
pub fn validate_git_ref(field_name: &str, reference: &str) -> Result<()> {
    validate_non_empty_string(field_name, reference)?;
    if reference.starts_with('-') || reference.chars().any(char::is_whitespace) {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: reference.to_string(),
            reason: "Not a valid git branch name".to_string(),
        });
    }
    Ok(())
}

fn is_scp_like(url_str: &str) -> bool {
    if url_str.contains("://") {
        return false;
    }
    match url_str.split_once(':') {
        Some((host, path)) => {
            let host = host.rsplit('@').next().unwrap_or(host);
            !host.is_empty() && !host.contains('/') && !path.is_empty()
        }
        None => false,
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// A single path component, used for directories created under the venue.
pub fn validate_dir_name(field_name: &str, name: &str) -> Result<()> {
    validate_path(field_name, name)?;
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Must be a single directory name".to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| WedError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(WedError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_unique_names<'a>(
    field_name: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(WedError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.to_string(),
                reason: "Duplicate name".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_git_url() {
        assert!(validate_git_url("git_url", "https://github.com/org/repo.git").is_ok());
        assert!(validate_git_url("git_url", "ssh://git@github.com/org/repo.git").is_ok());
        assert!(validate_git_url("git_url", "git@github.com:org/repo.git").is_ok());
        assert!(validate_git_url("git_url", "file:///tmp/repo").is_ok());
        assert!(validate_git_url("git_url", "").is_err());
        assert!(validate_git_url("git_url", "not a url").is_err());
        assert!(validate_git_url("git_url", "ftp://example.com/repo").is_err());
        assert!(validate_git_url("git_url", "--upload-pack=cmd:x").is_err());
    }

    #[test]
    fn test_validate_git_ref() {
        assert!(validate_git_ref("branch", "main").is_ok());
        assert!(validate_git_ref("branch", "release/1.2").is_ok());
        assert!(validate_git_ref("branch", "--orphan=x").is_err());
        assert!(validate_git_ref("branch", "my branch").is_err());
        assert!(validate_git_ref("branch", "").is_err());
    }

    #[test]
    fn test_validate_dir_name() {
        assert!(validate_dir_name("name", "auth").is_ok());
        assert!(validate_dir_name("name", "..").is_err());
        assert!(validate_dir_name("name", "org/auth").is_err());
        assert!(validate_dir_name("name", "").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("concurrency", 4, 1).is_ok());
        assert!(validate_positive_number("concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("api".to_string());
        let missing: Option<String> = None;

        assert_eq!(validate_required_field("name", &present).unwrap(), "api");
        match validate_required_field("image_url", &missing) {
            Err(WedError::MissingConfigError { field }) => assert_eq!(field, "image_url"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("outside_port", 8080u32, 1, 65535).is_ok());
        assert!(validate_range("outside_port", 0u32, 1, 65535).is_err());
        assert!(validate_range("outside_port", 70000u32, 1, 65535).is_err());
    }

    #[test]
    fn test_validate_unique_names() {
        assert!(validate_unique_names("attendees", ["auth", "billing"]).is_ok());
        assert!(validate_unique_names("attendees", ["auth", "auth"]).is_err());
    }
}
