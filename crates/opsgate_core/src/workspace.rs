//! Tenant workspace names.

use opsgate_error::{OpsgateResult, ValidationError};
use serde::{Deserialize, Serialize};

/// A sanitized tenant namespace identifier.
///
/// Valid names match `[A-Za-z0-9._-]+`. Workspaces are created
/// implicitly on first access and own every other ops document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceName(String);

impl WorkspaceName {
    /// Parse and validate a workspace name.
    pub fn parse(name: impl Into<String>) -> OpsgateResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::new("workspace name is empty").into());
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ValidationError::new(format!(
                "workspace name '{}' contains invalid characters",
                name
            ))
            .into());
        }
        Ok(Self(name))
    }

    /// The workspace name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkspaceName {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl std::fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WorkspaceName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value).map_err(|e| e.to_string())
    }
}

impl From<WorkspaceName> for String {
    fn from(value: WorkspaceName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["default", "acme", "a.b-c_d", "Team42"] {
            assert!(WorkspaceName::parse(name).is_ok());
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "a b", "../etc", "ws/1", "caf\u{e9}"] {
            assert!(WorkspaceName::parse(name).is_err(), "{name:?} should fail");
        }
    }

    #[test]
    fn test_default_is_default() {
        assert_eq!(WorkspaceName::default().as_str(), "default");
    }
}
