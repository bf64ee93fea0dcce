use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Pointers to the package the app runs and the one kept for rollback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRecord {
    #[serde(
        rename = "currentPackage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_package: Option<String>,
    #[serde(
        rename = "previousPackage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_package: Option<String>,
}

impl StatusRecord {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        serde_json::from_str(input).context("failed to parse status record")
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize status record")
    }

    pub fn is_empty(&self) -> bool {
        self.current_package.is_none() && self.previous_package.is_none()
    }
}
