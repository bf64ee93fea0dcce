use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Release record stored next to a package's files.
///
/// Fields the store does not interpret (labels, app version, signature
/// attributes, ...) are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageMetadata {
    #[serde(rename = "packageHash")]
    pub package_hash: String,
    #[serde(rename = "downloadUrl", default)]
    pub download_url: String,
    #[serde(
        rename = "relativeBundlePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relative_bundle_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageMetadata {
    pub fn new(package_hash: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            package_hash: package_hash.into(),
            download_url: download_url.into(),
            relative_bundle_path: None,
            extra: Map::new(),
        }
    }

    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let metadata: Self =
            serde_json::from_str(input).context("failed to parse package metadata")?;
        if metadata.package_hash.trim().is_empty() {
            return Err(anyhow!("package metadata has an empty packageHash"));
        }
        Ok(metadata)
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize package metadata")
    }

    pub fn with_relative_bundle_path(mut self, relative_bundle_path: impl Into<String>) -> Self {
        self.relative_bundle_path = Some(relative_bundle_path.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}
