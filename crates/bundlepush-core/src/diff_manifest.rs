use std::path::{Component, Path};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

/// Name of the manifest shipped at the root of a diff container.
pub const DIFF_MANIFEST_FILE_NAME: &str = "hotcodepush.json";

/// Describes how a diff container is merged with the current package.
///
/// When `retained_files` is present only those paths are carried over from
/// the current package. Manifests that list only `deleted_files` carry over
/// everything except the deleted paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffManifest {
    #[serde(
        rename = "retainedFiles",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub retained_files: Option<Vec<String>>,
    #[serde(rename = "deletedFiles", default)]
    pub deleted_files: Vec<String>,
}

impl DiffManifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            serde_json::from_str(input).context("failed to parse diff manifest")?;
        for path in manifest
            .retained_files
            .iter()
            .flatten()
            .chain(manifest.deleted_files.iter())
        {
            validate_manifest_path(path)
                .with_context(|| format!("invalid diff manifest entry '{path}'"))?;
        }
        Ok(manifest)
    }

    pub fn is_deleted(&self, relative_path: &str) -> bool {
        self.deleted_files
            .iter()
            .any(|deleted| normalize(deleted) == normalize(relative_path))
    }
}

fn validate_manifest_path(path: &str) -> anyhow::Result<()> {
    let relative = Path::new(path);
    if relative.as_os_str().is_empty() {
        return Err(anyhow!("path must not be empty"));
    }
    if relative.is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return Err(anyhow!("path must be relative"));
    }
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        return Err(anyhow!("path must not include '..' or a prefix"));
    }
    Ok(())
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}
