use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{chain_message, Result, UpdateError};
use crate::layout::{default_base_dir, validate_bundle_file_name, StoreLayout};
use crate::verify::validate_public_key;

pub const DEFAULT_BUNDLE_FILE_NAME: &str = "index.bundle";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    /// Directory the store root is created under.
    pub base_dir: Option<PathBuf>,
    pub test_mode: bool,
    /// Hex-encoded Ed25519 key. When set, every container update must be
    /// signed.
    pub public_key: Option<String>,
    pub bundle_file_name: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            test_mode: false,
            public_key: None,
            bundle_file_name: DEFAULT_BUNDLE_FILE_NAME.to_string(),
        }
    }
}

impl UpdaterConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        toml::from_str(input).context("failed to parse updater config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read updater config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        validate_bundle_file_name(&self.bundle_file_name)?;
        if let Some(public_key) = self.public_key() {
            validate_public_key(public_key)?;
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<StoreLayout> {
        let base_dir = match &self.base_dir {
            Some(base_dir) => base_dir.clone(),
            None => default_base_dir()
                .map_err(|err| UpdateError::MalformedInput(chain_message(&err)))?,
        };
        Ok(StoreLayout::new(base_dir).with_test_mode(self.test_mode))
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
