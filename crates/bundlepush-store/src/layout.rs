use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageContext, UpdateError};

pub const STORE_FOLDER_NAME: &str = "BundlePush";
pub const TEST_STORE_FOLDER_NAME: &str = "TestPackages";
pub const STATUS_FILE_NAME: &str = "status.json";
pub const PACKAGE_METADATA_FILE_NAME: &str = "metadata.json";
pub const DOWNLOAD_STAGING_FILE_NAME: &str = "download.tmp";
pub const UNZIPPED_DIR_NAME: &str = "unzipped";

/// Handle to one package store. Every store operation takes a layout, so
/// two layouts with different base directories never share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    base_dir: PathBuf,
    test_mode: bool,
}

impl StoreLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            test_mode: false,
        }
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn root(&self) -> PathBuf {
        let root = self.base_dir.join(STORE_FOLDER_NAME);
        if self.test_mode {
            root.join(TEST_STORE_FOLDER_NAME)
        } else {
            root
        }
    }

    pub fn status_path(&self) -> PathBuf {
        self.root().join(STATUS_FILE_NAME)
    }

    pub fn package_dir(&self, package_hash: &str) -> PathBuf {
        self.root().join(package_hash)
    }

    pub fn package_metadata_path(&self, package_hash: &str) -> PathBuf {
        self.package_dir(package_hash)
            .join(PACKAGE_METADATA_FILE_NAME)
    }

    pub fn download_staging_path(&self) -> PathBuf {
        self.root().join(DOWNLOAD_STAGING_FILE_NAME)
    }

    pub fn unzipped_dir(&self) -> PathBuf {
        self.root().join(UNZIPPED_DIR_NAME)
    }

    pub fn ensure_root(&self) -> Result<PathBuf> {
        let root = self.root();
        fs::create_dir_all(&root)
            .storage_context(|| format!("failed to create store root {}", root.display()))?;
        Ok(root)
    }
}

/// `$HOME/.bundlepush`, or `%LOCALAPPDATA%\BundlePush` on Windows.
pub fn default_base_dir() -> anyhow::Result<PathBuf> {
    use anyhow::Context;

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows base directory")?;
        return Ok(PathBuf::from(app_data).join("BundlePush"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve base directory")?;
    Ok(PathBuf::from(home).join(".bundlepush"))
}

/// Package hashes name directories under the store root, so they must be a
/// single path segment that cannot collide with the store's own entries.
pub fn validate_package_hash(package_hash: &str) -> Result<()> {
    let reserved = [
        STATUS_FILE_NAME,
        DOWNLOAD_STAGING_FILE_NAME,
        UNZIPPED_DIR_NAME,
        TEST_STORE_FOLDER_NAME,
    ];
    let valid = !package_hash.trim().is_empty()
        && package_hash != "."
        && package_hash != ".."
        && !package_hash.contains(['/', '\\', ':'])
        && !reserved.contains(&package_hash);
    if !valid {
        return Err(UpdateError::MalformedInput(format!(
            "invalid package hash '{package_hash}'"
        )));
    }
    Ok(())
}

/// The bundle file name is joined onto package directories, so it must be a
/// plain file name.
pub fn validate_bundle_file_name(bundle_file_name: &str) -> Result<()> {
    let name = bundle_file_name.trim();
    if name.is_empty() {
        return Err(UpdateError::MalformedInput(
            "bundle file name must not be empty".to_string(),
        ));
    }
    if name != bundle_file_name
        || name.contains(['/', '\\', ':'])
        || name == "."
        || name == ".."
    {
        return Err(UpdateError::MalformedInput(format!(
            "bundle file name must be a plain file name: '{bundle_file_name}'"
        )));
    }
    Ok(())
}
