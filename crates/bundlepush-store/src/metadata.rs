use std::fs;
use std::io;
use std::path::PathBuf;

use bundlepush_core::{PackageMetadata, StatusRecord};
use tracing::debug;

use crate::error::{chain_message, Result, StorageContext, UpdateError};
use crate::fs_utils::write_file_atomically;
use crate::layout::StoreLayout;

/// Returns the empty record when no status file has been written yet.
pub fn read_status(layout: &StoreLayout) -> Result<StatusRecord> {
    let path = layout.status_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(StatusRecord::default()),
        Err(err) => {
            return Err(err)
                .storage_context(|| format!("failed to read status file {}", path.display()));
        }
    };

    StatusRecord::from_json_str(&raw).map_err(|err| UpdateError::CorruptState {
        path,
        reason: chain_message(&err),
    })
}

pub fn write_status(layout: &StoreLayout, status: &StatusRecord) -> Result<PathBuf> {
    layout.ensure_root()?;
    let path = layout.status_path();
    let payload = status
        .to_json_string()
        .map_err(|err| UpdateError::CorruptState {
            path: path.clone(),
            reason: chain_message(&err),
        })?;
    write_file_atomically(&path, payload.as_bytes())?;
    debug!(
        current = status.current_package.as_deref().unwrap_or("-"),
        previous = status.previous_package.as_deref().unwrap_or("-"),
        "status record written"
    );
    Ok(path)
}

/// A missing or unreadable record means the package is not installed.
pub fn read_package_metadata(layout: &StoreLayout, package_hash: &str) -> Option<PackageMetadata> {
    let path = layout.package_metadata_path(package_hash);
    let raw = fs::read_to_string(&path).ok()?;
    match PackageMetadata::from_json_str(&raw) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            debug!(path = %path.display(), error = %chain_message(&err), "ignoring unreadable package metadata");
            None
        }
    }
}

pub fn write_package_metadata(
    layout: &StoreLayout,
    package_hash: &str,
    metadata: &PackageMetadata,
) -> Result<PathBuf> {
    let path = layout.package_metadata_path(package_hash);
    let payload = metadata
        .to_json_string()
        .map_err(|err| UpdateError::MalformedInput(chain_message(&err)))?;
    write_file_atomically(&path, payload.as_bytes())?;
    Ok(path)
}

pub fn current_package_hash(layout: &StoreLayout) -> Result<Option<String>> {
    Ok(read_status(layout)?.current_package)
}

pub fn previous_package_hash(layout: &StoreLayout) -> Result<Option<String>> {
    Ok(read_status(layout)?.previous_package)
}

pub fn current_package(layout: &StoreLayout) -> Result<Option<PackageMetadata>> {
    Ok(current_package_hash(layout)?.and_then(|hash| read_package_metadata(layout, &hash)))
}

pub fn previous_package(layout: &StoreLayout) -> Result<Option<PackageMetadata>> {
    Ok(previous_package_hash(layout)?.and_then(|hash| read_package_metadata(layout, &hash)))
}

pub fn current_package_dir(layout: &StoreLayout) -> Result<Option<PathBuf>> {
    Ok(current_package_hash(layout)?.map(|hash| layout.package_dir(&hash)))
}

/// Absolute path of the bundle the app should load, if a package is current.
pub fn current_bundle_path(
    layout: &StoreLayout,
    bundle_file_name: &str,
) -> Result<Option<PathBuf>> {
    let Some(hash) = current_package_hash(layout)? else {
        return Ok(None);
    };
    let Some(metadata) = read_package_metadata(layout, &hash) else {
        return Ok(None);
    };

    let package_dir = layout.package_dir(&hash);
    let relative = metadata
        .relative_bundle_path
        .as_deref()
        .unwrap_or(bundle_file_name);
    Ok(Some(package_dir.join(relative)))
}
