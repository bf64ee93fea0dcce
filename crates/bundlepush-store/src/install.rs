use tracing::{info, warn};

use crate::error::{Result, StorageContext, UpdateError};
use crate::fs_utils::remove_dir_if_exists;
use crate::layout::{validate_package_hash, StoreLayout};
use crate::metadata::{read_package_metadata, read_status, write_status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyCurrent,
    Installed {
        previous: Option<String>,
    },
    /// The pending package was discarded instead of kept for rollback.
    ReplacedPending,
}

/// Makes `package_hash` the current package.
///
/// With `remove_pending_update` the existing current package is deleted and
/// `previous` is left as it was. Otherwise the current package becomes the
/// rollback target and the older previous package is deleted. The status
/// record is written after every directory change.
pub fn install_package(
    layout: &StoreLayout,
    package_hash: &str,
    remove_pending_update: bool,
) -> Result<InstallOutcome> {
    validate_package_hash(package_hash)?;
    let mut status = read_status(layout)?;
    if status.current_package.as_deref() == Some(package_hash) {
        info!(package = package_hash, "package already current");
        return Ok(InstallOutcome::AlreadyCurrent);
    }

    if read_package_metadata(layout, package_hash).is_none() {
        return Err(UpdateError::InvalidUpdate(format!(
            "package {package_hash} has no metadata record in {}",
            layout.package_dir(package_hash).display()
        )));
    }

    let outcome = if remove_pending_update {
        if let Some(current) = status.current_package.as_deref() {
            delete_package_dir(layout, current)?;
        }
        InstallOutcome::ReplacedPending
    } else {
        if let Some(previous) = status.previous_package.as_deref() {
            if previous != package_hash {
                delete_package_dir(layout, previous)?;
            }
        }
        status.previous_package = status.current_package.take();
        InstallOutcome::Installed {
            previous: status.previous_package.clone(),
        }
    };

    status.current_package = Some(package_hash.to_string());
    write_status(layout, &status)?;
    info!(
        package = package_hash,
        previous = status.previous_package.as_deref().unwrap_or("-"),
        discarded_pending = remove_pending_update,
        "package installed"
    );
    Ok(outcome)
}

/// Restores the previous package. Fails without touching the store when
/// there is nothing to roll back to or the previous package is unreadable.
pub fn rollback_package(layout: &StoreLayout) -> Result<String> {
    let mut status = read_status(layout)?;
    let Some(previous) = status.previous_package.take() else {
        warn!("rollback requested but no previous package is recorded");
        return Err(UpdateError::NoRollbackTarget);
    };
    if read_package_metadata(layout, &previous).is_none() {
        warn!(package = %previous, "rollback target has no readable metadata record");
        return Err(UpdateError::CorruptState {
            path: layout.package_metadata_path(&previous),
            reason: format!("rollback target {previous} has no readable metadata record"),
        });
    }

    if let Some(current) = status.current_package.as_deref() {
        if current != previous {
            delete_package_dir(layout, current)?;
        }
    }

    status.current_package = Some(previous.clone());
    write_status(layout, &status)?;
    info!(package = %previous, "rolled back to previous package");
    Ok(previous)
}

/// Deletes the whole store root, including status and every package.
pub fn clear_updates(layout: &StoreLayout) -> Result<()> {
    let root = layout.root();
    remove_dir_if_exists(&root)
        .storage_context(|| format!("failed to remove store root {}", root.display()))?;
    info!(root = %root.display(), "cleared all updates");
    Ok(())
}

fn delete_package_dir(layout: &StoreLayout, package_hash: &str) -> Result<()> {
    let dir = layout.package_dir(package_hash);
    remove_dir_if_exists(&dir)
        .storage_context(|| format!("failed to remove package {}", dir.display()))
}
