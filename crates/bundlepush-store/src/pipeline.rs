use std::fs;
use std::path::{Path, PathBuf};

use bundlepush_core::PackageMetadata;
use tracing::{debug, info, warn};

use crate::assemble::{assemble_package, ArchiveExtractor, AssemblyRequest, UpdateKind};
use crate::download::{download_to_staging, DownloadProgress};
use crate::error::{Result, StorageContext, UpdateError};
use crate::fs_utils::{remove_dir_if_exists, remove_file_if_exists};
use crate::layout::{validate_bundle_file_name, validate_package_hash, StoreLayout};
use crate::metadata::{
    current_bundle_path, read_package_metadata, read_status, write_package_metadata,
};
use crate::source::{parse_download_url, PackageSource};
use crate::verify::{validate_public_key, verify_package};

#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    /// Release record from the update service; `packageHash` and
    /// `downloadUrl` are required, other fields are stored as-is.
    pub update: &'a PackageMetadata,
    pub expected_bundle_file_name: &'a str,
    pub public_key: Option<&'a str>,
}

/// Downloads, assembles and verifies a package into its directory and
/// writes its metadata record. The status record is not modified; call
/// [`install_package`](crate::install_package) to make it current.
///
/// A hash already recorded as current or previous is returned as stored,
/// so a referenced package directory is never rebuilt in place. On failure
/// the partially built package directory is removed and the installed
/// packages are left untouched. Callers must not run two cycles against
/// the same store at once.
pub fn download_package<P>(
    layout: &StoreLayout,
    source: &dyn PackageSource,
    extractor: &dyn ArchiveExtractor,
    request: &DownloadRequest<'_>,
    progress: P,
) -> Result<PackageMetadata>
where
    P: FnMut(DownloadProgress) + Send,
{
    let package_hash = request.update.package_hash.as_str();
    validate_package_hash(package_hash)?;
    let url = parse_download_url(&request.update.download_url)?;
    validate_bundle_file_name(request.expected_bundle_file_name)?;
    if let Some(public_key) = request.public_key {
        validate_public_key(public_key)?;
    }

    let status = read_status(layout)?;
    if status.current_package.as_deref() == Some(package_hash) {
        return read_package_metadata(layout, package_hash).ok_or_else(|| {
            UpdateError::CorruptState {
                path: layout.package_metadata_path(package_hash),
                reason: "current package has no readable metadata record".to_string(),
            }
        });
    }

    // The rollback target's directory must survive a failed re-download.
    if status.previous_package.as_deref() == Some(package_hash) {
        if let Some(metadata) = read_package_metadata(layout, package_hash) {
            info!(package = package_hash, "package already stored as rollback target");
            return Ok(metadata);
        }
        warn!(
            package = package_hash,
            "rollback target has no readable metadata record; rebuilding it"
        );
    }

    layout.ensure_root()?;
    let new_package_dir = layout.package_dir(package_hash);
    if new_package_dir.exists() {
        debug!(path = %new_package_dir.display(), "removing stale package directory");
        remove_dir_if_exists(&new_package_dir).storage_context(|| {
            format!("failed to remove stale package {}", new_package_dir.display())
        })?;
    }

    let staging = StagingArea::claim(layout)?;
    let current_package_dir = status
        .current_package
        .as_deref()
        .map(|hash| layout.package_dir(hash));

    let result = (|| -> Result<PackageMetadata> {
        let payload = download_to_staging(source, &url, &staging.download_file, progress)?;
        let assembled = assemble_package(
            extractor,
            &AssemblyRequest {
                staged_file: &payload.path,
                payload_kind: payload.kind,
                unzipped_dir: &staging.unzipped_dir,
                current_package_dir: current_package_dir.as_deref(),
                new_package_dir: &new_package_dir,
                expected_bundle_file_name: request.expected_bundle_file_name,
            },
        )?;

        if assembled.update_kind != UpdateKind::RawBundle {
            let plan = verify_package(
                &new_package_dir,
                package_hash,
                assembled.update_kind,
                request.public_key,
            )?;
            debug!(?plan, "package verification passed");
        }

        let metadata = request
            .update
            .clone()
            .with_relative_bundle_path(assembled.relative_bundle_path);
        write_package_metadata(layout, package_hash, &metadata)?;
        Ok(metadata)
    })();

    match &result {
        Ok(_) => info!(package = package_hash, "package downloaded"),
        Err(err) => {
            warn!(package = package_hash, error = %err, "package download failed");
            if let Err(cleanup_err) = remove_dir_if_exists(&new_package_dir) {
                warn!(
                    path = %new_package_dir.display(),
                    error = %cleanup_err,
                    "failed to remove partial package directory"
                );
            }
        }
    }
    result
}

/// Re-downloads the current package's bundle file in place. The old file
/// stays in place until the new one has been received completely.
pub fn replace_current_bundle(
    layout: &StoreLayout,
    source: &dyn PackageSource,
    bundle_url: &str,
    bundle_file_name: &str,
) -> Result<PathBuf> {
    let url = parse_download_url(bundle_url)?;
    validate_bundle_file_name(bundle_file_name)?;
    let bundle_path = current_bundle_path(layout, bundle_file_name)?.ok_or_else(|| {
        UpdateError::InvalidUpdate("no current package to replace the bundle of".to_string())
    })?;
    let tmp_path = sibling_download_path(&bundle_path);

    if let Err(err) = download_to_staging(source, &url, &tmp_path, |_| {}) {
        if let Err(cleanup_err) = remove_file_if_exists(&tmp_path) {
            warn!(
                path = %tmp_path.display(),
                error = %cleanup_err,
                "failed to remove partial bundle download"
            );
        }
        return Err(err);
    }
    fs::rename(&tmp_path, &bundle_path).storage_context(|| {
        format!(
            "failed to move {} over {}",
            tmp_path.display(),
            bundle_path.display()
        )
    })?;
    info!(bundle = %bundle_path.display(), "current bundle replaced");
    Ok(bundle_path)
}

fn sibling_download_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("bundle");
    path.with_file_name(format!(".{file_name}.download"))
}

/// Download file and unzip directory for one cycle. Leftovers from a crashed
/// cycle are removed on claim; both are removed again on drop.
struct StagingArea {
    download_file: PathBuf,
    unzipped_dir: PathBuf,
}

impl StagingArea {
    fn claim(layout: &StoreLayout) -> Result<Self> {
        let staging = Self {
            download_file: layout.download_staging_path(),
            unzipped_dir: layout.unzipped_dir(),
        };
        staging.clear().storage_context(|| {
            format!(
                "failed to clear staging artifacts in {}",
                layout.root().display()
            )
        })?;
        Ok(staging)
    }

    fn clear(&self) -> std::io::Result<()> {
        remove_file_if_exists(&self.download_file)?;
        remove_dir_if_exists(&self.unzipped_dir)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(err) = self.clear() {
            warn!(error = %err, "failed to remove staging artifacts");
        }
    }
}
