use std::collections::VecDeque;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use bundlepush_core::{DiffManifest, PayloadKind, DIFF_MANIFEST_FILE_NAME};
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{chain_message, Result, StorageContext, UpdateError};
use crate::fs_utils::{
    copy_dir_contents, copy_file, move_file, relative_files, relative_slash_path,
    remove_dir_if_exists, remove_file_if_exists,
};
use crate::layout::PACKAGE_METADATA_FILE_NAME;
use crate::verify::SIGNATURE_FILE_NAME;

/// The "unzip" capability: unpack `archive_path` into `destination`.
pub trait ArchiveExtractor {
    fn extract(&self, archive_path: &Path, destination: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive_path: &Path, destination: &Path) -> Result<()> {
        let file = File::open(archive_path)
            .storage_context(|| format!("failed to open {}", archive_path.display()))?;
        let mut archive = ZipArchive::new(file).map_err(|err| {
            UpdateError::InvalidUpdate(format!("update archive is not a readable zip: {err}"))
        })?;
        fs::create_dir_all(destination)
            .storage_context(|| format!("failed to create {}", destination.display()))?;

        archive.extract(destination).map_err(|err| match err {
            ZipError::Io(source) => UpdateError::Storage {
                context: format!(
                    "failed to extract {} into {}",
                    archive_path.display(),
                    destination.display()
                ),
                source,
            },
            other => UpdateError::InvalidUpdate(format!("failed to extract update archive: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    RawBundle,
    Full,
    Diff,
}

impl UpdateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RawBundle => "raw-bundle",
            Self::Full => "full",
            Self::Diff => "diff",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPackage {
    /// `/`-separated path of the bundle entry point inside the package.
    pub relative_bundle_path: String,
    pub update_kind: UpdateKind,
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    pub staged_file: &'a Path,
    pub payload_kind: PayloadKind,
    pub unzipped_dir: &'a Path,
    pub current_package_dir: Option<&'a Path>,
    pub new_package_dir: &'a Path,
    pub expected_bundle_file_name: &'a str,
}

/// Materializes the new package directory from a staged download.
pub fn assemble_package(
    extractor: &dyn ArchiveExtractor,
    request: &AssemblyRequest<'_>,
) -> Result<AssembledPackage> {
    if !request.payload_kind.is_container() {
        move_file(
            request.staged_file,
            &request.new_package_dir.join(request.expected_bundle_file_name),
        )?;
        info!("applying single-file bundle update");
        return Ok(AssembledPackage {
            relative_bundle_path: request.expected_bundle_file_name.to_string(),
            update_kind: UpdateKind::RawBundle,
        });
    }

    remove_dir_if_exists(request.unzipped_dir).storage_context(|| {
        format!(
            "failed to clear stale unzip directory {}",
            request.unzipped_dir.display()
        )
    })?;
    extractor.extract(request.staged_file, request.unzipped_dir)?;
    if let Err(err) = remove_file_if_exists(request.staged_file) {
        warn!(
            path = %request.staged_file.display(),
            error = %err,
            "failed to remove staged archive"
        );
    }

    let manifest_path = request.unzipped_dir.join(DIFF_MANIFEST_FILE_NAME);
    let update_kind = if manifest_path.is_file() {
        let manifest = read_diff_manifest(&manifest_path)?;
        let current_package_dir = request.current_package_dir.ok_or_else(|| {
            UpdateError::InvalidUpdate(
                "diff update received but no current package is installed".to_string(),
            )
        })?;
        fs::create_dir_all(request.new_package_dir).storage_context(|| {
            format!("failed to create {}", request.new_package_dir.display())
        })?;
        copy_retained_files(&manifest, current_package_dir, request.new_package_dir)?;
        fs::remove_file(&manifest_path)
            .storage_context(|| format!("failed to remove {}", manifest_path.display()))?;
        UpdateKind::Diff
    } else {
        UpdateKind::Full
    };

    copy_dir_contents(request.unzipped_dir, request.new_package_dir)?;
    remove_dir_if_exists(request.unzipped_dir).storage_context(|| {
        format!("failed to remove {}", request.unzipped_dir.display())
    })?;

    let stale_metadata = request.new_package_dir.join(PACKAGE_METADATA_FILE_NAME);
    remove_file_if_exists(&stale_metadata)
        .storage_context(|| format!("failed to remove {}", stale_metadata.display()))?;

    let relative_bundle_path =
        find_bundle_file(request.new_package_dir, request.expected_bundle_file_name)?
            .ok_or_else(|| {
                UpdateError::InvalidUpdate(format!(
                    "no bundle file named \"{}\" was found in the update contents",
                    request.expected_bundle_file_name
                ))
            })?;

    info!(
        kind = update_kind.as_str(),
        bundle = %relative_bundle_path,
        "applying container update"
    );
    Ok(AssembledPackage {
        relative_bundle_path,
        update_kind,
    })
}

fn read_diff_manifest(path: &Path) -> Result<DiffManifest> {
    let raw = fs::read_to_string(path)
        .storage_context(|| format!("failed to read diff manifest {}", path.display()))?;
    DiffManifest::from_json_str(&raw).map_err(|err| UpdateError::InvalidUpdate(chain_message(&err)))
}

fn copy_retained_files(
    manifest: &DiffManifest,
    current_package_dir: &Path,
    new_package_dir: &Path,
) -> Result<()> {
    if let Some(retained_files) = &manifest.retained_files {
        for relative in retained_files {
            let source = current_package_dir.join(relative);
            let destination = new_package_dir.join(relative);
            if source.is_dir() {
                copy_dir_contents(&source, &destination)?;
            } else if source.is_file() {
                copy_file(&source, &destination)?;
            } else {
                return Err(UpdateError::InvalidUpdate(format!(
                    "diff manifest retains '{relative}' but the current package has no such file"
                )));
            }
        }
        debug!(count = retained_files.len(), "copied retained files from current package");
        return Ok(());
    }

    let mut copied = 0_usize;
    for (relative, source) in relative_files(current_package_dir)? {
        if relative == PACKAGE_METADATA_FILE_NAME
            || relative == SIGNATURE_FILE_NAME
            || manifest.is_deleted(&relative)
        {
            continue;
        }
        copy_file(&source, &new_package_dir.join(&relative))?;
        copied += 1;
    }
    debug!(
        copied,
        deleted = manifest.deleted_files.len(),
        "carried current package forward"
    );
    Ok(())
}

/// Returns the bundle's path relative to `package_dir`. A file at the root
/// wins; otherwise the shallowest match in sorted directory order.
pub fn find_bundle_file(package_dir: &Path, bundle_file_name: &str) -> Result<Option<String>> {
    if package_dir.join(bundle_file_name).is_file() {
        return Ok(Some(bundle_file_name.to_string()));
    }

    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(package_dir.to_path_buf());
    while let Some(dir) = queue.pop_front() {
        let mut entries = Vec::new();
        for entry in
            fs::read_dir(&dir).storage_context(|| format!("failed to read {}", dir.display()))?
        {
            let entry = entry.storage_context(|| format!("failed to read {}", dir.display()))?;
            entries.push(entry.path());
        }
        entries.sort();

        for path in entries {
            if path.is_dir() {
                queue.push_back(path);
            } else if path.file_name().and_then(|name| name.to_str()) == Some(bundle_file_name) {
                return Ok(Some(relative_slash_path(package_dir, &path)));
            }
        }
    }

    Ok(None)
}
