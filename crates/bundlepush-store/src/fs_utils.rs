use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, StorageContext};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Copies the tree under `src` into `dst`, overwriting files that already
/// exist there. Existing files in `dst` that are not in `src` are kept.
/// Symlinks are not followed or copied.
pub fn copy_dir_contents(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).storage_context(|| format!("failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).storage_context(|| format!("failed to read {}", src.display()))?
    {
        let entry = entry.storage_context(|| format!("failed to read {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .storage_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.file_type().is_symlink() {
            debug!(path = %src_path.display(), "skipping symlink");
            continue;
        }
        if metadata.is_dir() {
            copy_dir_contents(&src_path, &dst_path)?;
            continue;
        }

        copy_file(&src_path, &dst_path)?;
    }
    Ok(())
}

pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .storage_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(src, dst).storage_context(|| {
        format!("failed to copy {} to {}", src.display(), dst.display())
    })?;
    Ok(())
}

/// Renames `src` to `dst`, falling back to copy-and-delete across devices.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .storage_context(|| format!("failed to create {}", parent.display()))?;
    }

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_file(src, dst)?;
    fs::remove_file(src).storage_context(|| format!("failed to remove {}", src.display()))
}

/// Writes through a sibling temp file and renames it over `path`, so readers
/// see either the old content or the new content.
pub fn write_file_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .storage_context(|| format!("failed to create {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("state");
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp_path)
            .storage_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(contents)
            .storage_context(|| format!("failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .storage_context(|| format!("failed to sync {}", tmp_path.display()))?;
        drop(file);
        fs::rename(&tmp_path, path).storage_context(|| {
            format!(
                "failed to move {} over {}",
                tmp_path.display(),
                path.display()
            )
        })
    })();

    if result.is_err() {
        if let Err(err) = remove_file_if_exists(&tmp_path) {
            warn!(path = %tmp_path.display(), error = %err, "failed to remove temp file");
        }
    }
    result
}

/// Regular files under `root` as (`/`-separated relative path, absolute
/// path), sorted by relative path.
pub fn relative_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        for entry in
            fs::read_dir(&dir).storage_context(|| format!("failed to read {}", dir.display()))?
        {
            let entry = entry.storage_context(|| format!("failed to read {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .storage_context(|| format!("failed to stat {}", path.display()))?;
            if file_type.is_dir() {
                queue.push_back(path);
            } else if file_type.is_file() {
                files.push((relative_slash_path(root, &path), path));
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
