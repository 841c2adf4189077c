use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const STAGING_SUFFIX: &str = ".gstpatch-tmp";

/// Removes a file, symlink or directory tree. Returns whether anything was there.
pub fn remove_path_if_exists(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to stat {}", path.display()));
        }
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory {}", path.display()))?;
    } else {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(true)
}

pub fn path_exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Copies `src` to `dst` keeping entry types: directories recurse, symlinks
/// are recreated as symlinks, regular files keep their permissions.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(src)
        .with_context(|| format!("failed to stat source path: {}", src.display()))?;

    if metadata.is_dir() {
        fs::create_dir_all(dst)
            .with_context(|| format!("failed to create directory: {}", dst.display()))?;
        for entry in
            fs::read_dir(src).with_context(|| format!("failed to read directory: {}", src.display()))?
        {
            let entry =
                entry.with_context(|| format!("failed to iterate directory: {}", src.display()))?;
            copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
        }
        return Ok(());
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(src)
            .with_context(|| format!("failed to read symlink: {}", src.display()))?;
        std::os::unix::fs::symlink(&target, dst).with_context(|| {
            format!(
                "failed to copy symlink {} -> {}",
                dst.display(),
                target.display()
            )
        })?;
        return Ok(());
    }

    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Copies `src` next to `dst` under a temporary name, then renames it over
/// `dst`. A reader never observes a half-written `dst`.
pub fn copy_into_place(src: &Path, dst: &Path) -> Result<()> {
    let staging = staging_sibling(dst)?;
    remove_path_if_exists(&staging)?;
    if let Err(err) = copy_tree(src, &staging) {
        let _ = remove_path_if_exists(&staging);
        return Err(err);
    }

    if fs::symlink_metadata(dst).is_ok_and(|metadata| metadata.is_dir()) {
        remove_path_if_exists(dst)?;
    }
    if let Err(err) = fs::rename(&staging, dst) {
        let _ = remove_path_if_exists(&staging);
        return Err(err).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                staging.display(),
                dst.display()
            )
        });
    }
    Ok(())
}

/// Whether `name` is a temporary copy left by an interrupted [`copy_into_place`].
pub fn is_staging_name(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

fn staging_sibling(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .with_context(|| format!("path has no parent directory: {}", path.display()))?;
    let name = path
        .file_name()
        .with_context(|| format!("path has no file name: {}", path.display()))?;
    Ok(parent.join(format!(".{}{STAGING_SUFFIX}", name.to_string_lossy())))
}
