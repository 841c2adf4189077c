//! Snapshot and restore of the files a patch removes or overwrites.
//!
//! The backup lives inside the installation's shared support dir and mirrors
//! the layout relative to it: `lib64/<entry>` for bundled libraries and the
//! wine unix dir path for the replaceable binary.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use gstpatch_core::{matches_any, Installation, LibraryRule, MutationStep, PatchError};

use crate::fs_utils::{
    copy_into_place, copy_tree, is_staging_name, path_exists_no_follow, remove_path_if_exists,
};
use crate::live_fs::{HostFs, LiveFsPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// Relative to the shared support dir.
    pub relative: PathBuf,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    pub root: PathBuf,
    pub entries: Vec<BackupEntry>,
}

impl BackupSet {
    /// Entries under the native-library dir, i.e. the ones a patch deletes.
    pub fn library_entries<'a>(
        &'a self,
        install: &'a Installation,
    ) -> impl Iterator<Item = &'a BackupEntry> + 'a {
        let lib_rel = install.native_lib_rel();
        self.entries
            .iter()
            .filter(move |entry| entry.relative.starts_with(&lib_rel))
    }

    pub fn contains(&self, relative: &Path) -> bool {
        self.entries.iter().any(|entry| entry.relative == relative)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub backup_removed: bool,
}

/// Lists the live entries a patch would remove or overwrite, sorted by path.
pub fn collect_backup_targets(
    install: &Installation,
    rules: &[LibraryRule],
) -> Result<Vec<BackupEntry>> {
    let lib_dir = install.native_lib_dir();
    let mut entries = Vec::new();
    for entry in fs::read_dir(&lib_dir)
        .with_context(|| format!("failed to read library directory: {}", lib_dir.display()))?
    {
        let entry = entry
            .with_context(|| format!("failed to iterate directory: {}", lib_dir.display()))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !matches_any(rules, name) {
            continue;
        }
        entries.push(BackupEntry {
            relative: install.native_lib_rel().join(name),
            kind: entry_kind(&entry.path())?,
        });
    }
    entries.sort_by(|a, b| a.relative.cmp(&b.relative));

    let binary = install.replaceable_binary_path();
    if path_exists_no_follow(&binary) {
        entries.push(BackupEntry {
            relative: install.replaceable_binary_rel(),
            kind: entry_kind(&binary)?,
        });
    }

    Ok(entries)
}

/// Captures every target entry into the backup dir and returns the captured
/// set. Nothing outside the backup area is modified.
///
/// A fresh backup is assembled in a staging dir and renamed into place when
/// complete. An existing complete backup is authoritative: entries it already
/// holds are kept as they are, missing ones are added one at a time.
pub fn create_backup(
    install: &Installation,
    rules: &[LibraryRule],
) -> Result<BackupSet, PatchError> {
    let backup_failure = |err: anyhow::Error| PatchError::BackupFailure {
        reason: format!("{err:#}"),
    };

    let targets = collect_backup_targets(install, rules).map_err(backup_failure)?;
    let shared = install.shared_support_dir();
    let backup_dir = install.backup_dir();

    if backup_dir.is_dir() {
        tracing::info!(
            backup = %backup_dir.display(),
            "extending existing backup left by an interrupted patch"
        );
        for target in &targets {
            let saved = backup_dir.join(&target.relative);
            if path_exists_no_follow(&saved) {
                continue;
            }
            copy_into_place(&shared.join(&target.relative), &saved).map_err(backup_failure)?;
        }
    } else {
        let staging = install.backup_staging_dir();
        stage_backup(&shared, &staging, &backup_dir, &targets).map_err(|err| {
            if let Err(cleanup) = remove_path_if_exists(&staging) {
                tracing::warn!(
                    staging = %staging.display(),
                    "failed to clean up partial backup: {cleanup:#}"
                );
            }
            backup_failure(err)
        })?;
    }

    tracing::info!(
        backup = %backup_dir.display(),
        entries = targets.len(),
        "backup complete"
    );
    Ok(BackupSet {
        root: backup_dir,
        entries: targets,
    })
}

fn stage_backup(
    shared: &Path,
    staging: &Path,
    backup_dir: &Path,
    targets: &[BackupEntry],
) -> Result<()> {
    remove_path_if_exists(staging)?;
    fs::create_dir_all(staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    for target in targets {
        copy_tree(&shared.join(&target.relative), &staging.join(&target.relative))?;
    }
    if path_exists_no_follow(backup_dir) {
        remove_path_if_exists(backup_dir)?;
    }
    fs::rename(staging, backup_dir).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            backup_dir.display()
        )
    })
}

/// Reads what a completed backup holds.
pub fn read_backup_set(install: &Installation) -> Result<BackupSet, PatchError> {
    let backup_dir = install.backup_dir();
    if !backup_dir.is_dir() {
        return Err(PatchError::NoBackupFound { path: backup_dir });
    }
    scan_backup(install, &backup_dir).map_err(|err| PatchError::PartialMutationFailure {
        step: MutationStep::RestoreFiles,
        backup: backup_dir.clone(),
        reason: format!("{err:#}"),
    })
}

fn scan_backup(install: &Installation, backup_dir: &Path) -> Result<BackupSet> {
    let mut entries = Vec::new();
    let saved_lib_dir = backup_dir.join(install.native_lib_rel());
    if saved_lib_dir.is_dir() {
        for entry in fs::read_dir(&saved_lib_dir)
            .with_context(|| format!("failed to read {}", saved_lib_dir.display()))?
        {
            let entry = entry
                .with_context(|| format!("failed to iterate {}", saved_lib_dir.display()))?;
            if is_staging_name(&entry.file_name()) {
                tracing::debug!(path = %entry.path().display(), "ignoring partial copy in backup");
                continue;
            }
            entries.push(BackupEntry {
                relative: install.native_lib_rel().join(entry.file_name()),
                kind: entry_kind(&entry.path())?,
            });
        }
    }
    entries.sort_by(|a, b| a.relative.cmp(&b.relative));

    let saved_binary = backup_dir.join(install.replaceable_binary_rel());
    if path_exists_no_follow(&saved_binary) {
        entries.push(BackupEntry {
            relative: install.replaceable_binary_rel(),
            kind: entry_kind(&saved_binary)?,
        });
    }

    Ok(BackupSet {
        root: backup_dir.to_path_buf(),
        entries,
    })
}

/// Puts every backed-up entry back, then clears the marker, then deletes the
/// backup. Backup deletion is best-effort and never fails the restore.
pub fn restore_backup(install: &Installation) -> Result<RestoreReport, PatchError> {
    restore_backup_with(&HostFs, install)
}

/// [`restore_backup`] with the live-file mutations routed through `live`.
pub fn restore_backup_with(
    live: &dyn LiveFsPort,
    install: &Installation,
) -> Result<RestoreReport, PatchError> {
    install.validate_for_restore()?;
    let set = read_backup_set(install)?;
    let shared = install.shared_support_dir();
    let partial = |step: MutationStep, err: anyhow::Error| PatchError::PartialMutationFailure {
        step,
        backup: set.root.clone(),
        reason: format!("{err:#}"),
    };

    for entry in &set.entries {
        let path = shared.join(&entry.relative);
        live.replace_entry(&set.root.join(&entry.relative), &path).map_err(|err| {
            tracing::error!(
                installation = %install.display_name(),
                path = %path.display(),
                "restore step failed: {err:#}"
            );
            partial(MutationStep::RestoreFiles, err)
        })?;
    }

    live.clear_marker(install).map_err(|err| {
        tracing::error!(
            installation = %install.display_name(),
            "failed to clear patch marker: {err:#}"
        );
        partial(MutationStep::ClearMarker, err)
    })?;

    let backup_removed = match remove_path_if_exists(&set.root) {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(
                backup = %set.root.display(),
                "restore succeeded but the backup could not be removed: {err:#}"
            );
            false
        }
    };

    tracing::info!(
        installation = %install.display_name(),
        restored = set.entries.len(),
        "restore complete"
    );
    Ok(RestoreReport {
        restored: set.entries.len(),
        backup_removed,
    })
}

fn entry_kind(path: &Path) -> Result<EntryKind> {
    let metadata =
        fs::symlink_metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let file_type = metadata.file_type();
    Ok(if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    })
}
