use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use gstpatch_core::{Installation, LibraryRule, MutationStep, PatchError};

use crate::backup::{create_backup, BackupSet};
use crate::checksum::sha256_file;
use crate::live_fs::{HostFs, LiveFsPort};
use crate::marker::PatchMarker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub backup: BackupSet,
    pub removed: Vec<PathBuf>,
    pub marker: PatchMarker,
}

/// Checks that the artifact is a readable regular file and returns its digest.
pub fn check_artifact(artifact: &Path) -> Result<String, PatchError> {
    let missing = || PatchError::ArtifactMissing {
        path: artifact.to_path_buf(),
    };
    if !artifact.is_file() {
        return Err(missing());
    }
    File::open(artifact).map_err(|_| missing())?;
    sha256_file(artifact).map_err(|err| {
        tracing::warn!(artifact = %artifact.display(), "artifact unreadable: {err:#}");
        missing()
    })
}

/// Patches one installation: backup, remove bundled libraries, install the
/// artifact, write the marker. Layout and artifact are checked before the
/// backup, and nothing outside the backup area changes until the backup is
/// complete.
pub fn apply_patch(
    install: &Installation,
    artifact: &Path,
    rules: &[LibraryRule],
) -> Result<ApplyReport, PatchError> {
    apply_patch_with(&HostFs, install, artifact, rules)
}

/// [`apply_patch`] with the post-backup mutations routed through `live`.
pub fn apply_patch_with(
    live: &dyn LiveFsPort,
    install: &Installation,
    artifact: &Path,
    rules: &[LibraryRule],
) -> Result<ApplyReport, PatchError> {
    install.validate_for_apply()?;
    let artifact_sha256 = check_artifact(artifact)?;

    let backup = create_backup(install, rules)?;
    let shared = install.shared_support_dir();
    let partial = |step: MutationStep, err: anyhow::Error| {
        tracing::error!(
            installation = %install.display_name(),
            backup = %backup.root.display(),
            "patch stopped while {step}: {err:#}"
        );
        PatchError::PartialMutationFailure {
            step,
            backup: backup.root.clone(),
            reason: format!("{err:#}"),
        }
    };

    let mut removed = Vec::new();
    for entry in backup.library_entries(install) {
        let path = shared.join(&entry.relative);
        if live
            .remove_entry(&path)
            .map_err(|err| partial(MutationStep::RemoveLibraries, err))?
        {
            removed.push(entry.relative.clone());
        }
    }
    tracing::info!(
        installation = %install.display_name(),
        removed = removed.len(),
        "removed bundled libraries"
    );

    live.replace_entry(artifact, &install.replaceable_binary_path())
        .map_err(|err| partial(MutationStep::InstallArtifact, err))?;

    let marker = PatchMarker {
        patched_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        artifact: Some(artifact.display().to_string()),
        artifact_sha256: Some(artifact_sha256),
        backup_entries: Some(backup.entries.len()),
    };
    live.write_marker(install, &marker)
        .map_err(|err| partial(MutationStep::WriteMarker, err))?;

    tracing::info!(installation = %install.display_name(), "patch applied");
    Ok(ApplyReport {
        backup,
        removed,
        marker,
    })
}
