use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    PreconditionMissing,
    NoInstallationsFound,
    InvalidInstallationLayout,
    NoBackupFound,
    BackupFailure,
    PartialMutationFailure,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreconditionMissing => "precondition-missing",
            Self::NoInstallationsFound => "no-installations-found",
            Self::InvalidInstallationLayout => "invalid-installation-layout",
            Self::NoBackupFound => "no-backup-found",
            Self::BackupFailure => "backup-failure",
            Self::PartialMutationFailure => "partial-mutation-failure",
        }
    }
}

/// The destructive step that was running when a patch or restore broke off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStep {
    RemoveLibraries,
    InstallArtifact,
    WriteMarker,
    RestoreFiles,
    ClearMarker,
}

impl fmt::Display for MutationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::RemoveLibraries => "removing bundled libraries",
            Self::InstallArtifact => "installing replacement binary",
            Self::WriteMarker => "writing patch marker",
            Self::RestoreFiles => "restoring backed-up files",
            Self::ClearMarker => "clearing patch marker",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("required system component not found: {} ({hint})", path.display())]
    CapabilityMissing { path: PathBuf, hint: String },

    #[error("replacement artifact not found or unreadable: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("no installations found under {}", root.display())]
    NoInstallationsFound { root: PathBuf },

    #[error("failed to scan {} for installations: {reason}", root.display())]
    DiscoveryFailed { root: PathBuf, reason: String },

    #[error("invalid installation layout: {} is missing", missing.display())]
    InvalidInstallationLayout { missing: PathBuf },

    #[error("no backup found at {}", path.display())]
    NoBackupFound { path: PathBuf },

    #[error("backup failed, installation left untouched: {reason}")]
    BackupFailure { reason: String },

    #[error("{step} failed; originals are kept in {} for manual recovery: {reason}", backup.display())]
    PartialMutationFailure {
        step: MutationStep,
        backup: PathBuf,
        reason: String,
    },
}

impl PatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CapabilityMissing { .. } | Self::ArtifactMissing { .. } => {
                ErrorCategory::PreconditionMissing
            }
            Self::NoInstallationsFound { .. } | Self::DiscoveryFailed { .. } => {
                ErrorCategory::NoInstallationsFound
            }
            Self::InvalidInstallationLayout { .. } => ErrorCategory::InvalidInstallationLayout,
            Self::NoBackupFound { .. } => ErrorCategory::NoBackupFound,
            Self::BackupFailure { .. } => ErrorCategory::BackupFailure,
            Self::PartialMutationFailure { .. } => ErrorCategory::PartialMutationFailure,
        }
    }

    pub fn needs_manual_recovery(&self) -> bool {
        matches!(self, Self::PartialMutationFailure { .. })
    }
}
