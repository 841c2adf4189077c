use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gstpatch_core::{GstPatchConfig, Installation, PatchError};
use gstpatch_patcher::{check_artifact, inspect_state, Direction, PatchState};

/// Host capability the patched binary depends on.
pub(crate) trait CapabilityProbe {
    fn check(&self) -> Result<(), PatchError>;
}

pub(crate) struct FrameworkProbe {
    framework_dir: PathBuf,
}

impl FrameworkProbe {
    pub(crate) fn new(framework_dir: impl Into<PathBuf>) -> Self {
        Self {
            framework_dir: framework_dir.into(),
        }
    }
}

impl CapabilityProbe for FrameworkProbe {
    fn check(&self) -> Result<(), PatchError> {
        if self.framework_dir.is_dir() {
            return Ok(());
        }
        Err(PatchError::CapabilityMissing {
            path: self.framework_dir.clone(),
            hint: "install the GStreamer runtime package for macOS first".to_string(),
        })
    }
}

/// The configured artifact, or the replaceable binary's name next to the
/// running executable.
pub(crate) fn resolve_artifact_path(config: &GstPatchConfig) -> Result<PathBuf> {
    if let Some(artifact) = &config.artifact {
        return Ok(artifact.clone());
    }
    let exe = std::env::current_exe().context("failed to resolve the running executable")?;
    let dir = exe
        .parent()
        .with_context(|| format!("executable has no parent directory: {}", exe.display()))?;
    Ok(dir.join(&config.layout.replaceable_binary))
}

pub(crate) fn plans_apply(installs: &[Installation], direction: Direction) -> bool {
    match direction {
        Direction::Restore => false,
        Direction::Toggle | Direction::Apply => installs
            .iter()
            .any(|install| inspect_state(install) == PatchState::Unpatched),
    }
}

/// Fails the run up front when a patch is planned and the artifact is not usable.
pub(crate) fn ensure_artifact_for(
    installs: &[Installation],
    direction: Direction,
    artifact: &Path,
) -> Result<(), PatchError> {
    if plans_apply(installs, direction) {
        check_artifact(artifact)?;
    }
    Ok(())
}
