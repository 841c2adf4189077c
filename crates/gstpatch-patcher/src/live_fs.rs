use std::path::{Path, PathBuf};

use anyhow::Result;
use gstpatch_core::Installation;

use crate::fs_utils::{copy_into_place, remove_path_if_exists};
use crate::marker::{self, PatchMarker};

/// Mutations of an installation's live files once its backup is complete.
/// Each method maps to one [`gstpatch_core::MutationStep`].
pub trait LiveFsPort {
    fn remove_entry(&self, path: &Path) -> Result<bool>;
    fn replace_entry(&self, src: &Path, dst: &Path) -> Result<()>;
    fn write_marker(&self, install: &Installation, marker: &PatchMarker) -> Result<PathBuf>;
    fn clear_marker(&self, install: &Installation) -> Result<bool>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl LiveFsPort for HostFs {
    fn remove_entry(&self, path: &Path) -> Result<bool> {
        remove_path_if_exists(path)
    }

    fn replace_entry(&self, src: &Path, dst: &Path) -> Result<()> {
        copy_into_place(src, dst)
    }

    fn write_marker(&self, install: &Installation, marker: &PatchMarker) -> Result<PathBuf> {
        marker::write_marker(install, marker)
    }

    fn clear_marker(&self, install: &Installation) -> Result<bool> {
        marker::clear_marker(install)
    }
}
