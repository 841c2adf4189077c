use std::path::{Path, PathBuf};

use crate::config::LayoutConfig;
use crate::error::PatchError;

/// One discovered application bundle. Paths are derived, never stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    root: PathBuf,
    display_name: String,
    layout: LayoutConfig,
}

impl Installation {
    pub fn new(root: impl Into<PathBuf>, layout: &LayoutConfig) -> Self {
        let root = root.into();
        let display_name = display_name_for(&root, &layout.bundle_suffix);
        Self {
            root,
            display_name,
            layout: layout.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn shared_support_dir(&self) -> PathBuf {
        self.root
            .join("Contents")
            .join("SharedSupport")
            .join(&self.layout.product)
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.shared_support_dir().join("lib")
    }

    pub fn native_lib_dir(&self) -> PathBuf {
        self.shared_support_dir().join("lib64")
    }

    pub fn wine_unix_dir(&self) -> PathBuf {
        self.shared_support_dir().join(&self.layout.wine_unix_dir)
    }

    pub fn replaceable_binary_path(&self) -> PathBuf {
        self.wine_unix_dir().join(&self.layout.replaceable_binary)
    }

    /// Path of the replaceable binary relative to the shared support dir.
    pub fn replaceable_binary_rel(&self) -> PathBuf {
        Path::new(&self.layout.wine_unix_dir).join(&self.layout.replaceable_binary)
    }

    pub fn native_lib_rel(&self) -> PathBuf {
        PathBuf::from("lib64")
    }

    pub fn marker_path(&self) -> PathBuf {
        self.shared_support_dir().join(&self.layout.marker)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.shared_support_dir().join(&self.layout.backup_dir)
    }

    pub fn backup_staging_dir(&self) -> PathBuf {
        self.shared_support_dir()
            .join(format!("{}.partial", self.layout.backup_dir))
    }

    /// Checks the subpaths a patch needs; nothing is touched.
    pub fn validate_for_apply(&self) -> Result<(), PatchError> {
        for required in [
            self.shared_support_dir(),
            self.native_lib_dir(),
            self.replaceable_binary_path(),
        ] {
            if !required.exists() {
                return Err(PatchError::InvalidInstallationLayout { missing: required });
            }
        }
        Ok(())
    }

    pub fn validate_for_restore(&self) -> Result<(), PatchError> {
        let shared = self.shared_support_dir();
        if !shared.is_dir() {
            return Err(PatchError::InvalidInstallationLayout { missing: shared });
        }
        Ok(())
    }
}

fn display_name_for(root: &Path, bundle_suffix: &str) -> String {
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    let cut = name.len().saturating_sub(bundle_suffix.len());
    if !bundle_suffix.is_empty()
        && name.is_char_boundary(cut)
        && name[cut..].eq_ignore_ascii_case(bundle_suffix)
        && cut > 0
    {
        return name[..cut].to_string();
    }
    name
}
