use std::fs;
use std::io;
use std::path::Path;

use crate::config::LayoutConfig;
use crate::error::PatchError;
use crate::layout::Installation;
use crate::rules::BundleMatcher;

/// Scans the immediate children of `root` for matching bundle directories.
///
/// Results keep directory-enumeration order. A missing `root` yields an empty
/// list; other read errors are reported as `DiscoveryFailed`.
pub fn locate_installations(
    root: &Path,
    matcher: &BundleMatcher,
    layout: &LayoutConfig,
) -> Result<Vec<Installation>, PatchError> {
    let discovery_failed = |err: io::Error| PatchError::DiscoveryFailed {
        root: root.to_path_buf(),
        reason: err.to_string(),
    };

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(discovery_failed(err)),
    };

    let mut installations = Vec::new();
    for entry in entries {
        let entry = entry.map_err(discovery_failed)?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !matcher.matches(&name) {
            continue;
        }
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        installations.push(Installation::new(path, layout));
    }

    Ok(installations)
}

/// Same as [`locate_installations`] but treats an empty result as an error.
pub fn require_installations(
    root: &Path,
    matcher: &BundleMatcher,
    layout: &LayoutConfig,
) -> Result<Vec<Installation>, PatchError> {
    let installations = locate_installations(root, matcher, layout)?;
    if installations.is_empty() {
        return Err(PatchError::NoInstallationsFound {
            root: root.to_path_buf(),
        });
    }
    Ok(installations)
}
