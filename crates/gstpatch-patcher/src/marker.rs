use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use gstpatch_core::Installation;

use crate::fs_utils::remove_path_if_exists;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Unpatched,
    Patched,
}

impl PatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpatched => "unpatched",
            Self::Patched => "patched",
        }
    }
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the marker file. Every field is optional so that any marker,
/// including a hand-written or empty one, still reads as patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchMarker {
    pub patched_at: Option<String>,
    pub artifact: Option<String>,
    pub artifact_sha256: Option<String>,
    pub backup_entries: Option<usize>,
}

/// Marker presence is the whole state. Any error while probing counts as
/// unpatched.
pub fn is_patched(install: &Installation) -> bool {
    install.marker_path().try_exists().unwrap_or(false)
}

pub fn inspect_state(install: &Installation) -> PatchState {
    if is_patched(install) {
        PatchState::Patched
    } else {
        PatchState::Unpatched
    }
}

pub fn write_marker(install: &Installation, marker: &PatchMarker) -> Result<PathBuf> {
    let path = install.marker_path();
    fs::write(&path, render_marker(marker).as_bytes())
        .with_context(|| format!("failed to write patch marker: {}", path.display()))?;
    Ok(path)
}

pub fn read_marker(install: &Installation) -> Result<Option<PatchMarker>> {
    let path = install.marker_path();
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read patch marker: {}", path.display()));
        }
    };
    Ok(Some(parse_marker(&String::from_utf8_lossy(&raw))))
}

pub fn clear_marker(install: &Installation) -> Result<bool> {
    remove_path_if_exists(&install.marker_path())
}

pub fn render_marker(marker: &PatchMarker) -> String {
    let mut payload = String::new();
    if let Some(patched_at) = &marker.patched_at {
        payload.push_str(&format!("patched_at={patched_at}\n"));
    }
    if let Some(artifact) = &marker.artifact {
        payload.push_str(&format!("artifact={artifact}\n"));
    }
    if let Some(sha256) = &marker.artifact_sha256 {
        payload.push_str(&format!("artifact_sha256={sha256}\n"));
    }
    if let Some(count) = marker.backup_entries {
        payload.push_str(&format!("backup_entries={count}\n"));
    }
    payload
}

pub(crate) fn parse_marker(raw: &str) -> PatchMarker {
    let mut marker = PatchMarker::default();
    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((key, value)) = line.split_once('=') else {
            // free-form payload, e.g. a bare timestamp
            if marker.patched_at.is_none() {
                marker.patched_at = Some(line.to_string());
            }
            continue;
        };
        match key.trim() {
            "patched_at" => marker.patched_at = Some(value.trim().to_string()),
            "artifact" => marker.artifact = Some(value.trim().to_string()),
            "artifact_sha256" => marker.artifact_sha256 = Some(value.trim().to_string()),
            "backup_entries" => marker.backup_entries = value.trim().parse().ok(),
            _ => {}
        }
    }

    marker
}
