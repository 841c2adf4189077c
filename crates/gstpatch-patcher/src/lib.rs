mod apply;
mod backup;
mod checksum;
mod controller;
mod fs_utils;
mod live_fs;
mod marker;

pub use apply::{apply_patch, apply_patch_with, check_artifact, ApplyReport};
pub use backup::{
    collect_backup_targets, create_backup, read_backup_set, restore_backup, restore_backup_with,
    BackupEntry, BackupSet, EntryKind, RestoreReport,
};
pub use checksum::{sha256_file, sha256_hex};
pub use controller::{
    BatchEvent, BatchSummary, Direction, InstallOutcome, Outcome, PatchController,
};
pub use live_fs::{HostFs, LiveFsPort};
pub use marker::{
    clear_marker, inspect_state, is_patched, read_marker, render_marker, write_marker,
    PatchMarker, PatchState,
};
