use std::path::PathBuf;

use gstpatch_core::{GstPatchConfig, Installation, LibraryRule, PatchError};

use crate::apply::apply_patch;
use crate::backup::restore_backup;
use crate::marker::{inspect_state, PatchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Unpatched goes to patched, patched goes back to stock.
    Toggle,
    /// Only patch; patched installations are skipped.
    Apply,
    /// Only restore; installations with neither marker nor backup are skipped.
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Patched { removed: usize, backup: PathBuf },
    Restored { restored: usize, backup_removed: bool },
    Skipped { state: PatchState },
}

impl Outcome {
    pub fn resulting_state(&self) -> PatchState {
        match self {
            Self::Patched { .. } => PatchState::Patched,
            Self::Restored { .. } => PatchState::Unpatched,
            Self::Skipped { state } => *state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub installation: Installation,
    pub result: Result<Outcome, PatchError>,
}

#[derive(Debug)]
pub enum BatchEvent<'a> {
    Started {
        index: usize,
        total: usize,
        installation: &'a Installation,
    },
    Finished {
        index: usize,
        total: usize,
        installation: &'a Installation,
        result: &'a Result<Outcome, PatchError>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub patched: usize,
    pub restored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub needs_recovery: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[InstallOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match &outcome.result {
                Ok(Outcome::Patched { .. }) => summary.patched += 1,
                Ok(Outcome::Restored { .. }) => summary.restored += 1,
                Ok(Outcome::Skipped { .. }) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    if err.needs_manual_recovery() {
                        summary.needs_recovery += 1;
                    }
                }
            }
        }
        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Drives the two-state machine per installation. Installations are handled
/// strictly one after another.
#[derive(Debug, Clone)]
pub struct PatchController {
    artifact: PathBuf,
    rules: Vec<LibraryRule>,
}

impl PatchController {
    pub fn new(artifact: impl Into<PathBuf>, rules: Vec<LibraryRule>) -> Self {
        Self {
            artifact: artifact.into(),
            rules,
        }
    }

    pub fn from_config(config: &GstPatchConfig, artifact: impl Into<PathBuf>) -> Self {
        Self::new(artifact, config.library_rules.clone())
    }

    pub fn process(&self, install: &Installation) -> Result<Outcome, PatchError> {
        self.process_with(install, Direction::Toggle)
    }

    pub fn process_with(
        &self,
        install: &Installation,
        direction: Direction,
    ) -> Result<Outcome, PatchError> {
        let state = inspect_state(install);
        let restore = match (direction, state) {
            (Direction::Toggle, PatchState::Unpatched) => false,
            (Direction::Toggle, PatchState::Patched) => true,
            (Direction::Apply, PatchState::Unpatched) => false,
            (Direction::Apply, PatchState::Patched) => return Ok(Outcome::Skipped { state }),
            (Direction::Restore, PatchState::Patched) => true,
            (Direction::Restore, PatchState::Unpatched) => {
                // a backup without a marker is what an interrupted patch leaves
                if !install.backup_dir().is_dir() {
                    return Ok(Outcome::Skipped { state });
                }
                true
            }
        };

        tracing::info!(
            installation = %install.display_name(),
            state = %state,
            "processing installation"
        );
        if restore {
            let report = restore_backup(install)?;
            Ok(Outcome::Restored {
                restored: report.restored,
                backup_removed: report.backup_removed,
            })
        } else {
            let report = apply_patch(install, &self.artifact, &self.rules)?;
            Ok(Outcome::Patched {
                removed: report.removed.len(),
                backup: report.backup.root,
            })
        }
    }

    pub fn process_all(
        &self,
        installs: &[Installation],
        direction: Direction,
    ) -> Vec<InstallOutcome> {
        self.process_all_with_observer(installs, direction, |_| {})
    }

    /// Processes every installation; a failure is recorded and the batch moves on.
    pub fn process_all_with_observer<F>(
        &self,
        installs: &[Installation],
        direction: Direction,
        mut observer: F,
    ) -> Vec<InstallOutcome>
    where
        F: FnMut(BatchEvent<'_>),
    {
        let total = installs.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, install) in installs.iter().enumerate() {
            observer(BatchEvent::Started {
                index,
                total,
                installation: install,
            });
            let result = self.process_with(install, direction);
            if let Err(err) = &result {
                tracing::debug!(
                    installation = %install.display_name(),
                    category = err.category().as_str(),
                    "installation failed: {err}"
                );
            }
            observer(BatchEvent::Finished {
                index,
                total,
                installation: install,
                result: &result,
            });
            outcomes.push(InstallOutcome {
                installation: install.clone(),
                result,
            });
        }
        outcomes
    }
}
