pub use super::replace_error::{FailureKind, ReplaceError};
use super::outcome::*;
use super::request::*;
use crate::backup::{BackupManager, BackupRecord};
use crate::config::{BackupPreference, StaticPreference, SwapConfig};
use crate::conflict::{ConflictDetector, ProbeConflictDetector};
use crate::events::{TracingObserver, UpdateEvent, UpdateObserver};
use crate::permissions::{PermissionGuard, ensure_dir_writable};
use pe_version::{ParsedVersion, extract_file_version};
use starbase_utils::fs::{self, FsError};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Replaces installed files with newer versions, one guarded step at a
/// time, rolling back from a backup when the swap itself fails.
#[derive(Clone)]
pub struct ReplaceEngine {
    pub(crate) config: Arc<SwapConfig>,
    pub(crate) backups: BackupManager,
    preference: Arc<dyn BackupPreference>,
    detector: Arc<dyn ConflictDetector>,
    observer: Arc<dyn UpdateObserver>,
}

impl Default for ReplaceEngine {
    fn default() -> Self {
        Self::new(SwapConfig::default())
    }
}

impl ReplaceEngine {
    pub fn new(config: SwapConfig) -> Self {
        Self {
            backups: BackupManager::new(&config.backup_extension),
            preference: Arc::new(StaticPreference(config.backups_enabled)),
            detector: Arc::new(ProbeConflictDetector::new(config.probe_interval())),
            observer: Arc::new(TracingObserver),
            config: Arc::new(config),
        }
    }

    pub fn with_backup_preference(mut self, preference: impl BackupPreference + 'static) -> Self {
        self.preference = Arc::new(preference);
        self
    }

    pub fn with_conflict_detector(mut self, detector: impl ConflictDetector + 'static) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    pub fn with_observer(mut self, observer: impl UpdateObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub(crate) fn backups_enabled(&self) -> bool {
        self.preference.backups_enabled()
    }

    pub(crate) fn emit(&self, event: UpdateEvent) {
        self.observer.on_event(&event);
    }

    /// Decide whether the target should be replaced by the candidate,
    /// without touching either file.
    pub fn plan(&self, target: &Path, candidate: &Path) -> UpdatePlan {
        self.decide(&TargetFile::load(target), &Candidate::load(candidate))
    }

    pub(crate) fn decide(&self, target: &TargetFile, candidate: &Candidate) -> UpdatePlan {
        let floor = self.config.floor_for(&target.library.file_name).cloned();
        let plan = |decision, reason: String| UpdatePlan {
            decision,
            reason,
            library: target.library.clone(),
            existing_version: target.version.clone(),
            candidate_version: candidate.version.clone(),
            floor: floor.clone(),
        };

        if let Some(floor) = &floor {
            match target.parsed_version() {
                Some(ParsedVersion::Parsed(existing)) if existing < *floor => {
                    return plan(
                        PlanDecision::SkipBelowFloor,
                        format!("Version {existing} is below the minimum supported {floor}"),
                    );
                }
                Some(ParsedVersion::Parsed(_)) => {}
                _ => {
                    return plan(
                        PlanDecision::SkipBelowFloor,
                        format!("Version is unknown, a version of at least {floor} is required"),
                    );
                }
            }
        }

        if let (Some(existing), Some(latest)) = (target.parsed_version(), candidate.parsed_version())
        {
            if existing.effective() >= latest.effective() {
                return plan(
                    PlanDecision::SkipUpToDate,
                    format!("Already up to date (version {existing})"),
                );
            }

            return plan(
                PlanDecision::Proceed,
                format!("Updating from version {existing} to {latest}"),
            );
        }

        plan(
            PlanDecision::Proceed,
            "Version could not be determined, updating anyway".into(),
        )
    }

    /// Replace the target with the candidate. Never fails outright; the
    /// outcome and any failure are described by the returned result.
    #[instrument(skip(self, request), fields(file = ?request.target))]
    pub async fn update(&self, request: UpdateRequest) -> UpdateResult {
        let target = TargetFile::load(&request.target);
        let candidate = Candidate::load(&request.candidate);

        if !target.exists() {
            return UpdateResult::new(&target).fail(ReplaceError::MissingTarget {
                path: target.path.clone(),
            });
        }

        let plan = self.decide(&target, &candidate);

        self.emit(UpdateEvent::Decided {
            target: target.path.clone(),
            decision: plan.decision,
            reason: plan.reason.clone(),
        });

        if !plan.should_proceed() {
            return UpdateResult::skipped(&target, &plan);
        }

        self.replace(&target, &candidate, request.backup).await
    }

    fn preflight(&self, target: &TargetFile, candidate: &Candidate) -> Result<(), ReplaceError> {
        if !candidate.path.exists() {
            return Err(ReplaceError::MissingCandidate {
                path: candidate.path.clone(),
            });
        }

        let Some(dir) = target.path.parent().filter(|dir| dir.is_dir()) else {
            return Err(ReplaceError::MissingParent {
                path: target
                    .path
                    .parent()
                    .unwrap_or(target.path.as_path())
                    .to_path_buf(),
            });
        };

        ensure_dir_writable(dir)?;

        Ok(())
    }

    fn obtain_backup(
        &self,
        target: &Path,
        supplied: Option<BackupRecord>,
    ) -> Result<Option<BackupRecord>, ReplaceError> {
        let enabled = self.backups_enabled();

        let record = match supplied {
            Some(record) if record.is_present() => {
                debug!(file = ?target, backup = ?record.backup, "Using pre-created backup");

                return Ok(Some(record));
            }
            Some(record) => {
                warn!(
                    file = ?target,
                    backup = ?record.backup,
                    "Pre-created backup no longer exists",
                );

                if !enabled {
                    return Ok(None);
                }

                self.backups.create_backup(target)?
            }
            None if enabled => self.backups.create_backup(target)?,
            None => {
                debug!(file = ?target, "Backups are disabled, skipping");

                return Ok(None);
            }
        };

        self.emit(UpdateEvent::BackupCreated {
            target: target.to_path_buf(),
            backup: record.backup.clone(),
        });

        Ok(Some(record))
    }

    async fn wait_for_unlock(&self, target: &Path) -> Result<(), ReplaceError> {
        let attempts = self.config.unlock_attempts;

        for attempt in 1..=attempts {
            if !self
                .detector
                .is_locked(target, self.config.probe_timeout())
                .await
            {
                return Ok(());
            }

            self.emit(UpdateEvent::LockRetry {
                target: target.to_path_buf(),
                attempt,
                attempts,
            });

            if attempt < attempts {
                tokio::time::sleep(self.config.unlock_interval()).await;
            }
        }

        Err(ReplaceError::Locked {
            path: target.to_path_buf(),
            attempts,
        })
    }

    fn swap(&self, target: &Path, candidate: &Path) -> Result<(), ReplaceError> {
        let handle_error = |error: FsError| ReplaceError::SwapFailed {
            path: target.to_path_buf(),
            error: Box::new(error),
        };

        if target.exists() {
            fs::remove_file(target).map_err(handle_error)?;
        }

        fs::copy_file(candidate, target).map_err(handle_error)?;

        Ok(())
    }

    fn rollback(&self, target: &Path, record: &BackupRecord) -> bool {
        let restored = match self.backups.restore(record, target) {
            Ok(()) => true,
            Err(error) => {
                warn!(file = ?target, "Rollback failed: {error}");

                false
            }
        };

        self.emit(UpdateEvent::RollbackAttempted {
            target: target.to_path_buf(),
            backup: record.backup.clone(),
            restored,
        });

        restored
    }

    /// The mutating steps shared by both flows: backup, unlock wait, swap,
    /// permission restore and verify. A target that does not exist yet is
    /// a first install, with no backup or unlock wait.
    pub(crate) async fn replace(
        &self,
        target: &TargetFile,
        candidate: &Candidate,
        supplied_backup: Option<BackupRecord>,
    ) -> UpdateResult {
        let mut result = UpdateResult::new(target);
        let first_install = !target.exists();

        if let Err(error) = self.preflight(target, candidate) {
            return result.fail(error);
        }

        let guard = match PermissionGuard::capture(&target.path) {
            Ok(guard) => guard,
            Err(error) => return result.fail(error.into()),
        };

        let backup = if first_install {
            None
        } else {
            match self.obtain_backup(&target.path, supplied_backup) {
                Ok(backup) => backup,
                Err(error) => return result.fail(error),
            }
        };

        result.backup_path = backup.as_ref().map(|record| record.backup.clone());

        if !first_install {
            if let Err(error) = guard.make_writable() {
                return result.fail(error.into());
            }

            // Dropping the guard on return puts the original bits back
            if let Err(error) = self.wait_for_unlock(&target.path).await {
                return result.fail(error);
            }
        }

        if let Err(error) = self.swap(&target.path, &candidate.path) {
            if let Some(record) = &backup {
                if self.rollback(&target.path, record) {
                    result.outcome = UpdateOutcome::RolledBack;
                }
            } else if first_install && target.path.exists() {
                let _ = fs::remove_file(&target.path);
            }

            if let Err(restore_error) = guard.restore() {
                warn!(file = ?target.path, "{restore_error}");
            }

            return result.fail(error);
        }

        if let Err(error) = guard.restore() {
            return result.fail(error.into());
        }

        self.emit(UpdateEvent::SwapCompleted {
            target: target.path.clone(),
            candidate: candidate.path.clone(),
        });

        let installed = extract_file_version(&target.path);
        result.installed_version = installed.clone();

        if installed != candidate.version {
            self.emit(UpdateEvent::VerifyFailed {
                target: target.path.clone(),
                expected: candidate.version.clone(),
                actual: installed.clone(),
            });

            return result.fail(ReplaceError::VerifyMismatch {
                path: target.path.clone(),
                expected: candidate.version.clone(),
                actual: installed,
            });
        }

        debug!(
            file = ?target.path,
            from = ?target.version,
            to = ?installed,
            "Updated file",
        );

        result.success = true;
        result.outcome = UpdateOutcome::Updated;
        result
    }
}
