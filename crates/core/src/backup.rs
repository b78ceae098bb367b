pub use super::backup_error::BackupError;
use crate::config::DEFAULT_BACKUP_EXTENSION;
use crate::permissions::{PermissionGuard, make_read_only, make_writable};
use rustc_hash::FxHashMap;
use serde::Serialize;
use starbase_utils::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, trace, warn};

pub const DEFAULT_BACKUP_CONCURRENCY: usize = 4;

/// A byte-identical copy of a target, taken before it was modified.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BackupRecord {
    pub original: PathBuf,
    pub backup: PathBuf,
    pub created_at: SystemTime,
}

impl BackupRecord {
    /// Whether the backup file still exists on disk.
    pub fn is_present(&self) -> bool {
        self.backup.is_file()
    }
}

#[derive(Debug, Default)]
pub struct BackupBatch {
    pub created: FxHashMap<PathBuf, BackupRecord>,
    pub failed: FxHashMap<PathBuf, BackupError>,
}

impl BackupBatch {
    pub fn take(&mut self, path: &Path) -> Option<BackupRecord> {
        self.created.remove(path)
    }
}

#[derive(Clone, Debug)]
pub struct BackupManager {
    extension: String,
}

impl Default for BackupManager {
    fn default() -> Self {
        Self::new(DEFAULT_BACKUP_EXTENSION)
    }
}

impl BackupManager {
    pub fn new(extension: impl AsRef<str>) -> Self {
        Self {
            extension: extension.as_ref().trim_start_matches('.').to_owned(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The target path with its extension replaced by the backup extension.
    pub fn backup_path_for(&self, target: &Path) -> PathBuf {
        target.with_extension(&self.extension)
    }

    #[instrument(skip(self))]
    pub fn create_backup(&self, target: &Path) -> Result<BackupRecord, BackupError> {
        if !target.is_file() {
            return Err(BackupError::MissingTarget {
                path: target.to_path_buf(),
            });
        }

        let backup = self.backup_path_for(target);

        if backup.exists() {
            debug!(backup = ?backup, "Removing previous backup");

            make_writable(&backup)?;
            fs::remove_file(&backup)?;
        }

        trace!(file = ?target, backup = ?backup, "Copying target to backup");

        if let Err(error) = fs::copy_file(target, &backup)
            .map_err(BackupError::from)
            .and_then(|_| self.finalize_backup(target, &backup))
        {
            if backup.exists() {
                let _ = make_writable(&backup);
                let _ = fs::remove_file(&backup);
            }

            return Err(error);
        }

        debug!(file = ?target, backup = ?backup, "Created backup");

        Ok(BackupRecord {
            original: target.to_path_buf(),
            backup,
            created_at: SystemTime::now(),
        })
    }

    fn finalize_backup(&self, target: &Path, backup: &Path) -> Result<(), BackupError> {
        let source = fs::metadata(target)?;
        let copied = fs::metadata(backup)?;

        if source.len() != copied.len() {
            return Err(BackupError::Incomplete {
                path: backup.to_path_buf(),
                expected: source.len(),
                actual: copied.len(),
            });
        }

        // The copy inherits the target's bits, which may be read-only
        make_writable(backup)?;

        if let Ok(modified) = source.modified() {
            let handle_error = |error: std::io::Error| BackupError::Metadata {
                path: backup.to_path_buf(),
                error: Box::new(error),
            };

            File::options()
                .write(true)
                .open(backup)
                .and_then(|file| file.set_modified(modified))
                .map_err(handle_error)?;
        }

        make_read_only(backup)?;

        Ok(())
    }

    /// Copy the backup bytes back over the target.
    #[instrument(skip(self))]
    pub fn restore(&self, record: &BackupRecord, target: &Path) -> Result<(), BackupError> {
        if !record.is_present() {
            return Err(BackupError::MissingBackup {
                path: record.backup.clone(),
            });
        }

        // The copy carries the backup's read-only bit, so put the
        // target's own permissions back afterwards
        let guard = PermissionGuard::capture(target)?;
        guard.make_writable()?;

        fs::copy_file(&record.backup, target)?;

        guard.restore()?;

        debug!(file = ?target, backup = ?record.backup, "Restored target from backup");

        Ok(())
    }

    /// Back up many independent files on a bounded pool. A failure for one
    /// path never affects the others.
    #[instrument(skip(self, paths))]
    pub async fn create_backups_parallel(
        &self,
        paths: Vec<PathBuf>,
        concurrency: usize,
    ) -> BackupBatch {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut set = JoinSet::new();

        for path in paths {
            let manager = self.clone();
            let semaphore = Arc::clone(&semaphore);

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let worker_path = path.clone();

                let result =
                    tokio::task::spawn_blocking(move || manager.create_backup(&worker_path))
                        .await
                        .unwrap_or_else(|error| {
                            Err(BackupError::WorkerFailed {
                                path: path.clone(),
                                error: error.to_string(),
                            })
                        });

                (path, result)
            });
        }

        let mut batch = BackupBatch::default();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((path, Ok(record))) => {
                    batch.created.insert(path, record);
                }
                Ok((path, Err(error))) => {
                    warn!(file = ?path, "Failed to create backup: {error}");

                    batch.failed.insert(path, error);
                }
                Err(error) => {
                    warn!("Backup task was aborted: {error}");
                }
            }
        }

        debug!(
            created = batch.created.len(),
            failed = batch.failed.len(),
            "Finished creating backups",
        );

        batch
    }
}
