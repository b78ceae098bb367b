use super::outcome::*;
use super::replace::ReplaceEngine;
use super::request::*;
use crate::events::UpdateEvent;
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub updated: Vec<UpdateResult>,
    pub skipped: Vec<UpdateResult>,
    pub failed: Vec<UpdateResult>,

    /// Backups left on disk by the batch.
    pub backups: Vec<PathBuf>,
}

impl UpdateSummary {
    pub fn len(&self) -> usize {
        self.updated.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, result: UpdateResult) {
        if let Some(backup) = &result.backup_path {
            if backup.exists() {
                self.backups.push(backup.clone());
            }
        }

        if result.success {
            self.updated.push(result);
        } else if result.is_skipped() {
            self.skipped.push(result);
        } else {
            self.failed.push(result);
        }
    }

    fn sort(&mut self) {
        self.updated.sort_by(|a, b| a.target.cmp(&b.target));
        self.skipped.sort_by(|a, b| a.target.cmp(&b.target));
        self.failed.sort_by(|a, b| a.target.cmp(&b.target));
        self.backups.sort();
    }
}

impl ReplaceEngine {
    /// Whether a request will reach the mutating steps, and so needs a backup.
    fn needs_backup(&self, request: &BatchRequest) -> bool {
        let target = TargetFile::load(request.target());

        if !target.exists() || request.has_backup() {
            return false;
        }

        let candidate = Candidate::load(request.candidate());

        if !candidate.path.exists() {
            return false;
        }

        if matches!(request, BatchRequest::Renamed(_)) && self.check_rename_gate(&candidate).is_err()
        {
            return false;
        }

        self.decide(&target, &candidate).should_proceed()
    }

    /// Update many independent files. Requests for the same target are
    /// only run once, backups are created up front in parallel, and a
    /// failure for one file never stops the others.
    #[instrument(skip_all)]
    pub async fn update_all<I, R>(&self, requests: I) -> UpdateSummary
    where
        I: IntoIterator<Item = R>,
        R: Into<BatchRequest>,
    {
        let mut seen = FxHashSet::default();
        let mut requests = requests
            .into_iter()
            .map(Into::into)
            .filter(|request: &BatchRequest| {
                let unique = seen.insert(canonicalize_path(request.target()));

                if !unique {
                    debug!(file = ?request.target(), "Skipping duplicate request");
                }

                unique
            })
            .collect::<Vec<_>>();

        if self.backups_enabled() {
            let paths = requests
                .iter()
                .filter(|request| self.needs_backup(request))
                .map(|request| canonicalize_path(request.target()))
                .collect::<Vec<_>>();

            if !paths.is_empty() {
                let mut batch = self
                    .backups
                    .create_backups_parallel(paths, self.config.backup_concurrency)
                    .await;

                for record in batch.created.values() {
                    self.emit(UpdateEvent::BackupCreated {
                        target: record.original.clone(),
                        backup: record.backup.clone(),
                    });
                }

                for request in &mut requests {
                    if let Some(record) = batch.take(&canonicalize_path(request.target())) {
                        request.set_backup(record);
                    }
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.update_concurrency.max(1)));
        let mut set = JoinSet::new();

        for request in requests {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();

                match request {
                    BatchRequest::Standard(request) => engine.update(request).await,
                    BatchRequest::Renamed(request) => engine.update_renamed(request).await,
                }
            });
        }

        let mut summary = UpdateSummary::default();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => summary.push(result),
                Err(error) => warn!("Update task was aborted: {error}"),
            }
        }

        summary.sort();

        debug!(
            updated = summary.updated.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            backups = summary.backups.len(),
            "Finished updating files",
        );

        summary
    }
}
