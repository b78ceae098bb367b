use super::outcome::*;
use super::replace::ReplaceEngine;
use super::replace_error::ReplaceError;
use super::request::*;
use crate::events::UpdateEvent;
use pe_version::meets_minimum;
use tracing::{debug, instrument};

impl ReplaceEngine {
    /// Check that a renamed artifact is recent enough to be installed.
    pub(crate) fn check_rename_gate(&self, candidate: &Candidate) -> Result<(), ReplaceError> {
        let minimum = &self.config.rename_min_version;

        let Some(version) = &candidate.version else {
            return Err(ReplaceError::UnknownVersion {
                path: candidate.path.clone(),
            });
        };

        if !meets_minimum(Some(version.as_str()), minimum) {
            return Err(ReplaceError::BelowMinimum {
                path: candidate.path.clone(),
                version: version.to_owned(),
                minimum: minimum.clone(),
            });
        }

        debug!(
            file = ?candidate.path,
            version,
            minimum = minimum.to_string(),
            "Artifact meets the minimum version",
        );

        Ok(())
    }

    /// Install an artifact under a different file name. The installed
    /// file may not exist yet, in which case it's created with default
    /// permissions and no backup is taken.
    #[instrument(skip(self, request), fields(file = ?request.target))]
    pub async fn update_renamed(&self, request: RenameRequest) -> UpdateResult {
        let target = TargetFile::load(&request.target);
        let candidate = Candidate::load(&request.candidate);

        if let Err(error) = self.check_rename_gate(&candidate) {
            return UpdateResult::new(&target).fail(error);
        }

        if target.exists() {
            let plan = self.decide(&target, &candidate);

            self.emit(UpdateEvent::Decided {
                target: target.path.clone(),
                decision: plan.decision,
                reason: plan.reason.clone(),
            });

            if !plan.should_proceed() {
                return UpdateResult::skipped(&target, &plan);
            }
        } else {
            self.emit(UpdateEvent::Decided {
                target: target.path.clone(),
                decision: PlanDecision::Proceed,
                reason: format!(
                    "Installing {} as a new file",
                    candidate.version.as_deref().unwrap_or("unknown version")
                ),
            });
        }

        self.replace(&target, &candidate, request.backup).await
    }
}
