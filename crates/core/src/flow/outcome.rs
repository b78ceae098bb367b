use super::replace_error::{FailureKind, ReplaceError};
use super::request::TargetFile;
use crate::library::LibraryType;
use pe_version::FileVersion;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanDecision {
    Proceed,
    SkipUpToDate,
    SkipBelowFloor,
}

/// The version check of an update, decided before anything is touched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpdatePlan {
    pub decision: PlanDecision,
    pub reason: String,
    pub library: LibraryType,
    pub existing_version: Option<String>,
    pub candidate_version: Option<String>,
    pub floor: Option<FileVersion>,
}

impl UpdatePlan {
    pub fn should_proceed(&self) -> bool {
        self.decision == PlanDecision::Proceed
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateOutcome {
    Updated,
    UpToDate,
    BelowFloor,
    Failed,
    RolledBack,
}

#[derive(Debug)]
pub struct UpdateResult {
    pub success: bool,
    pub outcome: UpdateOutcome,
    pub target: PathBuf,
    pub library: LibraryType,
    pub backup_path: Option<PathBuf>,
    pub previous_version: Option<String>,
    pub installed_version: Option<String>,

    /// Why the update was skipped.
    pub reason: Option<String>,

    pub failure: Option<ReplaceError>,
}

impl UpdateResult {
    pub(crate) fn new(target: &TargetFile) -> Self {
        Self {
            success: false,
            outcome: UpdateOutcome::Failed,
            target: target.path.clone(),
            library: target.library.clone(),
            backup_path: None,
            previous_version: target.version.clone(),
            installed_version: None,
            reason: None,
            failure: None,
        }
    }

    pub(crate) fn skipped(target: &TargetFile, plan: &UpdatePlan) -> Self {
        let mut result = Self::new(target);
        result.outcome = match plan.decision {
            PlanDecision::SkipBelowFloor => UpdateOutcome::BelowFloor,
            _ => UpdateOutcome::UpToDate,
        };
        result.reason = Some(plan.reason.clone());

        if plan.decision == PlanDecision::SkipBelowFloor && target.version.is_none() {
            result.failure = Some(ReplaceError::UnknownVersion {
                path: target.path.clone(),
            });
        }

        result
    }

    pub(crate) fn fail(mut self, error: ReplaceError) -> Self {
        self.success = false;
        self.failure = Some(error);
        self
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self.outcome,
            UpdateOutcome::UpToDate | UpdateOutcome::BelowFloor
        )
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|error| error.kind())
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.failure
            .as_ref()
            .map(|error| error.to_string())
            .or_else(|| self.reason.clone())
    }
}
