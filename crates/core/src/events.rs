use crate::flow::PlanDecision;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Emitted by the engine at each decision point of an update.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum UpdateEvent {
    Decided {
        target: PathBuf,
        decision: PlanDecision,
        reason: String,
    },
    BackupCreated {
        target: PathBuf,
        backup: PathBuf,
    },
    LockRetry {
        target: PathBuf,
        attempt: u32,
        attempts: u32,
    },
    SwapCompleted {
        target: PathBuf,
        candidate: PathBuf,
    },
    VerifyFailed {
        target: PathBuf,
        expected: Option<String>,
        actual: Option<String>,
    },
    RollbackAttempted {
        target: PathBuf,
        backup: PathBuf,
        restored: bool,
    },
}

impl UpdateEvent {
    pub fn target(&self) -> &PathBuf {
        match self {
            Self::Decided { target, .. }
            | Self::BackupCreated { target, .. }
            | Self::LockRetry { target, .. }
            | Self::SwapCompleted { target, .. }
            | Self::VerifyFailed { target, .. }
            | Self::RollbackAttempted { target, .. } => target,
        }
    }
}

pub trait UpdateObserver: Send + Sync {
    fn on_event(&self, event: &UpdateEvent);
}

/// Forwards every event to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl UpdateObserver for TracingObserver {
    fn on_event(&self, event: &UpdateEvent) {
        match event {
            UpdateEvent::Decided {
                target,
                decision,
                reason,
            } => {
                info!(file = ?target, decision = ?decision, "{reason}");
            }
            UpdateEvent::BackupCreated { target, backup } => {
                info!(file = ?target, backup = ?backup, "Created backup");
            }
            UpdateEvent::LockRetry {
                target,
                attempt,
                attempts,
            } => {
                info!(file = ?target, "File is in use (attempt {attempt} of {attempts})");
            }
            UpdateEvent::SwapCompleted { target, candidate } => {
                debug!(file = ?target, candidate = ?candidate, "Replaced file contents");
            }
            UpdateEvent::VerifyFailed {
                target,
                expected,
                actual,
            } => {
                error!(
                    file = ?target,
                    expected = ?expected,
                    actual = ?actual,
                    "Version verification failed",
                );
            }
            UpdateEvent::RollbackAttempted {
                target,
                backup,
                restored,
            } => {
                if *restored {
                    warn!(file = ?target, backup = ?backup, "Restored backup after failed update");
                } else {
                    error!(file = ?target, backup = ?backup, "Failed to restore backup");
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl UpdateObserver for NoopObserver {
    fn on_event(&self, _event: &UpdateEvent) {}
}
