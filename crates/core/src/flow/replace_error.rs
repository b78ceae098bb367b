use crate::backup_error::BackupError;
use crate::permissions_error::PermissionError;
use miette::Diagnostic;
use pe_version::FileVersion;
use serde::Serialize;
use starbase_styles::{Style, Stylize};
use starbase_utils::fs::FsError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of why an update attempt failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum FailureKind {
    NotFound,
    PermissionDenied,
    VersionUnreadable,
    BelowMinimum,
    BackupFailed,
    LockTimeout,
    SwapFailure,
    VerifyMismatch,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::VersionUnreadable => "version unreadable",
            Self::BelowMinimum => "below minimum version",
            Self::BackupFailed => "backup failed",
            Self::LockTimeout => "lock timeout",
            Self::SwapFailure => "swap failure",
            Self::VerifyMismatch => "verify mismatch",
        })
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum ReplaceError {
    #[diagnostic(transparent)]
    #[error(transparent)]
    Backup(#[from] Box<BackupError>),

    #[diagnostic(transparent)]
    #[error(transparent)]
    Permission(#[from] Box<PermissionError>),

    #[diagnostic(code(binswap::replace::missing_target))]
    #[error("Target {} does not exist.", .path.style(Style::Path))]
    MissingTarget { path: PathBuf },

    #[diagnostic(code(binswap::replace::missing_candidate))]
    #[error("Replacement {} does not exist.", .path.style(Style::Path))]
    MissingCandidate { path: PathBuf },

    #[diagnostic(code(binswap::replace::missing_parent))]
    #[error("Target directory {} does not exist.", .path.style(Style::Path))]
    MissingParent { path: PathBuf },

    #[diagnostic(code(binswap::replace::unknown_version))]
    #[error(
        "Unable to read the version of {}, a known version is required.",
        .path.style(Style::Path),
    )]
    UnknownVersion { path: PathBuf },

    #[diagnostic(code(binswap::replace::below_minimum))]
    #[error(
        "Version {} of {} does not meet the minimum of {}.",
        .version.style(Style::Hash),
        .path.style(Style::Path),
        .minimum.to_string().style(Style::Hash),
    )]
    BelowMinimum {
        path: PathBuf,
        version: String,
        minimum: FileVersion,
    },

    #[diagnostic(
        code(binswap::replace::locked),
        help = "Close any application using this file and try again."
    )]
    #[error(
        "Target {} is still in use after {attempts} attempts.",
        .path.style(Style::Path),
    )]
    Locked { path: PathBuf, attempts: u32 },

    #[diagnostic(code(binswap::replace::swap_failed))]
    #[error("Failed to replace {}.", .path.style(Style::Path))]
    SwapFailed {
        path: PathBuf,
        #[source]
        error: Box<FsError>,
    },

    #[diagnostic(code(binswap::replace::verify_mismatch))]
    #[error(
        "Version verification of {} failed, expected {} but found {}.",
        .path.style(Style::Path),
        .expected.clone().unwrap_or_else(|| "unknown".into()).style(Style::Hash),
        .actual.clone().unwrap_or_else(|| "unknown".into()).style(Style::Hash),
    )]
    VerifyMismatch {
        path: PathBuf,
        expected: Option<String>,
        actual: Option<String>,
    },
}

impl ReplaceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Backup(_) => FailureKind::BackupFailed,
            Self::Permission(_) => FailureKind::PermissionDenied,
            Self::MissingTarget { .. }
            | Self::MissingCandidate { .. }
            | Self::MissingParent { .. } => FailureKind::NotFound,
            Self::UnknownVersion { .. } => FailureKind::VersionUnreadable,
            Self::BelowMinimum { .. } => FailureKind::BelowMinimum,
            Self::Locked { .. } => FailureKind::LockTimeout,
            Self::SwapFailed { .. } => FailureKind::SwapFailure,
            Self::VerifyMismatch { .. } => FailureKind::VerifyMismatch,
        }
    }
}

impl From<BackupError> for ReplaceError {
    fn from(e: BackupError) -> ReplaceError {
        ReplaceError::Backup(Box::new(e))
    }
}

impl From<PermissionError> for ReplaceError {
    fn from(e: PermissionError) -> ReplaceError {
        ReplaceError::Permission(Box::new(e))
    }
}
