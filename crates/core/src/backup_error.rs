use crate::permissions_error::PermissionError;
use miette::Diagnostic;
use starbase_styles::{Style, Stylize};
use starbase_utils::fs::FsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum BackupError {
    #[diagnostic(transparent)]
    #[error(transparent)]
    Fs(#[from] Box<FsError>),

    #[diagnostic(transparent)]
    #[error(transparent)]
    Permission(#[from] Box<PermissionError>),

    #[diagnostic(code(binswap::backup::missing_target))]
    #[error("Cannot back up {}, the file does not exist.", .path.style(Style::Path))]
    MissingTarget { path: PathBuf },

    #[diagnostic(code(binswap::backup::missing_backup))]
    #[error("Backup {} no longer exists.", .path.style(Style::Path))]
    MissingBackup { path: PathBuf },

    #[diagnostic(code(binswap::backup::incomplete))]
    #[error(
        "Backup {} is incomplete, copied {actual} of {expected} bytes.",
        .path.style(Style::Path),
    )]
    Incomplete {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[diagnostic(code(binswap::backup::metadata))]
    #[error("Failed to carry over metadata to backup {}.", .path.style(Style::Path))]
    Metadata {
        path: PathBuf,
        #[source]
        error: Box<io::Error>,
    },

    #[diagnostic(code(binswap::backup::worker_failed))]
    #[error("Backup worker for {} did not finish: {error}", .path.style(Style::Path))]
    WorkerFailed { path: PathBuf, error: String },
}

impl From<FsError> for BackupError {
    fn from(e: FsError) -> BackupError {
        BackupError::Fs(Box::new(e))
    }
}

impl From<PermissionError> for BackupError {
    fn from(e: PermissionError) -> BackupError {
        BackupError::Permission(Box::new(e))
    }
}
