use miette::Diagnostic;
use starbase_styles::{Style, Stylize};
use starbase_utils::fs::FsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum PermissionError {
    #[diagnostic(transparent)]
    #[error(transparent)]
    Fs(#[from] Box<FsError>),

    #[diagnostic(code(binswap::permissions::update_failed))]
    #[error("Failed to update permissions of {}.", .path.style(Style::Path))]
    UpdateFailed {
        path: PathBuf,
        #[source]
        error: Box<io::Error>,
    },

    #[diagnostic(
        code(binswap::permissions::read_only_dir),
        help = "Run with elevated privileges or make the directory writable."
    )]
    #[error("Directory {} is not writable.", .path.style(Style::Path))]
    ReadOnlyDirectory {
        path: PathBuf,
        #[source]
        error: Box<io::Error>,
    },
}

impl From<FsError> for PermissionError {
    fn from(e: FsError) -> PermissionError {
        PermissionError::Fs(Box::new(e))
    }
}
