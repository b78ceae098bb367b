pub use super::permissions_error::PermissionError;
use starbase_utils::fs;
use std::fmt::Debug;
use std::fs::{File, Permissions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{instrument, trace, warn};

/// Mode applied to files that had no previous permissions to restore.
#[cfg(unix)]
pub const DEFAULT_FILE_MODE: u32 = 0o644;

fn set_permissions(path: &Path, perms: Permissions) -> Result<(), PermissionError> {
    std::fs::set_permissions(path, perms).map_err(|error| PermissionError::UpdateFailed {
        path: path.to_path_buf(),
        error: Box::new(error),
    })
}

/// Clear the read-only bit of a file, if it's set.
pub fn make_writable(path: &Path) -> Result<(), PermissionError> {
    let mut perms = fs::metadata(path)?.permissions();

    if perms.readonly() {
        trace!(file = ?path, "Clearing read-only permission");

        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);

        set_permissions(path, perms)?;
    }

    Ok(())
}

/// Mark a file as read-only, keeping its other bits.
pub fn make_read_only(path: &Path) -> Result<(), PermissionError> {
    let mut perms = fs::metadata(path)?.permissions();

    if !perms.readonly() {
        perms.set_readonly(true);

        set_permissions(path, perms)?;
    }

    Ok(())
}

static WRITE_CHECKS: AtomicU64 = AtomicU64::new(0);

/// Verify the current user can create files in a directory, by creating
/// and removing an empty marker file. Mode bits alone don't account for
/// ownership, ACLs or read-only mounts.
#[instrument]
pub fn ensure_dir_writable(dir: &Path) -> Result<(), PermissionError> {
    fs::metadata(dir)?;

    let marker = dir.join(format!(
        ".binswap-write-check-{}-{}",
        std::process::id(),
        WRITE_CHECKS.fetch_add(1, Ordering::Relaxed)
    ));

    match File::options().write(true).create_new(true).open(&marker) {
        Ok(file) => {
            drop(file);

            if let Err(error) = std::fs::remove_file(&marker) {
                warn!(file = ?marker, "Failed to remove write check marker: {error}");
            }

            Ok(())
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(error) => {
            trace!(dir = ?dir, "Directory is not writable: {error}");

            Err(PermissionError::ReadOnlyDirectory {
                path: dir.to_path_buf(),
                error: Box::new(error),
            })
        }
    }
}

/// Captures the permissions of a file on creation, and puts them back
/// when restored or dropped. A file that did not exist at capture time
/// receives the default mode instead.
#[derive(Debug)]
pub struct PermissionGuard {
    path: PathBuf,
    original: Option<Permissions>,
    armed: bool,
}

impl PermissionGuard {
    #[instrument(name = "capture_permissions")]
    pub fn capture<P: AsRef<Path> + Debug>(path: P) -> Result<Self, PermissionError> {
        let path = path.as_ref();
        let original = if path.exists() {
            Some(fs::metadata(path)?.permissions())
        } else {
            None
        };

        trace!(file = ?path, permissions = ?original, "Captured permissions");

        Ok(Self {
            path: path.to_path_buf(),
            original,
            armed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original(&self) -> Option<&Permissions> {
        self.original.as_ref()
    }

    #[cfg(unix)]
    pub fn original_mode(&self) -> Option<u32> {
        use std::os::unix::fs::PermissionsExt;

        self.original.as_ref().map(|perms| perms.mode())
    }

    pub fn make_writable(&self) -> Result<(), PermissionError> {
        if self.path.exists() {
            make_writable(&self.path)?;
        }

        Ok(())
    }

    /// Reapply the captured permissions and disarm the guard.
    pub fn restore(mut self) -> Result<(), PermissionError> {
        self.armed = false;
        self.apply()
    }

    fn apply(&self) -> Result<(), PermissionError> {
        if !self.path.exists() {
            trace!(file = ?self.path, "Nothing to restore permissions on");

            return Ok(());
        }

        match &self.original {
            Some(perms) => {
                trace!(file = ?self.path, "Restoring captured permissions");

                set_permissions(&self.path, perms.clone())
            }
            #[cfg(unix)]
            None => {
                trace!(file = ?self.path, mode = DEFAULT_FILE_MODE, "Applying default permissions");

                fs::update_perms(&self.path, Some(DEFAULT_FILE_MODE))?;

                Ok(())
            }
            #[cfg(not(unix))]
            None => make_writable(&self.path),
        }
    }
}

impl Drop for PermissionGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(error) = self.apply() {
                warn!(file = ?self.path, "Failed to restore permissions: {error}");
            }
        }
    }
}
