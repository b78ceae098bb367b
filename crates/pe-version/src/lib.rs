mod file_version;
mod resource;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod version_error;

pub use file_version::*;
pub use resource::*;
pub use version_error::*;

use std::fmt::Debug;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument, trace};

/// Read the embedded `FileVersion` string of the binary at the provided path.
///
/// Any I/O error, missing version resource, or malformed resource is
/// logged and collapsed into `None`. Callers treat `None` as an unknown
/// version rather than a fatal error.
#[instrument]
pub fn extract_file_version<P: AsRef<Path> + Debug>(path: P) -> Option<String> {
    let path = path.as_ref();

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            debug!(file = ?path, "Unable to read binary for version extraction: {error}");

            return None;
        }
    };

    match read_file_version(&bytes) {
        Ok(version) => {
            trace!(file = ?path, version = &version, "Extracted file version");

            Some(version)
        }
        Err(error) => {
            debug!(file = ?path, "No usable version resource: {error}");

            None
        }
    }
}
