use crate::backup::BackupRecord;
use crate::library::{LibraryType, rename_target_for};
use pe_version::{ParsedVersion, extract_file_version};
use std::path::{Path, PathBuf};

/// Resolve symlinks and relative segments. Paths that don't exist yet
/// are resolved through their parent directory.
pub fn canonicalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// The installed file being updated.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetFile {
    pub path: PathBuf,
    pub library: LibraryType,
    pub version: Option<String>,
}

impl TargetFile {
    pub fn load(path: &Path) -> Self {
        let path = canonicalize_path(path);

        Self {
            library: LibraryType::from_path(&path),
            version: extract_file_version(&path),
            path,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn parsed_version(&self) -> Option<ParsedVersion> {
        self.version.as_deref().map(ParsedVersion::parse)
    }
}

/// The file supplying the replacement bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub path: PathBuf,
    pub version: Option<String>,
}

impl Candidate {
    pub fn load(path: &Path) -> Self {
        let path = canonicalize_path(path);

        Self {
            version: extract_file_version(&path),
            path,
        }
    }

    pub fn parsed_version(&self) -> Option<ParsedVersion> {
        self.version.as_deref().map(ParsedVersion::parse)
    }
}

#[derive(Clone, Debug)]
pub struct UpdateRequest {
    pub target: PathBuf,
    pub candidate: PathBuf,

    /// A backup created ahead of time, reused when still on disk.
    pub backup: Option<BackupRecord>,
}

impl UpdateRequest {
    pub fn new(target: impl Into<PathBuf>, candidate: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            candidate: candidate.into(),
            backup: None,
        }
    }

    pub fn with_backup(mut self, backup: BackupRecord) -> Self {
        self.backup = Some(backup);
        self
    }
}

/// An update where the installed name differs from the artifact name.
/// The target may not exist yet.
#[derive(Clone, Debug)]
pub struct RenameRequest {
    pub target: PathBuf,
    pub candidate: PathBuf,
    pub backup: Option<BackupRecord>,
}

impl RenameRequest {
    pub fn new(target: impl Into<PathBuf>, candidate: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            candidate: candidate.into(),
            backup: None,
        }
    }

    /// Install a known renamed artifact into a directory, under its
    /// installed name.
    pub fn for_artifact(dir: &Path, candidate: impl Into<PathBuf>) -> Option<Self> {
        let candidate = candidate.into();
        let installed = rename_target_for(&candidate.file_name()?.to_string_lossy())?;

        Some(Self::new(dir.join(installed), candidate))
    }

    pub fn with_backup(mut self, backup: BackupRecord) -> Self {
        self.backup = Some(backup);
        self
    }
}

/// Either kind of request, for batches.
#[derive(Clone, Debug)]
pub enum BatchRequest {
    Standard(UpdateRequest),
    Renamed(RenameRequest),
}

impl BatchRequest {
    pub fn target(&self) -> &Path {
        match self {
            Self::Standard(request) => &request.target,
            Self::Renamed(request) => &request.target,
        }
    }

    pub fn candidate(&self) -> &Path {
        match self {
            Self::Standard(request) => &request.candidate,
            Self::Renamed(request) => &request.candidate,
        }
    }

    pub fn has_backup(&self) -> bool {
        match self {
            Self::Standard(request) => request.backup.is_some(),
            Self::Renamed(request) => request.backup.is_some(),
        }
    }

    pub fn set_backup(&mut self, backup: BackupRecord) {
        match self {
            Self::Standard(request) => request.backup = Some(backup),
            Self::Renamed(request) => request.backup = Some(backup),
        }
    }
}

impl From<UpdateRequest> for BatchRequest {
    fn from(request: UpdateRequest) -> Self {
        Self::Standard(request)
    }
}

impl From<RenameRequest> for BatchRequest {
    fn from(request: RenameRequest) -> Self {
        Self::Renamed(request)
    }
}
