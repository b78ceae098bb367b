use crate::version_error::PeVersionError;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// A normalized (major, minor, patch) version used to order binaries.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "String", try_from = "String")]
pub struct FileVersion(pub Version);

impl FileVersion {
    /// The lowest representable version. Unparseable input collapses to this.
    pub const MIN: FileVersion = FileVersion(Version::new(0, 0, 0));

    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse leniently, collapsing anything unparseable to [`FileVersion::MIN`].
    pub fn parse<T: AsRef<str>>(value: T) -> Self {
        ParsedVersion::parse(value).effective()
    }
}

impl Default for FileVersion {
    fn default() -> Self {
        Self::MIN
    }
}

impl Deref for FileVersion {
    type Target = Version;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0.major, self.0.minor, self.0.patch)
    }
}

impl FromStr for FileVersion {
    type Err = PeVersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match ParsedVersion::parse(value) {
            ParsedVersion::Parsed(version) => Ok(version),
            ParsedVersion::Unparseable { raw } => Err(PeVersionError::InvalidVersion(raw)),
        }
    }
}

impl TryFrom<String> for FileVersion {
    type Error = PeVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

#[allow(clippy::from_over_into)]
impl Into<String> for FileVersion {
    fn into(self) -> String {
        self.to_string()
    }
}

/// Outcome of parsing a raw version label. The unparseable case keeps
/// the raw input around for diagnostics, and only collapses to the
/// minimum version when compared.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParsedVersion {
    Parsed(FileVersion),
    Unparseable { raw: String },
}

impl ParsedVersion {
    /// Parse a raw version label with the following rules:
    ///
    /// - Commas are treated as dots, so "1, 2, 3, 4" is accepted.
    /// - Only the first three components are used, extra ones are ignored.
    /// - Missing components default to 0, so "3.1" is "3.1.0".
    /// - Every used component must be numeric, otherwise the label is
    ///   unparseable.
    pub fn parse<T: AsRef<str>>(value: T) -> Self {
        let raw = value.as_ref();
        let cleaned = raw.trim().replace(',', ".");

        if cleaned.is_empty() {
            return Self::Unparseable {
                raw: raw.to_owned(),
            };
        }

        let mut parts = [0u64; 3];

        for (index, segment) in cleaned.split('.').take(3).enumerate() {
            match segment.trim().parse::<u64>() {
                Ok(number) => {
                    parts[index] = number;
                }
                Err(_) => {
                    return Self::Unparseable {
                        raw: raw.to_owned(),
                    };
                }
            }
        }

        Self::Parsed(FileVersion::new(parts[0], parts[1], parts[2]))
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    /// The version to compare with. Unparseable labels are treated as
    /// maximally outdated.
    pub fn effective(&self) -> FileVersion {
        match self {
            Self::Parsed(version) => version.clone(),
            Self::Unparseable { .. } => FileVersion::MIN,
        }
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(version) => write!(f, "{version}"),
            Self::Unparseable { raw } => write!(f, "{raw} (unparseable)"),
        }
    }
}

/// Order two raw version labels.
pub fn compare_versions<A: AsRef<str>, B: AsRef<str>>(a: A, b: B) -> Ordering {
    FileVersion::parse(a).cmp(&FileVersion::parse(b))
}

/// Return true if the raw label is known, parseable, and at least `minimum`.
pub fn meets_minimum(value: Option<&str>, minimum: &FileVersion) -> bool {
    match value.map(ParsedVersion::parse) {
        Some(ParsedVersion::Parsed(version)) => &version >= minimum,
        _ => false,
    }
}
