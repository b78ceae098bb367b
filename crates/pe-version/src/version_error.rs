#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PeVersionError {
    #[error("Missing DOS header magic, not a PE binary.")]
    InvalidDosHeader,

    #[error("Missing PE signature at offset {0:#x}.")]
    InvalidPeSignature(usize),

    #[error("Unknown optional header magic {0:#x}.")]
    UnknownOptionalHeader(u16),

    #[error("Binary does not contain a resource directory.")]
    MissingResourceDirectory,

    #[error("Binary does not contain a version resource.")]
    MissingVersionResource,

    #[error("Relative virtual address {0:#x} is not mapped by any section.")]
    UnmappedAddress(u32),

    #[error("Read of {len} bytes at offset {offset:#x} is out of bounds.")]
    OutOfBounds { offset: usize, len: usize },

    #[error("Version resource is malformed: {0}")]
    MalformedVersionInfo(&'static str),

    #[error("Version resource does not declare a FileVersion string.")]
    MissingFileVersion,

    #[error("Invalid version `{0}`. Expected up to three numeric components.")]
    InvalidVersion(String),
}
