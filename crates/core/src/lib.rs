mod backup;
mod backup_error;
mod config;
mod config_error;
mod conflict;
mod events;
pub mod flow;
mod library;
mod permissions;
mod permissions_error;

pub use async_trait::async_trait;
pub use backup::*;
pub use config::*;
pub use conflict::*;
pub use events::*;
pub use flow::*;
pub use library::*;
pub use pe_version::{FileVersion, ParsedVersion, compare_versions, extract_file_version};
pub use permissions::*;
