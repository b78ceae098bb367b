pub use super::config_error::SwapConfigError;
use crate::backup::DEFAULT_BACKUP_CONCURRENCY;
use pe_version::FileVersion;
use serde::{Deserialize, Serialize};
use starbase_utils::toml;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BACKUP_EXTENSION: &str = "dlsss";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SwapConfig {
    pub backups_enabled: bool,
    pub backup_extension: String,
    pub backup_concurrency: usize,
    pub update_concurrency: usize,

    /// Minimum existing version per library file name. Targets below
    /// their floor are never touched.
    pub floors: BTreeMap<String, FileVersion>,

    /// Minimum version a renamed artifact must have before it's installed.
    pub rename_min_version: FileVersion,

    pub probe_timeout_ms: u64,
    pub probe_interval_ms: u64,
    pub unlock_attempts: u32,
    pub unlock_interval_ms: u64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            backups_enabled: true,
            backup_extension: DEFAULT_BACKUP_EXTENSION.into(),
            backup_concurrency: DEFAULT_BACKUP_CONCURRENCY,
            update_concurrency: 4,
            floors: BTreeMap::from_iter([("nvngx_dlss.dll".into(), FileVersion::new(2, 0, 0))]),
            rename_min_version: FileVersion::new(3, 1, 0),
            probe_timeout_ms: 5000,
            probe_interval_ms: 100,
            unlock_attempts: 3,
            unlock_interval_ms: 2000,
        }
    }
}

impl SwapConfig {
    #[instrument(name = "load_swap_config")]
    pub fn load<P: AsRef<Path> + Debug>(path: P) -> Result<Self, SwapConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            debug!(file = ?path, "Config file does not exist, using defaults");

            return Ok(Self::default());
        }

        debug!(file = ?path, "Loading swap config");

        let mut config: SwapConfig = toml::read_file(path)?;
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    pub fn normalize(&mut self) {
        self.floors = std::mem::take(&mut self.floors)
            .into_iter()
            .map(|(name, version)| (name.to_lowercase(), version))
            .collect();
        self.backup_extension = self
            .backup_extension
            .trim()
            .trim_start_matches('.')
            .to_owned();
    }

    pub fn validate(&self) -> Result<(), SwapConfigError> {
        let invalid = |setting: &str, reason: &str| SwapConfigError::InvalidSetting {
            setting: setting.to_owned(),
            reason: reason.to_owned(),
        };

        if self.backup_concurrency == 0 {
            return Err(invalid("backup-concurrency", "must be at least 1"));
        }

        if self.update_concurrency == 0 {
            return Err(invalid("update-concurrency", "must be at least 1"));
        }

        if self.unlock_attempts == 0 {
            return Err(invalid("unlock-attempts", "must be at least 1"));
        }

        if self.backup_extension.is_empty()
            || self
                .backup_extension
                .contains(['.', '/', '\\'])
        {
            return Err(invalid(
                "backup-extension",
                "must be a non-empty extension without separators",
            ));
        }

        Ok(())
    }

    /// Case-insensitive floor lookup on a library file name.
    pub fn floor_for(&self, file_name: &str) -> Option<&FileVersion> {
        self.floors
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(file_name))
            .map(|(_, version)| version)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn unlock_interval(&self) -> Duration {
        Duration::from_millis(self.unlock_interval_ms)
    }
}

/// Whether backups should be created. Consulted on every update, never
/// cached, so that a toggle flipped mid-batch applies to the next file.
pub trait BackupPreference: Send + Sync {
    fn backups_enabled(&self) -> bool;
}

impl<F> BackupPreference for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn backups_enabled(&self) -> bool {
        self()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StaticPreference(pub bool);

impl BackupPreference for StaticPreference {
    fn backups_enabled(&self) -> bool {
        self.0
    }
}

/// A toggle that can be flipped at runtime, for example from a settings screen.
#[derive(Clone, Debug, Default)]
pub struct SharedPreference(Arc<AtomicBool>);

impl SharedPreference {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

impl BackupPreference for SharedPreference {
    fn backups_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Reads `backups-enabled` from a config file on every call.
#[derive(Clone, Debug)]
pub struct ConfigFilePreference {
    pub path: PathBuf,
}

impl ConfigFilePreference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BackupPreference for ConfigFilePreference {
    fn backups_enabled(&self) -> bool {
        match SwapConfig::load(&self.path) {
            Ok(config) => config.backups_enabled,
            Err(error) => {
                warn!(file = ?self.path, "Unable to read backup preference, keeping backups on: {error}");

                true
            }
        }
    }
}
