#![allow(dead_code)]

use binswap_core::{ConflictDetector, SwapConfig, UpdateEvent, UpdateObserver, async_trait};
use pe_version::test_utils::fake_dll;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn write_dll(dir: &Path, name: &str, version: &str) -> PathBuf {
    let path = dir.join(name);

    fs::create_dir_all(dir).unwrap();
    fs::write(&path, fake_dll(version)).unwrap();

    path
}

pub fn fast_config() -> SwapConfig {
    SwapConfig {
        probe_timeout_ms: 100,
        probe_interval_ms: 10,
        unlock_attempts: 2,
        unlock_interval_ms: 10,
        ..SwapConfig::default()
    }
}

#[cfg(unix)]
pub fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

/// Whether files can actually be created in the directory. Mode bits don't
/// stop a privileged user, so tests that rely on them check this first.
pub fn can_create_in(dir: &Path) -> bool {
    let path = dir.join(".created-by-test");
    let created = fs::write(&path, "").is_ok();

    if created {
        fs::remove_file(&path).unwrap();
    }

    created
}

#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<UpdateEvent>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<UpdateEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(|event| match event {
                UpdateEvent::Decided { .. } => "decided",
                UpdateEvent::BackupCreated { .. } => "backup-created",
                UpdateEvent::LockRetry { .. } => "lock-retry",
                UpdateEvent::SwapCompleted { .. } => "swap-completed",
                UpdateEvent::VerifyFailed { .. } => "verify-failed",
                UpdateEvent::RollbackAttempted { .. } => "rollback-attempted",
            })
            .collect()
    }
}

impl UpdateObserver for RecordingObserver {
    fn on_event(&self, event: &UpdateEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Reports every file as locked.
#[derive(Clone, Default)]
pub struct AlwaysLocked {
    pub calls: Arc<AtomicU32>,
}

impl AlwaysLocked {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConflictDetector for AlwaysLocked {
    async fn is_locked(&self, _path: &Path, _timeout: Duration) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Rewrites a file while the engine waits for the target to unlock.
pub struct RewriteDuringProbe {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[async_trait]
impl ConflictDetector for RewriteDuringProbe {
    async fn is_locked(&self, _path: &Path, _timeout: Duration) -> bool {
        fs::write(&self.path, &self.bytes).unwrap();
        false
    }
}
