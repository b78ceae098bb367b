use async_trait::async_trait;
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, instrument, trace, warn};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// A live process that holds an open handle on a file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LockHolder {
    pub pid: u32,
    pub name: String,
}

#[async_trait]
pub trait ConflictDetector: Send + Sync {
    /// Whether another process currently holds the file open in a way that
    /// would prevent it from being replaced. Must return within `timeout`.
    async fn is_locked(&self, path: &Path, timeout: Duration) -> bool;
}

#[derive(Debug, Eq, PartialEq)]
enum Probe {
    Free,
    Contended,
    Unavailable,
}

fn is_sharing_violation(error: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    if matches!(error.raw_os_error(), Some(32 | 33)) {
        return true;
    }

    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn probe_file(path: &Path) -> Probe {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if is_sharing_violation(&error) => return Probe::Contended,
        Err(error) => {
            trace!(file = ?path, "Unable to open for probing: {error}");

            return Probe::Unavailable;
        }
    };

    match fs2::FileExt::try_lock_shared(&file) {
        Ok(()) => {
            let _ = fs2::FileExt::unlock(&file);

            Probe::Free
        }
        Err(error) if is_sharing_violation(&error) => Probe::Contended,
        Err(error) => {
            trace!(file = ?path, "Unable to take a shared lock: {error}");

            Probe::Unavailable
        }
    }
}

#[cfg(target_os = "linux")]
fn process_holds_file(pid: u32, target: &Path) -> bool {
    // Processes we can't inspect, or that exited mid-scan, are skipped
    let Ok(entries) = std::fs::read_dir(format!("/proc/{pid}/fd")) else {
        return false;
    };

    entries
        .flatten()
        .any(|entry| std::fs::read_link(entry.path()).is_ok_and(|link| link == target))
}

#[cfg(not(target_os = "linux"))]
fn process_holds_file(_pid: u32, _target: &Path) -> bool {
    false
}

/// Scan live processes for open handles on the file. Best-effort: only
/// platforms that expose per-process handle tables report anything.
#[instrument]
pub fn find_lock_holders(path: &Path) -> Vec<LockHolder> {
    let target = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut holders = system
        .processes()
        .iter()
        .filter(|(pid, _)| process_holds_file(pid.as_u32(), &target))
        .map(|(pid, process)| LockHolder {
            pid: pid.as_u32(),
            name: process.name().to_string_lossy().into_owned(),
        })
        .collect::<Vec<_>>();

    holders.sort_by_key(|holder| holder.pid);

    trace!(file = ?path, holders = holders.len(), "Scanned processes for open handles");

    holders
}

/// Probes a file by opening it and taking a non-blocking shared lock.
#[derive(Clone, Debug)]
pub struct ProbeConflictDetector {
    pub interval: Duration,
}

impl Default for ProbeConflictDetector {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}

impl ProbeConflictDetector {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl ConflictDetector for ProbeConflictDetector {
    #[instrument(skip(self))]
    async fn is_locked(&self, path: &Path, timeout: Duration) -> bool {
        let started = Instant::now();
        let mut scanned = false;

        loop {
            let probe_path = path.to_path_buf();
            let probe = tokio::task::spawn_blocking(move || probe_file(&probe_path))
                .await
                .unwrap_or(Probe::Unavailable);

            match probe {
                Probe::Free => return false,
                Probe::Unavailable => return false,
                Probe::Contended if !scanned => {
                    scanned = true;

                    let scan_path = path.to_path_buf();
                    let holders =
                        tokio::task::spawn_blocking(move || find_lock_holders(&scan_path))
                            .await
                            .unwrap_or_default();

                    if !holders.is_empty() {
                        for holder in &holders {
                            warn!(
                                file = ?path,
                                pid = holder.pid,
                                process = &holder.name,
                                "File is held open by another process",
                            );
                        }

                        return true;
                    }
                }
                Probe::Contended => {}
            }

            let elapsed = started.elapsed();

            if elapsed >= timeout {
                debug!(
                    file = ?path,
                    "Could not determine lock state within {}ms, assuming unlocked",
                    timeout.as_millis(),
                );

                return false;
            }

            tokio::time::sleep(self.interval.min(timeout - elapsed)).await;
        }
    }
}
