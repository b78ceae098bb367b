use binswap_core::*;
use starbase_sandbox::create_empty_sandbox;
use std::time::{Duration, Instant};

fn detector() -> ProbeConflictDetector {
    ProbeConflictDetector::new(Duration::from_millis(10))
}

mod probe_conflict_detector {
    use super::*;

    #[tokio::test]
    async fn unlocked_file() {
        let sandbox = create_empty_sandbox();
        sandbox.create_file("lib.dll", "bytes");

        assert!(
            !detector()
                .is_locked(&sandbox.path().join("lib.dll"), Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn open_readers_are_not_a_lock() {
        let sandbox = create_empty_sandbox();
        sandbox.create_file("lib.dll", "bytes");
        let path = sandbox.path().join("lib.dll");

        let _reader = std::fs::File::open(&path).unwrap();

        assert!(!detector().is_locked(&path, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn missing_file_is_not_locked() {
        let sandbox = create_empty_sandbox();

        assert!(
            !detector()
                .is_locked(&sandbox.path().join("missing.dll"), Duration::from_secs(1))
                .await
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn exclusive_lock_with_known_holder() {
        let sandbox = create_empty_sandbox();
        sandbox.create_file("lib.dll", "bytes");
        let path = sandbox.path().join("lib.dll");

        let handle = std::fs::File::open(&path).unwrap();
        fs2::FileExt::lock_exclusive(&handle).unwrap();

        let locked = detector().is_locked(&path, Duration::from_secs(1)).await;

        fs2::FileExt::unlock(&handle).unwrap();

        assert!(locked);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn returns_within_timeout() {
        let sandbox = create_empty_sandbox();
        sandbox.create_file("lib.dll", "bytes");
        let path = sandbox.path().join("lib.dll");

        let handle = std::fs::File::open(&path).unwrap();
        fs2::FileExt::lock_exclusive(&handle).unwrap();

        let started = Instant::now();
        detector().is_locked(&path, Duration::from_millis(200)).await;

        fs2::FileExt::unlock(&handle).unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

mod lock_holders {
    use super::*;

    #[test]
    fn none_for_unopened_file() {
        let sandbox = create_empty_sandbox();
        sandbox.create_file("lib.dll", "bytes");

        assert!(find_lock_holders(&sandbox.path().join("lib.dll")).is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn finds_current_process() {
        let sandbox = create_empty_sandbox();
        sandbox.create_file("lib.dll", "bytes");
        let path = sandbox.path().join("lib.dll");

        let _handle = std::fs::File::open(&path).unwrap();
        let holders = find_lock_holders(&path);

        assert!(holders.iter().any(|holder| holder.pid == std::process::id()));
    }
}
