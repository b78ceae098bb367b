mod utils;

use binswap_core::*;
use pe_version::test_utils::fake_dll;
use starbase_sandbox::create_empty_sandbox;
use std::fs;
use utils::*;

mod update_all {
    use super::*;

    #[tokio::test]
    async fn sorts_results_into_summary() {
        let sandbox = create_empty_sandbox();
        let latest = sandbox.path().join("latest");
        let dlss = write_dll(&latest, "nvngx_dlss.dll", "3.5.0");
        let xess = write_dll(&latest, "libxess.dll", "1.3.1");

        let old = write_dll(&sandbox.path().join("one"), "nvngx_dlss.dll", "2.1.0");
        let ancient = write_dll(&sandbox.path().join("two"), "nvngx_dlss.dll", "1.9.0");
        let current = write_dll(&sandbox.path().join("three"), "libxess.dll", "1.3.1");

        let summary = ReplaceEngine::new(fast_config())
            .update_all([
                UpdateRequest::new(&old, &dlss),
                UpdateRequest::new(&ancient, &dlss),
                UpdateRequest::new(&current, &xess),
            ])
            .await;

        assert_eq!(summary.len(), 3);
        assert_eq!(summary.updated.len(), 1);
        assert_eq!(summary.skipped.len(), 2);
        assert!(summary.failed.is_empty());
        assert_eq!(
            summary.backups,
            [sandbox.path().join("one/nvngx_dlss.dlsss").canonicalize().unwrap()]
        );
        assert_eq!(fs::read(&old).unwrap(), fake_dll("3.5.0"));
        assert_eq!(fs::read(&ancient).unwrap(), fake_dll("1.9.0"));
    }

    #[tokio::test]
    async fn creates_backups_up_front() {
        let sandbox = create_empty_sandbox();
        let candidate = write_dll(&sandbox.path().join("latest"), "dstorage.dll", "1.2.0");
        let observer = RecordingObserver::default();
        let targets = (0..6)
            .map(|index| {
                write_dll(
                    &sandbox.path().join(format!("game{index}")),
                    "dstorage.dll",
                    "1.0.0",
                )
            })
            .collect::<Vec<_>>();

        let summary = ReplaceEngine::new(fast_config())
            .with_observer(observer.clone())
            .update_all(
                targets
                    .iter()
                    .map(|target| UpdateRequest::new(target, &candidate)),
            )
            .await;

        assert_eq!(summary.updated.len(), 6);
        assert_eq!(summary.backups.len(), 6);

        // Created once by the batch and reused by each update
        assert_eq!(
            observer
                .names()
                .iter()
                .filter(|name| **name == "backup-created")
                .count(),
            6
        );

        for target in &targets {
            assert_eq!(
                fs::read(target.with_extension("dlsss")).unwrap(),
                fake_dll("1.0.0")
            );
        }
    }

    #[tokio::test]
    async fn runs_each_target_once() {
        let sandbox = create_empty_sandbox();
        let candidate = write_dll(&sandbox.path().join("latest"), "libxess.dll", "1.3.1");
        let target = write_dll(&sandbox.path().join("game"), "libxess.dll", "1.0.0");
        let relative = sandbox.path().join("game/../game/libxess.dll");

        let summary = ReplaceEngine::new(fast_config())
            .update_all([
                UpdateRequest::new(&target, &candidate),
                UpdateRequest::new(&relative, &candidate),
            ])
            .await;

        assert_eq!(summary.len(), 1);
        assert_eq!(summary.updated.len(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let sandbox = create_empty_sandbox();
        let candidate = write_dll(&sandbox.path().join("latest"), "libxess.dll", "1.3.1");
        let first = write_dll(&sandbox.path().join("a"), "libxess.dll", "1.0.0");
        let second = write_dll(&sandbox.path().join("b"), "libxess.dll", "1.0.0");

        let summary = ReplaceEngine::new(fast_config())
            .update_all([
                UpdateRequest::new(&first, sandbox.path().join("missing.dll")),
                UpdateRequest::new(&second, &candidate),
            ])
            .await;

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].failure_kind(), Some(FailureKind::NotFound));
        assert_eq!(summary.updated.len(), 1);
        assert_eq!(fs::read(&second).unwrap(), fake_dll("1.3.1"));
    }

    #[tokio::test]
    async fn mixes_standard_and_renamed_requests() {
        let sandbox = create_empty_sandbox();
        let latest = sandbox.path().join("latest");
        let game = sandbox.path().join("game");
        let artifact = write_dll(&latest, "amd_fidelityfx_loader_dx12.dll", "3.1.4");
        let xess = write_dll(&latest, "libxess.dll", "1.3.1");
        let target = write_dll(&game, "libxess.dll", "1.0.0");

        let summary = ReplaceEngine::new(fast_config())
            .update_all([
                BatchRequest::from(UpdateRequest::new(&target, &xess)),
                BatchRequest::from(RenameRequest::for_artifact(&game, &artifact).unwrap()),
            ])
            .await;

        assert_eq!(summary.updated.len(), 2);
        assert_eq!(summary.backups.len(), 1);
        assert!(game.join("amd_fidelityfx_dx12.dll").exists());
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs() {
        let sandbox = create_empty_sandbox();
        let candidate = write_dll(&sandbox.path().join("latest"), "libxess.dll", "1.3.1");
        let first = write_dll(&sandbox.path().join("a"), "libxess.dll", "1.0.0");
        let second = write_dll(&sandbox.path().join("b"), "libxess.dll", "1.0.0");

        let summary = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            ReplaceEngine::new(SwapConfig {
                update_concurrency: 0,
                backup_concurrency: 0,
                ..fast_config()
            })
            .update_all([
                UpdateRequest::new(&first, &candidate),
                UpdateRequest::new(&second, &candidate),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(summary.updated.len(), 2);
        assert_eq!(fs::read(&first).unwrap(), fake_dll("1.3.1"));
    }

    #[tokio::test]
    async fn empty_batch() {
        let summary = ReplaceEngine::default()
            .update_all(Vec::<UpdateRequest>::new())
            .await;

        assert!(summary.is_empty());
    }
}
