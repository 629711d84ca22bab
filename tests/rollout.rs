// ABOUTME: Integration tests for the rollout coordinator.
// ABOUTME: Drives whole rollouts against a fake fleet: success, failure, rollback, cancellation.

mod support;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use support::{CountingInventory, FakeFleet, fast_settings, ids, targets, version};
use tranche::deploy::{
    AuditLog, FailureStage, RolloutCoordinator, RolloutError, RolloutRegistry, RolloutSettings,
    RolloutStatus,
};
use tranche::inventory::{
    EndpointTemplate, FileInventory, InventoryError, StaticInventory, Target,
};
use tranche::types::DeploymentName;

fn coordinator(
    fleet: &Arc<FakeFleet>,
    settings: RolloutSettings,
) -> RolloutCoordinator<Arc<FakeFleet>, Arc<FakeFleet>> {
    support::init_tracing();
    RolloutCoordinator::new(
        DeploymentName::new("web").unwrap(),
        fleet.clone(),
        fleet.clone(),
        settings,
    )
    .with_registry(RolloutRegistry::default())
}

mod success {
    use super::*;

    #[tokio::test]
    async fn six_targets_in_pairs_all_healthy() {
        let inventory = targets(&["a", "b", "c", "d", "e", "f"]);
        let fleet = FakeFleet::new(&inventory).shared();

        let report = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::Succeeded);
        assert!(report.succeeded());
        assert_eq!(report.version, version("v2"));
        assert_eq!(report.batch_size, 2);
        let batches: Vec<_> = report.batches.iter().map(|b| b.targets.clone()).collect();
        assert_eq!(
            batches,
            vec![ids(&["a", "b"]), ids(&["c", "d"]), ids(&["e", "f"])]
        );
        assert_eq!(report.committed, ids(&["a", "b", "c", "d", "e", "f"]));
        assert!(report.failed.is_empty());
        assert!(fleet.reverted_ids().is_empty());
        for id in ["a", "b", "c", "d", "e", "f"] {
            assert_eq!(fleet.running(id).as_deref(), Some("v2"));
        }
    }

    #[tokio::test]
    async fn inventory_is_read_once() {
        let inventory = CountingInventory::new(targets(&["a", "b", "c"]));
        let fleet = FakeFleet::new(&targets(&["a", "b", "c"])).shared();

        coordinator(&fleet, fast_settings())
            .run(&inventory, &version("v2"), 1)
            .await
            .unwrap();

        assert_eq!(inventory.reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_batches_but_not_after_the_last() {
        let inventory = targets(&["a", "b", "c"]);
        let fleet = FakeFleet::new(&inventory).shared();
        let settings = RolloutSettings {
            batch_delay: Duration::from_secs(30),
            ..fast_settings()
        };

        let start = tokio::time::Instant::now();
        let report = coordinator(&fleet, settings)
            .run(&StaticInventory::new(inventory), &version("v2"), 1)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::Succeeded);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(90), "elapsed {elapsed:?}");
    }
}

mod failure {
    use super::*;

    #[tokio::test]
    async fn unhealthy_second_batch_rolls_everything_back() {
        let inventory = targets(&["a", "b", "c", "d"]);
        let fleet = FakeFleet::new(&inventory).unhealthy_on_new(&["c", "d"]).shared();

        let report = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedRolledBack);
        assert!(report.committed.is_empty());
        assert_eq!(report.failed, ids(&["c", "d"]));

        let mut reverted = report.reverted.clone();
        reverted.sort();
        assert_eq!(reverted, ids(&["a", "b", "c", "d"]));
        for id in ["a", "b", "c", "d"] {
            assert_eq!(fleet.running(id).as_deref(), Some("v1"), "{id}");
        }
        assert!(report.manual_intervention.is_empty());
    }

    #[tokio::test]
    async fn failure_in_last_batch_reverts_all_earlier_batches() {
        let inventory = targets(&["a", "b", "c", "d", "e", "f"]);
        let fleet = FakeFleet::new(&inventory).unhealthy_on_new(&["f"]).shared();

        let report = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedRolledBack);
        assert_eq!(report.batches.len(), 3);
        let mut reverted = fleet.reverted_ids();
        reverted.sort();
        assert_eq!(reverted, ids(&["a", "b", "c", "d", "e", "f"]));
    }

    #[tokio::test]
    async fn deploy_failure_is_not_reverted() {
        let inventory = targets(&["a", "b", "c", "d"]);
        let fleet = FakeFleet::new(&inventory).failing_deploy(&["c"]).shared();

        let report = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedRolledBack);
        assert_eq!(report.failed, ids(&["c"]));
        let failure = &report.batches[1].failures[0];
        assert_eq!(failure.stage, FailureStage::Deploy);
        assert!(failure.reason.contains("image pull failed"));

        let reverted = fleet.reverted_ids();
        assert!(!reverted.contains(&ids(&["c"])[0]));
        assert_eq!(reverted.len(), 3);
    }

    #[tokio::test]
    async fn each_target_returns_to_its_own_previous_version() {
        let inventory = vec![
            Target::new("a", version("v1.0"), "http://a.test/health"),
            Target::new("b", version("v0.9"), "http://b.test/health"),
        ];
        let fleet = FakeFleet::new(&inventory).unhealthy_on_new(&["b"]).shared();

        let report = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedRolledBack);
        assert_eq!(fleet.running("a").as_deref(), Some("v1.0"));
        assert_eq!(fleet.running("b").as_deref(), Some("v0.9"));
    }

    #[tokio::test]
    async fn failed_revert_ends_in_manual_intervention() {
        let inventory = targets(&["a", "b", "c", "d"]);
        let fleet = FakeFleet::new(&inventory)
            .unhealthy_on_new(&["c"])
            .failing_revert(&["b"])
            .shared();

        let report = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedManual);
        assert_eq!(report.inconsistent_targets(), ids(&["b"]));
        assert_eq!(report.committed, ids(&["b"]));
        assert_eq!(fleet.running("b").as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn disabled_auto_rollback_leaves_everything_for_an_operator() {
        let inventory = targets(&["a", "b", "c", "d"]);
        let fleet = FakeFleet::new(&inventory).unhealthy_on_new(&["d"]).shared();
        let settings = RolloutSettings {
            auto_rollback: false,
            ..fast_settings()
        };

        let report = coordinator(&fleet, settings)
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedManual);
        assert!(fleet.reverted_ids().is_empty());
        assert_eq!(report.inconsistent_targets(), ids(&["a", "b", "c", "d"]));
    }

    #[tokio::test]
    async fn oversized_batch_fails_before_any_deploy() {
        let inventory = targets(&["a", "b"]);
        let fleet = FakeFleet::new(&inventory).shared();

        let err = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(inventory), &version("v2"), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, RolloutError::Plan(_)), "got {err:?}");
        assert!(fleet.deployed_ids().is_empty());
    }

    #[tokio::test]
    async fn unprobeable_inventory_endpoint_fails_before_any_deploy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a v1\nb v1 https://b.test/health").unwrap();
        let inventory = FileInventory::new(
            file.path(),
            EndpointTemplate::new("http://{target}.test/health"),
            None,
        );
        let fleet = FakeFleet::new(&targets(&["a", "b"])).shared();

        let err = coordinator(&fleet, fast_settings())
            .run(&inventory, &version("v2"), 1)
            .await
            .unwrap_err();

        assert!(
            matches!(err, RolloutError::Inventory(InventoryError::InvalidEndpoint { line: 2, .. })),
            "got {err:?}"
        );
        assert!(fleet.deployed_ids().is_empty());
    }

    #[tokio::test]
    async fn unsafe_target_id_fails_before_any_deploy() {
        let bad = Target::new("a;touch${IFS}pwned", version("v1"), "http://a.test/health");
        let fleet = FakeFleet::new(&targets(&["b"])).shared();

        let err = coordinator(&fleet, fast_settings())
            .run(
                &StaticInventory::new(vec![targets(&["b"]).remove(0), bad]),
                &version("v2"),
                1,
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, RolloutError::Inventory(InventoryError::InvalidTarget { .. })),
            "got {err:?}"
        );
        assert!(fleet.deployed_ids().is_empty());
    }

    #[tokio::test]
    async fn empty_inventory_is_rejected() {
        let fleet = FakeFleet::default().shared();

        let err = coordinator(&fleet, fast_settings())
            .run(&StaticInventory::new(Vec::new()), &version("v2"), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, RolloutError::Inventory(_)), "got {err:?}");
    }
}

mod cancellation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_batch_reverts_issued_deploys() {
        let inventory = targets(&["a", "b", "c", "d"]);
        let fleet = FakeFleet::new(&inventory)
            .deploy_delay(Duration::from_secs(10))
            .shared();
        let coordinator = coordinator(&fleet, fast_settings());

        let token = coordinator.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let report = coordinator
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedRolledBack);
        assert_eq!(report.batches.len(), 1);
        assert!(
            report.batches[0]
                .failures
                .iter()
                .all(|f| f.stage == FailureStage::Cancelled)
        );
        let mut reverted = fleet.reverted_ids();
        reverted.sort();
        assert_eq!(reverted, ids(&["a", "b"]));
        assert!(report.committed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_between_batches_reverts_committed() {
        let inventory = targets(&["a", "b", "c", "d"]);
        let fleet = FakeFleet::new(&inventory).shared();
        let settings = RolloutSettings {
            batch_delay: Duration::from_secs(60),
            ..fast_settings()
        };
        let coordinator = coordinator(&fleet, settings);

        let token = coordinator.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let report = coordinator
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::FailedRolledBack);
        assert_eq!(report.batches.len(), 1);
        assert_eq!(fleet.deployed_ids(), ids(&["a", "b"]));
        assert_eq!(fleet.reverted_ids(), ids(&["a", "b"]));
        assert!(report.committed.is_empty());
    }
}

mod exclusion {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_rollout_of_same_deployment_is_refused() {
        let inventory = targets(&["a", "b"]);
        let fleet = FakeFleet::new(&inventory)
            .deploy_delay(Duration::from_secs(5))
            .shared();
        let registry = RolloutRegistry::default();

        let first = coordinator(&fleet, fast_settings()).with_registry(registry.clone());
        let second = coordinator(&fleet, fast_settings()).with_registry(registry.clone());
        let first_inventory = StaticInventory::new(inventory.clone());
        let second_inventory = StaticInventory::new(inventory);
        let v2 = version("v2");

        let (first, second) = tokio::join!(
            first.run(&first_inventory, &v2, 1),
            second.run(&second_inventory, &v2, 1),
        );

        assert_eq!(first.unwrap().status, RolloutStatus::Succeeded);
        assert!(matches!(second, Err(RolloutError::AlreadyInProgress(_))));
        assert!(!registry.is_active(&DeploymentName::new("web").unwrap()));
    }
}

mod audit {
    use super::*;

    fn events(path: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn records_rollout_milestones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let inventory = targets(&["a", "b", "c", "d"]);
        let fleet = FakeFleet::new(&inventory).unhealthy_on_new(&["c"]).shared();

        let report = coordinator(&fleet, fast_settings())
            .with_audit_log(AuditLog::new(&path))
            .run(&StaticInventory::new(inventory), &version("v2"), 2)
            .await
            .unwrap();

        assert!(report.warnings.is_empty());
        assert_eq!(
            events(&path),
            vec![
                "rollout_started",
                "batch_completed",
                "batch_completed",
                "rollback_completed",
                "rollout_finished",
            ]
        );
    }

    #[tokio::test]
    async fn unwritable_audit_log_becomes_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = targets(&["a"]);
        let fleet = FakeFleet::new(&inventory).shared();

        // A directory cannot be opened for appending.
        let report = coordinator(&fleet, fast_settings())
            .with_audit_log(AuditLog::new(dir.path()))
            .run(&StaticInventory::new(inventory), &version("v2"), 1)
            .await
            .unwrap();

        assert_eq!(report.status, RolloutStatus::Succeeded);
        assert!(!report.warnings.is_empty());
        assert!(report.warnings[0].contains("audit log"));
    }
}
