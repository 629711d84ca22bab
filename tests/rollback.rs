// ABOUTME: Integration tests for the rollback manager.
// ABOUTME: Covers idempotency, revert failures, post-revert probe failures, and the rollback policy.

mod support;

use std::num::NonZeroU32;
use std::time::Duration;
use support::{FakeFleet, fast_policy, ids, targets, version};
use tranche::deploy::{DeploymentExecutor, RevertEntry, RollbackManager};
use tranche::health::{HealthProber, ProbePolicy};
use tranche::inventory::Target;

fn entries(targets: &[Target]) -> Vec<RevertEntry> {
    targets
        .iter()
        .map(|t| RevertEntry::new(t.clone(), t.version.clone()))
        .collect()
}

/// Put every target on `v2` so there is something to revert.
async fn deploy_all(fleet: &FakeFleet, targets: &[Target]) {
    for target in targets {
        fleet.deploy(target, &version("v2")).await.unwrap();
    }
}

#[tokio::test]
async fn reverts_targets_to_their_previous_version() {
    support::init_tracing();
    let inventory = targets(&["a", "b"]);
    let fleet = FakeFleet::new(&inventory).shared();
    deploy_all(&fleet, &inventory).await;

    let prober = HealthProber::new(fleet.clone());
    let summary = RollbackManager::new(&fleet, &prober)
        .rollback(&entries(&inventory), &fast_policy())
        .await
        .unwrap();

    assert_eq!(summary.reverted, ids(&["a", "b"]));
    assert_eq!(fleet.running("a").as_deref(), Some("v1"));
    assert_eq!(fleet.running("b").as_deref(), Some("v1"));
}

#[tokio::test]
async fn rollback_is_idempotent() {
    let inventory = targets(&["a", "b"]);
    let fleet = FakeFleet::new(&inventory).unhealthy_on_new(&["a", "b"]).shared();
    deploy_all(&fleet, &inventory).await;

    let prober = HealthProber::new(fleet.clone());
    let manager = RollbackManager::new(&fleet, &prober);

    let first = manager
        .rollback(&entries(&inventory), &fast_policy())
        .await
        .unwrap();
    let second = manager
        .rollback(&entries(&inventory), &fast_policy())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(fleet.running("a").as_deref(), Some("v1"));
    assert_eq!(fleet.running("b").as_deref(), Some("v1"));
    for (_, to_version) in fleet.reverts() {
        assert_eq!(to_version.as_str(), "v1");
    }
}

#[tokio::test]
async fn failed_revert_of_one_target_requires_manual_intervention_for_it_only() {
    let inventory = targets(&["a", "b"]);
    let fleet = FakeFleet::new(&inventory).failing_revert(&["b"]).shared();
    deploy_all(&fleet, &inventory).await;

    let prober = HealthProber::new(fleet.clone());
    let err = RollbackManager::new(&fleet, &prober)
        .rollback(&entries(&inventory), &fast_policy())
        .await
        .unwrap_err();

    assert_eq!(err.reverted, ids(&["a"]));
    assert_eq!(err.inconsistent_targets(), ids(&["b"]));
    assert!(err.to_string().contains("revert rejected"), "got: {err}");
}

#[tokio::test]
async fn unhealthy_after_revert_requires_manual_intervention() {
    let inventory = targets(&["a", "b"]);
    let fleet = FakeFleet::new(&inventory).always_unhealthy(&["a"]).shared();
    deploy_all(&fleet, &inventory).await;

    let prober = HealthProber::new(fleet.clone());
    let err = RollbackManager::new(&fleet, &prober)
        .rollback(&entries(&inventory), &fast_policy())
        .await
        .unwrap_err();

    assert_eq!(err.inconsistent_targets(), ids(&["a"]));
    let reason = &err.manual_intervention_required[0].reason;
    assert!(reason.contains("after revert"), "got: {reason}");
    // The revert itself was issued.
    assert_eq!(fleet.running("a").as_deref(), Some("v1"));
}

#[tokio::test(start_paused = true)]
async fn post_revert_probe_uses_the_given_policy() {
    let inventory = targets(&["a"]);
    let fleet = FakeFleet::new(&inventory).always_unhealthy(&["a"]).shared();

    let policy = ProbePolicy::new(
        Duration::from_secs(1),
        NonZeroU32::new(3).unwrap(),
        Duration::from_secs(2),
    );
    let prober = HealthProber::new(fleet.clone());
    let _ = RollbackManager::new(&fleet, &prober)
        .rollback(&entries(&inventory), &policy)
        .await;

    assert_eq!(fleet.check_count(), 3);
}

#[tokio::test]
async fn explicit_target_version_is_used() {
    let inventory = targets(&["a"]);
    let fleet = FakeFleet::new(&inventory).shared();
    deploy_all(&fleet, &inventory).await;

    let entry = RevertEntry::new(inventory[0].clone(), version("v0.8"));
    let prober = HealthProber::new(fleet.clone());
    RollbackManager::new(&fleet, &prober)
        .rollback(&[entry], &fast_policy())
        .await
        .unwrap();

    assert_eq!(fleet.running("a").as_deref(), Some("v0.8"));
}
