// Tenant lifecycle state machine: provisioning atomicity, guarded
// transitions, retryable deletion, and per-tenant write serialization.

mod common;

use atrium_gateway::tenancy::{TenancyError, TenantStatus};

#[tokio::test]
async fn create_returns_active_never_pending() {
    let harness = common::harness();

    let record = harness.state.lifecycle.create("acme", None).await.unwrap();
    assert_eq!(record.tenant_id, "acme_1");
    assert_eq!(record.schema_name, "t_acme_1");
    assert_eq!(record.status, TenantStatus::Active);
    assert!(harness.provisioner.has_schema("t_acme_1"));

    // The post-return observable state is ACTIVE, not PENDING.
    let stored = harness.state.lifecycle.get("acme_1").await.unwrap();
    assert_eq!(stored.status, TenantStatus::Active);
}

#[tokio::test]
async fn failed_provisioning_burns_the_identifier() {
    let harness = common::harness();

    harness.provisioner.fail_next_provision(true);
    let err = harness
        .state
        .lifecycle
        .create("beta", None)
        .await
        .unwrap_err();
    assert!(matches!(err, TenancyError::TenantProvisioning { .. }));

    // No half-provisioned tenant: the record exists only as a DELETED
    // audit row and does not resolve.
    let burned = harness.state.lifecycle.get("beta_1").await.unwrap();
    assert_eq!(burned.status, TenantStatus::Deleted);
    assert!(harness.state.directory.resolve("beta_1").await.is_err());
    assert!(!harness.provisioner.has_schema("t_beta_1"));

    // Retrying the same name allocates a fresh identifier.
    harness.provisioner.fail_next_provision(false);
    let retried = harness.state.lifecycle.create("beta", None).await.unwrap();
    assert_eq!(retried.tenant_id, "beta_2");
    assert_eq!(retried.status, TenantStatus::Active);
    assert!(harness.provisioner.has_schema("t_beta_2"));
}

#[tokio::test]
async fn same_status_update_is_an_idempotent_noop() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;

    let unchanged = harness
        .state
        .lifecycle
        .update_status(&record.tenant_id, TenantStatus::Active)
        .await
        .unwrap();
    assert_eq!(unchanged.status, TenantStatus::Active);
    assert_eq!(unchanged.version, record.version);
}

#[tokio::test]
async fn suspension_round_trip() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;

    let suspended = harness
        .state
        .lifecycle
        .update_status(&record.tenant_id, TenantStatus::Suspended)
        .await
        .unwrap();
    assert_eq!(suspended.status, TenantStatus::Suspended);
    assert!(harness.state.directory.resolve(&record.tenant_id).await.is_err());

    let resumed = harness
        .state
        .lifecycle
        .update_status(&record.tenant_id, TenantStatus::Active)
        .await
        .unwrap();
    assert_eq!(resumed.status, TenantStatus::Active);
    assert!(harness.state.directory.resolve(&record.tenant_id).await.is_ok());
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;
    let id = record.tenant_id.clone();

    // Administrative targets never include PENDING or DELETED.
    for target in [TenantStatus::Pending, TenantStatus::Deleted] {
        let err = harness
            .state
            .lifecycle
            .update_status(&id, target)
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyError::IllegalTenantTransition { .. }));
    }

    // Out of DELETED nothing is legal.
    harness.state.lifecycle.delete(&id, true).await.unwrap();
    let err = harness
        .state
        .lifecycle
        .update_status(&id, TenantStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, TenancyError::IllegalTenantTransition { .. }));

    let missing = harness
        .state
        .lifecycle
        .update_status("ghost_1", TenantStatus::Suspended)
        .await
        .unwrap_err();
    assert!(matches!(missing, TenancyError::TenantNotFound(_)));
}

#[tokio::test]
async fn delete_drops_schema_and_reaches_terminal_state() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;

    let deleted = harness
        .state
        .lifecycle
        .delete(&record.tenant_id, true)
        .await
        .unwrap();
    assert_eq!(deleted.status, TenantStatus::Deleted);
    assert!(!harness.provisioner.has_schema(&record.schema_name));

    // Terminal: deleting again is a no-op, not an error.
    let again = harness
        .state
        .lifecycle
        .delete(&record.tenant_id, true)
        .await
        .unwrap();
    assert_eq!(again.status, TenantStatus::Deleted);
}

#[tokio::test]
async fn delete_without_drop_keeps_the_schema() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;

    let deleted = harness
        .state
        .lifecycle
        .delete(&record.tenant_id, false)
        .await
        .unwrap();
    assert_eq!(deleted.status, TenantStatus::Deleted);
    assert!(harness.provisioner.has_schema(&record.schema_name));
}

#[tokio::test]
async fn failed_schema_drop_leaves_deleting_and_is_retryable() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;
    let id = record.tenant_id.clone();

    harness.provisioner.fail_next_drop(true);
    let err = harness.state.lifecycle.delete(&id, true).await.unwrap_err();
    assert!(matches!(err, TenancyError::TenantProvisioning { .. }));

    // The lifecycle does not claim a deletion it did not perform.
    let stuck = harness.state.lifecycle.get(&id).await.unwrap();
    assert_eq!(stuck.status, TenantStatus::Deleting);
    assert!(harness.provisioner.has_schema(&record.schema_name));

    // Retry completes the teardown.
    harness.provisioner.fail_next_drop(false);
    let done = harness.state.lifecycle.delete(&id, true).await.unwrap();
    assert_eq!(done.status, TenantStatus::Deleted);
    assert!(!harness.provisioner.has_schema(&record.schema_name));
}

#[tokio::test]
async fn tenant_names_are_validated_before_allocation() {
    let harness = common::harness();

    for bad in ["", "a", "bad name", "acme;drop", &"x".repeat(101)] {
        let err = harness.state.lifecycle.create(bad, None).await.unwrap_err();
        assert!(
            matches!(err, TenancyError::InvalidTenantName(_)),
            "name {:?} should be rejected",
            bad
        );
    }
}

#[tokio::test]
async fn list_pages_and_filters_by_status() {
    let harness = common::harness();
    for name in ["acme", "globex", "initech"] {
        common::seed_tenant(&harness, name).await;
    }
    harness
        .state
        .lifecycle
        .update_status("globex_1", TenantStatus::Suspended)
        .await
        .unwrap();

    let active = harness
        .state
        .lifecycle
        .list(Some(TenantStatus::Active), 50, 0)
        .await
        .unwrap();
    assert_eq!(active.len(), 2);

    let all = harness.state.lifecycle.list(None, 50, 0).await.unwrap();
    assert_eq!(all.len(), 3);

    let paged = harness.state.lifecycle.list(None, 2, 0).await.unwrap();
    assert_eq!(paged.len(), 2);
    let rest = harness.state.lifecycle.list(None, 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_updates_both_succeed() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;
    let id = record.tenant_id.clone();

    let lifecycle_a = harness.state.lifecycle.clone();
    let lifecycle_b = harness.state.lifecycle.clone();
    let id_a = id.clone();
    let id_b = id.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { lifecycle_a.update_status(&id_a, TenantStatus::Suspended).await }),
        tokio::spawn(async move { lifecycle_b.update_status(&id_b, TenantStatus::Suspended).await }),
    );

    // One wins the compare-and-swap; the other observes the post-state and
    // succeeds idempotently.
    assert_eq!(a.unwrap().unwrap().status, TenantStatus::Suspended);
    assert_eq!(b.unwrap().unwrap().status, TenantStatus::Suspended);

    let final_state = harness.state.lifecycle.get(&id).await.unwrap();
    assert_eq!(final_state.status, TenantStatus::Suspended);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conflicting_updates_leave_no_undefined_state() {
    let harness = common::harness();
    let record = common::seed_tenant(&harness, "acme").await;
    let id = record.tenant_id.clone();

    let lifecycle_a = harness.state.lifecycle.clone();
    let lifecycle_b = harness.state.lifecycle.clone();
    let id_a = id.clone();
    let id_b = id.clone();

    let (suspend, delete) = tokio::join!(
        tokio::spawn(async move { lifecycle_a.update_status(&id_a, TenantStatus::Suspended).await }),
        tokio::spawn(async move { lifecycle_b.update_status(&id_b, TenantStatus::Deleting).await }),
    );
    let suspend = suspend.unwrap();
    let delete = delete.unwrap();

    // Exactly one serialization wins. Each call either succeeded with its
    // own target or failed cleanly against the post-state; there is no
    // third outcome and no undefined intermediate status.
    let suspend_ok = match suspend {
        Ok(record) => {
            assert_eq!(record.status, TenantStatus::Suspended);
            true
        }
        Err(err) => {
            assert!(matches!(err, TenancyError::IllegalTenantTransition { .. }));
            false
        }
    };
    let delete_ok = match delete {
        Ok(record) => {
            assert_eq!(record.status, TenantStatus::Deleting);
            true
        }
        Err(err) => {
            assert!(matches!(err, TenancyError::IllegalTenantTransition { .. }));
            false
        }
    };
    assert!(suspend_ok || delete_ok, "at least one writer must land");

    // The post-state is whatever the last winner wrote, nothing else.
    let final_state = harness.state.lifecycle.get(&id).await.unwrap();
    if delete_ok {
        assert_eq!(final_state.status, TenantStatus::Deleting);
    } else {
        assert_eq!(final_state.status, TenantStatus::Suspended);
    }
}
