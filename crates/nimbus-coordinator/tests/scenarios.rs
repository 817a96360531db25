//! End-to-end scenarios driven through the coordinator against the
//! in-memory test-support store.
#![feature(assert_matches)]

use core::assert_matches::assert_matches;
use std::sync::Arc;

use nimbus_coordinator::Coordinator;
use nimbus_locking::LockManager;
use nimbus_store::EntityStore;
use nimbus_test_support::{InMemoryStore, RecordingEmitter};
use nimbus_types::{
    entities::{
        Group, Installation, InstallationBackup, InstallationDbMigration,
        InstallationDbRestoration,
    },
    CommonFields, CoreError, GroupId, GroupState, InstallationBackupId, InstallationBackupState,
    InstallationDbMigrationId, InstallationDbMigrationState, InstallationDbRestorationId,
    InstallationDbRestorationState, InstallationId, InstallationState, MultitenantDatabaseId,
    RequestId,
};
use time::macros::datetime;

fn harness() -> (Coordinator<InMemoryStore>, Arc<InMemoryStore>, Arc<RecordingEmitter>) {
    let store = Arc::new(InMemoryStore::new());
    let emitter = Arc::new(RecordingEmitter::new());
    let lock_manager = LockManager::new(Arc::clone(&store));
    let (nudge_tx, _nudge_rx) = nimbus_coordinator::channel();
    let coordinator = Coordinator::new(lock_manager, emitter.clone(), nudge_tx);
    (coordinator, store, emitter)
}

fn new_installation() -> Installation {
    Installation {
        common: CommonFields::new(InstallationId::generate(), datetime!(2024-01-01 0:00 UTC)),
        state: InstallationState::CreationRequested,
        owner_id: "u1".to_owned(),
        dns: "a.example.com".to_owned(),
        group_id: None,
        group_sequence: None,
        deletion_locked: false,
        deletion_pending_expiry: None,
    }
}

#[tokio::test]
async fn create_then_retry_after_failure() {
    let (coordinator, _store, emitter) = harness();
    let installation = new_installation();
    let id = installation.common.id.clone();

    let created = coordinator
        .create(installation)
        .await
        .expect("create should succeed");
    assert_eq!(created.state, InstallationState::CreationRequested);

    // Supervisor marks CreationFailed out-of-band.
    coordinator
        .transition_to(&id, InstallationState::CreationFailed, RequestId::generate(), |_| true)
        .await
        .expect("supervisor-driven failure transition should succeed");

    let retried = coordinator
        .retry_transition(&id, InstallationState::CreationRequested, RequestId::generate())
        .await
        .expect("retry-create should succeed");
    assert_eq!(retried.state, InstallationState::CreationRequested);

    let events = emitter.events().await;
    assert_eq!(events.len(), 3, "creation + failure + retry, no suppressed duplicates");
    assert_eq!(events[0].old_state, "n/a");
    assert_eq!(events[2].old_state, "CreationFailed");
    assert_eq!(events[2].new_state, "CreationRequested");
}

#[tokio::test]
async fn update_under_security_lock_is_forbidden() {
    let (coordinator, _store, emitter) = harness();
    let mut installation = new_installation();
    installation.common.api_security_lock = true;
    let id = installation.common.id.clone();
    coordinator
        .create(installation)
        .await
        .expect("create should succeed");

    let result = coordinator
        .transition_to(&id, InstallationState::UpdateRequested, RequestId::generate(), |_| true)
        .await;
    let err = result.expect_err("security-locked installation must reject mutation");
    assert_eq!(*err.current_context(), CoreError::Forbidden);

    // Only the creation event should have been emitted; the rejected call
    // produced no second event.
    assert_eq!(emitter.events().await.len(), 1);
}

#[tokio::test]
async fn joining_a_deleted_group_is_a_bad_request() {
    let (coordinator, store, _emitter) = harness();

    let group = Group {
        common: CommonFields::new(GroupId::generate(), datetime!(2024-01-01 0:00 UTC)),
        state: GroupState::Deleted,
        name: "g".to_owned(),
        image: "img:v1".to_owned(),
        sequence: 1,
    };
    let group_id = group.common.id.clone();
    store.seed(group);

    let installation = new_installation();
    let installation_id = installation.common.id.clone();
    store.seed(installation);

    let result = coordinator
        .join_group(&installation_id, &group_id, RequestId::generate())
        .await;
    let err = result.expect_err("joining a deleted group must fail");
    assert_eq!(*err.current_context(), CoreError::BadRequest);

    let unchanged = store
        .get(&installation_id)
        .await
        .expect("get should succeed")
        .expect("installation should still exist");
    assert_matches!(unchanged.group_id, None);
}

#[tokio::test]
async fn deleting_a_backup_with_an_active_restoration_is_rejected() {
    let (coordinator, store, _emitter) = harness();

    let installation = new_installation();
    let installation_id = installation.common.id.clone();
    store.seed(installation);

    let backup = InstallationBackup {
        common: CommonFields::new(InstallationBackupId::generate(), datetime!(2024-01-01 0:00 UTC)),
        state: InstallationBackupState::BackupSucceeded,
        installation_id: installation_id.clone(),
        cluster_installation_id: "ci-1".to_owned(),
    };
    let backup_id = backup.common.id.clone();
    store.seed(backup);

    let restoration = InstallationDbRestoration {
        common: CommonFields::new(
            InstallationDbRestorationId::generate(),
            datetime!(2024-01-01 0:00 UTC),
        ),
        state: InstallationDbRestorationState::InProgress,
        installation_id,
        backup_id: backup_id.clone(),
    };
    store.seed(restoration);

    let result = coordinator.delete_backup(&backup_id).await;
    let err = result.expect_err("deleting an in-use backup must fail");
    assert_eq!(*err.current_context(), CoreError::BadRequest);

    let unchanged = store
        .get(&backup_id)
        .await
        .expect("get should succeed")
        .expect("backup should still exist");
    assert_eq!(unchanged.state, InstallationBackupState::BackupSucceeded);
}

#[tokio::test]
async fn deleting_a_backup_with_an_active_migration_is_rejected() {
    let (coordinator, store, _emitter) = harness();

    let installation = new_installation();
    let installation_id = installation.common.id.clone();
    store.seed(installation);

    let backup = InstallationBackup {
        common: CommonFields::new(InstallationBackupId::generate(), datetime!(2024-01-01 0:00 UTC)),
        state: InstallationBackupState::BackupSucceeded,
        installation_id: installation_id.clone(),
        cluster_installation_id: "ci-1".to_owned(),
    };
    let backup_id = backup.common.id.clone();
    store.seed(backup);

    let migration = InstallationDbMigration {
        common: CommonFields::new(
            InstallationDbMigrationId::generate(),
            datetime!(2024-01-01 0:00 UTC),
        ),
        state: InstallationDbMigrationState::InProgress,
        installation_id,
        source_database_id: None,
        destination_database_id: MultitenantDatabaseId::generate(),
        source_backup_id: Some(backup_id.clone()),
    };
    store.seed(migration);

    let result = coordinator.delete_backup(&backup_id).await;
    let err = result.expect_err("deleting a backup in use by an active migration must fail");
    assert_eq!(*err.current_context(), CoreError::BadRequest);

    let unchanged = store
        .get(&backup_id)
        .await
        .expect("get should succeed")
        .expect("backup should still exist");
    assert_eq!(unchanged.state, InstallationBackupState::BackupSucceeded);
}

#[tokio::test]
async fn db_migration_happy_path_through_commit() {
    let (coordinator, store, _emitter) = harness();

    let mut installation = new_installation();
    installation.state = InstallationState::Stable;
    let installation_id = installation.common.id.clone();
    store.seed(installation);

    let destination = MultitenantDatabaseId::generate();
    let (_installation, migration) = coordinator
        .trigger_db_migration(&installation_id, |installation| InstallationDbMigration {
            common: CommonFields::new(
                nimbus_types::InstallationDbMigrationId::generate(),
                datetime!(2024-01-01 0:00 UTC),
            ),
            state: nimbus_types::InstallationDbMigrationState::Requested,
            installation_id: installation.common.id.clone(),
            source_database_id: None,
            destination_database_id: destination.clone(),
            source_backup_id: None,
        })
        .await
        .expect("triggering a migration on a Stable installation should succeed");

    let migration_id = migration.common.id.clone();
    let in_progress = store
        .get(&installation_id)
        .await
        .expect("get should succeed")
        .expect("installation should still exist");
    assert_eq!(in_progress.state, InstallationState::DbMigrationInProgress);

    // Supervisor drives the migration through to Succeeded out-of-band.
    coordinator
        .retry_transition(
            &migration_id,
            nimbus_types::InstallationDbMigrationState::InProgress,
            RequestId::generate(),
        )
        .await
        .expect("migration should advance to InProgress");
    coordinator
        .retry_transition(
            &migration_id,
            nimbus_types::InstallationDbMigrationState::Succeeded,
            RequestId::generate(),
        )
        .await
        .expect("migration should advance to Succeeded");

    let committed = coordinator
        .commit_migration(&migration_id)
        .await
        .expect("commit should succeed once Succeeded");
    assert_eq!(committed.state, nimbus_types::InstallationDbMigrationState::Committed);
}

#[tokio::test]
async fn rollback_requires_hibernation_first() {
    let (coordinator, store, _emitter) = harness();

    let mut installation = new_installation();
    installation.state = InstallationState::Stable;
    let installation_id = installation.common.id.clone();
    store.seed(installation);

    let migration = InstallationDbMigration {
        common: CommonFields::new(
            InstallationDbMigrationId::generate(),
            datetime!(2024-01-01 0:00 UTC),
        ),
        state: nimbus_types::InstallationDbMigrationState::Succeeded,
        installation_id: installation_id.clone(),
        source_database_id: None,
        destination_database_id: MultitenantDatabaseId::generate(),
        source_backup_id: None,
    };
    let migration_id = migration.common.id.clone();
    store.seed(migration);

    let rejected = coordinator
        .rollback_migration(&installation_id, &migration_id)
        .await;
    let err = rejected.expect_err("rollback while Stable must fail");
    assert_eq!(*err.current_context(), CoreError::BadRequest);

    coordinator
        .transition_to(
            &installation_id,
            InstallationState::HibernationRequested,
            RequestId::generate(),
            |_| true,
        )
        .await
        .expect("installation should move to HibernationRequested");
    coordinator
        .transition_to(
            &installation_id,
            InstallationState::Hibernating,
            RequestId::generate(),
            |_| true,
        )
        .await
        .expect("installation should move to Hibernating");

    let rolled_back = coordinator
        .rollback_migration(&installation_id, &migration_id)
        .await
        .expect("rollback while Hibernating should succeed");
    assert_eq!(
        rolled_back.state,
        nimbus_types::InstallationDbMigrationState::RollbackRequested
    );
}
