//! Cross-entity interlock rules: multi-entity operations that must acquire
//! more than one lock, always in the global order (`Installation` before
//! `Group` before `Cluster` before `InstallationBackup` before
//! `InstallationDBMigration` before `InstallationDBRestoration` before
//! `MultitenantDatabase`).

use error_stack::{Report, ResultExt};
use nimbus_store::{
    BackupUsageQuery, EntityStore, GroupMembershipQuery, InstallationBackupActivityQuery,
    InstallationDbMigrationQuery,
};
use nimbus_types::{
    entities::{Group, Installation, InstallationDbMigration},
    CoreError, CoreResult, GroupId, InstallationDbMigrationId, InstallationId, InstallationState,
    Lockable, RequestId, Stateful,
};

use crate::transition::Coordinator;

impl<S: Send + Sync + 'static> Coordinator<S>
where
    S: EntityStore<Group> + EntityStore<Installation>,
{
    /// Creates an installation already bound to a group: acquire the group
    /// lock, verify it is not deleted, then create the installation with
    /// `group_id` populated.
    pub async fn create_installation_in_group(
        &self,
        group_id: &GroupId,
        build: impl FnOnce(&Group) -> Installation,
    ) -> CoreResult<Installation> {
        let (group, guard) = self
            .lock_manager()
            .acquire::<Group>(group_id, RequestId::generate())
            .await?;

        if group.is_deleted() {
            guard
                .release()
                .await
                .attach_printable("releasing group lock after deleted-group rejection")?;
            return Err(Report::new(CoreError::BadRequest)
                .attach_printable(format!("group {group_id} is deleted")));
        }

        let installation = build(&group);
        let created = self.create(installation).await;

        guard
            .release()
            .await
            .attach_printable("releasing group lock after installation creation")?;

        created
    }

    /// Joins (or reassigns) an installation to a group. Locks are acquired
    /// installation-then-group per the global order, and released in
    /// reverse.
    pub async fn join_group(
        &self,
        installation_id: &InstallationId,
        group_id: &GroupId,
        owner: RequestId,
    ) -> CoreResult<Installation> {
        let (mut installation, installation_guard) = self
            .lock_manager()
            .acquire::<Installation>(installation_id, owner)
            .await?;
        let (group, group_guard) = self
            .lock_manager()
            .acquire::<Group>(group_id, RequestId::generate())
            .await
            .attach_printable("acquiring group lock while joining installation to group")?;

        if group.is_deleted() {
            group_guard
                .release()
                .await
                .attach_printable("releasing group lock after deleted-group rejection")?;
            installation_guard
                .release()
                .await
                .attach_printable("releasing installation lock after deleted-group rejection")?;
            return Err(Report::new(CoreError::BadRequest)
                .attach_printable(format!("group {group_id} is deleted")));
        }

        if installation.group_id.as_ref() != Some(group_id) {
            installation.group_id = Some(group_id.clone());
            installation.group_sequence = Some(group.sequence);
            if let Err(report) = self.store().update(&installation).await {
                group_guard
                    .release()
                    .await
                    .attach_printable("releasing group lock after a failed persist")?;
                installation_guard
                    .release()
                    .await
                    .attach_printable("releasing installation lock after a failed persist")?;
                return Err(report
                    .change_context(CoreError::Internal)
                    .attach_printable("persisting installation group assignment"));
            }
        }

        group_guard
            .release()
            .await
            .attach_printable("releasing group lock after join")?;
        installation_guard
            .release()
            .await
            .attach_printable("releasing installation lock after join")?;
        self.nudge();

        Ok(installation)
    }

    /// Leaves the current group while retaining a caller-merged
    /// configuration view (the installation keeps whatever fields
    /// `merge` copies onto it, then has its group reference cleared).
    pub async fn leave_group_retain_config(
        &self,
        installation_id: &InstallationId,
        merge: impl FnOnce(&Installation) -> Installation,
        owner: RequestId,
    ) -> CoreResult<Installation> {
        let (installation, guard) = self
            .lock_manager()
            .acquire::<Installation>(installation_id, owner)
            .await?;

        let mut merged = merge(&installation);
        merged.group_id = None;
        merged.group_sequence = None;

        if let Err(report) = self.store().update(&merged).await {
            guard
                .release()
                .await
                .attach_printable("releasing installation lock after a failed persist")?;
            return Err(report
                .change_context(CoreError::Internal)
                .attach_printable("persisting installation after leaving group"));
        }

        guard
            .release()
            .await
            .attach_printable("releasing installation lock after leaving group")?;
        self.nudge();

        Ok(merged)
    }
}

impl<S: Send + Sync + 'static> Coordinator<S>
where
    S: EntityStore<Group> + GroupMembershipQuery,
{
    /// Deletes a group, refusing while any non-deleted installation still
    /// references it. Repeat deletions on an already-deleted group are
    /// idempotent successes.
    pub async fn delete_group(&self, group_id: &GroupId) -> CoreResult<Group> {
        let (group, guard) = self
            .lock_manager()
            .acquire::<Group>(group_id, RequestId::generate())
            .await?;

        if group.is_deleted() {
            guard
                .release()
                .await
                .attach_printable("releasing group lock on idempotent re-delete")?;
            return Ok(group);
        }

        if self.store().has_non_deleted_installations(group_id).await? {
            guard
                .release()
                .await
                .attach_printable("releasing group lock after dependency rejection")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "group {group_id} still has non-deleted installations referencing it"
            )));
        }

        let current = group.state();
        self.commit(group, guard, current, nimbus_types::GroupState::Deleted)
            .await
    }
}

impl<S: Send + Sync + 'static> Coordinator<S>
where
    S: EntityStore<Installation> + InstallationBackupActivityQuery,
{
    /// Deletes an installation: primary target `DeletionPendingRequested`,
    /// falling back to `DeletionRequested` when the former is not a valid
    /// transition from the current state. Refuses if deletion is
    /// administratively locked, or if a backup is actively being taken.
    pub async fn delete_installation(&self, installation_id: &InstallationId) -> CoreResult<Installation> {
        let owner = RequestId::generate();
        let (installation, guard) = self
            .lock_manager()
            .acquire::<Installation>(installation_id, owner)
            .await?;

        if installation.deletion_locked {
            guard
                .release()
                .await
                .attach_printable("releasing installation lock after deletion-locked rejection")?;
            return Err(Report::new(CoreError::Forbidden)
                .attach_printable(format!("installation {installation_id} is deletion-locked")));
        }

        if self
            .store()
            .has_in_progress_backup(installation_id)
            .await?
        {
            guard
                .release()
                .await
                .attach_printable("releasing installation lock after in-progress-backup rejection")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "installation {installation_id} has a backup in progress"
            )));
        }

        use nimbus_statemachine::{EntityTransitions, TransitionRules};
        let current = installation.state();
        let primary = InstallationState::DeletionPendingRequested;
        let fallback = InstallationState::DeletionRequested;
        let target = if <Installation as EntityTransitions>::Machine::valid_transition(current, primary) {
            primary
        } else if <Installation as EntityTransitions>::Machine::valid_transition(current, fallback) {
            fallback
        } else {
            guard
                .release()
                .await
                .attach_printable("releasing installation lock: no valid deletion transition")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "installation {installation_id} has no valid deletion transition from {current}"
            )));
        };

        self.commit(installation, guard, current, target).await
    }
}

impl<S: Send + Sync + 'static> Coordinator<S>
where
    S: EntityStore<Installation> + EntityStore<InstallationDbMigration> + InstallationDbMigrationQuery,
{
    /// Triggers a DB migration: verifies there is no blocking prior
    /// migration for this installation, then persists the migration row
    /// and transitions the installation to `DbMigrationInProgress` in the
    /// same locked section.
    pub async fn trigger_db_migration(
        &self,
        installation_id: &InstallationId,
        build_migration: impl FnOnce(&Installation) -> InstallationDbMigration,
    ) -> CoreResult<(Installation, InstallationDbMigration)> {
        let (installation, guard) = self
            .lock_manager()
            .acquire::<Installation>(installation_id, RequestId::generate())
            .await?;

        if self
            .store()
            .has_blocking_migration(installation_id)
            .await?
        {
            guard
                .release()
                .await
                .attach_printable("releasing installation lock after blocking-migration rejection")?;
            return Err(Report::new(CoreError::Conflict).attach_printable(format!(
                "installation {installation_id} already has a blocking migration in flight"
            )));
        }

        let migration = build_migration(&installation);
        if let Err(report) = self.store().create(migration.clone()).await {
            guard
                .release()
                .await
                .attach_printable("releasing installation lock after a failed migration insert")?;
            return Err(report
                .change_context(CoreError::Internal)
                .attach_printable("persisting new installation DB migration row"));
        }

        let current = installation.state();
        let updated = self
            .commit(installation, guard, current, InstallationState::DbMigrationInProgress)
            .await?;

        Ok((updated, migration))
    }

    /// Commits a migration that has reached `Succeeded`. Only the
    /// migration lock is held; the installation's state is not touched.
    pub async fn commit_migration(
        &self,
        migration_id: &InstallationDbMigrationId,
    ) -> CoreResult<InstallationDbMigration> {
        use nimbus_types::InstallationDbMigrationState;

        let (migration, guard) = self
            .lock_manager()
            .acquire::<InstallationDbMigration>(migration_id, RequestId::generate())
            .await?;

        if migration.state() != InstallationDbMigrationState::Succeeded {
            guard
                .release()
                .await
                .attach_printable("releasing migration lock: commit requires Succeeded")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "migration {migration_id} is not in Succeeded; cannot commit"
            )));
        }

        let current = migration.state();
        self.commit(migration, guard, current, InstallationDbMigrationState::Committed)
            .await
    }

    /// Rolls back a migration that has reached `Succeeded`, requiring the
    /// installation to be `Hibernating` first. Per the global lock order,
    /// the installation lock (kind 1) is acquired before the migration
    /// lock (kind 5), even though the migration is the operation's
    /// primary subject.
    pub async fn rollback_migration(
        &self,
        installation_id: &InstallationId,
        migration_id: &InstallationDbMigrationId,
    ) -> CoreResult<InstallationDbMigration> {
        use nimbus_types::InstallationDbMigrationState;

        let (installation, installation_guard) = self
            .lock_manager()
            .acquire::<Installation>(installation_id, RequestId::generate())
            .await?;

        if installation.state() != InstallationState::Hibernating {
            installation_guard
                .release()
                .await
                .attach_printable("releasing installation lock: rollback requires Hibernating")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "installation {installation_id} must be Hibernating to roll back a migration"
            )));
        }

        let (migration, migration_guard) = self
            .lock_manager()
            .acquire::<InstallationDbMigration>(migration_id, RequestId::generate())
            .await
            .attach_printable("acquiring migration lock for rollback")?;

        if migration.state() != InstallationDbMigrationState::Succeeded {
            migration_guard
                .release()
                .await
                .attach_printable("releasing migration lock: rollback requires Succeeded")?;
            installation_guard
                .release()
                .await
                .attach_printable("releasing installation lock after rollback rejection")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "migration {migration_id} is not in Succeeded; cannot roll back"
            )));
        }

        let current = migration.state();
        let rolled_back = self
            .commit(
                migration,
                migration_guard,
                current,
                InstallationDbMigrationState::RollbackRequested,
            )
            .await?;

        installation_guard
            .release()
            .await
            .attach_printable("releasing installation lock after rollback request")?;

        Ok(rolled_back)
    }
}

impl<S: Send + Sync + 'static> Coordinator<S>
where
    S: EntityStore<nimbus_types::entities::InstallationBackup> + BackupUsageQuery,
{
    /// Deletes a backup, refusing while a non-terminal restoration or
    /// migration references it.
    pub async fn delete_backup(
        &self,
        backup_id: &nimbus_types::InstallationBackupId,
    ) -> CoreResult<nimbus_types::entities::InstallationBackup> {
        let (backup, guard) = self
            .lock_manager()
            .acquire::<nimbus_types::entities::InstallationBackup>(backup_id, RequestId::generate())
            .await?;

        if self.store().is_backup_in_use(backup_id).await? {
            guard
                .release()
                .await
                .attach_printable("releasing backup lock after in-use rejection")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "backup {backup_id} is referenced by an active restoration or migration"
            )));
        }

        use nimbus_statemachine::{EntityTransitions, TransitionRules};
        let current = backup.state();
        let target = nimbus_types::InstallationBackupState::DeletionRequested;
        if !<nimbus_types::entities::InstallationBackup as EntityTransitions>::Machine::valid_transition(
            current, target,
        ) {
            guard
                .release()
                .await
                .attach_printable("releasing backup lock: no valid deletion transition")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "backup {backup_id} has no valid transition from {current} to {target}"
            )));
        }

        self.commit(backup, guard, current, target).await
    }
}
