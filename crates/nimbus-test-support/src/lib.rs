//! In-memory stand-ins for the store and event emitter contracts declared
//! by `nimbus-store`. Used only by this workspace's own test suites; never
//! compiled into a production binary.

mod table;

use async_trait::async_trait;
use nimbus_store::{
    BackupUsageQuery, EntityStore, EventEmitter, GroupMembershipQuery,
    InstallationBackupActivityQuery, InstallationDbMigrationQuery,
};
use nimbus_types::{
    entities::{
        Cluster, ClusterInstallationMigration, Group, Installation, InstallationBackup,
        InstallationDbMigration, InstallationDbRestoration, MultitenantDatabase,
    },
    state::EntityState,
    CoreResult, GroupId, InstallationBackupId, InstallationId, Lockable, RequestId,
    StateChangeEvent,
};
use table::Table;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// Holds one [`Table`] per managed entity kind. Cheap to construct; meant
/// to be wrapped in an `Arc` and shared the same way a real pooled
/// connection handle would be.
#[derive(Default)]
pub struct InMemoryStore {
    clusters: Table<Cluster>,
    installations: Table<Installation>,
    groups: Table<Group>,
    multitenant_databases: Table<MultitenantDatabase>,
    installation_backups: Table<InstallationBackup>,
    installation_db_restorations: Table<InstallationDbRestoration>,
    installation_db_migrations: Table<InstallationDbMigration>,
    cluster_installation_migrations: Table<ClusterInstallationMigration>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity directly, bypassing `create`'s semantics. Test
    /// fixtures use this to set up a starting state rather than driving the
    /// coordinator through every preceding transition.
    pub fn seed<E: SeedInto>(&self, entity: E) {
        entity.seed_into(self);
    }
}

/// Dispatches [`InMemoryStore::seed`] to the right backing table. One impl
/// per entity kind, analogous to the per-kind `EntityStore` impls below.
pub trait SeedInto: Lockable {
    fn seed_into(self, store: &InMemoryStore);
}

macro_rules! impl_entity_store {
    ($entity:ty, $field:ident) => {
        #[async_trait]
        impl EntityStore<$entity> for InMemoryStore {
            async fn get(&self, id: &<$entity as Lockable>::Id) -> CoreResult<Option<$entity>> {
                self.$field.get(id).await
            }

            async fn create(&self, entity: $entity) -> CoreResult<()> {
                self.$field.create(entity).await
            }

            async fn update(&self, entity: &$entity) -> CoreResult<()> {
                self.$field.update(entity).await
            }

            async fn update_state(&self, entity: &$entity) -> CoreResult<()> {
                self.$field.update(entity).await
            }

            async fn lock(
                &self,
                id: &<$entity as Lockable>::Id,
                owner: &RequestId,
                now: OffsetDateTime,
            ) -> CoreResult<$entity> {
                self.$field.lock(id, owner, now).await
            }

            async fn unlock(
                &self,
                id: &<$entity as Lockable>::Id,
                owner: Option<&RequestId>,
                force: bool,
            ) -> CoreResult<()> {
                self.$field.unlock(id, owner, force).await
            }
        }

        impl SeedInto for $entity {
            fn seed_into(self, store: &InMemoryStore) {
                store.$field.seed(self);
            }
        }
    };
}

impl_entity_store!(Cluster, clusters);
impl_entity_store!(Installation, installations);
impl_entity_store!(Group, groups);
impl_entity_store!(MultitenantDatabase, multitenant_databases);
impl_entity_store!(InstallationBackup, installation_backups);
impl_entity_store!(InstallationDbRestoration, installation_db_restorations);
impl_entity_store!(InstallationDbMigration, installation_db_migrations);
impl_entity_store!(
    ClusterInstallationMigration,
    cluster_installation_migrations
);

#[async_trait]
impl GroupMembershipQuery for InMemoryStore {
    async fn has_non_deleted_installations(&self, group_id: &GroupId) -> CoreResult<bool> {
        Ok(self
            .installations
            .scan(|installation| !installation.is_deleted() && installation.group_id.as_ref() == Some(group_id))
            .await)
    }
}

#[async_trait]
impl BackupUsageQuery for InMemoryStore {
    async fn is_backup_in_use(&self, backup_id: &InstallationBackupId) -> CoreResult<bool> {
        let referenced_by_restoration = self
            .installation_db_restorations
            .scan(|restoration| {
                !restoration.state().is_terminal() && &restoration.backup_id == backup_id
            })
            .await;
        if referenced_by_restoration {
            return Ok(true);
        }

        let referenced_by_migration = self
            .installation_db_migrations
            .scan(|migration| {
                !migration.state().is_terminal() && migration.source_backup_id.as_ref() == Some(backup_id)
            })
            .await;
        Ok(referenced_by_migration)
    }
}

#[async_trait]
impl InstallationDbMigrationQuery for InMemoryStore {
    async fn has_blocking_migration(&self, installation_id: &InstallationId) -> CoreResult<bool> {
        Ok(self
            .installation_db_migrations
            .scan(|migration| {
                migration.installation_id == *installation_id
                    && (!migration.state().is_terminal()
                        || migration.state == nimbus_types::InstallationDbMigrationState::Succeeded)
            })
            .await)
    }
}

#[async_trait]
impl InstallationBackupActivityQuery for InMemoryStore {
    async fn has_in_progress_backup(&self, installation_id: &InstallationId) -> CoreResult<bool> {
        Ok(self
            .installation_backups
            .scan(|backup| {
                backup.installation_id == *installation_id && !backup.state().is_terminal()
            })
            .await)
    }
}

/// Records every emitted event in arrival order, for tests to assert
/// against: a minimal fake that satisfies the trait and exposes its
/// captures.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<StateChangeEvent>>,
}

impl RecordingEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<StateChangeEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventEmitter for RecordingEmitter {
    async fn emit(&self, event: StateChangeEvent) -> CoreResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
