//! Concrete entity struct definitions for the eight managed kinds.

use time::OffsetDateTime;

use crate::{
    entity::{impl_lockable, impl_stateful, CommonFields},
    id::{
        ClusterId, ClusterInstallationMigrationId, GroupId, InstallationBackupId,
        InstallationDbMigrationId, InstallationDbRestorationId, InstallationId,
        MultitenantDatabaseId,
    },
    kind::EntityKind,
    state::{
        ClusterInstallationMigrationState, ClusterState, GroupState, InstallationBackupState,
        InstallationDbMigrationState, InstallationDbRestorationState, InstallationState,
        MultitenantDatabaseState,
    },
};

/// A compute environment hosting one or more installations.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub common: CommonFields<ClusterId>,
    pub state: ClusterState,
    pub provider: String,
    pub size: String,
    pub version: String,
}

impl_lockable!(Cluster, id = ClusterId, kind = EntityKind::Cluster);
impl_stateful!(Cluster, state = ClusterState);

/// A tenant workload scheduled onto a cluster.
#[derive(Debug, Clone)]
pub struct Installation {
    pub common: CommonFields<InstallationId>,
    pub state: InstallationState,
    pub owner_id: String,
    pub dns: String,
    /// `None` when the installation is not (currently) bound to a group.
    pub group_id: Option<GroupId>,
    /// Must equal a prior value of the referenced group's `Sequence`, or be
    /// `None` when `group_id` is `None`.
    pub group_sequence: Option<u64>,
    /// Administrative flag: when set, deletion requests are refused with
    /// `Forbidden` regardless of lifecycle state.
    pub deletion_locked: bool,
    /// Set on transition into `DeletionPending`; the supervisor may
    /// escalate to `DeletionRequested` at or after this time.
    pub deletion_pending_expiry: Option<OffsetDateTime>,
}

impl_lockable!(Installation, id = InstallationId, kind = EntityKind::Installation);
impl_stateful!(Installation, state = InstallationState);

/// A configuration bundle (version, image, environment) optionally shared
/// across installations. Groups have no lifecycle state machine of their
/// own; they are versioned by a monotonically increasing `sequence`.
#[derive(Debug, Clone)]
pub struct Group {
    pub common: CommonFields<GroupId>,
    pub state: GroupState,
    pub name: String,
    pub image: String,
    pub sequence: u64,
}

impl_lockable!(Group, id = GroupId, kind = EntityKind::Group);
impl_stateful!(Group, state = GroupState);

/// A shared database server hosting multiple installations' schemas.
/// Configuration-only: no lifecycle state transitions are driven through
/// the Transition Coordinator, but it still participates in the lock
/// manager's ordered multi-lock protocol when a DB migration reads or
/// reserves capacity on it.
#[derive(Debug, Clone)]
pub struct MultitenantDatabase {
    pub common: CommonFields<MultitenantDatabaseId>,
    pub state: MultitenantDatabaseState,
    pub vpc_id: String,
    pub max_installations: u32,
}

impl_lockable!(
    MultitenantDatabase,
    id = MultitenantDatabaseId,
    kind = EntityKind::MultitenantDatabase
);
impl_stateful!(MultitenantDatabase, state = MultitenantDatabaseState);

/// A backup of an installation's database and file store.
#[derive(Debug, Clone)]
pub struct InstallationBackup {
    pub common: CommonFields<InstallationBackupId>,
    pub state: InstallationBackupState,
    pub installation_id: InstallationId,
    pub cluster_installation_id: String,
}

impl_lockable!(
    InstallationBackup,
    id = InstallationBackupId,
    kind = EntityKind::InstallationBackup
);
impl_stateful!(InstallationBackup, state = InstallationBackupState);

/// Restoration of an installation's database from a prior backup.
#[derive(Debug, Clone)]
pub struct InstallationDbRestoration {
    pub common: CommonFields<InstallationDbRestorationId>,
    pub state: InstallationDbRestorationState,
    pub installation_id: InstallationId,
    pub backup_id: InstallationBackupId,
}

impl_lockable!(
    InstallationDbRestoration,
    id = InstallationDbRestorationId,
    kind = EntityKind::InstallationDbRestoration
);
impl_stateful!(InstallationDbRestoration, state = InstallationDbRestorationState);

/// Migration of an installation's database from one `MultitenantDatabase`
/// (or a dedicated database) to another.
#[derive(Debug, Clone)]
pub struct InstallationDbMigration {
    pub common: CommonFields<InstallationDbMigrationId>,
    pub state: InstallationDbMigrationState,
    pub installation_id: InstallationId,
    pub source_database_id: Option<MultitenantDatabaseId>,
    pub destination_database_id: MultitenantDatabaseId,
    /// Set when the migration restores the destination from a backup
    /// rather than copying live from `source_database_id`. While this is
    /// `Some` and the migration is non-terminal, the referenced backup may
    /// not be deleted.
    pub source_backup_id: Option<InstallationBackupId>,
}

impl_lockable!(
    InstallationDbMigration,
    id = InstallationDbMigrationId,
    kind = EntityKind::InstallationDbMigration
);
impl_stateful!(InstallationDbMigration, state = InstallationDbMigrationState);

/// Migration of a deployed installation from one cluster to another.
#[derive(Debug, Clone)]
pub struct ClusterInstallationMigration {
    pub common: CommonFields<ClusterInstallationMigrationId>,
    pub state: ClusterInstallationMigrationState,
    pub installation_id: InstallationId,
    pub source_cluster_id: ClusterId,
    pub destination_cluster_id: ClusterId,
}

impl_lockable!(
    ClusterInstallationMigration,
    id = ClusterInstallationMigrationId,
    kind = EntityKind::ClusterInstallationMigration
);
impl_stateful!(
    ClusterInstallationMigration,
    state = ClusterInstallationMigrationState
);
