//! Per-entity-kind transition tables.
//!
//! Every valid-transition relation is a static `{from -> set<to>}` table,
//! never scattered through control flow, so the coordinator's
//! `TransitionTo` can validate a step with a single lookup and so each
//! table can be exhaustively unit-tested here in isolation.

use nimbus_types::{
    entities::{
        Cluster, ClusterInstallationMigration, Group, Installation, InstallationBackup,
        InstallationDbMigration, InstallationDbRestoration, MultitenantDatabase,
    },
    state::EntityState,
    ClusterInstallationMigrationState, ClusterState, GroupState, InstallationBackupState,
    InstallationDbMigrationState, InstallationDbRestorationState, InstallationState,
    MultitenantDatabaseState, Stateful,
};

/// The valid-transition relation and non-terminal-state set for one entity
/// kind's state enum. Implemented by a zero-sized marker type generated by
/// [`transition_table!`], never by hand.
pub trait TransitionRules {
    type State: EntityState;

    #[must_use]
    fn valid_transition(from: Self::State, to: Self::State) -> bool;

    #[must_use]
    fn non_terminal_states() -> Vec<Self::State>;
}

/// Associates a [`Stateful`] entity type with the [`TransitionRules`]
/// implementation that governs it, so generic code (the Transition
/// Coordinator) can write `E::Machine::valid_transition(...)` once for all
/// eight entity kinds instead of matching on `EntityKind`.
pub trait EntityTransitions: Stateful {
    type Machine: TransitionRules<State = Self::State>;
}

/// Declares a transition-table marker type. States not named as a `from`
/// key simply have no valid outgoing transition (they fall through to the
/// default `false` arm) — that includes every terminal state, which need
/// not be repeated in `transitions`.
macro_rules! transition_table {
    (
        $(#[$meta:meta])*
        $machine:ident : $state:ty,
        all = [$($all:ident),+ $(,)?],
        transitions = { $($from:ident => [$($to:ident),+ $(,)?]),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $machine;

        impl $machine {
            const ALL_STATES: &'static [$state] = &[$(<$state>::$all),+];
        }

        impl TransitionRules for $machine {
            type State = $state;

            fn valid_transition(from: $state, to: $state) -> bool {
                match from {
                    $(<$state>::$from => matches!(to, $(<$state>::$to)|+),)*
                    #[allow(unreachable_patterns)]
                    _ => false,
                }
            }

            fn non_terminal_states() -> Vec<$state> {
                Self::ALL_STATES
                    .iter()
                    .copied()
                    .filter(|state| !state.is_terminal())
                    .collect()
            }
        }
    };
}

transition_table!(
    /// Cluster lifecycle transitions.
    ClusterMachine: ClusterState,
    all = [
        CreationRequested, Provisioning, Provisioned, UpgradeRequested, Upgrading, Stable,
        ResizeRequested, Resizing, DeletionRequested, Deleting, Deleted, CreationFailed,
        ProvisioningFailed, UpgradeFailed, ResizeFailed, DeletionFailed,
    ],
    transitions = {
        CreationRequested => [Provisioning, CreationFailed],
        CreationFailed => [CreationRequested, DeletionRequested],
        Provisioning => [Provisioned, ProvisioningFailed],
        ProvisioningFailed => [Provisioning, DeletionRequested],
        Provisioned => [Stable],
        Stable => [UpgradeRequested, ResizeRequested, DeletionRequested],
        UpgradeRequested => [Upgrading, UpgradeFailed],
        Upgrading => [Stable, UpgradeFailed],
        UpgradeFailed => [UpgradeRequested, DeletionRequested],
        ResizeRequested => [Resizing, ResizeFailed],
        Resizing => [Stable, ResizeFailed],
        ResizeFailed => [ResizeRequested, DeletionRequested],
        DeletionRequested => [Deleting],
        Deleting => [Deleted, DeletionFailed],
        DeletionFailed => [DeletionRequested],
    }
);

transition_table!(
    /// Installation lifecycle transitions.
    InstallationMachine: InstallationState,
    all = [
        CreationRequested, CreationDns, CreationInProgress, Stable, UpdateRequested,
        UpdateInProgress, HibernationRequested, Hibernating, WakeUpRequested,
        DeletionPendingRequested, DeletionPending, DeletionCancellationRequested,
        DeletionRequested, Deleting, Deleted, DbMigrationInProgress, DbRestorationInProgress,
        CreationFailed, CreationDnsFailed, CreationNoCompatibleClusters, UpdateFailed,
        HibernationFailed, WakeUpFailed, DeletionFailed, DeletionFinalCleanup,
    ],
    transitions = {
        CreationRequested => [CreationDns, CreationFailed, CreationNoCompatibleClusters],
        CreationDns => [CreationInProgress, CreationDnsFailed],
        CreationInProgress => [Stable, CreationFailed],
        CreationFailed => [CreationRequested, DeletionRequested],
        CreationDnsFailed => [CreationDns, DeletionRequested],
        CreationNoCompatibleClusters => [CreationRequested, DeletionRequested],
        Stable => [
            UpdateRequested, HibernationRequested, DeletionPendingRequested, DeletionRequested,
            DbMigrationInProgress, DbRestorationInProgress,
        ],
        UpdateRequested => [UpdateInProgress, UpdateFailed],
        UpdateInProgress => [Stable, UpdateFailed],
        UpdateFailed => [UpdateRequested, DeletionRequested],
        HibernationRequested => [Hibernating, HibernationFailed],
        HibernationFailed => [HibernationRequested, DeletionRequested],
        Hibernating => [
            WakeUpRequested, UpdateRequested, DbMigrationInProgress, DbRestorationInProgress,
            DeletionPendingRequested, DeletionRequested,
        ],
        WakeUpRequested => [Stable, WakeUpFailed],
        WakeUpFailed => [WakeUpRequested, DeletionRequested],
        DeletionPendingRequested => [DeletionPending],
        DeletionPending => [DeletionCancellationRequested, DeletionRequested],
        DeletionCancellationRequested => [Stable],
        DeletionRequested => [Deleting],
        Deleting => [Deleted, DeletionFailed],
        DeletionFailed => [DeletionRequested, DeletionFinalCleanup],
        DeletionFinalCleanup => [Deleted],
        DbMigrationInProgress => [Stable],
        DbRestorationInProgress => [Stable],
    }
);

transition_table!(
    /// Group has no runtime lifecycle beyond soft-delete; the only valid
    /// transition is `Active -> Deleted`.
    GroupMachine: GroupState,
    all = [Active, Deleted],
    transitions = {
        Active => [Deleted],
    }
);

transition_table!(
    /// MultitenantDatabase is configuration-only; same soft-delete-only
    /// shape as [`GroupMachine`].
    MultitenantDatabaseMachine: MultitenantDatabaseState,
    all = [Active, Deleted],
    transitions = {
        Active => [Deleted],
    }
);

transition_table!(
    /// InstallationBackup lifecycle transitions. `DeletionRequested` is
    /// reachable from `{BackupSucceeded, BackupFailed}`; whether it may
    /// actually be taken while the backup is still referenced elsewhere is
    /// enforced by the coordinator/interlock layer, not by this table.
    InstallationBackupMachine: InstallationBackupState,
    all = [
        BackupRequested, BackupInProgress, BackupSucceeded, BackupFailed, DeletionRequested,
        Deleted,
    ],
    transitions = {
        BackupRequested => [BackupInProgress],
        BackupInProgress => [BackupSucceeded, BackupFailed],
        BackupSucceeded => [DeletionRequested],
        BackupFailed => [DeletionRequested],
        DeletionRequested => [Deleted],
    }
);

transition_table!(
    /// InstallationDBRestoration: linear `Requested -> InProgress ->
    /// {Succeeded, Failed}`.
    InstallationDbRestorationMachine: InstallationDbRestorationState,
    all = [Requested, InProgress, Succeeded, Failed],
    transitions = {
        Requested => [InProgress],
        InProgress => [Succeeded, Failed],
    }
);

transition_table!(
    /// InstallationDBMigration: `Requested -> InProgress -> Succeeded`,
    /// then either `Committed` or `RollbackRequested -> RollingBack ->
    /// RolledBack`; failure during `InProgress` goes to `Failed`.
    InstallationDbMigrationMachine: InstallationDbMigrationState,
    all = [
        Requested, InProgress, Succeeded, RollbackRequested, RollingBack, RolledBack, Committed,
        Failed,
    ],
    transitions = {
        Requested => [InProgress],
        InProgress => [Succeeded, Failed],
        Succeeded => [Committed, RollbackRequested],
        RollbackRequested => [RollingBack],
        RollingBack => [RolledBack],
    }
);

transition_table!(
    /// ClusterInstallationMigration: linear `CreationRequested ->
    /// InProgress -> {Succeeded, Failed}`.
    ClusterInstallationMigrationMachine: ClusterInstallationMigrationState,
    all = [CreationRequested, InProgress, Succeeded, Failed],
    transitions = {
        CreationRequested => [InProgress],
        InProgress => [Succeeded, Failed],
    }
);

impl EntityTransitions for Cluster {
    type Machine = ClusterMachine;
}

impl EntityTransitions for Installation {
    type Machine = InstallationMachine;
}

impl EntityTransitions for Group {
    type Machine = GroupMachine;
}

impl EntityTransitions for MultitenantDatabase {
    type Machine = MultitenantDatabaseMachine;
}

impl EntityTransitions for InstallationBackup {
    type Machine = InstallationBackupMachine;
}

impl EntityTransitions for InstallationDbRestoration {
    type Machine = InstallationDbRestorationMachine;
}

impl EntityTransitions for InstallationDbMigration {
    type Machine = InstallationDbMigrationMachine;
}

impl EntityTransitions for ClusterInstallationMigration {
    type Machine = ClusterInstallationMigrationMachine;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn installation_stable_allows_the_spec_named_targets_and_nothing_else() {
        assert!(InstallationMachine::valid_transition(
            InstallationState::Stable,
            InstallationState::UpdateRequested
        ));
        assert!(InstallationMachine::valid_transition(
            InstallationState::Stable,
            InstallationState::HibernationRequested
        ));
        assert!(InstallationMachine::valid_transition(
            InstallationState::Stable,
            InstallationState::DbMigrationInProgress
        ));
        assert!(!InstallationMachine::valid_transition(
            InstallationState::Stable,
            InstallationState::Deleted
        ));
    }

    #[test]
    fn installation_failed_states_retry_same_phase_or_go_straight_to_deletion() {
        assert!(InstallationMachine::valid_transition(
            InstallationState::CreationFailed,
            InstallationState::CreationRequested
        ));
        assert!(InstallationMachine::valid_transition(
            InstallationState::CreationFailed,
            InstallationState::DeletionRequested
        ));
        assert!(InstallationMachine::valid_transition(
            InstallationState::HibernationFailed,
            InstallationState::HibernationRequested
        ));
        assert!(InstallationMachine::valid_transition(
            InstallationState::HibernationFailed,
            InstallationState::DeletionRequested
        ));
    }

    #[test]
    fn installation_deletion_pending_offers_cancellation_and_escalation() {
        assert!(InstallationMachine::valid_transition(
            InstallationState::DeletionPending,
            InstallationState::DeletionCancellationRequested
        ));
        assert!(InstallationMachine::valid_transition(
            InstallationState::DeletionPending,
            InstallationState::DeletionRequested
        ));
    }

    #[test]
    fn terminal_states_accept_no_outgoing_transition() {
        assert!(!InstallationMachine::valid_transition(
            InstallationState::Deleted,
            InstallationState::CreationRequested
        ));
        assert!(!ClusterMachine::valid_transition(
            ClusterState::Deleted,
            ClusterState::CreationRequested
        ));
        assert!(!InstallationDbMigrationMachine::valid_transition(
            InstallationDbMigrationState::Committed,
            InstallationDbMigrationState::RollbackRequested
        ));
    }

    #[test]
    fn backup_deletion_requested_is_reachable_only_from_terminal_outcomes() {
        assert!(InstallationBackupMachine::valid_transition(
            InstallationBackupState::BackupSucceeded,
            InstallationBackupState::DeletionRequested
        ));
        assert!(InstallationBackupMachine::valid_transition(
            InstallationBackupState::BackupFailed,
            InstallationBackupState::DeletionRequested
        ));
        assert!(!InstallationBackupMachine::valid_transition(
            InstallationBackupState::BackupRequested,
            InstallationBackupState::DeletionRequested
        ));
    }

    #[test]
    fn db_migration_commit_and_rollback_paths() {
        assert!(InstallationDbMigrationMachine::valid_transition(
            InstallationDbMigrationState::Succeeded,
            InstallationDbMigrationState::Committed
        ));
        assert!(InstallationDbMigrationMachine::valid_transition(
            InstallationDbMigrationState::Succeeded,
            InstallationDbMigrationState::RollbackRequested
        ));
        assert!(!InstallationDbMigrationMachine::valid_transition(
            InstallationDbMigrationState::Requested,
            InstallationDbMigrationState::Committed
        ));
    }

    #[test]
    fn db_restoration_is_linear() {
        assert!(InstallationDbRestorationMachine::valid_transition(
            InstallationDbRestorationState::Requested,
            InstallationDbRestorationState::InProgress
        ));
        assert!(InstallationDbRestorationMachine::valid_transition(
            InstallationDbRestorationState::InProgress,
            InstallationDbRestorationState::Succeeded
        ));
        assert!(!InstallationDbRestorationMachine::valid_transition(
            InstallationDbRestorationState::Requested,
            InstallationDbRestorationState::Succeeded
        ));
    }

    #[test]
    fn non_terminal_states_exclude_deleted_and_include_stable() {
        let non_terminal = ClusterMachine::non_terminal_states();
        assert!(non_terminal.contains(&ClusterState::Stable));
        assert!(!non_terminal.contains(&ClusterState::Deleted));
    }

    #[test]
    fn group_and_database_only_support_soft_delete() {
        assert!(GroupMachine::valid_transition(
            GroupState::Active,
            GroupState::Deleted
        ));
        assert!(!GroupMachine::valid_transition(
            GroupState::Deleted,
            GroupState::Active
        ));
        assert_eq!(GroupMachine::non_terminal_states(), vec![GroupState::Active]);
        assert_eq!(
            MultitenantDatabaseMachine::non_terminal_states(),
            vec![MultitenantDatabaseState::Active]
        );
    }

    #[test]
    fn no_op_same_state_is_not_a_valid_transition_entry() {
        // TransitionTo treats from == to as a distinct no-op path; the
        // table itself does not special-case it.
        assert!(!InstallationMachine::valid_transition(
            InstallationState::Stable,
            InstallationState::Stable
        ));
    }
}
