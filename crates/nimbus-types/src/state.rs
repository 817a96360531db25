//! Per-entity state enumerations.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Shared behaviour every per-entity state enum exposes so generic code in
/// `nimbus-statemachine` and `nimbus-coordinator` can work uniformly across
/// entity kinds.
pub trait EntityState: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// The state newly created entities start in.
    fn initial() -> Self;

    /// Whether the state is terminal: no outgoing transition is ever valid.
    fn is_terminal(self) -> bool;
}

macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident),+ $(,)? }
        initial = $initial:ident,
        terminal = [$($terminal:ident),* $(,)?]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt.write_str(match self {
                    $(Self::$variant => stringify!($variant)),+
                })
            }
        }

        impl EntityState for $name {
            fn initial() -> Self {
                Self::$initial
            }

            fn is_terminal(self) -> bool {
                matches!(self, $(Self::$terminal)|*)
            }
        }
    };
}

state_enum!(
    /// Cluster lifecycle state.
    ClusterState {
        CreationRequested,
        Provisioning,
        Provisioned,
        UpgradeRequested,
        Upgrading,
        Stable,
        ResizeRequested,
        Resizing,
        DeletionRequested,
        Deleting,
        Deleted,
        CreationFailed,
        ProvisioningFailed,
        UpgradeFailed,
        ResizeFailed,
        DeletionFailed,
    }
    initial = CreationRequested,
    terminal = [Deleted]
);

state_enum!(
    /// Installation lifecycle state.
    InstallationState {
        CreationRequested,
        CreationDns,
        CreationInProgress,
        Stable,
        UpdateRequested,
        UpdateInProgress,
        HibernationRequested,
        Hibernating,
        WakeUpRequested,
        DeletionPendingRequested,
        DeletionPending,
        DeletionCancellationRequested,
        DeletionRequested,
        Deleting,
        Deleted,
        DbMigrationInProgress,
        DbRestorationInProgress,
        CreationFailed,
        CreationDnsFailed,
        CreationNoCompatibleClusters,
        UpdateFailed,
        HibernationFailed,
        WakeUpFailed,
        DeletionFailed,
        DeletionFinalCleanup,
    }
    initial = CreationRequested,
    terminal = [Deleted]
);

state_enum!(
    /// Group state: Groups have no lifecycle state machine of their own in
    /// the source system (they are versioned by a monotonic `Sequence`
    /// instead), but soft-delete still needs a terminal marker so the
    /// uniform [`crate::entity::Stateful`] machinery can lock and
    /// transition them like every other kind.
    GroupState { Active, Deleted }
    initial = Active,
    terminal = [Deleted]
);

state_enum!(
    /// MultitenantDatabase is configuration-only in the source system (no
    /// lifecycle state); the same placeholder-terminal approach as
    /// [`GroupState`] is used so it participates in the generic lock
    /// manager without a bespoke code path.
    MultitenantDatabaseState { Active, Deleted }
    initial = Active,
    terminal = [Deleted]
);

state_enum!(
    /// InstallationBackup lifecycle state.
    InstallationBackupState {
        BackupRequested,
        BackupInProgress,
        BackupSucceeded,
        BackupFailed,
        DeletionRequested,
        Deleted,
    }
    initial = BackupRequested,
    terminal = [Deleted]
);

state_enum!(
    /// InstallationDBRestoration lifecycle state.
    InstallationDbRestorationState {
        Requested,
        InProgress,
        Succeeded,
        Failed,
    }
    initial = Requested,
    terminal = [Succeeded, Failed]
);

state_enum!(
    /// InstallationDBMigration lifecycle state.
    InstallationDbMigrationState {
        Requested,
        InProgress,
        Succeeded,
        RollbackRequested,
        RollingBack,
        RolledBack,
        Committed,
        Failed,
    }
    initial = Requested,
    terminal = [Committed, RolledBack, Failed]
);

state_enum!(
    /// ClusterInstallationMigration lifecycle state.
    ClusterInstallationMigrationState {
        CreationRequested,
        InProgress,
        Succeeded,
        Failed,
    }
    initial = CreationRequested,
    terminal = [Succeeded, Failed]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_states_match_spec_table() {
        assert_eq!(ClusterState::initial(), ClusterState::CreationRequested);
        assert_eq!(
            InstallationState::initial(),
            InstallationState::CreationRequested
        );
        assert_eq!(
            InstallationBackupState::initial(),
            InstallationBackupState::BackupRequested
        );
        assert_eq!(
            InstallationDbRestorationState::initial(),
            InstallationDbRestorationState::Requested
        );
        assert_eq!(
            InstallationDbMigrationState::initial(),
            InstallationDbMigrationState::Requested
        );
        assert_eq!(
            ClusterInstallationMigrationState::initial(),
            ClusterInstallationMigrationState::CreationRequested
        );
    }

    #[test]
    fn terminal_states_match_spec_table() {
        assert!(ClusterState::Deleted.is_terminal());
        assert!(!ClusterState::Stable.is_terminal());
        assert!(InstallationState::Deleted.is_terminal());
        assert!(!InstallationState::Hibernating.is_terminal());
        assert!(InstallationDbMigrationState::Committed.is_terminal());
        assert!(InstallationDbMigrationState::RolledBack.is_terminal());
        assert!(InstallationDbMigrationState::Failed.is_terminal());
        assert!(!InstallationDbMigrationState::Succeeded.is_terminal());
        assert!(InstallationDbRestorationState::Succeeded.is_terminal());
        assert!(InstallationDbRestorationState::Failed.is_terminal());
        assert!(ClusterInstallationMigrationState::Succeeded.is_terminal());
        assert!(ClusterInstallationMigrationState::Failed.is_terminal());
    }
}
