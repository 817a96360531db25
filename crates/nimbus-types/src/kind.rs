//! Entity kinds and the mandated lock-acquisition order.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The eight entity kinds the control-plane core manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Installation,
    Group,
    Cluster,
    InstallationBackup,
    InstallationDbMigration,
    InstallationDbRestoration,
    MultitenantDatabase,
    ClusterInstallationMigration,
}

impl EntityKind {
    /// Position in the global lock-acquisition order. Lower numbers must
    /// be acquired first; multi-lock callers that need more than one kind
    /// MUST sort by this value before acquiring.
    #[must_use]
    pub const fn lock_order(self) -> u8 {
        match self {
            Self::Installation => 1,
            Self::Group => 2,
            Self::Cluster => 3,
            Self::InstallationBackup => 4,
            Self::InstallationDbMigration => 5,
            Self::InstallationDbRestoration => 6,
            Self::MultitenantDatabase => 7,
            Self::ClusterInstallationMigration => 8,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Installation => "Installation",
            Self::Group => "Group",
            Self::Cluster => "Cluster",
            Self::InstallationBackup => "InstallationBackup",
            Self::InstallationDbMigration => "InstallationDBMigration",
            Self::InstallationDbRestoration => "InstallationDBRestoration",
            Self::MultitenantDatabase => "MultitenantDatabase",
            Self::ClusterInstallationMigration => "ClusterInstallationMigration",
        };
        fmt.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_order_is_total_and_strictly_increasing() {
        assert_eq!(EntityKind::Installation.lock_order(), 1);
        assert_eq!(EntityKind::Group.lock_order(), 2);
        assert_eq!(EntityKind::Cluster.lock_order(), 3);
        assert_eq!(EntityKind::InstallationBackup.lock_order(), 4);
        assert_eq!(EntityKind::InstallationDbMigration.lock_order(), 5);
        assert_eq!(EntityKind::InstallationDbRestoration.lock_order(), 6);
        assert_eq!(EntityKind::MultitenantDatabase.lock_order(), 7);
        assert!(EntityKind::Installation.lock_order() < EntityKind::Group.lock_order());
        assert!(
            EntityKind::InstallationDbMigration.lock_order()
                < EntityKind::InstallationDbRestoration.lock_order()
        );
    }
}
