//! Data model for the Nimbus control-plane core: entity kinds, per-kind
//! state enumerations, the common entity shape, identifiers, the
//! state-change event envelope, and the shared error taxonomy.
//!
//! This crate has no knowledge of locking, transition validation, or
//! persistence — it is the vocabulary the other core crates build on.

pub mod entities;
pub mod entity;
pub mod error;
pub mod event;
pub mod id;
pub mod kind;
pub mod state;

pub use entity::{CommonFields, Lockable, Stateful};
pub use error::{CoreError, CoreResult};
pub use event::StateChangeEvent;
pub use id::{
    ClusterId, ClusterInstallationMigrationId, GroupId, InstallationBackupId,
    InstallationDbMigrationId, InstallationDbRestorationId, InstallationId,
    MultitenantDatabaseId, RawId, RequestId,
};
pub use kind::EntityKind;
pub use state::{
    ClusterInstallationMigrationState, ClusterState, EntityState, GroupState,
    InstallationBackupState, InstallationDbMigrationState, InstallationDbRestorationState,
    InstallationState, MultitenantDatabaseState,
};
