//! Contracts the control-plane core depends on but does not implement:
//! the persistent store and the event emitter. Both are external
//! collaborators in the source system; this crate only states their
//! shape so the coordinator, lock manager, and interlock rules can be
//! written against a trait instead of a concrete backend.
//!
//! `nimbus-test-support` provides the only implementation in this
//! workspace, an in-memory stand-in used exclusively by tests.

use async_trait::async_trait;
use nimbus_types::{
    CoreResult, GroupId, InstallationBackupId, InstallationId, Lockable, RequestId,
    StateChangeEvent,
};
use time::OffsetDateTime;

/// Persistence operations common to every entity kind: get, create, a
/// full-row update, a state-only update, and lock/unlock.
///
/// Implementations MUST provide the atomicity the Lock Manager relies on:
/// `lock` sets `lock_owner` only if it is currently unset or already equal
/// to `owner`, as a single atomic operation against the backing store.
#[async_trait]
pub trait EntityStore<E: Lockable>: Send + Sync {
    async fn get(&self, id: &E::Id) -> CoreResult<Option<E>>;

    async fn create(&self, entity: E) -> CoreResult<()>;

    /// Full-row write, used for updates that touch configuration fields in
    /// addition to (or instead of) `state`.
    async fn update(&self, entity: &E) -> CoreResult<()>;

    /// State-only write for the coordinator's hot path, so implementations
    /// may skip re-serializing unrelated columns.
    async fn update_state(&self, entity: &E) -> CoreResult<()>;

    /// Atomically sets `lock_owner = owner` iff it is currently `None` or
    /// already `owner`, and returns the entity as it stood after that
    /// write. Returns `Err(CoreError::NotFound)` if no row exists and
    /// `Err(CoreError::Conflict)` if the row is locked by a different
    /// owner.
    async fn lock(&self, id: &E::Id, owner: &RequestId, now: OffsetDateTime) -> CoreResult<E>;

    /// Idempotent: clears `lock_owner` only if it currently equals `owner`.
    /// When `force` is set, `owner` is ignored and the clear is
    /// unconditional (administrative force-unlock) — callers pass `None`
    /// in that case.
    async fn unlock(&self, id: &E::Id, owner: Option<&RequestId>, force: bool) -> CoreResult<()>;
}

/// Best-effort event sink. Emitter failures are logged by the caller,
/// never escalated into the outcome of a successful transition.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: StateChangeEvent) -> CoreResult<()>;
}

/// Group-membership dependency check used by the delete-group interlock:
/// a group may not be deleted while a non-deleted installation still
/// references it.
#[async_trait]
pub trait GroupMembershipQuery: Send + Sync {
    async fn has_non_deleted_installations(&self, group_id: &GroupId) -> CoreResult<bool>;
}

/// Backup-usage dependency check: a backup may not transition to
/// `DeletionRequested` while a non-terminal restoration or migration
/// references it.
#[async_trait]
pub trait BackupUsageQuery: Send + Sync {
    async fn is_backup_in_use(&self, backup_id: &InstallationBackupId) -> CoreResult<bool>;
}

/// Single-active-migration dependency check: at most one
/// `InstallationDBMigration` may be non-terminal per installation, and no
/// new migration may start while a prior one is `Succeeded` but not yet
/// `Committed`.
#[async_trait]
pub trait InstallationDbMigrationQuery: Send + Sync {
    async fn has_blocking_migration(&self, installation_id: &InstallationId) -> CoreResult<bool>;
}

/// Dependency check used by the delete-installation interlock: an
/// installation may not be deleted while one of its backups is actively
/// being taken.
#[async_trait]
pub trait InstallationBackupActivityQuery: Send + Sync {
    async fn has_in_progress_backup(&self, installation_id: &InstallationId) -> CoreResult<bool>;
}
