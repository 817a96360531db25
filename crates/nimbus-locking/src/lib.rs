//! Advisory, per-`(entity kind, entity id)` distributed locking.
//!
//! Locks are rows in the store, not an in-process primitive: any number of
//! control-plane replicas can race to acquire the same lock, and the store
//! is relied on to make the compare-and-set in [`EntityStore::lock`]
//! atomic. [`LockGuard::release`] is idempotent and safe to call from both
//! the happy path and every error path; the contract that it MUST be
//! called on every exit is not something the type system can enforce
//! (there is no async `Drop`), so [`LockGuard`] logs a warning if it is
//! ever dropped without having been released. Enforced by discipline, not
//! the compiler.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use nimbus_store::EntityStore;
use nimbus_types::{CoreError, CoreResult, Lockable, RequestId};
use time::OffsetDateTime;
use tracing::{instrument, warn};

/// The global lock-acquisition order, expressed as the
/// `EntityKind::lock_order()` values in ascending order. Exposed so
/// `nimbus-coordinator`'s interlock rules can assert they acquire locks in
/// the right sequence.
pub const LOCK_ORDER: [nimbus_types::EntityKind; 8] = [
    nimbus_types::EntityKind::Installation,
    nimbus_types::EntityKind::Group,
    nimbus_types::EntityKind::Cluster,
    nimbus_types::EntityKind::InstallationBackup,
    nimbus_types::EntityKind::InstallationDbMigration,
    nimbus_types::EntityKind::InstallationDbRestoration,
    nimbus_types::EntityKind::MultitenantDatabase,
    nimbus_types::EntityKind::ClusterInstallationMigration,
];

/// Orchestrates `Acquire`/release/`ForceRelease` against an [`EntityStore`].
/// One instance is shared (via `Arc`) across all requests in a process;
/// the mutual exclusion it provides is entirely delegated to the store.
pub struct LockManager<S> {
    store: Arc<S>,
}

impl<S> LockManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Send + Sync + 'static> LockManager<S> {
    /// Reads the row and atomically sets `lockOwner = owner` if it is
    /// currently unset or already `owner`.
    /// Returns the loaded entity and a guard whose `release` MUST be
    /// called on every exit path of the caller.
    #[instrument(skip(self), fields(kind = %E::KIND, id = %id, owner = %owner))]
    pub async fn acquire<E>(&self, id: &E::Id, owner: RequestId) -> CoreResult<(E, LockGuard<E, S>)>
    where
        E: Lockable,
        S: EntityStore<E>,
    {
        let now = OffsetDateTime::now_utc();
        let entity = self
            .store
            .lock(id, &owner, now)
            .await
            .attach_printable_lazy(|| format!("acquiring lock on {} {id}", E::KIND))?;
        let guard = LockGuard::new(Arc::clone(&self.store), id.clone(), owner);
        Ok((entity, guard))
    }

    /// Administrative unconditional clear. Never exposed on the
    /// user-facing request path; only via explicit admin operations. Does
    /// not emit a state-change event.
    #[instrument(skip(self), fields(kind = %E::KIND, id = %id))]
    pub async fn force_release<E>(&self, id: &E::Id) -> CoreResult<()>
    where
        E: Lockable,
        S: EntityStore<E>,
    {
        self.store
            .unlock(id, None, true)
            .await
            .attach_printable_lazy(|| format!("force-releasing lock on {} {id}", E::KIND))
    }
}

/// A held lock on a single entity. `release` is idempotent: the first call
/// performs the atomic store clear, every subsequent call (and every
/// concurrent call racing with the first) is a no-op that returns `Ok(())`.
#[must_use = "a lock guard must be released on every exit path of the holding request"]
pub struct LockGuard<E: Lockable, S> {
    store: Arc<S>,
    id: E::Id,
    owner: RequestId,
    released: AtomicBool,
}

impl<E: Lockable, S> LockGuard<E, S> {
    fn new(store: Arc<S>, id: E::Id, owner: RequestId) -> Self {
        Self {
            store,
            id,
            owner,
            released: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &RequestId {
        &self.owner
    }

    #[must_use]
    pub fn id(&self) -> &E::Id {
        &self.id
    }

    /// Idempotent release. Safe to call multiple times and from both the
    /// success and error paths; only the first call reaches the store.
    pub async fn release(&self) -> CoreResult<()>
    where
        S: EntityStore<E>,
    {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.store
            .unlock(&self.id, Some(&self.owner), false)
            .await
            .attach_printable_lazy(|| format!("releasing lock on {} {}", E::KIND, self.id))
    }
}

impl<E: Lockable, S> Drop for LockGuard<E, S> {
    fn drop(&mut self) {
        if !self.released.load(Ordering::Acquire) {
            warn!(
                kind = %E::KIND,
                id = %self.id,
                owner = %self.owner,
                "lock guard dropped without release being called; the store row may remain locked \
                 until the owner's lock is force-released"
            );
        }
    }
}

/// Lock contention: the row exists but is held by a different owner.
/// Returned by [`EntityStore::lock`] implementations; re-exported here so
/// callers matching on `acquire`'s error don't need to depend on
/// `nimbus-store` directly just for this one variant check.
#[must_use]
pub fn is_conflict(report: &Report<CoreError>) -> bool {
    matches!(report.current_context(), CoreError::Conflict)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nimbus_test_support::InMemoryStore;
    use nimbus_types::{entities::Installation, CommonFields, InstallationId, InstallationState};
    use time::macros::datetime;

    use super::*;

    fn new_installation() -> Installation {
        Installation {
            common: CommonFields::new(InstallationId::generate(), datetime!(2024-01-01 0:00 UTC)),
            state: InstallationState::CreationRequested,
            owner_id: "owner".to_owned(),
            dns: "a.example.com".to_owned(),
            group_id: None,
            group_sequence: None,
            deletion_locked: false,
            deletion_pending_expiry: None,
        }
    }

    #[tokio::test]
    async fn acquire_then_release_then_reacquire_by_same_owner_succeeds() {
        let store = Arc::new(InMemoryStore::new());
        let installation = new_installation();
        let id = installation.common.id.clone();
        store.seed(installation);
        let manager = LockManager::new(Arc::clone(&store));

        let owner = RequestId::generate();
        let (_entity, guard) = manager
            .acquire::<Installation>(&id, owner.clone())
            .await
            .expect("first acquire should succeed");
        guard.release().await.expect("release should succeed");

        let (_entity, guard2) = manager
            .acquire::<Installation>(&id, owner)
            .await
            .expect("re-acquire by same owner should succeed");
        guard2.release().await.expect("second release should succeed");
    }

    #[tokio::test]
    async fn second_owner_is_rejected_with_conflict_while_first_holds() {
        let store = Arc::new(InMemoryStore::new());
        let installation = new_installation();
        let id = installation.common.id.clone();
        store.seed(installation);
        let manager = LockManager::new(Arc::clone(&store));

        let owner_a = RequestId::generate();
        let (_entity, guard_a) = manager
            .acquire::<Installation>(&id, owner_a)
            .await
            .expect("first acquire should succeed");

        let owner_b = RequestId::generate();
        let result = manager.acquire::<Installation>(&id, owner_b).await;
        let err = result.expect_err("second acquire should be rejected");
        assert_eq!(*err.current_context(), CoreError::Conflict);

        guard_a.release().await.expect("release should succeed");
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let installation = new_installation();
        let id = installation.common.id.clone();
        store.seed(installation);
        let manager = LockManager::new(Arc::clone(&store));

        let owner = RequestId::generate();
        let (_entity, guard) = manager
            .acquire::<Installation>(&id, owner)
            .await
            .expect("acquire should succeed");

        guard.release().await.expect("first release should succeed");
        guard.release().await.expect("second release should be a no-op success");
    }

    #[tokio::test]
    async fn acquire_on_missing_entity_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let manager = LockManager::new(store);

        let owner = RequestId::generate();
        let result = manager
            .acquire::<Installation>(&InstallationId::generate(), owner)
            .await;
        let err = result.expect_err("acquire on a missing row should fail");
        assert_eq!(*err.current_context(), CoreError::NotFound);
    }

    #[tokio::test]
    async fn force_release_clears_lock_held_by_another_owner() {
        let store = Arc::new(InMemoryStore::new());
        let installation = new_installation();
        let id = installation.common.id.clone();
        store.seed(installation);
        let manager = LockManager::new(Arc::clone(&store));

        let owner = RequestId::generate();
        let (_entity, _guard) = manager
            .acquire::<Installation>(&id, owner)
            .await
            .expect("acquire should succeed");

        manager
            .force_release::<Installation>(&id)
            .await
            .expect("force-release should succeed regardless of current owner");

        let new_owner = RequestId::generate();
        manager
            .acquire::<Installation>(&id, new_owner)
            .await
            .expect("a different owner can now acquire the lock");
    }
}
