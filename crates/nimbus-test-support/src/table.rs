//! A single concurrent in-memory table backing one entity kind.
//!
//! Built on `scc::HashMap` rather than `Mutex<HashMap<_>>`: entry mutation
//! happens through `entry_async` so the lock-acquire compare-and-set is a
//! single atomic operation against the table, mirroring the atomicity
//! [`EntityStore::lock`] requires of a real backend.

use error_stack::Report;
use nimbus_types::{CoreError, CoreResult, Lockable, RequestId};
use scc::hash_map::Entry;
use time::OffsetDateTime;

pub struct Table<E: Lockable> {
    rows: scc::HashMap<E::Id, E>,
}

impl<E: Lockable> Default for Table<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Lockable> Table<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: scc::HashMap::new(),
        }
    }

    pub fn seed(&self, entity: E) {
        let id = entity.id().clone();
        // Test-only seeding bypasses the `create` validation path on
        // purpose: tests set up fixtures directly in whatever state they
        // need to exercise.
        let _ = self.rows.insert_sync(id, entity);
    }

    pub async fn get(&self, id: &E::Id) -> CoreResult<Option<E>> {
        Ok(self.rows.get_async(id).await.map(|entry| entry.clone()))
    }

    pub async fn create(&self, entity: E) -> CoreResult<()> {
        let id = entity.id().clone();
        self.rows
            .insert_async(id, entity)
            .await
            .map_err(|_| Report::new(CoreError::Conflict).attach_printable("entity already exists"))
    }

    pub async fn update(&self, entity: &E) -> CoreResult<()> {
        match self.rows.entry_async(entity.id().clone()).await {
            Entry::Occupied(mut occupied) => {
                *occupied.get_mut() = entity.clone();
                Ok(())
            }
            Entry::Vacant(_) => Err(Report::new(CoreError::NotFound)
                .attach_printable("cannot update a row that does not exist")),
        }
    }

    pub async fn lock(
        &self,
        id: &E::Id,
        owner: &RequestId,
        now: OffsetDateTime,
    ) -> CoreResult<E> {
        match self.rows.entry_async(id.clone()).await {
            Entry::Occupied(mut occupied) => {
                let row = occupied.get_mut();
                match row.lock_owner() {
                    None => {
                        row.set_lock_owner(Some(owner.clone()));
                        row.set_lock_acquired_at(Some(now));
                        Ok(row.clone())
                    }
                    Some(current) if current == owner => {
                        row.set_lock_acquired_at(Some(now));
                        Ok(row.clone())
                    }
                    Some(_) => Err(Report::new(CoreError::Conflict)
                        .attach_printable("lock held by a different owner")),
                }
            }
            Entry::Vacant(_) => {
                Err(Report::new(CoreError::NotFound).attach_printable("no such row to lock"))
            }
        }
    }

    pub async fn unlock(&self, id: &E::Id, owner: Option<&RequestId>, force: bool) -> CoreResult<()> {
        if let Some(mut entry) = self.rows.get_async(id).await {
            if force {
                entry.set_lock_owner(None);
                entry.set_lock_acquired_at(None);
                return Ok(());
            }
            if let Some(owner) = owner {
                if entry.lock_owner() == Some(owner) {
                    entry.set_lock_owner(None);
                    entry.set_lock_acquired_at(None);
                }
            }
            Ok(())
        } else {
            // Unlocking a row that no longer exists (e.g. raced with a
            // hard cleanup) is treated as an idempotent no-op, consistent
            // with release() never failing on a second call.
            Ok(())
        }
    }

    pub async fn scan<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&E) -> bool,
    {
        let mut found = false;
        self.rows
            .scan_async(|_, value| {
                if predicate(value) {
                    found = true;
                }
            })
            .await;
        found
    }
}
