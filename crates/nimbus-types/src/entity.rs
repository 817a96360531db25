//! The common shape every managed entity has, independent of entity kind:
//! id, state, API-security-lock, lock owner/timestamp, create/delete
//! timestamps.

use time::OffsetDateTime;

use crate::{id::RequestId, kind::EntityKind, state::EntityState};

/// Fields and accessors common to every entity kind, independent of whether
/// that kind has a lifecycle state machine. Implemented by both stateful
/// entities (Installation, Cluster, ...) and the two configuration-only
/// kinds (Group, MultitenantDatabase) so the Lock Manager can work
/// generically over any of them.
pub trait Lockable: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display + Send + Sync;

    /// The fixed entity kind this type represents. Constant per type, not
    /// per value.
    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;

    fn lock_owner(&self) -> Option<&RequestId>;
    fn set_lock_owner(&mut self, owner: Option<RequestId>);

    fn lock_acquired_at(&self) -> Option<OffsetDateTime>;
    fn set_lock_acquired_at(&mut self, at: Option<OffsetDateTime>);

    fn api_security_lock(&self) -> bool;
    fn set_api_security_lock(&mut self, locked: bool);

    fn create_at(&self) -> OffsetDateTime;

    /// `None` means the entity has not been (soft-)deleted. `Some(_)` is
    /// terminal: the entity is read-only except for administrative unlock
    /// and informational queries.
    fn delete_at(&self) -> Option<OffsetDateTime>;
    fn set_delete_at(&mut self, at: Option<OffsetDateTime>);

    fn is_deleted(&self) -> bool {
        self.delete_at().is_some()
    }
}

/// Extends [`Lockable`] with the lifecycle state machine fields. Every
/// entity kind except Group and MultitenantDatabase implements this.
pub trait Stateful: Lockable {
    type State: EntityState;

    fn state(&self) -> Self::State;
    fn set_state(&mut self, state: Self::State);
}

/// Generates the boilerplate `Lockable` impl (and, when a state type is
/// given, the `Stateful` impl) for a struct that stores the common fields
/// under a `common: CommonFields<Id>` member.
macro_rules! impl_lockable {
    ($entity:ty, id = $id_ty:ty, kind = $kind:expr) => {
        impl $crate::entity::Lockable for $entity {
            type Id = $id_ty;

            const KIND: $crate::kind::EntityKind = $kind;

            fn id(&self) -> &Self::Id {
                &self.common.id
            }

            fn lock_owner(&self) -> Option<&$crate::id::RequestId> {
                self.common.lock_owner.as_ref()
            }

            fn set_lock_owner(&mut self, owner: Option<$crate::id::RequestId>) {
                self.common.lock_owner = owner;
            }

            fn lock_acquired_at(&self) -> Option<::time::OffsetDateTime> {
                self.common.lock_acquired_at
            }

            fn set_lock_acquired_at(&mut self, at: Option<::time::OffsetDateTime>) {
                self.common.lock_acquired_at = at;
            }

            fn api_security_lock(&self) -> bool {
                self.common.api_security_lock
            }

            fn set_api_security_lock(&mut self, locked: bool) {
                self.common.api_security_lock = locked;
            }

            fn create_at(&self) -> ::time::OffsetDateTime {
                self.common.create_at
            }

            fn delete_at(&self) -> Option<::time::OffsetDateTime> {
                self.common.delete_at
            }

            fn set_delete_at(&mut self, at: Option<::time::OffsetDateTime>) {
                self.common.delete_at = at;
            }
        }
    };
}

macro_rules! impl_stateful {
    ($entity:ty, state = $state_ty:ty) => {
        impl $crate::entity::Stateful for $entity {
            type State = $state_ty;

            fn state(&self) -> Self::State {
                self.state
            }

            fn set_state(&mut self, state: Self::State) {
                self.state = state;
            }
        }
    };
}

pub(crate) use impl_lockable;
pub(crate) use impl_stateful;

/// The fields common to every entity, factored out so each entity struct
/// only has to declare its own kind-specific configuration fields plus one
/// `common: CommonFields<Id>` member.
#[derive(Debug, Clone)]
pub struct CommonFields<Id> {
    pub id: Id,
    pub lock_owner: Option<RequestId>,
    pub lock_acquired_at: Option<OffsetDateTime>,
    pub api_security_lock: bool,
    pub create_at: OffsetDateTime,
    pub delete_at: Option<OffsetDateTime>,
}

impl<Id> CommonFields<Id> {
    #[must_use]
    pub fn new(id: Id, now: OffsetDateTime) -> Self {
        Self {
            id,
            lock_owner: None,
            lock_acquired_at: None,
            api_security_lock: false,
            create_at: now,
            delete_at: None,
        }
    }
}
