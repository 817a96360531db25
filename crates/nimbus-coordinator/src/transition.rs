//! The canonical mutation sequence: `TransitionTo`, `RetryTransition`, and
//! `FallbackTransition`, plus the entity-creation path that starts every
//! lifecycle.

use error_stack::{Report, ResultExt};
use nimbus_locking::{LockGuard, LockManager};
use nimbus_statemachine::{EntityTransitions, TransitionRules};
use nimbus_store::{EntityStore, EventEmitter};
use nimbus_types::{CoreError, CoreResult, RequestId, StateChangeEvent, Stateful};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::instrument;

use crate::nudge::NudgeSender;

/// Owns the collaborators every mutation needs: the lock manager, the
/// event emitter, and the supervisor nudge sender. One instance is shared
/// (behind an `Arc`, by convention of callers) across all requests in a
/// process.
pub struct Coordinator<S> {
    lock_manager: LockManager<S>,
    emitter: std::sync::Arc<dyn EventEmitter>,
    nudge: NudgeSender,
}

impl<S> Coordinator<S> {
    #[must_use]
    pub fn new(
        lock_manager: LockManager<S>,
        emitter: std::sync::Arc<dyn EventEmitter>,
        nudge: NudgeSender,
    ) -> Self {
        Self {
            lock_manager,
            emitter,
            nudge,
        }
    }

    #[must_use]
    pub fn store(&self) -> &std::sync::Arc<S> {
        self.lock_manager.store()
    }

    pub(crate) fn lock_manager(&self) -> &LockManager<S> {
        &self.lock_manager
    }

    pub(crate) fn nudge(&self) {
        self.nudge.nudge();
    }
}

impl<S: Send + Sync + 'static> Coordinator<S> {
    /// Creates a new entity in its initial state: persists the row with
    /// no lock held, then emits the first state-change event with
    /// `oldState = "n/a"`.
    #[instrument(skip(self, entity), fields(kind = %E::KIND))]
    pub async fn create<E>(&self, entity: E) -> CoreResult<E>
    where
        E: Stateful + Clone,
        S: EntityStore<E>,
    {
        self.store()
            .create(entity.clone())
            .await
            .attach_printable_lazy(|| format!("creating {} {}", E::KIND, entity.id()))?;

        let event = StateChangeEvent::creation(
            E::KIND,
            entity.id(),
            entity.state(),
            OffsetDateTime::now_utc(),
        );
        self.emit_best_effort(event).await;
        self.nudge.nudge();

        Ok(entity)
    }

    /// `TransitionTo(kind, id, target, mutate)`.
    ///
    /// `mutate` applies request-supplied field patches and reports whether
    /// it changed anything; when it returns `false` and `target` already
    /// equals the current state, this is a true no-op: no persist, no
    /// event, but the lock is still released and the supervisor still
    /// nudged.
    #[instrument(skip(self, owner, mutate), fields(kind = %E::KIND, id = %id, owner = %owner))]
    pub async fn transition_to<E, M>(
        &self,
        id: &E::Id,
        target: E::State,
        owner: RequestId,
        mutate: M,
    ) -> CoreResult<E>
    where
        E: Stateful + EntityTransitions + Clone,
        S: EntityStore<E>,
        M: FnOnce(&mut E) -> bool,
    {
        let (mut entity, guard) = self.lock_manager.acquire::<E>(id, owner).await?;

        if entity.api_security_lock() {
            guard
                .release()
                .await
                .attach_printable("releasing lock after security-lock rejection")?;
            return Err(Report::new(CoreError::Forbidden)
                .attach_printable(format!("{} {} is API-security-locked", E::KIND, id)));
        }

        let current = entity.state();
        if target != current && !E::Machine::valid_transition(current, target) {
            guard
                .release()
                .await
                .attach_printable("releasing lock after invalid-transition rejection")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "{} {} has no valid transition from {current} to {target}",
                E::KIND,
                id
            )));
        }

        let changed = mutate(&mut entity);
        if !changed && target == current {
            guard
                .release()
                .await
                .attach_printable("releasing lock on the no-op path")?;
            self.nudge.nudge();
            return Ok(entity);
        }

        self.commit(entity, guard, current, target).await
    }

    /// `RetryTransition`: identical to [`Coordinator::transition_to`]
    /// except that retrying onto the entity's current state is success
    /// without a duplicate event, and still nudges the supervisor.
    #[instrument(skip(self, owner), fields(kind = %E::KIND, id = %id, owner = %owner))]
    pub async fn retry_transition<E>(
        &self,
        id: &E::Id,
        target: E::State,
        owner: RequestId,
    ) -> CoreResult<E>
    where
        E: Stateful + EntityTransitions + Clone,
        S: EntityStore<E>,
    {
        let (entity, guard) = self.lock_manager.acquire::<E>(id, owner).await?;
        let current = entity.state();

        if current == target {
            guard
                .release()
                .await
                .attach_printable("releasing lock on idempotent retry")?;
            self.nudge.nudge();
            return Ok(entity);
        }

        if !E::Machine::valid_transition(current, target) {
            guard
                .release()
                .await
                .attach_printable("releasing lock after invalid retry target")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "{} {} has no valid retry transition from {current} to {target}",
                E::KIND,
                id
            )));
        }

        self.commit(entity, guard, current, target).await
    }

    /// `FallbackTransition(primary, fallback)`: tries `primary`; if it is
    /// not a valid transition from the current state, tries
    /// `fallback` instead. Only one transition is ever committed. Used by
    /// installation deletion's "normally delete-pending, but certain
    /// failure states go straight to delete" policy.
    #[instrument(skip(self, owner), fields(kind = %E::KIND, id = %id, owner = %owner))]
    pub async fn fallback_transition<E>(
        &self,
        id: &E::Id,
        primary: E::State,
        fallback: E::State,
        owner: RequestId,
    ) -> CoreResult<E>
    where
        E: Stateful + EntityTransitions + Clone,
        S: EntityStore<E>,
    {
        let (entity, guard) = self.lock_manager.acquire::<E>(id, owner).await?;
        let current = entity.state();

        let target = if E::Machine::valid_transition(current, primary) {
            primary
        } else if E::Machine::valid_transition(current, fallback) {
            fallback
        } else {
            guard
                .release()
                .await
                .attach_printable("releasing lock: neither primary nor fallback is valid")?;
            return Err(Report::new(CoreError::BadRequest).attach_printable(format!(
                "{} {} has no valid transition from {current} to {primary} or {fallback}",
                E::KIND,
                id
            )));
        };

        self.commit(entity, guard, current, target).await
    }

    /// Shared persist/emit/release/nudge tail used by every transition
    /// variant once a legal `(current, target)` pair has been decided.
    pub(crate) async fn commit<E>(
        &self,
        mut entity: E,
        guard: LockGuard<E, S>,
        current: E::State,
        target: E::State,
    ) -> CoreResult<E>
    where
        E: Stateful + Clone,
        S: EntityStore<E>,
    {
        entity.set_state(target);
        if let Err(report) = self.store().update_state(&entity).await {
            guard
                .release()
                .await
                .attach_printable("releasing lock after a failed persist")?;
            return Err(report
                .change_context(CoreError::Internal)
                .attach_printable(format!("persisting {} {} after transition", E::KIND, entity.id())));
        }

        let event = StateChangeEvent::transition(
            E::KIND,
            entity.id(),
            current,
            target,
            OffsetDateTime::now_utc(),
            Value::Null,
        );
        self.emit_best_effort(event).await;

        guard
            .release()
            .await
            .attach_printable("releasing lock after a committed transition")?;
        self.nudge.nudge();

        Ok(entity)
    }

    async fn emit_best_effort(&self, event: StateChangeEvent) {
        if let Err(report) = self.emitter.emit(event).await {
            tracing::error!(error = ?report, "state-change event emission failed; continuing");
        }
    }
}
