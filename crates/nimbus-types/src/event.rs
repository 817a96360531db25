//! The single event shape every state change produces.
//!
//! The event producer and webhook fan-out are external collaborators; this
//! crate only defines the record they consume.

use core::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::kind::EntityKind;

/// The old state of an entity that has just been created. There is no
/// "previous" state in that case, so the event carries this sentinel
/// instead of `None` to keep the payload a plain string on the wire (the
/// source system did the same with a literal `"n/a"`).
pub const NO_PRIOR_STATE: &str = "n/a";

/// A single state-change record: `{entity kind, id, old state, new state,
/// timestamp, extras}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub kind: EntityKind,
    pub entity_id: String,
    pub old_state: String,
    pub new_state: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Free-form additional context (e.g. which group an installation was
    /// assigned to). Kept as JSON so each entity kind can attach whatever
    /// is relevant without the event envelope needing a variant per kind.
    pub extras: serde_json::Value,
}

impl StateChangeEvent {
    #[must_use]
    pub fn creation(kind: EntityKind, entity_id: impl fmt::Display, new_state: impl fmt::Display, now: OffsetDateTime) -> Self {
        Self {
            kind,
            entity_id: entity_id.to_string(),
            old_state: NO_PRIOR_STATE.to_owned(),
            new_state: new_state.to_string(),
            timestamp: now,
            extras: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn transition(
        kind: EntityKind,
        entity_id: impl fmt::Display,
        old_state: impl fmt::Display,
        new_state: impl fmt::Display,
        now: OffsetDateTime,
        extras: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            entity_id: entity_id.to_string(),
            old_state: old_state.to_string(),
            new_state: new_state.to_string(),
            timestamp: now,
            extras,
        }
    }
}
