//! The Transition Coordinator, cross-entity interlock rules, and the
//! supervisor nudge channel for the Nimbus control-plane core. This crate
//! is the only place the full set of lifecycle and locking invariants is
//! enforced end to end; `nimbus-locking` and `nimbus-statemachine` provide
//! the primitives it composes.

mod interlocks;
mod nudge;
mod transition;

pub use nudge::{channel, NudgeReceiver, NudgeSender};
pub use transition::Coordinator;
