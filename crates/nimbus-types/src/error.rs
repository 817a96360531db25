//! The tagged error discriminator returned by every core operation.
//!
//! A small `Debug + Display + Error` type carried inside an
//! `error_stack::Report` so call sites can `.attach_printable` operator
//! context without widening what callers have to match on.

use core::fmt;

/// Tagged discriminator for every failure the core can produce. Handlers
/// outside this crate map each variant to an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// No row with the given id, or a reference to an entity that does not
    /// exist. Maps to HTTP 404.
    NotFound,
    /// The lock is already held by another owner, or a duplicate in-flight
    /// operation was attempted. Maps to HTTP 409.
    Conflict,
    /// The API-security-lock is engaged, or the entity is deletion-locked.
    /// Maps to HTTP 403.
    Forbidden,
    /// An invalid transition, or an invariant violation caught before
    /// commit. Maps to HTTP 400.
    BadRequest,
    /// A store failure, serialization failure, or unexpected internal
    /// state. Maps to HTTP 500.
    Internal,
}

impl fmt::Display for CoreError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::NotFound => "entity not found",
            Self::Conflict => "conflicting operation in progress",
            Self::Forbidden => "operation forbidden",
            Self::BadRequest => "invalid request",
            Self::Internal => "internal control-plane error",
        })
    }
}

impl core::error::Error for CoreError {}

/// Convenience alias for the `Result<T, Report<E>>` spelling used throughout
/// this workspace.
pub type CoreResult<T> = error_stack::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable_for_each_variant() {
        assert_eq!(CoreError::NotFound.to_string(), "entity not found");
        assert_eq!(
            CoreError::Conflict.to_string(),
            "conflicting operation in progress"
        );
        assert_eq!(CoreError::Forbidden.to_string(), "operation forbidden");
        assert_eq!(CoreError::BadRequest.to_string(), "invalid request");
        assert_eq!(
            CoreError::Internal.to_string(),
            "internal control-plane error"
        );
    }
}
