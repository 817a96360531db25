//! Opaque 26-character alphanumeric identifiers.
//!
//! Mirrors the identifier shape used throughout the source system: a short,
//! URL-safe, collision-resistant id that is generated once at creation time
//! and never recomputed.

use core::fmt;

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

const ID_LENGTH: usize = 26;

/// A 26-character alphanumeric identifier shared by every entity kind and by
/// request/lock owners.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RawId(SmolStr);

impl RawId {
    /// Generates a new random id using the same alphabet (`[A-Za-z0-9]`) and
    /// length the store expects.
    #[must_use]
    pub fn generate() -> Self {
        let raw: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LENGTH)
            .map(char::from)
            .collect();
        Self(SmolStr::new(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for RawId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, fmt)
    }
}

impl fmt::Display for RawId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

impl From<&str> for RawId {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl From<String> for RawId {
    fn from(value: String) -> Self {
        Self(SmolStr::new(value))
    }
}

/// Identifies the request (or administrative actor) currently holding a
/// lock. Distinct type from the entity ids so a lock owner can never be
/// accidentally compared against an entity id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(RawId);

impl RequestId {
    #[must_use]
    pub fn generate() -> Self {
        Self(RawId::generate())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, fmt)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(RawId::from(value))
    }
}

/// Generates one typed id newtype per entity kind, each a thin wrapper
/// around [`RawId`] so that, for example, an [`InstallationId`] can never be
/// passed where a [`ClusterId`] is expected.
macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(RawId);

        impl $name {
            #[must_use]
            pub fn generate() -> Self {
                Self(RawId::generate())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.0, fmt)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, fmt)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(RawId::from(value))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(RawId::from(value))
            }
        }
    };
}

entity_id!(ClusterId);
entity_id!(InstallationId);
entity_id!(GroupId);
entity_id!(MultitenantDatabaseId);
entity_id!(InstallationBackupId);
entity_id!(InstallationDbRestorationId);
entity_id!(InstallationDbMigrationId);
entity_id!(ClusterInstallationMigrationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_26_characters_and_alphanumeric() {
        let id = InstallationId::generate();
        assert_eq!(id.as_str().len(), ID_LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn distinct_entity_kinds_cannot_be_confused_at_compile_time() {
        // This is primarily a compile-time property; the runtime check just
        // confirms two independently generated ids differ.
        let a = InstallationId::generate();
        let b = InstallationId::generate();
        assert_ne!(a, b);
    }
}
