// SPDX-License-Identifier: MIT

//! Identifier newtypes.
//!
//! Two families are used across the data model (§3 of the spec):
//! - UUID-backed ids (`session_id`, `task_id`, `review_id`) via
//!   [`define_uuid_id`], generated internally with `Uuid::new_v4`.
//! - Opaque string ids (`machine_id`, `workspace_id`, agent identifiers)
//!   via [`define_str_id`], always supplied by the caller (a machine's
//!   hostname, an operator-chosen workspace slug, an agent's own identity)
//!   and never generated by this crate.

use std::borrow::Borrow;
use std::fmt;

/// Define a UUID-backed id newtype with `new()`, `Display`, and serde support.
#[macro_export]
macro_rules! define_uuid_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a new random id.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> uuid::Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }
    };
}

/// Define a `String`-backed id newtype for identifiers supplied by an
/// external caller rather than generated here.
#[macro_export]
macro_rules! define_str_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}

/// Returns a string slice truncated to at most `n` characters, used when
/// logging ids in breadcrumbs without spelling out a full UUID.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// A namespaced key, e.g. for `(machine_id, slot)` or `(project_number,
/// issue_number)` composite-uniqueness lookups in the Claim Store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(parts: &[&dyn fmt::Display]) -> Self {
        let joined = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("\u{1}");
        Self(joined)
    }
}

impl Borrow<str> for CompositeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_uuid_id! {
        /// test id
        pub struct TestUuidId;
    }

    define_str_id! {
        /// test id
        pub struct TestStrId;
    }

    #[test]
    fn uuid_id_round_trips_through_display_and_parse() {
        let id = TestUuidId::new();
        let parsed: TestUuidId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn str_id_compares_against_str() {
        let id = TestStrId::new("worker-1");
        assert_eq!(id.as_str(), "worker-1");
    }

    #[test]
    fn short_truncates_long_strings() {
        assert_eq!(short("abcdefgh", 4), "abcd");
        assert_eq!(short("ab", 4), "ab");
    }
}
