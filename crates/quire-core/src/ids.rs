//! Opaque string identifiers.
//!
//! Every id is a transparent string newtype so persisted records stay plain
//! JSON strings while the type system keeps tab, node, message and project ids
//! apart. Fresh ids are UUID v4.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a new unique id using UUID v4.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Get the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First `n` characters, for display.
            pub fn short(&self, n: usize) -> &str {
                match self.0.char_indices().nth(n) {
                    Some((idx, _)) => &self.0[..idx],
                    None => &self.0,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
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
    };
}

string_id!(
    /// Identifier of a node in a version graph.
    NodeId
);

string_id!(
    /// Identifier of a session tab.
    TabId
);

string_id!(
    /// Identifier of a message. Locally created messages carry a provisional id
    /// until the message store assigns the real one.
    MessageId
);

string_id!(
    /// Identifier of a project in the external message store.
    ProjectId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        assert_ne!(NodeId::generate(), NodeId::generate());
        assert!(!TabId::generate().as_str().is_empty());
    }

    #[test]
    fn test_transparent_serialization() {
        let id = MessageId::new("msg-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""msg-1""#);
        let parsed: MessageId = serde_json::from_str(r#""msg-1""#).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_short() {
        let id = ProjectId::new("abcdef123");
        assert_eq!(id.short(6), "abcdef");
        assert_eq!(id.short(50), "abcdef123");
        assert_eq!(format!("{}", id), "abcdef123");
    }
}
