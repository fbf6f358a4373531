//! Branded ID newtypes for type safety.
//!
//! Session and task IDs are opaque strings chosen by callers, so they are
//! never generated here. Connection IDs are minted by the server for each
//! observer channel and use UUID v7.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a registered worker session.
    SessionId
}

branded_id! {
    /// Identifier of a task in the shared task graph.
    TaskId
}

branded_id! {
    /// Identifier of a connected observer channel.
    ConnectionId
}

impl ConnectionId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn-{}", Uuid::now_v7()))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    #[test]
    fn connection_ids_are_unique_and_prefixed() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn-"));
    }

    #[test]
    fn from_str_ref() {
        let id = SessionId::from("worker-a");
        assert_eq!(id.as_str(), "worker-a");
    }

    #[test]
    fn deref_to_str() {
        let id = TaskId::from("t1");
        let s: &str = &id;
        assert_eq!(s, "t1");
    }

    #[test]
    fn display() {
        let id = TaskId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
    }

    #[test]
    fn serde_is_transparent() {
        let id = SessionId::from("sess-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sess-1\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn map_lookup_by_str() {
        let mut map = HashMap::new();
        let _ = map.insert(TaskId::from("t1"), 1);
        assert_eq!(map.get("t1"), Some(&1));
    }

    #[test]
    fn ordered_sets_sort_lexically() {
        let set: BTreeSet<TaskId> = ["b", "a", "c"].into_iter().map(TaskId::from).collect();
        let ordered: Vec<&str> = set.iter().map(TaskId::as_str).collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }

    #[test]
    fn into_inner() {
        let id = SessionId::from("inner-test");
        assert_eq!(id.into_inner(), "inner-test");
    }
}
