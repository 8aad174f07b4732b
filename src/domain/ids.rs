//! Type-safe identifiers.
//!
//! Every record kind gets its own newtype around [`uuid::Uuid`] (v4) so a
//! task id can never be passed where a conversation id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a fulfillment task (one confirmed order).
    ///
    /// Allocated before the escrow freeze so the freeze transaction and the
    /// task share the same id.
    TaskId
);

uuid_id!(
    /// Unique identifier for a chat conversation.
    ConversationId
);

uuid_id!(
    /// Unique identifier for a wallet transaction.
    TransactionId
);

uuid_id!(
    /// Unique identifier for an issued quote.
    QuoteId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_ne!(ConversationId::new(), ConversationId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = format!("{}", TaskId::new());
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn serializes_as_bare_uuid_string() {
        let uuid = uuid::Uuid::new_v4();
        let id = TaskId::from_uuid(uuid);
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn from_uuid_round_trip() {
        let uuid = uuid::Uuid::new_v4();
        let id = ConversationId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
        assert_eq!(uuid::Uuid::from(id), uuid);
    }
}
