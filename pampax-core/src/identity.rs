//! Identity types for PAMPAX entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ENTITY ID TYPE SYSTEM
// ============================================================================

/// Trait for type-safe entity IDs.
///
/// Gives compile-time safety so IDs for different entity kinds cannot be
/// accidentally mixed up.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The name of the entity type (e.g., "span", "edge").
    const ENTITY_NAME: &'static str;

    /// Create a new ID from a UUID.
    fn new(uuid: Uuid) -> Self;

    /// Get the underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Create a nil (all zeros) ID.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    /// Create a new timestamp-sortable UUIDv7 ID.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// Create a new random UUIDv4 ID.
    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Error type for parsing entity IDs from strings.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse {} ID from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Macro to define a type-safe entity ID newtype around a `Uuid`.
macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

define_entity_id!(SpanId, "span", "Type-safe, content-derived ID for a Span.");
define_entity_id!(EdgeId, "edge", "Type-safe ID for an Edge.");
define_entity_id!(
    MemoryItemId,
    "memory_item",
    "Type-safe ID for a MemoryItem."
);
define_entity_id!(SessionId, "session", "Type-safe ID for a SessionState.");

// ============================================================================
// OTHER IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash, used to make `SpanId` a pure function of span
/// attributes (invariant 1: identical spans in two indexings yield
/// identical ids).
pub type ContentHash = [u8; 32];

/// Compute the SHA-256 hash of arbitrary content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Derive a `SpanId` from a span's stable attributes:
/// `{repo, path, byteStart, byteEnd, kind, name, signature, docHash, parentsHash}`.
///
/// Two spans with identical attributes always hash to the same `SpanId`,
/// regardless of when or how many times they were indexed.
#[allow(clippy::too_many_arguments)]
pub fn compute_span_id(
    repo: &str,
    path: &str,
    byte_start: u32,
    byte_end: u32,
    kind: &str,
    name: Option<&str>,
    signature: Option<&str>,
    doc: Option<&str>,
    parents: &[SpanId],
) -> SpanId {
    let mut hasher = Sha256::new();
    hasher.update(repo.as_bytes());
    hasher.update(b"\0");
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(byte_start.to_le_bytes());
    hasher.update(byte_end.to_le_bytes());
    hasher.update(kind.as_bytes());
    hasher.update(b"\0");
    hasher.update(name.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(signature.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    if let Some(doc) = doc {
        hasher.update(compute_content_hash(doc.as_bytes()));
    }
    let mut parents_hasher = Sha256::new();
    for parent in parents {
        parents_hasher.update(parent.as_uuid().as_bytes());
    }
    hasher.update(parents_hasher.finalize());

    let digest = hasher.finalize();
    // A content hash is 32 bytes; a UUID needs 16. Fold the digest in half
    // so every input byte still influences the id.
    let mut uuid_bytes = [0u8; 16];
    for i in 0..16 {
        uuid_bytes[i] = digest[i] ^ digest[i + 16];
    }
    SpanId::new(Uuid::from_bytes(uuid_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_id_is_pure_function_of_attributes() {
        let a = compute_span_id(
            "repo", "path.rs", 0, 10, "function", Some("foo"), Some("fn foo()"), None, &[],
        );
        let b = compute_span_id(
            "repo", "path.rs", 0, 10, "function", Some("foo"), Some("fn foo()"), None, &[],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn span_id_changes_with_byte_range() {
        let a = compute_span_id("repo", "path.rs", 0, 10, "function", None, None, None, &[]);
        let b = compute_span_id("repo", "path.rs", 0, 11, "function", None, None, None, &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn entity_id_serde_roundtrip() {
        let id = SpanId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"'));
        let back: SpanId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn entity_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: SessionId = uuid_str.parse().expect("valid uuid");
        assert_eq!(id.to_string(), uuid_str);
    }
}
