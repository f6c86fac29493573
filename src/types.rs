//! Basic type definitions for the chat hub
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: identity of a connected, room-joined user
//! - `RoomId`: identifier of a chat room
//! - `SessionId`: one registration of a client, unique per connection

use serde::{Deserialize, Serialize};

/// Client identifier (newtype pattern)
///
/// Wraps the user id supplied on the join handshake.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier
///
/// Rooms are keyed by the id handed out by the persistence collaborator.
/// The literal `"default"` is a sentinel on the wire and never a registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Sentinel accepted on the join handshake in place of a real id
    pub const DEFAULT_SENTINEL: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random room id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Whether this id is the `"default"` sentinel
    pub fn is_default_sentinel(&self) -> bool {
        self.0 == Self::DEFAULT_SENTINEL
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session identifier
///
/// The same user id may connect more than once; each connection gets its own
/// session so that one connection ending cannot evict another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_unique() {
        let id1 = RoomId::generate();
        let id2 = RoomId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_id_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_default_sentinel() {
        assert!(RoomId::new("default").is_default_sentinel());
        assert!(!RoomId::new("Default").is_default_sentinel());
        assert!(!RoomId::generate().is_default_sentinel());
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ClientId::new("42")).unwrap();
        assert_eq!(json, "\"42\"");
        let room: RoomId = serde_json::from_str("\"r1\"").unwrap();
        assert_eq!(room, RoomId::new("r1"));
    }
}
