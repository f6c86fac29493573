//! Message protocol definitions
//!
//! JSON wire types exchanged over the WebSocket: chat messages, error frames,
//! persisted history entries and the room query/creation envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ClientId, RoomId};

/// Content of the notice broadcast when a client leaves its room
pub const LEAVE_NOTICE: &str = "User left the chat";

/// Content of the notice broadcast when a client joins a room
pub const JOIN_NOTICE: &str = "A new user has joined the room";

/// Chat message, both inbound and outbound
///
/// Missing fields deserialize as empty strings so that validation, not
/// parsing, decides whether an inbound message is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "roomId", default)]
    pub room_id: String,
    #[serde(default)]
    pub username: String,
}

impl ChatMessage {
    pub fn new(content: impl Into<String>, room_id: &RoomId, username: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            room_id: room_id.to_string(),
            username: username.into(),
        }
    }

    /// Synthetic notice sent to a room when `username` leaves it
    pub fn leave_notice(room_id: &RoomId, username: &str) -> Self {
        Self::new(LEAVE_NOTICE, room_id, username)
    }

    /// Synthetic notice sent to a room when `username` joins it
    pub fn join_notice(room_id: &RoomId, username: &str) -> Self {
        Self::new(JOIN_NOTICE, room_id, username)
    }

    /// An inbound message needs both a body and a sender name
    pub fn is_valid(&self) -> bool {
        !self.content.is_empty() && !self.username.is_empty()
    }
}

/// Error frame written to a client, `{"error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}

impl ErrorFrame {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    pub fn invalid_message() -> Self {
        Self::new("Invalid message format")
    }
}

/// Persisted message as returned by history queries (content decrypted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    pub content: String,
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub username: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Room kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Direct,
    #[default]
    Group,
}

/// Room creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(rename = "type", default)]
    pub room_type: RoomType,
    #[serde(rename = "creatorId", default)]
    pub creator_id: String,
}

/// Body of an `updateRoom` request
///
/// `type` is optional; when absent the room keeps its current type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRoomRequest {
    pub id: RoomId,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<RoomType>,
}

/// Room as returned by creation and listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomResponse {
    pub id: RoomId,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    #[serde(rename = "creatorId")]
    pub creator_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A connected member of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: ClientId,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_wire_names() {
        let msg = ChatMessage::new("hi", &RoomId::new("r1"), "A");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"content":"hi","roomId":"r1","username":"A"}"#);
    }

    #[test]
    fn test_chat_message_missing_fields_default_empty() {
        let msg: ChatMessage = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert_eq!(msg.content, "hello");
        assert!(msg.username.is_empty());
        assert!(!msg.is_valid());
    }

    #[test]
    fn test_chat_message_validation() {
        let room = RoomId::new("r1");
        assert!(ChatMessage::new("hi", &room, "A").is_valid());
        assert!(!ChatMessage::new("", &room, "A").is_valid());
        assert!(!ChatMessage::new("hi", &room, "").is_valid());
    }

    #[test]
    fn test_error_frame_serialize() {
        let json = serde_json::to_string(&ErrorFrame::invalid_message()).unwrap();
        assert_eq!(json, r#"{"error":"Invalid message format"}"#);
    }

    #[test]
    fn test_create_room_request_defaults() {
        let req: CreateRoomRequest = serde_json::from_str(r#"{"name": "lobby"}"#).unwrap();
        assert_eq!(req.room_type, RoomType::Group);
        assert!(req.creator_id.is_empty());

        let req: CreateRoomRequest =
            serde_json::from_str(r#"{"name": "dm", "type": "direct", "creatorId": "7"}"#).unwrap();
        assert_eq!(req.room_type, RoomType::Direct);
        assert_eq!(req.creator_id, "7");
    }

    #[test]
    fn test_update_room_request_type_is_optional() {
        let req: UpdateRoomRequest =
            serde_json::from_str(r#"{"id": "r1", "name": "renamed"}"#).unwrap();
        assert_eq!(req.id, RoomId::new("r1"));
        assert_eq!(req.room_type, None);

        let req: UpdateRoomRequest =
            serde_json::from_str(r#"{"id": "r1", "name": "dm", "type": "direct"}"#).unwrap();
        assert_eq!(req.room_type, Some(RoomType::Direct));

        assert!(serde_json::from_str::<UpdateRoomRequest>(r#"{"name": "x"}"#).is_err());
    }

    #[test]
    fn test_room_response_serialize() {
        let room = RoomResponse {
            id: RoomId::new("r1"),
            name: "lobby".to_string(),
            room_type: RoomType::Group,
            creator_id: "7".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&room).unwrap();
        assert!(json.contains("\"type\":\"group\""));
        assert!(json.contains("\"creatorId\":\"7\""));
        assert!(json.contains("\"createdAt\""));
    }
}
