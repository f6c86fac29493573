//! Persistence collaborator
//!
//! `ChatService` is the boundary the hub and the transport use to validate
//! rooms, manage membership and durably store messages. Every call is treated
//! as fallible and is never retried.
//!
//! `MemoryService` is the in-process implementation used by the binary and the
//! tests. Message content is encrypted with the codec before it is stored and
//! decrypted when history is read back; plaintext never reaches the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::codec;
use crate::error::ServiceError;
use crate::message::{CreateRoomRequest, HistoryMessage, RoomResponse, UpdateRoomRequest};
use crate::types::{ClientId, RoomId};

/// A message as held in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: String,
    /// Username of the sender
    pub sender: String,
    pub room_id: RoomId,
    /// Codec output, never plaintext (unless the key is invalid)
    pub encrypted_content: String,
    pub reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_edited: bool,
}

/// Durable membership of a user in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMember {
    pub user_id: ClientId,
    pub room_id: RoomId,
    pub joined_at: DateTime<Utc>,
}

/// Repository/service operations the chat hub depends on
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Store a message sent by `username` to `room_id`
    async fn create_message(
        &self,
        username: &str,
        room_id: &RoomId,
        content: &str,
    ) -> Result<StoredMessage, ServiceError>;

    /// Newest `limit` messages of a room, oldest first, content decrypted
    async fn get_messages_by_room_id(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, ServiceError>;

    async fn create_chat_room(&self, req: CreateRoomRequest) -> Result<RoomResponse, ServiceError>;

    async fn get_chat_room_by_id(&self, room_id: &RoomId) -> Result<RoomResponse, ServiceError>;

    async fn get_all_chat_rooms(&self) -> Result<Vec<RoomResponse>, ServiceError>;

    /// Rename a room, and change its type when the request carries one
    async fn update_chat_room(&self, req: UpdateRoomRequest) -> Result<RoomResponse, ServiceError>;

    /// Rooms `user_id` is a member of
    async fn get_chat_rooms_by_user_id(
        &self,
        user_id: &ClientId,
    ) -> Result<Vec<RoomResponse>, ServiceError>;

    async fn delete_chat_room(&self, room_id: &RoomId) -> Result<(), ServiceError>;

    async fn add_user_to_chat_room(
        &self,
        user_id: &ClientId,
        room_id: &RoomId,
    ) -> Result<(), ServiceError>;

    async fn get_members_by_chat_room_id(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<RoomMember>, ServiceError>;
}

/// Resolve the room named `name`, creating it on behalf of `user_id` if missing
pub async fn ensure_default_room(
    service: &dyn ChatService,
    name: &str,
    user_id: &ClientId,
) -> Result<RoomId, ServiceError> {
    let rooms = service.get_all_chat_rooms().await?;
    if let Some(room) = rooms.into_iter().find(|r| r.name == name) {
        return Ok(room.id);
    }

    let room = service
        .create_chat_room(CreateRoomRequest {
            name: name.to_string(),
            room_type: Default::default(),
            creator_id: user_id.to_string(),
        })
        .await?;

    info!("Created default room {} ({})", room.id, name);
    Ok(room.id)
}

#[derive(Debug, Default)]
struct Store {
    /// Insertion order is listing order
    rooms: Vec<RoomResponse>,
    members: Vec<RoomMember>,
    messages: Vec<StoredMessage>,
}

impl Store {
    fn room(&self, room_id: &RoomId) -> Option<&RoomResponse> {
        self.rooms.iter().find(|r| &r.id == room_id)
    }

    fn room_mut(&mut self, room_id: &RoomId) -> Option<&mut RoomResponse> {
        self.rooms.iter_mut().find(|r| &r.id == room_id)
    }
}

/// In-memory `ChatService`
pub struct MemoryService {
    key: Vec<u8>,
    store: RwLock<Store>,
}

impl MemoryService {
    /// Create an empty store encrypting message content with `key`
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            store: RwLock::new(Store::default()),
        }
    }
}

#[async_trait]
impl ChatService for MemoryService {
    async fn create_message(
        &self,
        username: &str,
        room_id: &RoomId,
        content: &str,
    ) -> Result<StoredMessage, ServiceError> {
        let encrypted_content = codec::encrypt(content, &self.key)?;

        let mut store = self.store.write().await;
        if store.room(room_id).is_none() {
            return Err(ServiceError::RoomNotFound(room_id.to_string()));
        }

        let message = StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender: username.to_string(),
            room_id: room_id.clone(),
            encrypted_content,
            reply_to: None,
            created_at: Utc::now(),
            updated_at: None,
            is_edited: false,
        };
        store.messages.push(message.clone());

        debug!("Stored message {} in room {}", message.id, room_id);
        Ok(message)
    }

    async fn get_messages_by_room_id(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, ServiceError> {
        let stored: Vec<StoredMessage> = {
            let store = self.store.read().await;
            let in_room: Vec<&StoredMessage> = store
                .messages
                .iter()
                .filter(|m| &m.room_id == room_id)
                .collect();
            let skip = in_room.len().saturating_sub(limit);
            in_room.into_iter().skip(skip).cloned().collect()
        };

        stored
            .into_iter()
            .map(|m| -> Result<HistoryMessage, ServiceError> {
                Ok(HistoryMessage {
                    content: codec::decrypt(&m.encrypted_content, &self.key)?,
                    id: m.id,
                    room_id: m.room_id.to_string(),
                    username: m.sender,
                    created_at: m.created_at,
                })
            })
            .collect()
    }

    async fn create_chat_room(&self, req: CreateRoomRequest) -> Result<RoomResponse, ServiceError> {
        if req.name.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("room name is required".to_string()));
        }

        let room = RoomResponse {
            id: RoomId::generate(),
            name: req.name,
            room_type: req.room_type,
            creator_id: req.creator_id,
            created_at: Utc::now(),
        };

        self.store.write().await.rooms.push(room.clone());
        info!("Created room {} ({})", room.id, room.name);
        Ok(room)
    }

    async fn get_chat_room_by_id(&self, room_id: &RoomId) -> Result<RoomResponse, ServiceError> {
        self.store
            .read()
            .await
            .room(room_id)
            .cloned()
            .ok_or_else(|| ServiceError::RoomNotFound(room_id.to_string()))
    }

    async fn get_all_chat_rooms(&self) -> Result<Vec<RoomResponse>, ServiceError> {
        Ok(self.store.read().await.rooms.clone())
    }

    async fn update_chat_room(&self, req: UpdateRoomRequest) -> Result<RoomResponse, ServiceError> {
        if req.name.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("room name is required".to_string()));
        }

        let mut store = self.store.write().await;
        let room = store
            .room_mut(&req.id)
            .ok_or_else(|| ServiceError::RoomNotFound(req.id.to_string()))?;

        room.name = req.name;
        if let Some(room_type) = req.room_type {
            room.room_type = room_type;
        }

        info!("Updated room {} ({})", room.id, room.name);
        Ok(room.clone())
    }

    async fn get_chat_rooms_by_user_id(
        &self,
        user_id: &ClientId,
    ) -> Result<Vec<RoomResponse>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .rooms
            .iter()
            .filter(|r| {
                store
                    .members
                    .iter()
                    .any(|m| &m.user_id == user_id && m.room_id == r.id)
            })
            .cloned()
            .collect())
    }

    async fn delete_chat_room(&self, room_id: &RoomId) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        if store.room(room_id).is_none() {
            return Err(ServiceError::RoomNotFound(room_id.to_string()));
        }

        store.rooms.retain(|r| &r.id != room_id);
        store.members.retain(|m| &m.room_id != room_id);
        store.messages.retain(|m| &m.room_id != room_id);

        info!("Deleted room {}", room_id);
        Ok(())
    }

    async fn add_user_to_chat_room(
        &self,
        user_id: &ClientId,
        room_id: &RoomId,
    ) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        if store.room(room_id).is_none() {
            return Err(ServiceError::RoomNotFound(room_id.to_string()));
        }

        let already = store
            .members
            .iter()
            .any(|m| &m.user_id == user_id && &m.room_id == room_id);
        if !already {
            store.members.push(RoomMember {
                user_id: user_id.clone(),
                room_id: room_id.clone(),
                joined_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn get_members_by_chat_room_id(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<RoomMember>, ServiceError> {
        let store = self.store.read().await;
        if store.room(room_id).is_none() {
            return Err(ServiceError::RoomNotFound(room_id.to_string()));
        }
        Ok(store
            .members
            .iter()
            .filter(|m| &m.room_id == room_id)
            .cloned()
            .collect())
    }
}
