//! Hub actor implementation
//!
//! The central actor that owns the room registry. Every membership change and
//! every fan-out happens inside its single loop, one command at a time, so the
//! registry needs no locks.
//!
//! Broadcasts are persisted through the `ChatService` before fan-out; a
//! persistence failure is logged and delivery proceeds. Both the persistence
//! call and each mailbox push are awaited on the loop, so a full mailbox stalls
//! every room unless `HubConfig::send_timeout_ms` is set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::config::HubConfig;
use crate::error::{AppError, SendError};
use crate::message::{ChatMessage, ClientSummary};
use crate::room::Room;
use crate::service::ChatService;
use crate::types::{ClientId, RoomId, SessionId};

/// Commands sent from connections and handlers to the Hub actor
#[derive(Debug)]
pub enum HubCommand {
    /// Add a client to its room
    Register { client: Client },
    /// Remove one registration of a client from its room and notify the rest
    Unregister {
        client_id: ClientId,
        room_id: RoomId,
        session: SessionId,
    },
    /// Persist a message and deliver it to its room
    Broadcast { message: ChatMessage },
    /// Make a room known to the registry
    OpenRoom { room_id: RoomId, name: String },
    /// Change the display name of a known room
    RenameRoom { room_id: RoomId, name: String },
    /// Drop a room and every client in it
    CloseRoom { room_id: RoomId },
    /// List the connected members of a room
    RoomClients {
        room_id: RoomId,
        reply: oneshot::Sender<Vec<ClientSummary>>,
    },
}

/// The Hub actor
///
/// Created with [`Hub::new`] and driven by [`Hub::run`]; all other code talks
/// to it through a [`HubHandle`].
pub struct Hub {
    /// Room registry: RoomId -> Room
    rooms: HashMap<RoomId, Room>,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
    /// Persistence collaborator
    service: Arc<dyn ChatService>,
    /// Bound on a single mailbox push
    send_timeout: Option<Duration>,
}

impl Hub {
    /// Create a hub and the first handle to it
    pub fn new(service: Arc<dyn ChatService>, config: &HubConfig) -> (Self, HubHandle) {
        let (sender, receiver) = mpsc::channel(config.command_buffer.max(1));
        let hub = Self {
            rooms: HashMap::new(),
            receiver,
            service,
            send_timeout: config.send_timeout(),
        };
        (hub, HubHandle { sender })
    }

    /// Run the Hub event loop
    ///
    /// Handles one command per iteration until every handle is dropped.
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Hub shutting down ({} rooms)", self.rooms.len());
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { client } => self.handle_register(client),
            HubCommand::Unregister {
                client_id,
                room_id,
                session,
            } => {
                self.handle_unregister(client_id, room_id, session).await;
            }
            HubCommand::Broadcast { message } => self.handle_broadcast(message).await,
            HubCommand::OpenRoom { room_id, name } => self.handle_open_room(room_id, name),
            HubCommand::RenameRoom { room_id, name } => self.handle_rename_room(room_id, name),
            HubCommand::CloseRoom { room_id } => self.handle_close_room(room_id),
            HubCommand::RoomClients { room_id, reply } => {
                let clients = self
                    .rooms
                    .get(&room_id)
                    .map(Room::summaries)
                    .unwrap_or_default();
                let _ = reply.send(clients);
            }
        }
    }

    fn handle_register(&mut self, client: Client) {
        info!("Client {} registering for room {}", client.id, client.room_id);

        let Some(room) = self.rooms.get_mut(&client.room_id) else {
            warn!("Room {} not found in hub, dropping client {}", client.room_id, client.id);
            return;
        };

        let client_id = client.id.clone();
        if room.insert(client) {
            info!("Client {} added to room {}", client_id, room.id);
        } else {
            debug!("Client {} already in room {}", client_id, room.id);
        }
    }

    async fn handle_unregister(
        &mut self,
        client_id: ClientId,
        room_id: RoomId,
        session: SessionId,
    ) {
        info!("Client {} unregistering from room {}", client_id, room_id);

        let username = {
            let Some(room) = self.rooms.get(&room_id) else {
                return;
            };
            let Some(client) = room.get(&client_id) else {
                return;
            };
            // Another connection with the same id owns the slot
            if client.session != session {
                debug!("Stale session {} for client {}, ignoring", session, client_id);
                return;
            }
            client.username.clone()
        };

        // Notice goes out while the client is still registered
        let notice = ChatMessage::leave_notice(&room_id, &username);
        self.persist(&notice).await;
        self.fan_out(&room_id, &notice, Some(&client_id)).await;

        if let Some(room) = self.rooms.get_mut(&room_id) {
            // Dropping the record closes its mailbox
            if room.remove(&client_id, session).is_some() {
                info!("Client {} removed from room {}", client_id, room_id);
                debug!("Room {} has {} clients", room_id, room.len());
            }
        }
    }

    async fn handle_broadcast(&mut self, message: ChatMessage) {
        let room_id = RoomId::new(message.room_id.clone());
        debug!("Broadcasting message to room {}", room_id);

        if !self.rooms.contains_key(&room_id) {
            debug!("Room {} not found for message broadcast", room_id);
            return;
        }

        self.persist(&message).await;
        self.fan_out(&room_id, &message, None).await;
    }

    fn handle_open_room(&mut self, room_id: RoomId, name: String) {
        if self.rooms.contains_key(&room_id) {
            return;
        }
        info!("Creating new room in hub: {} ({})", room_id, name);
        self.rooms.insert(room_id.clone(), Room::new(room_id, name));
    }

    fn handle_rename_room(&mut self, room_id: RoomId, name: String) {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            debug!("Room {} not found in hub, nothing to rename", room_id);
            return;
        };
        info!("Room {} renamed from {} to {}", room_id, room.name, name);
        room.name = name;
    }

    fn handle_close_room(&mut self, room_id: RoomId) {
        if let Some(room) = self.rooms.remove(&room_id) {
            info!("Room {} closed with {} clients", room_id, room.len());
        }
    }

    /// Helper: store a message, logging rather than propagating failure
    async fn persist(&self, message: &ChatMessage) {
        let room_id = RoomId::new(message.room_id.clone());
        if let Err(e) = self
            .service
            .create_message(&message.username, &room_id, &message.content)
            .await
        {
            error!("Failed to store message for room {}: {}", room_id, e);
        }
    }

    /// Helper: push a message onto every member mailbox, optionally skipping one
    async fn fan_out(&self, room_id: &RoomId, message: &ChatMessage, skip: Option<&ClientId>) {
        let Some(room) = self.rooms.get(room_id) else {
            return;
        };

        for client in room.members() {
            if skip == Some(&client.id) {
                continue;
            }

            match client.send(message.clone(), self.send_timeout).await {
                Ok(()) => debug!("Sent message to client {} in room {}", client.id, room_id),
                Err(SendError::ChannelClosed) => {
                    debug!("Mailbox of client {} already closed", client.id);
                }
                Err(SendError::Timeout) => {
                    warn!("Dropped message for slow client {} in room {}", client.id, room_id);
                }
            }
        }
    }
}

/// Cloneable handle to a running [`Hub`]
///
/// Every method fails with `AppError::ChannelSend` once the hub has stopped.
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn send(&self, cmd: HubCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }

    pub async fn register(&self, client: Client) -> Result<(), AppError> {
        self.send(HubCommand::Register { client }).await
    }

    pub async fn unregister(
        &self,
        client_id: ClientId,
        room_id: RoomId,
        session: SessionId,
    ) -> Result<(), AppError> {
        self.send(HubCommand::Unregister {
            client_id,
            room_id,
            session,
        })
        .await
    }

    pub async fn broadcast(&self, message: ChatMessage) -> Result<(), AppError> {
        self.send(HubCommand::Broadcast { message }).await
    }

    pub async fn open_room(
        &self,
        room_id: RoomId,
        name: impl Into<String>,
    ) -> Result<(), AppError> {
        self.send(HubCommand::OpenRoom {
            room_id,
            name: name.into(),
        })
        .await
    }

    pub async fn rename_room(
        &self,
        room_id: RoomId,
        name: impl Into<String>,
    ) -> Result<(), AppError> {
        self.send(HubCommand::RenameRoom {
            room_id,
            name: name.into(),
        })
        .await
    }

    pub async fn close_room(&self, room_id: RoomId) -> Result<(), AppError> {
        self.send(HubCommand::CloseRoom { room_id }).await
    }

    pub async fn room_clients(&self, room_id: RoomId) -> Result<Vec<ClientSummary>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::RoomClients { room_id, reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }
}
