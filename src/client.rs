//! Client struct definition
//!
//! The hub-side record of one connected, room-joined participant and the
//! bounded mailbox the hub uses to hand it messages.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::{ChatMessage, ClientSummary};
use crate::types::{ClientId, RoomId, SessionId};

/// Receiving end of a client mailbox, drained by the writer task
pub type Mailbox = mpsc::Receiver<ChatMessage>;

/// Create a bounded mailbox with room for `capacity` pending messages
pub fn mailbox(capacity: usize) -> (mpsc::Sender<ChatMessage>, Mailbox) {
    mpsc::channel(capacity.max(1))
}

/// Connected client information
///
/// The client owns the only sender of its mailbox, so dropping the client
/// closes the mailbox and ends the writer task.
#[derive(Debug)]
pub struct Client {
    /// User id supplied on join
    pub id: ClientId,
    /// Display name supplied on join
    pub username: String,
    /// Room this client is registered in
    pub room_id: RoomId,
    /// This connection's registration, distinct across reconnects of one id
    pub session: SessionId,
    /// Hub → Client mailbox
    sender: mpsc::Sender<ChatMessage>,
}

impl Client {
    pub fn new(
        id: ClientId,
        username: impl Into<String>,
        room_id: RoomId,
        sender: mpsc::Sender<ChatMessage>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            room_id,
            session: SessionId::new(),
            sender,
        }
    }

    /// Push a message onto this client's mailbox
    ///
    /// Waits while the mailbox is full; with `timeout` set, gives up after it.
    /// Returns an error if the writer has gone away.
    pub async fn send(
        &self,
        msg: ChatMessage,
        timeout: Option<Duration>,
    ) -> Result<(), SendError> {
        match timeout {
            None => self
                .sender
                .send(msg)
                .await
                .map_err(|_| SendError::ChannelClosed),
            Some(limit) => match tokio::time::timeout(limit, self.sender.send(msg)).await {
                Ok(result) => result.map_err(|_| SendError::ChannelClosed),
                Err(_) => Err(SendError::Timeout),
            },
        }
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}
