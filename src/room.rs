//! Room struct definition
//!
//! A named channel holding the set of connected clients for fan-out.
//! Only the hub loop mutates a room.

use std::collections::HashMap;

use crate::client::Client;
use crate::message::ClientSummary;
use crate::types::{ClientId, RoomId, SessionId};

/// Chat room
///
/// Members are keyed by client id; there is no ordering among them.
#[derive(Debug)]
pub struct Room {
    /// Room id for identification
    pub id: RoomId,
    /// Display name
    pub name: String,
    /// Connected members
    clients: HashMap<ClientId, Client>,
}

impl Room {
    pub fn new(id: RoomId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            clients: HashMap::new(),
        }
    }

    /// Add a client to the room
    ///
    /// Returns false (and drops `client`) if its id is already present.
    pub fn insert(&mut self, client: Client) -> bool {
        if self.clients.contains_key(&client.id) {
            return false;
        }
        self.clients.insert(client.id.clone(), client);
        true
    }

    /// Remove a client, handing back its record
    ///
    /// Only the registration identified by `session` is removed; a member with
    /// the same id from another connection is left alone.
    pub fn remove(&mut self, client_id: &ClientId, session: SessionId) -> Option<Client> {
        match self.clients.get(client_id) {
            Some(client) if client.session == session => self.clients.remove(client_id),
            _ => None,
        }
    }

    pub fn get(&self, client_id: &ClientId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    /// Number of connected members
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    pub fn summaries(&self) -> Vec<ClientSummary> {
        self.clients.values().map(Client::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{mailbox, Mailbox};

    fn client(id: &str) -> (Client, Mailbox) {
        let (tx, rx) = mailbox(4);
        (Client::new(ClientId::new(id), id, RoomId::new("r1"), tx), rx)
    }

    #[test]
    fn test_room_creation() {
        let room = Room::new(RoomId::new("r1"), "lobby");

        assert_eq!(room.id, RoomId::new("r1"));
        assert_eq!(room.name, "lobby");
        assert!(room.is_empty());
        assert_eq!(room.len(), 0);
    }

    #[test]
    fn test_room_insert_is_idempotent() {
        let mut room = Room::new(RoomId::new("r1"), "lobby");
        let (a, _rx_a) = client("a");
        let (a_again, _rx_again) = client("a");

        assert!(room.insert(a));
        assert!(!room.insert(a_again));
        assert_eq!(room.len(), 1);
        assert!(room.get(&ClientId::new("a")).is_some());
    }

    #[test]
    fn test_room_remove() {
        let mut room = Room::new(RoomId::new("r1"), "lobby");
        let (a, _rx_a) = client("a");
        let (b, _rx_b) = client("b");
        let session = a.session;
        room.insert(a);
        room.insert(b);

        let removed = room.remove(&ClientId::new("a"), session).unwrap();
        assert_eq!(removed.id, ClientId::new("a"));
        assert_eq!(room.len(), 1);
        assert!(room.get(&ClientId::new("a")).is_none());

        // Removing an absent client does nothing
        assert!(room.remove(&ClientId::new("zzz"), session).is_none());
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_room_remove_ignores_other_session() {
        let mut room = Room::new(RoomId::new("r1"), "lobby");
        let (first, _rx_first) = client("a");
        let (second, _rx_second) = client("a");
        let stale = second.session;
        room.insert(first);
        // Same id again is rejected, so `stale` never owned the slot
        room.insert(second);

        assert!(room.remove(&ClientId::new("a"), stale).is_none());
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_room_summaries() {
        let mut room = Room::new(RoomId::new("r1"), "lobby");
        let (a, _rx_a) = client("a");
        let (b, _rx_b) = client("b");
        room.insert(a);
        room.insert(b);

        let mut names: Vec<String> = room.summaries().into_iter().map(|c| c.username).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(room.members().count(), 2);
    }
}
