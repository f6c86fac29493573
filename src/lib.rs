//! Group chat server library
//!
//! A multi-room WebSocket chat server built with tokio-tungstenite around a
//! single broadcast hub, with message history stored encrypted.
//!
//! # Features
//! - Named rooms, including a lazily created `Default` room
//! - Join/leave notices
//! - Fan-out of chat messages to every member of a room
//! - Durable history through a pluggable `ChatService`, encrypted at rest
//! - Room creation, renaming, listing, deletion and member queries
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` is the central actor and the only owner of the room registry
//! - Each connection runs a reader and a writer task (the pump)
//! - The hub hands messages to a writer only through that client's mailbox
//! - No locks around the registry - all access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use chat_hub::{handle_connection, Config, Hub, MemoryService, ServerContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(Config::default());
//!     let service = Arc::new(MemoryService::new(chat_hub::codec::generate_key().to_vec()));
//!     let (hub, handle) = Hub::new(service.clone(), &config.hub);
//!     tokio::spawn(hub.run());
//!
//!     let ctx = ServerContext { hub: handle, service, config };
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, ctx.clone()));
//!     }
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod pump;
pub mod room;
pub mod route;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use client::{Client, Mailbox};
pub use config::{Config, HubConfig};
pub use error::{AppError, CryptoError, SendError, ServiceError};
pub use handler::{handle_connection, ServerContext};
pub use hub::{Hub, HubCommand, HubHandle};
pub use message::{
    ChatMessage, ClientSummary, ErrorFrame, HistoryMessage, RoomResponse, UpdateRoomRequest,
};
pub use room::Room;
pub use route::Route;
pub use service::{ChatService, MemoryService};
pub use types::{ClientId, RoomId, SessionId};
