//! Error types for the chat hub
//!
//! Defines application-level errors, persistence errors, codec errors and
//! mailbox send errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send an error frame to the client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Connection write failed (fatal)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Channel send error (fatal - hub has stopped)
    #[error("Channel send error")]
    ChannelSend,

    /// Required handshake parameter missing
    #[error("{0} is required")]
    MissingParameter(&'static str),

    /// Handshake parameter present but malformed
    #[error("Invalid {0}")]
    InvalidParameter(&'static str),

    /// Handshake path matches no endpoint
    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    /// Persistence collaborator failed
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Persistence collaborator errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No room with the given id
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Request rejected before touching storage
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Stored content could not be encrypted or decrypted
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Message codec errors
///
/// Only raised for a valid 32-byte key; a wrong-length key is a pass-through.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encoded text is not valid base64
    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Nonce region missing or integrity tag did not verify
    #[error("Authentication error")]
    Authentication,

    /// Cipher refused to encrypt
    #[error("Encryption error")]
    Encryption,
}

/// Mailbox send errors
///
/// Occurs when the hub pushes to a client mailbox.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The mailbox stayed full past the configured send timeout
    #[error("Mailbox send timed out")]
    Timeout,
}
