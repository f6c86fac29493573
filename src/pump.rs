//! Connection pump
//!
//! Adapts one WebSocket into two concurrent loops sharing a client:
//! the reader turns inbound frames into hub broadcasts, the writer drains the
//! client mailbox onto the socket. The only state they share is the socket's
//! sink half; the writer alone closes it, once the mailbox is closed.

use std::fmt::Display;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

use crate::client::Mailbox;
use crate::error::AppError;
use crate::hub::HubHandle;
use crate::message::{ChatMessage, ErrorFrame};
use crate::types::{ClientId, RoomId, SessionId};

/// Sink half shared by the reader and writer of one connection
pub type SharedSink<S> = Arc<Mutex<S>>;

/// Run both halves for a registered client until the connection ends
///
/// The writer is spawned; the reader runs on the calling task. Returns once
/// the reader has unregistered the client and the writer has closed the sink.
pub async fn pump<St, E, S>(
    stream: St,
    sink: S,
    mailbox: Mailbox,
    client_id: ClientId,
    room_id: RoomId,
    session: SessionId,
    hub: HubHandle,
) where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    let sink = Arc::new(Mutex::new(sink));

    let writer = tokio::spawn(run_writer(mailbox, sink.clone(), client_id.clone()));
    run_reader(stream, sink, &client_id, &room_id, session, &hub).await;

    if let Err(e) = writer.await {
        error!("Write task for {} failed: {}", client_id, e);
    }
}

/// Reader loop: inbound frames → hub broadcast intake
///
/// Invalid messages get an error frame and the loop continues. Close frames,
/// transport errors and end of stream end it, after which this connection's
/// registration (`session`) is unregistered.
pub async fn run_reader<St, E, S>(
    mut stream: St,
    sink: SharedSink<S>,
    client_id: &ClientId,
    room_id: &RoomId,
    session: SessionId,
    hub: &HubHandle,
) where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let mut message = match serde_json::from_str::<ChatMessage>(&text) {
                    Ok(message) if message.is_valid() => message,
                    _ => {
                        warn!("Invalid message format from {}", client_id);
                        if let Err(e) = write_json(&sink, &ErrorFrame::invalid_message()).await {
                            debug!("Could not report invalid message to {}: {}", client_id, e);
                            break;
                        }
                        continue;
                    }
                };

                // Clients cannot post into a room they are not in
                message.room_id = room_id.to_string();

                if hub.broadcast(message).await.is_err() {
                    debug!("Hub closed, ending read task for {}", client_id);
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!("Client {} sent close frame", client_id);
                break;
            }
            Ok(_) => {
                // Binary, ping and pong frames carry nothing for the hub
            }
            Err(e) => {
                debug!("WebSocket error for {}: {}", client_id, e);
                break;
            }
        }
    }

    debug!("Read task ended for {}", client_id);

    if hub
        .unregister(client_id.clone(), room_id.clone(), session)
        .await
        .is_err()
    {
        debug!("Hub closed before {} could unregister", client_id);
    }
}

/// Writer loop: client mailbox → connection
///
/// Ends when the mailbox is closed or a write fails, then closes the sink.
pub async fn run_writer<S>(mut mailbox: Mailbox, sink: SharedSink<S>, client_id: ClientId)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(message) = mailbox.recv().await {
        match write_json(&sink, &message).await {
            Ok(()) => {}
            Err(AppError::Json(e)) => {
                error!("Failed to serialize message: {}", e);
            }
            Err(e) => {
                debug!("Write to {} failed, ending write task: {}", client_id, e);
                break;
            }
        }
    }

    debug!("Write task ended for {}", client_id);

    if let Err(e) = sink.lock().await.close().await {
        debug!("Closing connection of {} failed: {}", client_id, e);
    }
}

/// Serialize `value` and write it as one text frame
pub async fn write_json<S, T>(sink: &SharedSink<S>, value: &T) -> Result<(), AppError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    sink.lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| AppError::Transport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{mailbox, Client};
    use crate::codec;
    use crate::config::HubConfig;
    use crate::hub::Hub;
    use crate::message::{CreateRoomRequest, LEAVE_NOTICE};
    use crate::service::{ChatService, MemoryService};
    use crate::test_support::{text, CaptureSink};
    use futures_util::stream;

    async fn start_hub() -> (HubHandle, RoomId) {
        let service = Arc::new(MemoryService::new(codec::generate_key().to_vec()));
        let room = service
            .create_chat_room(CreateRoomRequest {
                name: "r1".to_string(),
                room_type: Default::default(),
                creator_id: "1".to_string(),
            })
            .await
            .unwrap();

        let (hub, handle) = Hub::new(service, &HubConfig::default());
        tokio::spawn(hub.run());
        handle.open_room(room.id.clone(), "r1").await.unwrap();
        (handle, room.id)
    }

    async fn join(hub: &HubHandle, id: &str, room: &RoomId) -> (Mailbox, SessionId) {
        let (tx, rx) = mailbox(16);
        let client = Client::new(ClientId::new(id), id, room.clone(), tx);
        let session = client.session;
        hub.register(client).await.unwrap();
        (rx, session)
    }

    #[tokio::test]
    async fn test_writer_drains_mailbox_then_closes() {
        let (tx, rx) = mailbox(4);
        let sink = CaptureSink::default();
        let room = RoomId::new("r1");

        tx.send(ChatMessage::new("one", &room, "A")).await.unwrap();
        tx.send(ChatMessage::new("two", &room, "B")).await.unwrap();
        drop(tx);

        run_writer(rx, Arc::new(Mutex::new(sink.clone())), ClientId::new("A")).await;

        let frames = sink.json();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["content"], "one");
        assert_eq!(frames[1]["username"], "B");
        assert_eq!(frames[1]["roomId"], "r1");
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_reader_stamps_room_and_reports_invalid_messages() {
        let (hub, room) = start_hub().await;
        let (mut observer, _) = join(&hub, "B", &room).await;
        let (_a, session) = join(&hub, "A", &room).await;

        let frames = stream::iter(vec![
            text(r#"{"content":"","roomId":"x","username":"A"}"#),
            text("not json"),
            text(r#"{"content":"hi","roomId":"elsewhere","username":"A"}"#),
            Ok(Message::Close(None)),
            text(r#"{"content":"after close","username":"A"}"#),
        ]);
        let sink = CaptureSink::default();

        run_reader(
            frames,
            Arc::new(Mutex::new(sink.clone())),
            &ClientId::new("A"),
            &room,
            session,
            &hub,
        )
        .await;

        let errors = sink.json();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| e["error"] == "Invalid message format"));

        let received = observer.recv().await.unwrap();
        assert_eq!(received, ChatMessage::new("hi", &room, "A"));

        // Reader exit unregisters the client, which tells the rest of the room
        let notice = observer.recv().await.unwrap();
        assert_eq!(notice.content, LEAVE_NOTICE);
        assert!(hub
            .room_clients(room.clone())
            .await
            .unwrap()
            .iter()
            .all(|c| c.id != ClientId::new("A")));
    }

    #[tokio::test]
    async fn test_reader_ends_on_transport_error() {
        let (hub, room) = start_hub().await;
        let (mut observer, _) = join(&hub, "B", &room).await;
        let (_a, session) = join(&hub, "A", &room).await;

        let frames = stream::iter(vec![
            Err("connection reset".to_string()),
            text(r#"{"content":"never","username":"A"}"#),
        ]);

        run_reader(
            frames,
            Arc::new(Mutex::new(CaptureSink::default())),
            &ClientId::new("A"),
            &room,
            session,
            &hub,
        )
        .await;

        assert_eq!(observer.recv().await.unwrap().content, LEAVE_NOTICE);
    }

    #[tokio::test]
    async fn test_pump_echoes_then_releases_connection() {
        let (hub, room) = start_hub().await;
        let (mailbox, session) = join(&hub, "A", &room).await;

        let frames = stream::iter(vec![text(r#"{"content":"hi","username":"A"}"#)]);
        let sink = CaptureSink::default();

        pump(
            frames,
            sink.clone(),
            mailbox,
            ClientId::new("A"),
            room.clone(),
            session,
            hub.clone(),
        )
        .await;

        let written = sink.json();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0]["content"], "hi");
        assert_eq!(written[0]["roomId"], room.to_string());
        assert!(sink.is_closed());
        assert!(hub.room_clients(room).await.unwrap().is_empty());
    }
}
