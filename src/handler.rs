//! WebSocket connection handler
//!
//! Handles individual connections: WebSocket handshake, route selection,
//! the join handshake that turns a connection into a registered client, and
//! the one-shot room and history queries.

use std::fmt::Display;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::client::{self, Client};
use crate::config::Config;
use crate::error::{AppError, ServiceError};
use crate::hub::HubHandle;
use crate::message::{ChatMessage, CreateRoomRequest, ErrorFrame, UpdateRoomRequest};
use crate::pump;
use crate::route::Route;
use crate::service::{self as chat_service, ChatService};
use crate::types::{ClientId, RoomId};

/// Name of the join and room-query parameter in error frames
const USER_ID: &str = "User ID";

/// Everything a connection needs from the running server
#[derive(Clone)]
pub struct ServerContext {
    pub hub: HubHandle,
    pub service: Arc<dyn ChatService>,
    pub config: Arc<Config>,
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, picks the route from the request URI
/// and serves it.
pub async fn handle_connection(stream: TcpStream, ctx: ServerContext) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let mut target = None;
    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            target = Some((
                req.uri().path().to_string(),
                req.uri().query().map(str::to_string),
            ));
            Ok(resp)
        },
    )
    .await?;

    let (path, query) = target.unwrap_or_default();
    let (ws_sender, ws_receiver) = ws_stream.split();

    match Route::parse(&path, query.as_deref()) {
        Ok(route) => {
            debug!("{} requested {:?}", peer_addr, route);
            serve(ctx, route, ws_sender, ws_receiver).await
        }
        Err(e) => {
            warn!("Rejecting {} from {}: {}", path, peer_addr, e);
            reject(ws_sender, e.to_string()).await
        }
    }
}

/// Serve one route over an established connection
pub async fn serve<S, St, E>(
    ctx: ServerContext,
    route: Route,
    sink: S,
    mut stream: St,
) -> Result<(), AppError>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    match route {
        Route::JoinRoom {
            room_id,
            user_id,
            username,
        } => join_room(ctx, sink, stream, room_id, user_id, username).await,

        Route::CreateRoom { user_id } => {
            let Some(user_id) = non_empty(user_id) else {
                return reject(sink, AppError::MissingParameter(USER_ID).to_string()).await;
            };

            let Some(mut req) = next_json::<CreateRoomRequest, _, _>(&mut stream).await else {
                return reject(sink, ErrorFrame::invalid_message().error).await;
            };
            if req.creator_id.is_empty() {
                req.creator_id = user_id;
            }

            match ctx.service.create_chat_room(req).await.map_err(AppError::from) {
                Ok(room) => {
                    ctx.hub.open_room(room.id.clone(), room.name.clone()).await?;
                    respond(sink, &room).await
                }
                Err(e) => reject(sink, e.to_string()).await,
            }
        }

        Route::AllRooms => reply(sink, ctx.service.get_all_chat_rooms().await).await,

        Route::UserRooms { user_id } => {
            let Some(user_id) = non_empty(user_id) else {
                return reject(sink, AppError::MissingParameter(USER_ID).to_string()).await;
            };
            let rooms = ctx
                .service
                .get_chat_rooms_by_user_id(&ClientId::new(user_id))
                .await;
            reply(sink, rooms).await
        }

        Route::RoomClients { room_id } => {
            let clients = match ctx.service.get_chat_room_by_id(&room_id).await {
                Ok(_) => ctx.hub.room_clients(room_id).await?,
                Err(_) => Vec::new(),
            };
            respond(sink, &clients).await
        }

        Route::Messages {
            room_id,
            limit,
            user_id,
        } => {
            let room_id = if room_id.is_default_sentinel() {
                let user_id = ClientId::new(user_id.unwrap_or_default());
                match chat_service::ensure_default_room(
                    ctx.service.as_ref(),
                    &ctx.config.service.default_room_name,
                    &user_id,
                )
                .await
                {
                    Ok(id) => id,
                    Err(e) => {
                        error!("Failed to ensure default room: {}", e);
                        return reject(sink, "Failed to ensure default room").await;
                    }
                }
            } else {
                room_id
            };

            reply(sink, ctx.service.get_messages_by_room_id(&room_id, limit).await).await
        }

        Route::UpdateRoom => {
            let Some(req) = next_json::<UpdateRoomRequest, _, _>(&mut stream).await else {
                return reject(sink, ErrorFrame::invalid_message().error).await;
            };

            match ctx.service.update_chat_room(req).await.map_err(AppError::from) {
                Ok(room) => {
                    ctx.hub.rename_room(room.id.clone(), room.name.clone()).await?;
                    respond(sink, &room).await
                }
                Err(e) => reject(sink, e.to_string()).await,
            }
        }

        Route::DeleteRoom { room_id } => {
            match ctx.service.delete_chat_room(&room_id).await.map_err(AppError::from) {
                Ok(()) => {
                    ctx.hub.close_room(room_id.clone()).await?;
                    respond(sink, &serde_json::json!({ "deleted": room_id })).await
                }
                Err(e) => reject(sink, e.to_string()).await,
            }
        }
    }
}

/// Join handshake: resolve and validate the room, record membership,
/// register the client with the hub, announce it, then run the pump.
async fn join_room<S, St, E>(
    ctx: ServerContext,
    sink: S,
    stream: St,
    room_id: RoomId,
    user_id: Option<String>,
    username: String,
) -> Result<(), AppError>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let Some(user_id) = non_empty(user_id) else {
        let e = AppError::MissingParameter(USER_ID);
        warn!("Join rejected: {}", e);
        return reject(sink, e.to_string()).await;
    };
    let user_id = ClientId::new(user_id);

    info!(
        "Client {} (username: {}) attempting to join room {}",
        user_id, username, room_id
    );

    let room_id = if room_id.is_default_sentinel() {
        match chat_service::ensure_default_room(
            ctx.service.as_ref(),
            &ctx.config.service.default_room_name,
            &user_id,
        )
        .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to ensure default room: {}", e);
                return reject(sink, "Failed to create default room").await;
            }
        }
    } else {
        room_id
    };

    let room = match ctx.service.get_chat_room_by_id(&room_id).await {
        Ok(room) => room,
        Err(_) => {
            warn!("Room not found: {}", room_id);
            return reject(sink, "Room not found").await;
        }
    };

    let members = match ctx.service.get_members_by_chat_room_id(&room_id).await {
        Ok(members) => members,
        Err(e) => {
            error!("Failed to get room members: {}", e);
            return reject(sink, "Failed to get room members").await;
        }
    };

    if !members.iter().any(|m| m.user_id == user_id) {
        if let Err(e) = ctx.service.add_user_to_chat_room(&user_id, &room_id).await {
            error!("Failed to add user to room: {}", e);
            return reject(sink, "Failed to add user to room").await;
        }
    }

    ctx.hub.open_room(room_id.clone(), room.name).await?;

    let (sender, mailbox) = client::mailbox(ctx.config.hub.mailbox_capacity);
    let client = Client::new(user_id.clone(), username.clone(), room_id.clone(), sender);
    let session = client.session;

    info!("Registering client {} in room {}", user_id, room_id);
    ctx.hub.register(client).await?;
    ctx.hub
        .broadcast(ChatMessage::join_notice(&room_id, &username))
        .await?;

    pump::pump(
        stream,
        sink,
        mailbox,
        user_id.clone(),
        room_id,
        session,
        ctx.hub,
    )
    .await;

    info!("Client {} disconnected", user_id);
    Ok(())
}

/// Write one JSON reply and close the connection
async fn respond<S, T>(mut sink: S, value: &T) -> Result<(), AppError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| AppError::Transport(e.to_string()))?;
    sink.close()
        .await
        .map_err(|e| AppError::Transport(e.to_string()))
}

/// Write a service result, or its error as an error frame, and close
async fn reply<S, T>(sink: S, result: Result<T, ServiceError>) -> Result<(), AppError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    T: Serialize,
{
    match result.map_err(AppError::from) {
        Ok(value) => respond(sink, &value).await,
        Err(e) => reject(sink, e.to_string()).await,
    }
}

/// Write an error frame and close the connection
async fn reject<S>(sink: S, error: impl Into<String>) -> Result<(), AppError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    respond(sink, &ErrorFrame::new(error)).await
}

/// Next text frame parsed as `T`; `None` on bad JSON or end of stream
async fn next_json<T, St, E>(stream: &mut St) -> Option<T>
where
    T: serde::de::DeserializeOwned,
    St: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
