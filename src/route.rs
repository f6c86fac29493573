//! Request routing
//!
//! Every endpoint is a WebSocket upgrade; the handshake URI picks the route.

use serde::Deserialize;

use crate::error::AppError;
use crate::types::RoomId;

/// Endpoint selected by the handshake URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/ws/joinRoom/{roomId}?userId=&username=`
    JoinRoom {
        room_id: RoomId,
        user_id: Option<String>,
        username: String,
    },
    /// `/ws/createRoom?userId=`
    CreateRoom { user_id: Option<String> },
    /// `/ws/getAllRooms`
    AllRooms,
    /// `/ws/getRooms?userId=`
    UserRooms { user_id: Option<String> },
    /// `/ws/getRoomClients/{roomId}`
    RoomClients { room_id: RoomId },
    /// `/ws/getMessages/{roomId}/{limit}?userId=`
    Messages {
        room_id: RoomId,
        limit: usize,
        user_id: Option<String>,
    },
    /// `/ws/updateRoom`, request body arrives as the first frame
    UpdateRoom,
    /// `/ws/deleteRoom/{roomId}`
    DeleteRoom { room_id: RoomId },
}

#[derive(Debug, Default, Deserialize)]
struct Query {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    username: Option<String>,
}

impl Route {
    /// Parse a request path and optional query string
    pub fn parse(path: &str, query: Option<&str>) -> Result<Self, AppError> {
        let query: Query = serde_urlencoded::from_str(query.unwrap_or(""))
            .map_err(|_| AppError::InvalidParameter("query"))?;
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        let route = match segments.as_slice() {
            ["ws", "joinRoom", room_id] => Route::JoinRoom {
                room_id: RoomId::new(*room_id),
                user_id: query.user_id,
                username: query.username.unwrap_or_default(),
            },
            ["ws", "createRoom"] => Route::CreateRoom {
                user_id: query.user_id,
            },
            ["ws", "getAllRooms"] => Route::AllRooms,
            ["ws", "getRooms"] => Route::UserRooms {
                user_id: query.user_id,
            },
            ["ws", "getRoomClients", room_id] => Route::RoomClients {
                room_id: RoomId::new(*room_id),
            },
            ["ws", "getMessages", room_id, limit] => Route::Messages {
                room_id: RoomId::new(*room_id),
                limit: limit
                    .parse()
                    .map_err(|_| AppError::InvalidParameter("limit"))?,
                user_id: query.user_id,
            },
            ["ws", "updateRoom"] => Route::UpdateRoom,
            ["ws", "deleteRoom", room_id] => Route::DeleteRoom {
                room_id: RoomId::new(*room_id),
            },
            _ => return Err(AppError::UnknownRoute(path.to_string())),
        };

        Ok(route)
    }
}
