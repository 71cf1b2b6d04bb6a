mod client;
mod error;
mod hub;
mod list;
mod msg;
mod new;
mod registry;
mod room;
mod ws;

use axum::{Json, Router, debug_handler, routing::{get, post}};
use uuid::Uuid;

use crate::AppState;

pub use client::{ClientHandle, ClientId, Outbound};
pub use error::RoomError;
pub use hub::{HubConfig, HubHandle, HubState};
pub use msg::{Delivery, Message, Payload};
pub use registry::Registry;
pub use room::{Presence, RoomInfo, RoomSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createroom", post(new::new_room))
        .route("/rooms", get(list::rooms))
        .route("/getRooms", get(list::rooms))
        .route("/rooms/{room_id}/messages", get(list::messages))
        .route("/sessionid", get(session_id))
        .route("/ws/{room_id}", get(ws::room_ws))
}

#[debug_handler]
async fn session_id() -> Json<Uuid> {
    Json(Uuid::now_v7())
}
