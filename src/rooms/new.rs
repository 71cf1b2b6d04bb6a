use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;

use crate::AppResult;

use super::{Registry, RoomSummary};

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomBody {
    #[serde(alias = "roomName")]
    name: String,
    #[serde(default, alias = "description")]
    discription: String,
    /// Join the live room with the same name instead of making another.
    #[serde(default)]
    reuse: bool,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(registry): State<Registry>,
    Json(NewRoomBody { name, discription, reuse }): Json<NewRoomBody>,
) -> AppResult<Json<RoomSummary>> {
    let hub = if reuse {
        registry.open_room(name, discription).await?
    } else {
        registry.create_room(name, discription).await?
    };

    Ok(Json(hub.summary()))
}
