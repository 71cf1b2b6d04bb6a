use axum::{Json, debug_handler, extract::{Path, State}};
use uuid::Uuid;

use crate::AppResult;

use super::{Message, Registry, RoomSummary};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn rooms(State(registry): State<Registry>) -> Json<Vec<RoomSummary>> {
    Json(registry.list_rooms().await)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn messages(
    State(registry): State<Registry>,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(registry.history(room_id).await?))
}
