use axum::{
    debug_handler,
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{self, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppResult;

use super::{HubHandle, Payload, Registry};

const ADJECTIVES: [&str; 25] = [
    "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
    "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Sad",
    "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
];

const NOUNS: [&str; 24] = [
    "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
    "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
    "Unicorn", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra",
];

#[derive(Debug, Deserialize)]
pub(crate) struct WsQuery {
    #[serde(rename = "userID")]
    user_id: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<Uuid>,
    Query(WsQuery { user_id }): Query<WsQuery>,
    State(registry): State<Registry>,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let hub = registry.get_room(room_id).await?;
    let user_id = user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(anonymous_alias);

    Ok(ws.on_upgrade(move |socket| serve(socket, hub, user_id)))
}

pub(crate) fn anonymous_alias() -> String {
    let mut rng = rand::rng();
    format!(
        "{} {} #{:04}",
        ADJECTIVES[rng.random_range(0..ADJECTIVES.len())],
        NOUNS[rng.random_range(0..NOUNS.len())],
        rng.random_range(0..10_000),
    )
}

async fn serve(socket: WebSocket, hub: HubHandle, user_id: String) {
    let (client, mut outbound) = match hub.join(user_id).await {
        Ok(joined) => joined,
        Err(err) => {
            warn!(%err, "rejecting connection");
            return;
        }
    };
    drop(hub);

    info!(room_id = %client.room_id(), client_id = client.id(), user_id = %client.user_id(), "client connected");
    let (mut sender, mut receiver) = socket.split();

    let mut outbound_task = tokio::spawn(async move {
        while let Some(delivery) = outbound.recv().await {
            if sender.send(delivery.payload.to_ws()).await.is_err() {
                return;
            }
        }
        // buffer closed by the hub: unregistered, shed or room gone
        let _ = sender.send(ws::Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            _ = &mut outbound_task => break,
            frame = receiver.next() => match frame {
                Some(Ok(ws::Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!(client_id = client.id(), %err, "socket error");
                    break;
                }
                Some(Ok(msg)) => {
                    let Some(payload) = Payload::from_ws(msg) else {
                        continue;
                    };
                    if client.broadcast(payload).await.is_err() {
                        break;
                    }
                }
            },
        }
    }

    info!(room_id = %client.room_id(), client_id = client.id(), "client disconnected");
    client.leave().await;
    outbound_task.abort();
}
