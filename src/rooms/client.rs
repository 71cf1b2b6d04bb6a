use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use super::{
    error::RoomError,
    hub::BroadcastIntent,
    msg::{Delivery, Payload},
};

pub type ClientId = u64;

pub type Outbound = mpsc::Receiver<Arc<Delivery>>;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Hub-side half of a connection. Owning the only `Sender` of the outbound
/// buffer means dropping this value is what closes the buffer.
#[derive(Debug)]
pub(crate) struct Client {
    pub(crate) id: ClientId,
    pub(crate) user_id: String,
    outbound: mpsc::Sender<Arc<Delivery>>,
}

impl Client {
    pub(crate) fn new(user_id: String, capacity: usize) -> (Self, Outbound) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let client = Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            user_id,
            outbound,
        };
        (client, rx)
    }

    pub(crate) fn try_deliver(
        &self,
        delivery: &Arc<Delivery>,
    ) -> Result<(), TrySendError<Arc<Delivery>>> {
        self.outbound.try_send(Arc::clone(delivery))
    }
}

/// Transport-side half of a connection. Holds only weak references to the
/// hub's intent queues, so a live connection never keeps a room alive.
#[derive(Debug)]
pub struct ClientHandle {
    id: ClientId,
    user_id: String,
    room_id: Uuid,
    unregister: mpsc::WeakSender<ClientId>,
    broadcast: mpsc::WeakSender<BroadcastIntent>,
}

impl ClientHandle {
    pub(crate) fn new(
        client: &Client,
        room_id: Uuid,
        unregister: mpsc::WeakSender<ClientId>,
        broadcast: mpsc::WeakSender<BroadcastIntent>,
    ) -> Self {
        Self {
            id: client.id,
            user_id: client.user_id.clone(),
            room_id,
            unregister,
            broadcast,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    /// Queues `payload` for fan-out to the rest of the room.
    pub async fn broadcast(&self, payload: Payload) -> Result<(), RoomError> {
        let broadcast = self
            .broadcast
            .upgrade()
            .ok_or(RoomError::Closed(self.room_id))?;

        broadcast
            .send(BroadcastIntent {
                sender_id: self.id,
                sender: self.user_id.clone(),
                payload,
            })
            .await
            .map_err(|_| RoomError::Closed(self.room_id))
    }

    /// Asks the hub to drop this client. A hub that is already gone has
    /// closed the buffer itself, so failure here is not an error.
    pub async fn leave(self) {
        let Some(unregister) = self.unregister.upgrade() else {
            return;
        };
        if unregister.send(self.id).await.is_err() {
            debug!(client_id = self.id, room_id = %self.room_id, "hub gone before unregister");
        }
    }
}
