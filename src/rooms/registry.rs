use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::{
    error::RoomError,
    hub::{HubConfig, HubHandle},
    msg::Message,
    room::{RoomInfo, RoomSummary},
};

/// Process-wide map of live rooms. Cheap to clone.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

struct Inner {
    rooms: RwLock<HashMap<Uuid, HubHandle>>,
    config: HubConfig,
    lifetime: Option<Duration>,
    root: CancellationToken,
}

impl Registry {
    /// `lifetime` of `None` keeps rooms until the process exits.
    pub fn new(config: HubConfig, lifetime: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                rooms: RwLock::new(HashMap::new()),
                config,
                lifetime,
                root: CancellationToken::new(),
            }),
        }
    }

    /// Allocates a fresh room and starts its hub.
    pub async fn create_room(&self, name: String, description: String) -> Result<HubHandle, RoomError> {
        let info = RoomInfo::new(name, description);
        let mut rooms = self.inner.rooms.write().await;
        self.insert(&mut rooms, info)
    }

    /// Like [`Registry::create_room`], but returns the live room already
    /// called `name` if there is one. The first caller creates it.
    pub async fn open_room(&self, name: String, description: String) -> Result<HubHandle, RoomError> {
        let mut rooms = self.inner.rooms.write().await;
        if let Some(hub) = rooms.values().find(|hub| hub.info().name == name && hub.is_accepting()) {
            return Ok(hub.clone());
        }
        self.insert(&mut rooms, RoomInfo::new(name, description))
    }

    fn insert(&self, rooms: &mut HashMap<Uuid, HubHandle>, info: RoomInfo) -> Result<HubHandle, RoomError> {
        let id = info.id;
        if self.inner.root.is_cancelled() {
            return Err(RoomError::Closed(id));
        }
        if rooms.contains_key(&id) {
            return Err(RoomError::AlreadyExists(id));
        }

        let hub = HubHandle::spawn(info, self.inner.config, self.inner.root.child_token());
        rooms.insert(id, hub.clone());
        info!(room_id = %id, name = %hub.info().name, "room created");

        spawn_reaper(Arc::downgrade(&self.inner), hub.clone(), self.inner.lifetime);
        Ok(hub)
    }

    /// Looks up a room that still takes registrations.
    pub async fn get_room(&self, id: Uuid) -> Result<HubHandle, RoomError> {
        self.inner
            .rooms
            .read()
            .await
            .get(&id)
            .filter(|hub| hub.is_accepting())
            .cloned()
            .ok_or(RoomError::NotFound(id))
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<_> = self
            .inner
            .rooms
            .read()
            .await
            .values()
            .filter(|hub| hub.is_accepting())
            .map(HubHandle::summary)
            .collect();
        rooms.sort_by_key(|room| (room.time, room.id));
        rooms
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<Message>, RoomError> {
        self.get_room(id).await?.history().await
    }

    /// Returns whether a room was removed. The hub stops accepting before the
    /// write lock is released, so no lookup can hand it out afterwards.
    pub async fn remove_room(&self, id: Uuid) -> bool {
        let mut rooms = self.inner.rooms.write().await;
        let Some(hub) = rooms.remove(&id) else {
            return false;
        };
        hub.shutdown();
        info!(room_id = %id, "room removed");
        true
    }

    /// Shuts every room down and refuses new ones.
    pub async fn shutdown(&self) {
        let mut rooms = self.inner.rooms.write().await;
        self.inner.root.cancel();
        for (_, hub) in rooms.drain() {
            hub.shutdown();
        }
        info!("registry shut down");
    }

    pub async fn len(&self) -> usize {
        self.inner.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Removes the room once its lease runs out or its hub stops on its own,
/// whichever comes first.
fn spawn_reaper(registry: Weak<Inner>, hub: HubHandle, lifetime: Option<Duration>) {
    tokio::spawn(async move {
        let expired = async {
            match lifetime {
                Some(lifetime) => tokio::time::sleep(lifetime).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = expired => info!(room_id = %hub.id(), ?lifetime, "room lease expired"),
            _ = hub.terminated() => {}
        }

        if let Some(inner) = registry.upgrade() {
            Registry { inner }.remove_room(hub.id()).await;
        }
    });
}
