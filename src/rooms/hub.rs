use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot, watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    client::{Client, ClientHandle, ClientId, Outbound},
    error::RoomError,
    msg::{Delivery, Message, Payload, now_millis},
    room::{Presence, RoomInfo, RoomSummary},
};

const INTENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Capacity of each client's outbound buffer.
    pub client_buffer: usize,
    /// Whether a sender receives its own broadcasts.
    pub echo_to_sender: bool,
    pub record_history: bool,
    /// Oldest messages are dropped once the log holds this many.
    pub history_limit: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            client_buffer: 256,
            echo_to_sender: false,
            record_history: true,
            history_limit: 1024,
        }
    }
}

#[derive(Debug)]
pub struct BroadcastIntent {
    pub(crate) sender_id: ClientId,
    pub(crate) sender: String,
    pub(crate) payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Running,
    ShuttingDown,
    Terminated,
}

/// Cloneable front door to a room's actor. Everything it does goes through
/// the actor's intent queues; the membership set is never reachable from here.
#[derive(Debug, Clone)]
pub struct HubHandle {
    info: Arc<RoomInfo>,
    config: HubConfig,
    register: mpsc::Sender<Client>,
    unregister: mpsc::Sender<ClientId>,
    broadcast: mpsc::Sender<BroadcastIntent>,
    accepting: Arc<AtomicBool>,
    shutdown: CancellationToken,
    terminated: CancellationToken,
    presence: watch::Receiver<Presence>,
    history: mpsc::Sender<oneshot::Sender<Vec<Message>>>,
}

impl HubHandle {
    /// Starts the actor for `info` on the current runtime. Firing `shutdown`
    /// (or one of its parents) drains and stops it.
    pub fn spawn(info: RoomInfo, config: HubConfig, shutdown: CancellationToken) -> Self {
        let info = Arc::new(info);
        let (register_tx, register_rx) = mpsc::channel(INTENT_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::channel(INTENT_CAPACITY);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(INTENT_CAPACITY);
        let (presence_tx, presence_rx) = watch::channel(Presence::default());
        let accepting = Arc::new(AtomicBool::new(true));
        let terminated = CancellationToken::new();
        let (history_tx, history_rx) = mpsc::channel(INTENT_CAPACITY);

        let hub = Hub {
            info: Arc::clone(&info),
            config,
            clients: HashMap::new(),
            users: BTreeMap::new(),
            register: register_rx,
            unregister: unregister_rx,
            broadcast: broadcast_rx,
            accepting: Arc::clone(&accepting),
            shutdown: shutdown.clone(),
            presence: presence_tx,
            history: VecDeque::new(),
            history_requests: history_rx,
        };
        tokio::spawn(hub.run(terminated.clone()));

        Self {
            info,
            config,
            register: register_tx,
            unregister: unregister_tx,
            broadcast: broadcast_tx,
            accepting,
            shutdown,
            terminated,
            presence: presence_rx,
            history: history_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn info(&self) -> &RoomInfo {
        &self.info
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Wraps a new connection for `user_id` and queues its registration.
    pub async fn join(&self, user_id: String) -> Result<(ClientHandle, Outbound), RoomError> {
        if !self.is_accepting() {
            return Err(RoomError::Closed(self.id()));
        }

        let (client, outbound) = Client::new(user_id, self.config.client_buffer);
        let handle = ClientHandle::new(
            &client,
            self.id(),
            self.unregister.downgrade(),
            self.broadcast.downgrade(),
        );

        self.register
            .send(client)
            .await
            .map_err(|_| RoomError::Closed(self.id()))?;

        Ok((handle, outbound))
    }

    pub fn presence(&self) -> Presence {
        self.presence.borrow().clone()
    }

    pub fn watch_presence(&self) -> watch::Receiver<Presence> {
        self.presence.clone()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary::new(&self.info, self.presence())
    }

    /// Snapshot of the message log, answered by the actor between intents.
    pub async fn history(&self) -> Result<Vec<Message>, RoomError> {
        let (reply, snapshot) = oneshot::channel();
        self.history
            .send(reply)
            .await
            .map_err(|_| RoomError::Closed(self.id()))?;
        snapshot.await.map_err(|_| RoomError::Closed(self.id()))
    }

    /// Stops taking registrations and tells the actor to drain. Safe to call
    /// any number of times.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        self.shutdown.cancel();
    }

    pub fn state(&self) -> HubState {
        if self.terminated.is_cancelled() {
            HubState::Terminated
        } else if self.shutdown.is_cancelled() {
            HubState::ShuttingDown
        } else {
            HubState::Running
        }
    }

    pub async fn terminated(&self) {
        self.terminated.cancelled().await;
    }
}

struct Hub {
    info: Arc<RoomInfo>,
    config: HubConfig,
    clients: HashMap<ClientId, Client>,
    users: BTreeMap<String, bool>,
    register: mpsc::Receiver<Client>,
    unregister: mpsc::Receiver<ClientId>,
    broadcast: mpsc::Receiver<BroadcastIntent>,
    accepting: Arc<AtomicBool>,
    shutdown: CancellationToken,
    presence: watch::Sender<Presence>,
    history: VecDeque<Message>,
    history_requests: mpsc::Receiver<oneshot::Sender<Vec<Message>>>,
}

impl Hub {
    async fn run(mut self, terminated: CancellationToken) {
        info!(room_id = %self.info.id, name = %self.info.name, "hub running");

        loop {
            // Registrations go first so a join always lands before broadcasts
            // queued after it.
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,
                client = self.register.recv() => match client {
                    Some(client) => self.on_register(client),
                    None => break,
                },
                id = self.unregister.recv() => match id {
                    Some(id) => self.on_unregister(id),
                    None => break,
                },
                intent = self.broadcast.recv() => match intent {
                    Some(intent) => self.on_broadcast(intent),
                    None => break,
                },
                reply = self.history_requests.recv() => match reply {
                    Some(reply) => {
                        let _ = reply.send(self.history.iter().cloned().collect());
                    }
                    None => break,
                },
            }
        }

        self.drain();
        let room_id = self.info.id;
        drop(self);
        info!(%room_id, "hub terminated");
        terminated.cancel();
    }

    fn on_register(&mut self, client: Client) {
        debug!(room_id = %self.info.id, client_id = client.id, user_id = %client.user_id, "register");
        self.users.insert(client.user_id.clone(), true);
        self.clients.entry(client.id).or_insert(client);
        self.publish();
    }

    fn on_unregister(&mut self, id: ClientId) {
        if self.remove(id) {
            debug!(room_id = %self.info.id, client_id = id, "unregister");
            self.publish();
        }
    }

    fn on_broadcast(&mut self, intent: BroadcastIntent) {
        if !self.clients.contains_key(&intent.sender_id) {
            debug!(room_id = %self.info.id, client_id = intent.sender_id, "dropping broadcast from non-member");
            return;
        }

        let delivery = Arc::new(Delivery {
            sender: intent.sender,
            payload: intent.payload,
        });

        let mut delivered = 0;
        let mut shed = Vec::new();
        for (&id, client) in &self.clients {
            if id == intent.sender_id && !self.config.echo_to_sender {
                continue;
            }

            match client.try_deliver(&delivery) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(room_id = %self.info.id, client_id = id, user_id = %client.user_id, "outbound buffer full, shedding client");
                    shed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(room_id = %self.info.id, client_id = id, "outbound buffer gone, dropping client");
                    shed.push(id);
                }
            }
        }

        if !shed.is_empty() {
            for id in shed {
                self.remove(id);
            }
            self.publish();
        }

        if delivered > 0 && self.config.record_history && self.config.history_limit > 0 {
            if self.history.len() == self.config.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(Message {
                user_id: delivery.sender.clone(),
                time: now_millis(),
                room_id: self.info.id,
                data: delivery.payload.clone(),
            });
        }
    }

    /// Removes a member, closing its outbound buffer by dropping it.
    fn remove(&mut self, id: ClientId) -> bool {
        let Some(client) = self.clients.remove(&id) else {
            return false;
        };

        let still_here = self.clients.values().any(|c| c.user_id == client.user_id);
        self.users.insert(client.user_id, still_here);
        true
    }

    fn drain(&mut self) {
        self.accepting.store(false, Ordering::Release);
        self.shutdown.cancel();

        self.register.close();
        while let Ok(client) = self.register.try_recv() {
            debug!(room_id = %self.info.id, client_id = client.id, "dropping registration queued during shutdown");
        }

        for (_, client) in self.clients.drain() {
            self.users.insert(client.user_id, false);
        }
        self.publish();
    }

    fn publish(&self) {
        self.presence.send_replace(Presence {
            users: self.users.clone(),
            members: self.clients.len(),
        });
    }
}
