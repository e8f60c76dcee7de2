/**
 * Channel Registry
 *
 * Tracks which live subscriber connections exist and which rooms each one
 * has joined. The registry is the sole owner of membership state; WebSocket
 * handlers mutate it through join/leave/remove and the notifier only reads
 * snapshots of it.
 *
 * # Delivery Queues
 *
 * Every subscriber owns a bounded `mpsc` queue created on `register`. The
 * registry keeps the sending half; the connection's writer task drains the
 * receiving half. Dropping the sending half (on removal or shutdown) ends the
 * writer task, which then closes the socket.
 *
 * # Thread Safety
 *
 * All state lives behind one `Arc<RwLock<..>>`. Handles are cheap to clone
 * and operations on one subscriber never wait on I/O of another.
 */

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::shared::{RealtimeEvent, RoomId};

/// Identity of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving half of a subscriber's delivery queue
pub type NotificationReceiver = mpsc::Receiver<RealtimeEvent>;

/// Snapshot of a subscriber taken for delivery
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<RealtimeEvent>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queue an event without waiting
    pub fn try_deliver(
        &self,
        event: RealtimeEvent,
    ) -> Result<(), mpsc::error::TrySendError<RealtimeEvent>> {
        self.sender.try_send(event)
    }
}

#[derive(Debug)]
struct SubscriberEntry {
    sender: mpsc::Sender<RealtimeEvent>,
    rooms: HashSet<RoomId>,
}

#[derive(Debug)]
struct RegistryInner {
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    rooms: HashMap<RoomId, HashSet<SubscriberId>>,
    accepting: bool,
}

impl RegistryInner {
    fn detach(&mut self, id: SubscriberId, room: &RoomId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    fn snapshot(&self, id: SubscriberId) -> Option<Subscriber> {
        self.subscribers.get(&id).map(|entry| Subscriber {
            id,
            sender: entry.sender.clone(),
        })
    }
}

/// Room membership of all live subscribers
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    queue_capacity: usize,
}

impl ChannelRegistry {
    /// Create an empty registry whose subscribers buffer at most
    /// `queue_capacity` pending notifications each.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                subscribers: HashMap::new(),
                rooms: HashMap::new(),
                accepting: true,
            })),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection
    ///
    /// Returns `None` once the registry has been shut down.
    pub async fn register(&self) -> Option<(SubscriberId, NotificationReceiver)> {
        let mut inner = self.inner.write().await;
        if !inner.accepting {
            return None;
        }

        let id = SubscriberId::new();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        inner.subscribers.insert(
            id,
            SubscriberEntry {
                sender,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!("[Realtime] Subscriber {} registered", id);
        Some((id, receiver))
    }

    /// Add a subscriber to a room. Returns false for unknown subscribers.
    pub async fn join(&self, id: SubscriberId, room: RoomId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.subscribers.get_mut(&id) else {
            return false;
        };
        entry.rooms.insert(room.clone());
        inner.rooms.entry(room).or_default().insert(id);
        true
    }

    /// Remove a subscriber from a room. Returns false if it was not a member.
    pub async fn leave(&self, id: SubscriberId, room: &RoomId) -> bool {
        let mut inner = self.inner.write().await;
        let removed = match inner.subscribers.get_mut(&id) {
            Some(entry) => entry.rooms.remove(room),
            None => false,
        };
        if removed {
            inner.detach(id, room);
        }
        removed
    }

    /// Subscribers currently joined to `room`
    pub async fn members_of(&self, room: &RoomId) -> Vec<Subscriber> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| inner.snapshot(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every registered subscriber
    pub async fn all_subscribers(&self) -> Vec<Subscriber> {
        let inner = self.inner.read().await;
        inner
            .subscribers
            .iter()
            .map(|(id, entry)| Subscriber {
                id: *id,
                sender: entry.sender.clone(),
            })
            .collect()
    }

    /// Rooms joined by a subscriber, sorted
    pub async fn rooms_of(&self, id: SubscriberId) -> Vec<RoomId> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<RoomId> = inner
            .subscribers
            .get(&id)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Drop a subscriber from every room and close its queue
    pub async fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.subscribers.remove(&id) else {
            return false;
        };
        for room in &entry.rooms {
            inner.detach(id, room);
        }
        tracing::debug!("[Realtime] Subscriber {} removed", id);
        true
    }

    /// Stop accepting registrations and drop every subscriber
    ///
    /// Returns how many subscribers were disconnected.
    pub async fn disconnect_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        inner.accepting = false;
        inner.rooms.clear();
        let count = inner.subscribers.len();
        inner.subscribers.clear();
        count
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.subscribers.len()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    pub async fn room_size(&self, room: &RoomId) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}
