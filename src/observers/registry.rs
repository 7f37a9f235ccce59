use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{ServerEvent, SessionSnapshot};

pub type SubscriberId = Uuid;

/// A live observer connection
#[derive(Debug)]
pub struct Subscriber {
    pub id: SubscriberId,
    /// Last successful delivery or inbound command
    pub last_seen_alive: Instant,
    outbox: mpsc::Sender<ServerEvent>,
}

/// Receiving side handed to the connection that attached
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub events: mpsc::Receiver<ServerEvent>,
}

enum Delivery {
    Sent,
    Dropped,
    Gone,
}

/// Set of attached observers with best-effort, at-most-once fan-out.
///
/// A full outbox drops the event for that subscriber only; a closed outbox
/// removes the subscriber. Neither affects delivery to the others.
#[derive(Debug)]
pub struct ObserverRegistry {
    subscribers: HashMap<SubscriberId, Subscriber>,
    buffer: usize,
}

impl ObserverRegistry {
    /// `buffer` is the per-subscriber outbox capacity
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: HashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscriber and queue `snapshot` as its first event
    pub fn attach(&mut self, snapshot: SessionSnapshot) -> Subscription {
        let id = Uuid::new_v4();
        let (outbox, events) = mpsc::channel(self.buffer);

        let mut subscriber = Subscriber {
            id,
            last_seen_alive: Instant::now(),
            outbox,
        };
        // Fresh channel with capacity >= 1, cannot fail
        let _ = Self::deliver(&mut subscriber, ServerEvent::state(snapshot));

        self.subscribers.insert(id, subscriber);
        info!("Subscriber {} attached ({} total)", id, self.subscribers.len());

        Subscription { id, events }
    }

    pub fn detach(&mut self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            info!("Subscriber {} detached ({} remaining)", id, self.subscribers.len());
        }
        removed
    }

    /// Drop every subscriber, ending their event streams; returns how many
    pub fn clear(&mut self) -> usize {
        let count = self.subscribers.len();
        self.subscribers.clear();
        count
    }

    /// Deliver to every attached subscriber; returns how many accepted it
    pub fn broadcast(&mut self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();

        for subscriber in self.subscribers.values_mut() {
            match Self::deliver(subscriber, event.clone()) {
                Delivery::Sent => delivered += 1,
                Delivery::Dropped => {}
                Delivery::Gone => gone.push(subscriber.id),
            }
        }

        for id in gone {
            self.subscribers.remove(&id);
            debug!("Removed disconnected subscriber {}", id);
        }

        delivered
    }

    /// Deliver to one subscriber; false if it is unknown, full or gone
    pub fn send_to(&mut self, id: SubscriberId, event: ServerEvent) -> bool {
        let Some(subscriber) = self.subscribers.get_mut(&id) else {
            return false;
        };

        match Self::deliver(subscriber, event) {
            Delivery::Sent => true,
            Delivery::Dropped => false,
            Delivery::Gone => {
                self.subscribers.remove(&id);
                false
            }
        }
    }

    /// Note activity from a subscriber
    pub fn touch(&mut self, id: SubscriberId) {
        if let Some(subscriber) = self.subscribers.get_mut(&id) {
            subscriber.last_seen_alive = Instant::now();
        }
    }

    pub fn last_seen_alive(&self, id: SubscriberId) -> Option<Instant> {
        self.subscribers.get(&id).map(|s| s.last_seen_alive)
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    fn deliver(subscriber: &mut Subscriber, event: ServerEvent) -> Delivery {
        match subscriber.outbox.try_send(event) {
            Ok(()) => {
                subscriber.last_seen_alive = Instant::now();
                Delivery::Sent
            }
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber {} is not keeping up; dropping event", subscriber.id);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Gone,
        }
    }
}
