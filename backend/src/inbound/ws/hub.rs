//! Fan-out of live events to open WebSocket connections.
//!
//! Each connection subscribes with the caller's role and receives events on
//! an unbounded channel that its session loop drains. The hub is the
//! production [`LiveEventPublisher`]: notification delivery pushes through it
//! without awaiting the sockets.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::LiveEventPublisher;
use crate::domain::{LiveEvent, Role, UserId};

struct Subscriber {
    role: Role,
    outbox: UnboundedSender<LiveEvent>,
}

/// Registry of live connections keyed by user.
#[derive(Default)]
pub struct LiveHub {
    connections: Mutex<HashMap<UserId, HashMap<Uuid, Subscriber>>>,
}

impl LiveHub {
    /// Empty hub; share it behind an `Arc` between the socket layer and the
    /// notification publisher.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_connections<T>(
        &self,
        f: impl FnOnce(&mut HashMap<UserId, HashMap<Uuid, Subscriber>>) -> T,
    ) -> T {
        let mut guard = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Subscribe a connection and return the receiving end of its outbox.
    pub fn subscribe(
        &self,
        user_id: UserId,
        role: Role,
        connection_id: Uuid,
    ) -> UnboundedReceiver<LiveEvent> {
        let (outbox, inbox) = unbounded_channel();
        self.with_connections(|connections| {
            connections
                .entry(user_id)
                .or_default()
                .insert(connection_id, Subscriber { role, outbox });
        });
        inbox
    }

    /// Drop a connection's subscription.
    pub fn unsubscribe(&self, user_id: UserId, connection_id: Uuid) {
        self.with_connections(|connections| {
            if let Some(open) = connections.get_mut(&user_id) {
                open.remove(&connection_id);
                if open.is_empty() {
                    connections.remove(&user_id);
                }
            }
        });
    }

    /// Deliver `event` to every staff and admin connection.
    pub fn broadcast_to_staff(&self, event: &LiveEvent) {
        self.with_connections(|connections| {
            for subscriber in connections
                .values()
                .flat_map(HashMap::values)
                .filter(|subscriber| subscriber.role.is_staff())
            {
                // A closed outbox belongs to a session that is shutting down.
                let _ = subscriber.outbox.send(event.clone());
            }
        });
    }

    /// Number of open connections, across all users.
    pub fn connection_count(&self) -> usize {
        self.with_connections(|connections| connections.values().map(HashMap::len).sum())
    }
}

impl LiveEventPublisher for LiveHub {
    fn publish(&self, recipient: UserId, event: &LiveEvent) {
        self.with_connections(|connections| {
            let Some(open) = connections.get(&recipient) else {
                debug!(%recipient, "recipient has no live connection");
                return;
            };
            for subscriber in open.values() {
                let _ = subscriber.outbox.send(event.clone());
            }
        });
    }
}
