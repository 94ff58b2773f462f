//! Port for pushing events to connected clients.

use crate::domain::{LiveEvent, UserId};

/// Fan-out of live events to a user's open connections.
///
/// Delivery is best effort: publishing never fails the caller, and users
/// without connections simply miss the event.
#[cfg_attr(test, mockall::automock)]
pub trait LiveEventPublisher: Send + Sync {
    /// Deliver `event` to every connection of `recipient`.
    fn publish(&self, recipient: UserId, event: &LiveEvent);
}

/// Publisher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLiveEventPublisher;

impl LiveEventPublisher for NoopLiveEventPublisher {
    fn publish(&self, _recipient: UserId, _event: &LiveEvent) {}
}
