//! Live event publisher that remembers what it was asked to send.

use std::sync::{Mutex, PoisonError};

use crate::domain::ports::LiveEventPublisher;
use crate::domain::{LiveEvent, UserId};

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(UserId, LiveEvent)>>,
}

impl RecordingPublisher {
    /// Every event published so far, oldest first.
    pub fn events(&self) -> Vec<(UserId, LiveEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events delivered to one recipient.
    pub fn events_for(&self, recipient: &UserId) -> Vec<LiveEvent> {
        self.events()
            .into_iter()
            .filter(|(to, _)| to == recipient)
            .map(|(_, event)| event)
            .collect()
    }
}

impl LiveEventPublisher for RecordingPublisher {
    fn publish(&self, recipient: UserId, event: &LiveEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((recipient, event.clone()));
    }
}
