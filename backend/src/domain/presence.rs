//! Which users currently hold live connections.
//!
//! Each user maps to the set of connection ids they have open. A user is
//! announced online on their first connection. Going offline is a separate,
//! delayed step: after a disconnect the caller waits for a grace period and
//! then calls [`PresenceRegistry::settle_offline`], which consults the
//! current state. A reconnect during the grace period therefore wins.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use uuid::Uuid;

use super::user::UserId;

#[derive(Debug, Default)]
struct PresenceState {
    connections: HashMap<UserId, HashSet<Uuid>>,
    announced: HashSet<UserId>,
}

/// Thread-safe presence map shared by every WebSocket session.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    state: Mutex<PresenceState>,
}

impl PresenceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PresenceState) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    /// Register a connection. Returns `true` when the user should be
    /// announced online.
    ///
    /// # Examples
    /// ```
    /// use hera_backend::domain::{PresenceRegistry, UserId};
    /// use uuid::Uuid;
    ///
    /// let registry = PresenceRegistry::new();
    /// let user = UserId::random();
    /// assert!(registry.connect(user, Uuid::new_v4()));
    /// assert!(!registry.connect(user, Uuid::new_v4()));
    /// ```
    pub fn connect(&self, user_id: UserId, connection_id: Uuid) -> bool {
        self.with_state(|state| {
            state
                .connections
                .entry(user_id)
                .or_default()
                .insert(connection_id);
            state.announced.insert(user_id)
        })
    }

    /// Drop a connection. Returns `true` when the user has none left and an
    /// offline check should be scheduled.
    pub fn disconnect(&self, user_id: UserId, connection_id: Uuid) -> bool {
        self.with_state(|state| {
            let Some(open) = state.connections.get_mut(&user_id) else {
                return false;
            };
            open.remove(&connection_id);
            if open.is_empty() {
                state.connections.remove(&user_id);
                true
            } else {
                false
            }
        })
    }

    /// Finish a delayed offline check. Returns `true` when the user should be
    /// announced offline.
    pub fn settle_offline(&self, user_id: UserId) -> bool {
        self.with_state(|state| {
            if state.connections.contains_key(&user_id) {
                return false;
            }
            state.announced.remove(&user_id)
        })
    }

    /// Whether the user holds at least one connection.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.with_state(|state| state.connections.contains_key(&user_id))
    }

    /// Users with at least one connection, sorted for stable output.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> =
            self.with_state(|state| state.connections.keys().copied().collect());
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn registry() -> PresenceRegistry {
        PresenceRegistry::new()
    }

    #[rstest]
    fn last_connection_triggers_offline_check(registry: PresenceRegistry) {
        let user = UserId::random();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        registry.connect(user, a);
        registry.connect(user, b);
        assert!(!registry.disconnect(user, a));
        assert!(registry.disconnect(user, b));
        assert!(registry.settle_offline(user));
        assert!(!registry.settle_offline(user));
    }

    #[rstest]
    fn reconnect_within_grace_cancels_offline(registry: PresenceRegistry) {
        let user = UserId::random();
        let first = Uuid::new_v4();
        assert!(registry.connect(user, first));
        assert!(registry.disconnect(user, first));
        assert!(!registry.connect(user, Uuid::new_v4()));
        assert!(!registry.settle_offline(user));
        assert!(registry.is_online(user));
    }

    #[rstest]
    fn unknown_disconnects_are_ignored(registry: PresenceRegistry) {
        assert!(!registry.disconnect(UserId::random(), Uuid::new_v4()));
        assert!(registry.online_users().is_empty());
    }
}
