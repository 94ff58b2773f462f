//! Shared WebSocket adapter state.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::domain::{AuthService, NotificationService, PresenceRegistry};
use crate::inbound::http::state::HttpState;
use crate::inbound::ws::hub::LiveHub;

/// Connection policy for the `/ws` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsSettings {
    /// Exact origins (scheme, host and port) allowed to upgrade.
    pub allowed_origins: Vec<Url>,
    /// Delay before a user with no connections is announced offline.
    pub presence_grace: Duration,
    /// Time between server pings.
    pub heartbeat_interval: Duration,
    /// Idle time after which the connection is closed.
    pub client_timeout: Duration,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            presence_grace: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(10),
        }
    }
}

/// Dependency bundle for the WebSocket entry point and its sessions.
#[derive(Clone)]
pub struct WsState {
    pub auth: AuthService,
    pub notifications: NotificationService,
    pub presence: Arc<PresenceRegistry>,
    pub hub: Arc<LiveHub>,
    pub settings: Arc<WsSettings>,
}

impl WsState {
    pub fn new(
        auth: AuthService,
        notifications: NotificationService,
        presence: Arc<PresenceRegistry>,
        hub: Arc<LiveHub>,
        settings: WsSettings,
    ) -> Self {
        Self {
            auth,
            notifications,
            presence,
            hub,
            settings: Arc::new(settings),
        }
    }

    /// Share the HTTP services and presence registry with the socket layer.
    ///
    /// The hub must be the publisher the HTTP services were built with, so
    /// that notifications raised over HTTP reach open sockets.
    pub fn sharing(http: &HttpState, hub: Arc<LiveHub>, settings: WsSettings) -> Self {
        Self::new(
            http.auth.clone(),
            http.notifications.clone(),
            http.presence.clone(),
            hub,
            settings,
        )
    }
}
