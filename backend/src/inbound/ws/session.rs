//! Per-connection WebSocket loop.
//!
//! The loop multiplexes three sources: the heartbeat timer, frames from the
//! client, and live events queued for this connection by the hub. Pings go
//! out every `heartbeat_interval`; a connection that sends nothing for
//! `client_timeout` is closed.

use std::time::Instant;

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{LiveEvent, Principal};
use crate::inbound::ws::messages::{ClientFrame, ReplyFrame};
use crate::inbound::ws::state::WsState;

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    InvalidPayload,
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

/// Run a connection until it closes, then release its presence.
pub(super) async fn run_connection(
    state: WsState,
    principal: Principal,
    session: Session,
    stream: MessageStream,
) {
    let connection_id = Uuid::new_v4();
    let user_id = principal.user_id;
    let outbox = state.hub.subscribe(user_id, principal.role, connection_id);
    if state.presence.connect(user_id, connection_id) {
        state.hub.broadcast_to_staff(&LiveEvent::Presence {
            user_id,
            online: true,
        });
    }
    info!(%user_id, %connection_id, "WebSocket connected");

    WsSession {
        state: state.clone(),
        principal,
    }
    .run(session, stream, outbox)
    .await;

    state.hub.unsubscribe(user_id, connection_id);
    info!(%user_id, %connection_id, "WebSocket disconnected");
    if state.presence.disconnect(user_id, connection_id) {
        let grace = state.settings.presence_grace;
        actix_web::rt::spawn(async move {
            time::sleep(grace).await;
            if state.presence.settle_offline(user_id) {
                state.hub.broadcast_to_staff(&LiveEvent::Presence {
                    user_id,
                    online: false,
                });
            }
        });
    }
}

struct WsSession {
    state: WsState,
    principal: Principal,
}

impl WsSession {
    async fn run(
        &self,
        mut session: Session,
        mut stream: MessageStream,
        mut outbox: UnboundedReceiver<LiveEvent>,
    ) {
        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(self.state.settings.heartbeat_interval);

        if let Err(error) = self.send_unread_count(&mut session).await {
            self.log_shutdown_reason(&error);
            return;
        }

        loop {
            let result = tokio::select! {
                _ = heartbeat.tick() => {
                    self.handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message)
                        .await
                }
                Some(event) = outbox.recv() => {
                    self.send_json(&mut session, &event)
                        .await
                        .map_err(SessionError::Network)
                }
            };

            if let Err(error) = result {
                self.log_shutdown_reason(&error);
                let close_action = self.close_action_for(&error);
                self.close_session_if_needed(session, close_action).await;
                return;
            }
        }
    }

    async fn send_unread_count(&self, session: &mut Session) -> Result<(), SessionError> {
        match self.state.notifications.unread_count(&self.principal).await {
            Ok(count) => self
                .send_json(session, &LiveEvent::UnreadCount { count })
                .await
                .map_err(SessionError::Network),
            Err(error) => {
                warn!(%error, "unread count unavailable for new connection");
                Ok(())
            }
        }
    }

    async fn handle_heartbeat_tick(
        &self,
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), SessionError> {
        if Instant::now().duration_since(*last_heartbeat) > self.state.settings.client_timeout {
            return Err(SessionError::HeartbeatTimeout);
        }
        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn handle_stream_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };
        match message {
            Ok(message) => self.handle_message(session, last_heartbeat, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session.pong(&payload).await.map_err(SessionError::Network)
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text_message(session, text.as_ref()).await
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    async fn handle_text_message(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<(), SessionError> {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(error = %error, "Rejected malformed WebSocket frame");
                return Err(SessionError::InvalidPayload);
            }
        };
        match frame {
            ClientFrame::Ping => self
                .send_json(session, &ReplyFrame::Pong)
                .await
                .map_err(SessionError::Network),
            ClientFrame::MarkRead { id } => {
                // Success is reported through the unreadCount event the
                // notification service publishes.
                match self.state.notifications.mark_read(&self.principal, id).await {
                    Ok(()) => Ok(()),
                    Err(error) => {
                        debug!(%error, notification_id = %id, "markRead refused");
                        self.send_json(session, &ReplyFrame::from(&error))
                            .await
                            .map_err(SessionError::Network)
                    }
                }
            }
        }
    }

    async fn send_json<T: serde::Serialize>(
        &self,
        session: &mut Session,
        payload: &T,
    ) -> Result<(), Closed> {
        match serde_json::to_string(payload) {
            Ok(body) => session.text(body).await,
            Err(error) => {
                warn!(error = %error, "Failed to serialise WebSocket payload");
                Ok(())
            }
        }
    }

    fn log_shutdown_reason(&self, error: &SessionError) {
        match error {
            SessionError::HeartbeatTimeout => {
                warn!("WebSocket heartbeat timeout; closing connection");
            }
            SessionError::Protocol(error) => {
                warn!(error = %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(error = %error, "WebSocket send failed; closing connection");
            }
            SessionError::InvalidPayload
            | SessionError::ClientClosed(_)
            | SessionError::StreamClosed => {}
        }
    }

    fn close_action_for(&self, error: &SessionError) -> CloseAction {
        match error {
            SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Normal,
                description: Some("heartbeat timeout".to_owned()),
            })),
            SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Protocol,
                description: Some("protocol error".to_owned()),
            })),
            SessionError::InvalidPayload => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Policy,
                description: Some("invalid payload".to_owned()),
            })),
            SessionError::ClientClosed(reason) => CloseAction::Close(reason.clone()),
            SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
        }
    }

    async fn close_session_if_needed(&self, session: Session, close_action: CloseAction) {
        if let CloseAction::Close(reason) = close_action {
            if let Err(error) = session.close(reason).await {
                warn!(error = %error, "Failed to close WebSocket session");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
