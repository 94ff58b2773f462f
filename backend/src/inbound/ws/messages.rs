//! Wire-level frames for the WebSocket adapter.
//!
//! Outbound live events are serialised straight from
//! [`crate::domain::LiveEvent`]; this module adds the client requests and the
//! replies that only make sense on a socket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Error, ErrorCode};

/// Frame sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Mark one notification read.
    MarkRead {
        /// Notification id.
        id: Uuid,
    },
    /// Application-level keep-alive.
    Ping,
}

/// Socket-only reply.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplyFrame {
    /// Answer to [`ClientFrame::Ping`].
    Pong,
    /// A client request failed; the connection stays open.
    Error {
        /// Stable error code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl From<&Error> for ReplyFrame {
    fn from(error: &Error) -> Self {
        let code = serde_json::to_value(error.code())
            .ok()
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_else(|| "internal_error".to_owned());
        let message = match error.code() {
            ErrorCode::InternalError => "Internal server error".to_owned(),
            _ => error.message().to_owned(),
        };
        Self::Error { code, message }
    }
}
