//! In-app notifications and the live events pushed over WebSocket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::UnknownVariant;
use super::user::UserId;

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A customer placed an order.
    NewOrder,
    /// An M-Pesa payment settled.
    PaymentReceived,
    /// An M-Pesa payment failed.
    PaymentFailed,
    /// A variant reached its low stock threshold.
    LowStock,
    /// An order moved to a new status.
    OrderStatus,
}

impl NotificationKind {
    /// Database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewOrder => "new_order",
            Self::PaymentReceived => "payment_received",
            Self::PaymentFailed => "payment_failed",
            Self::LowStock => "low_stock",
            Self::OrderStatus => "order_status",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_order" => Ok(Self::NewOrder),
            "payment_received" => Ok(Self::PaymentReceived),
            "payment_failed" => Ok(Self::PaymentFailed),
            "low_stock" => Ok(Self::LowStock),
            "order_status" => Ok(Self::OrderStatus),
            other => Err(UnknownVariant {
                kind: "notification kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// Stored notification for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Identifier.
    pub id: Uuid,
    /// Recipient.
    pub recipient_id: UserId,
    /// Category.
    pub kind: NotificationKind,
    /// Headline.
    pub title: String,
    /// Body.
    pub message: String,
    /// Related order.
    pub order_id: Option<Uuid>,
    /// Whether the recipient has seen it.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Notification content before recipients are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    /// Category.
    pub kind: NotificationKind,
    /// Headline.
    pub title: String,
    /// Body.
    pub message: String,
    /// Related order.
    pub order_id: Option<Uuid>,
}

impl NotificationDraft {
    /// Convenience constructor.
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        order_id: Option<Uuid>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            order_id,
        }
    }

    /// Materialise the draft for a recipient.
    pub fn for_recipient(&self, recipient_id: UserId, at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id,
            kind: self.kind,
            title: self.title.clone(),
            message: self.message.clone(),
            order_id: self.order_id,
            is_read: false,
            created_at: at,
        }
    }
}

/// Event delivered to a user's live connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveEvent {
    /// A new notification.
    Notification {
        /// The stored notification.
        notification: Notification,
    },
    /// A user's online state changed.
    #[serde(rename_all = "camelCase")]
    Presence {
        /// User whose state changed.
        user_id: UserId,
        /// New state.
        online: bool,
    },
    /// The recipient's unread counter changed.
    UnreadCount {
        /// Unread notifications.
        count: u64,
    },
}
