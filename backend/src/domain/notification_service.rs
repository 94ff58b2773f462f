//! Notification delivery: persist per recipient, then push live.

use std::sync::Arc;

use mockable::Clock;
use pagination::{Page, PageRequest};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ports::{LiveEventPublisher, NotificationRepository, UserRepository};
use crate::domain::{Error, LiveEvent, Notification, NotificationDraft, Principal, UserId};

/// Stores notifications and fans them out to live connections.
#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    publisher: Arc<dyn LiveEventPublisher>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    /// Create the service.
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserRepository>,
        publisher: Arc<dyn LiveEventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifications,
            users,
            publisher,
            clock,
        }
    }

    /// Notify one user. Failures are logged, never returned.
    pub async fn notify_user(&self, recipient: UserId, draft: NotificationDraft) {
        self.deliver(&[recipient], &draft).await;
    }

    /// Notify every staff and admin account. Failures are logged, never
    /// returned.
    pub async fn notify_staff(&self, draft: NotificationDraft) {
        match self.users.staff_ids().await {
            Ok(staff) => self.deliver(&staff, &draft).await,
            Err(error) => warn!(%error, kind = draft.kind.as_str(), "staff lookup failed"),
        }
    }

    async fn deliver(&self, recipients: &[UserId], draft: &NotificationDraft) {
        if recipients.is_empty() {
            return;
        }
        let now = self.clock.utc();
        let stored: Vec<Notification> = recipients
            .iter()
            .map(|recipient| draft.for_recipient(*recipient, now))
            .collect();
        if let Err(error) = self.notifications.insert_many(&stored).await {
            warn!(%error, kind = draft.kind.as_str(), "failed to store notifications");
            return;
        }
        debug!(
            kind = draft.kind.as_str(),
            recipients = stored.len(),
            "notifications stored"
        );
        for notification in stored {
            let recipient = notification.recipient_id;
            self.publisher
                .publish(recipient, &LiveEvent::Notification { notification });
            self.push_unread_count(recipient).await;
        }
    }

    async fn push_unread_count(&self, recipient: UserId) {
        match self.notifications.unread_count(&recipient).await {
            Ok(count) => self
                .publisher
                .publish(recipient, &LiveEvent::UnreadCount { count }),
            Err(error) => warn!(%error, "unread count lookup failed"),
        }
    }

    /// Page through the caller's notifications.
    pub async fn list(
        &self,
        principal: &Principal,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, Error> {
        let (items, total) = self
            .notifications
            .list(&principal.user_id, unread_only, page)
            .await?;
        Ok(Page::new(items, page, total))
    }

    /// Mark one of the caller's notifications read.
    pub async fn mark_read(&self, principal: &Principal, id: Uuid) -> Result<(), Error> {
        if !self.notifications.mark_read(&principal.user_id, id).await? {
            return Err(Error::not_found("notification not found"));
        }
        self.push_unread_count(principal.user_id).await;
        Ok(())
    }

    /// Mark all of the caller's notifications read.
    pub async fn mark_all_read(&self, principal: &Principal) -> Result<u64, Error> {
        let updated = self.notifications.mark_all_read(&principal.user_id).await?;
        self.push_unread_count(principal.user_id).await;
        Ok(updated)
    }

    /// Unread notifications for the caller.
    pub async fn unread_count(&self, principal: &Principal) -> Result<u64, Error> {
        Ok(self.notifications.unread_count(&principal.user_id).await?)
    }
}
