//! Periodic housekeeping of sessions and abandoned sign-ups.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::Error;
use crate::domain::ports::{SessionRepository, UserRepository};

/// How long revoked sessions are kept for auditing.
const REVOKED_RETENTION_HOURS: i64 = 24;

/// Rows removed by one cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Sessions deleted.
    pub sessions: u64,
    /// Unverified accounts deleted.
    pub unverified_users: u64,
}

/// Cleanup service.
#[derive(Clone)]
pub struct CleanupService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl CleanupService {
    /// Create the service.
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            users,
            clock,
        }
    }

    /// Delete sessions whose refresh token expired, or that were revoked
    /// more than a day before `now`.
    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let revoked_before = now - Duration::hours(REVOKED_RETENTION_HOURS);
        Ok(self.sessions.purge(now, revoked_before).await?)
    }

    /// Delete unverified accounts whose verification window lapsed and that
    /// never ordered.
    pub async fn purge_unverified_users(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        Ok(self.users.delete_lapsed_unverified(now).await?)
    }

    /// Run both purges. A failing purge is logged and counted as zero.
    pub async fn run(&self) -> CleanupReport {
        let now = self.clock.utc();
        let sessions = self
            .purge_expired_sessions(now)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "session cleanup failed");
                0
            });
        let unverified_users = self
            .purge_unverified_users(now)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "unverified account cleanup failed");
                0
            });
        info!(sessions, unverified_users, "cleanup finished");
        CleanupReport {
            sessions,
            unverified_users,
        }
    }
}
