//! Background housekeeping: expired sessions and lapsed sign-ups.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use hera_backend::domain::CleanupService;

/// Run the cleanup jobs now and then every `interval` until the server stops.
pub(crate) fn spawn_cleanup(service: CleanupService, interval: Duration) -> JoinHandle<()> {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = service.run().await;
            info!(
                sessions = report.sessions,
                unverified_users = report.unverified_users,
                next_run_secs = interval.as_secs(),
                "scheduled cleanup complete"
            );
        }
    })
}
