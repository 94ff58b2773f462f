//! Builders wiring Diesel repositories and external adapters into the
//! HTTP and WebSocket states.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::{info, warn};

use hera_backend::domain::PresenceRegistry;
use hera_backend::domain::ports::{DisabledMpesaGateway, MpesaGateway};
use hera_backend::inbound::http::state::{HttpState, HttpStatePolicies, HttpStatePorts};
use hera_backend::inbound::ws::hub::LiveHub;
use hera_backend::inbound::ws::state::{WsSettings, WsState};
use hera_backend::outbound::mpesa::{DarajaConfig, DarajaGateway};
use hera_backend::outbound::persistence::{
    DbPool, DieselCatalogueRepository, DieselDiscountRepository, DieselExpenseRepository,
    DieselNotificationRepository, DieselOrderRepository, DieselPaymentRepository,
    DieselSessionRepository, DieselStockRepository, DieselUserRepository,
};
use hera_backend::outbound::security::Argon2PasswordHasher;

/// States shared by every worker, plus the ports for background jobs.
pub(crate) struct AppStates {
    pub(crate) http: HttpState,
    pub(crate) ws: WsState,
    pub(crate) ports: HttpStatePorts,
}

/// Daraja when credentials are configured, otherwise a gateway that answers
/// every push with "not configured".
fn build_gateway(config: Option<DarajaConfig>, clock: Arc<dyn Clock>) -> Arc<dyn MpesaGateway> {
    let Some(config) = config else {
        warn!("M-Pesa credentials not configured; payments are disabled");
        return Arc::new(DisabledMpesaGateway);
    };
    info!(shortcode = %config.shortcode, base_url = %config.base_url, "M-Pesa gateway enabled");
    match DarajaGateway::new(config, clock) {
        Ok(gateway) => Arc::new(gateway),
        Err(error) => {
            warn!(%error, "failed to build Daraja client; payments are disabled");
            Arc::new(DisabledMpesaGateway)
        }
    }
}

/// Driven ports backed by PostgreSQL, publishing live events through `hub`.
pub(crate) fn build_ports(
    pool: &DbPool,
    daraja: Option<DarajaConfig>,
    hub: Arc<LiveHub>,
) -> HttpStatePorts {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let mpesa_callback_token = daraja.as_ref().map(|config| config.callback_token.clone());
    HttpStatePorts {
        users: Arc::new(DieselUserRepository::new(pool.clone())),
        sessions: Arc::new(DieselSessionRepository::new(pool.clone())),
        catalogue: Arc::new(DieselCatalogueRepository::new(pool.clone())),
        stock: Arc::new(DieselStockRepository::new(pool.clone())),
        discounts: Arc::new(DieselDiscountRepository::new(pool.clone())),
        orders: Arc::new(DieselOrderRepository::new(pool.clone())),
        payments: Arc::new(DieselPaymentRepository::new(pool.clone())),
        notifications: Arc::new(DieselNotificationRepository::new(pool.clone())),
        expenses: Arc::new(DieselExpenseRepository::new(pool.clone())),
        hasher: Arc::new(Argon2PasswordHasher::default()),
        gateway: build_gateway(daraja, clock.clone()),
        mpesa_callback_token,
        publisher: hub,
        clock,
    }
}

/// Build both adapter states around one hub and one presence registry.
pub(crate) fn build_states(
    ports: HttpStatePorts,
    policies: HttpStatePolicies,
    hub: Arc<LiveHub>,
    ws_settings: WsSettings,
) -> AppStates {
    let http = HttpState::new(
        ports.clone(),
        policies,
        Arc::new(PresenceRegistry::new()),
    );
    let ws = WsState::sharing(&http, hub, ws_settings);
    AppStates { http, ws, ports }
}
