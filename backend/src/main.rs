//! Backend entry-point: loads settings, migrates the database, and serves the
//! REST API, WebSocket entry and OpenAPI docs.

mod server;

use actix_web::web;
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultEnv;
use ortho_config::OrthoConfig as _;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use hera_backend::inbound::http::health::HealthState;
use hera_backend::inbound::http::session_config::{BuildMode, session_settings_from_env};
use hera_backend::outbound::persistence::{DbPool, run_migrations};
use server::{AppSettings, ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load settings: {err}"))?;
    let session =
        session_settings_from_env(&DefaultEnv::new(), BuildMode::from_debug_assertions())
            .wrap_err("invalid session cookie configuration")?;
    info!(key = %session.key_fingerprint(), "session key loaded");

    let pool_config = settings.pool_config()?;
    if settings.skip_migrations {
        warn!("HERA_SKIP_MIGRATIONS set; not migrating the database");
    } else {
        run_migrations(pool_config.database_url())
            .await
            .wrap_err("database migration failed")?;
    }
    let pool = DbPool::new(pool_config)
        .await
        .wrap_err("failed to build the database pool")?;

    let bind_addr = settings.bind_addr()?;
    let config = ServerConfig::new(session, bind_addr, pool, settings);
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(Some(
        server::request_metrics().wrap_err("failed to configure Prometheus metrics")?,
    ));

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), config)?;
    let outcome = server.await;
    health_state.mark_unhealthy();
    outcome.wrap_err("server terminated with an error")
}
