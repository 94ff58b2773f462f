//! Server construction and middleware wiring.

mod cleanup;
mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::{AppSettings, ServerConfig, SettingsError};

#[cfg(feature = "metrics")]
use metrics::MetricsLayer;
#[cfg(feature = "metrics")]
pub use metrics::request_metrics;
use state_builders::{build_ports, build_states};

use std::sync::Arc;
use std::time::Duration;

use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession},
    storage::CookieSessionStore,
};
use actix_web::cookie::{Key, SameSite};
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use tracing::info;

use hera_backend::doc::ApiDoc;
use hera_backend::inbound::http::health::{HealthState, live, ready};
use hera_backend::inbound::http::routes;
use hera_backend::inbound::http::state::{HttpState, HttpStatePolicies};
use hera_backend::inbound::ws;
use hera_backend::inbound::ws::hub::LiveHub;
use hera_backend::inbound::ws::state::WsState;
use hera_backend::middleware::SilentRefresh;
use hera_backend::Trace;
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
    ws_state: web::Data<WsState>,
    key: Key,
    cookie_secure: bool,
    same_site: SameSite,
    session_ttl: Duration,
}

fn session_middleware(
    key: Key,
    cookie_secure: bool,
    same_site: SameSite,
    ttl: Duration,
) -> SessionMiddleware<CookieSessionStore> {
    let ttl = actix_web::cookie::time::Duration::seconds(
        i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
    );
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".into())
        .cookie_path("/".into())
        .cookie_secure(cookie_secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(same_site)
        .session_lifecycle(PersistentSession::default().session_ttl(ttl))
        .build()
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
        ws_state,
        key,
        cookie_secure,
        same_site,
        session_ttl,
    } = deps;

    let api = web::scope("/api/v1")
        .wrap(SilentRefresh)
        .wrap(session_middleware(key, cookie_secure, same_site, session_ttl))
        .configure(routes::configure);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .app_data(ws_state)
        .wrap(Trace)
        .service(api)
        .service(ws::ws_entry)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app.route(
        "/api-docs/openapi.json",
        web::get().to(|| async { web::Json(ApiDoc::openapi()) }),
    );

    app
}

/// Construct an Actix HTTP server using the provided health state and configuration.
///
/// Also starts the cleanup scheduler, which lives as long as the runtime.
///
/// # Errors
/// Propagates [`std::io::Error`] when settings are invalid, or binding the
/// socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let ServerConfig {
        key,
        cookie_secure,
        same_site,
        session_ttl,
        bind_addr,
        db_pool,
        settings,
        #[cfg(feature = "metrics")]
        prometheus,
    } = config;

    let ws_settings = settings.ws_settings().map_err(std::io::Error::other)?;
    let daraja = settings.daraja_config().map_err(std::io::Error::other)?;
    let policies = HttpStatePolicies {
        auth: settings.auth_policy().map_err(std::io::Error::other)?,
        shipping: settings.shipping_policy().map_err(std::io::Error::other)?,
    };

    let hub = Arc::new(LiveHub::new());
    let ports = build_ports(&db_pool, daraja, hub.clone());
    let states = build_states(ports, policies, hub, ws_settings);
    let _cleanup = cleanup::spawn_cleanup(
        states.ports.cleanup_service(),
        settings.cleanup_interval(),
    );
    let http_state = web::Data::new(states.http);
    let ws_state = web::Data::new(states.ws);

    #[cfg(feature = "metrics")]
    let metrics_layer = MetricsLayer::from_option(prometheus);

    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        let app = build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
            ws_state: ws_state.clone(),
            key: key.clone(),
            cookie_secure,
            same_site,
            session_ttl,
        });

        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics_layer.clone());

        app
    })
    .bind(bind_addr)?
    .run();

    info!(%bind_addr, "server listening");
    health_state.mark_ready();
    Ok(server)
}
