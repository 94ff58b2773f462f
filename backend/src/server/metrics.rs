//! Prometheus request metrics behind the `metrics` feature.
//!
//! The registry is served at `/metrics`. Probe and socket routes are left
//! out of the request histograms: probes would drown the storefront traffic
//! and a `/ws` upgrade lasts as long as the connection.

use std::sync::Arc;

use actix_service::{
    Service, ServiceExt as _, Transform,
    boxed::{self, BoxService},
};
use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Compat;
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use futures_util::future::LocalBoxFuture;

/// Metric name prefix.
pub const NAMESPACE: &str = "hera";
/// Path the registry is served on.
pub const ENDPOINT: &str = "/metrics";
const UNTRACKED: [&str; 3] = ["/health/ready", "/health/live", "/ws"];

/// Build the request metrics collector.
///
/// # Errors
/// Returns an [`std::io::Error`] when the collectors cannot be registered.
pub fn request_metrics() -> std::io::Result<PrometheusMetrics> {
    let builder = UNTRACKED
        .into_iter()
        .fold(
            PrometheusMetricsBuilder::new(NAMESPACE).endpoint(ENDPOINT),
            PrometheusMetricsBuilder::exclude,
        );
    builder
        .build()
        .map_err(|err| std::io::Error::other(format!("prometheus registry: {err}")))
}

/// Either the Prometheus middleware or a pass-through, so the app type is
/// the same whether or not a collector was configured.
#[derive(Clone)]
pub(crate) enum MetricsLayer {
    Enabled(Arc<PrometheusMetrics>),
    Disabled,
}

impl MetricsLayer {
    #[must_use]
    pub(crate) fn from_option(metrics: Option<PrometheusMetrics>) -> Self {
        metrics.map_or(Self::Disabled, |metrics| Self::Enabled(Arc::new(metrics)))
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        match self.clone() {
            Self::Enabled(metrics) => {
                let fut = Compat::new((*metrics).clone()).new_transform(service);
                Box::pin(async move { Ok(boxed::service(fut.await?)) })
            }
            Self::Disabled => Box::pin(async move {
                let svc = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
                Ok(boxed::service(svc))
            }),
        }
    }
}
