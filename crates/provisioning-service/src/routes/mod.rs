//! HTTP routes for the provisioning service.
//!
//! Defines the Axum router and application state.

use crate::backend::MeetingBackend;
use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::registry::MeetingRegistry;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Backend that hosts the meetings.
    pub backend: Arc<dyn MeetingBackend>,

    /// Title to meeting map.
    pub registry: Arc<MeetingRegistry>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn MeetingBackend>) -> Self {
        Self {
            config,
            backend,
            registry: Arc::new(MeetingRegistry::new()),
        }
    }
}

/// Build the application routes.
///
/// - `GET /` - status body
/// - `POST /join?title&name&region` - create or reuse the meeting, add an attendee
/// - `POST /end?title` - delete the meeting
/// - `GET /health` - liveness probe
/// - `GET /metrics` - Prometheus metrics
///
/// Browser front ends call the service cross-origin, so CORS is permissive.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/", get(handlers::server_status))
        .route("/health", get(handlers::health_check))
        .route("/join", post(handlers::join_meeting))
        .route("/end", post(handlers::end_meeting))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Outermost layer last: metrics see every response, timeouts included.
    api_routes
        .merge(metrics_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
