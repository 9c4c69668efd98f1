use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::DeviceService;

pub mod error;
pub mod packages;
pub mod telemetry;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DeviceService>,
}

impl AppState {
    pub fn new(service: DeviceService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build the main application router with all API routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health))
        // Package identity
        .route("/packages", get(packages::list))
        .route("/packages/resolve", post(packages::resolve))
        // Telemetry
        .route("/telemetry", delete(telemetry::clear_all))
        .route("/telemetry/capture", post(telemetry::capture))
        .route("/telemetry/history", get(telemetry::history))
        .route(
            "/telemetry/sessions",
            get(telemetry::sessions).post(telemetry::start_fresh),
        );

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Simple health check endpoint.
async fn health() -> &'static str {
    "ok"
}
