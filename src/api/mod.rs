pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/health", get(handlers::root::health_check))
        .nest("/api", api_routes())
        .with_state(app_state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/payments", payment_routes())
        .route("/plans", get(handlers::plans::list))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::payments::create))
        .route("/:id", get(handlers::payments::get))
        .route("/:id/verify", post(handlers::payments::verify))
        .route("/:id/resend", post(handlers::payments::resend))
        .route("/:id/cancel", post(handlers::payments::cancel))
}
