//! API Router and Application State
//!
//! Thin control surface over the session registry.

mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::session::SessionRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Session registry
    pub registry: Arc<SessionRegistry>,
    /// Service configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }
}

/// Create the control API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health))
        .route("/join_room", post(handlers::join_room))
        .route("/leave_room/{room_id}", post(handlers::leave_room))
        .route("/rooms", get(handlers::list_rooms))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
