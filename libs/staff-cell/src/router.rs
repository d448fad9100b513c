use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn staff_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_staff))
        .route("/match", get(handlers::find_matching_staff))
        .route("/{staff_id}", get(handlers::get_staff))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
