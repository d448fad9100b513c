use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::router::booking_routes;
use shared_config::AppConfig;
use staff_cell::router::staff_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Homecare scheduling API is running!" }))
        .nest("/bookings", booking_routes(state.clone()))
        .nest("/staff", staff_routes(state))
}
