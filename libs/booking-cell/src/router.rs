use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_booking))
        .route("/slots", get(handlers::get_available_slots))
        .route("/slots/range", get(handlers::get_available_slots_for_range))
        .route("/slots/next", get(handlers::get_next_available_slot))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}/auto-assign", post(handlers::auto_assign))
        .route("/{booking_id}/assign", post(handlers::manual_assign))
        .route("/{booking_id}/respond", post(handlers::staff_respond))
        .route("/{booking_id}/check-in", post(handlers::check_in))
        .route("/{booking_id}/check-out", post(handlers::check_out))
        .route("/{booking_id}/cancel", post(handlers::cancel_booking))
        .route(
            "/{booking_id}/confirm-completion",
            post(handlers::confirm_completion),
        )
        .route(
            "/{booking_id}/force-complete",
            post(handlers::force_complete),
        )
        .route("/{booking_id}/reschedule", patch(handlers::reschedule_booking))
        .route(
            "/maintenance/expire-assignments",
            post(handlers::expire_assignments),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
