use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use staff_cell::services::staff::StaffService;

use crate::models::{
    Actor, BookingError, CancelBookingRequest, CreateBookingRequest, ForceCompleteRequest,
    ManualAssignRequest, RescheduleRequest, StaffResponseRequest,
};
use crate::services::scheduling::{ScanControl, SchedulingService};

const MAX_RANGE_DAYS: i64 = 31;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub service_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub service_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NextSlotQuery {
    pub from: NaiveDate,
    pub service_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::NotFound => AppError::NotFound("Booking not found".to_string()),
        BookingError::InvalidTransition { .. } => AppError::BadRequest(e.to_string()),
        BookingError::Unauthorized => AppError::Auth("Not authorized for this booking".to_string()),
        BookingError::NoAvailableStaff => AppError::NotFound(
            "No staff available for the requested time; try another slot".to_string(),
        ),
        BookingError::InvalidSchedule(msg) => AppError::BadRequest(msg),
        BookingError::Busy(msg) => AppError::Busy(msg),
        BookingError::ValidationError(msg) => AppError::Validation(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user id".to_string()))
}

/// Customer and admin callers act under their own identity; the staff role is
/// resolved to a staff row so transition guards can compare against the
/// booking's assignment.
async fn resolve_actor(
    state: &AppConfig,
    user: &User,
    token: &str,
) -> Result<Actor, AppError> {
    if user.is_admin() {
        return Ok(Actor::Admin);
    }
    if user.is_staff() {
        let staff = StaffService::new(state)
            .get_by_user_id(user_uuid(user)?, token)
            .await
            .map_err(|_| AppError::Auth("No staff profile for this account".to_string()))?;
        return Ok(Actor::Staff(staff.id));
    }
    Ok(Actor::Customer(user_uuid(user)?))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && request.customer_id != user_uuid(&user)? {
        return Err(AppError::Auth(
            "Cannot create bookings for another customer".to_string(),
        ));
    }

    let scheduling = SchedulingService::new(&state);
    let outcome = scheduling
        .create_booking(request, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "booking": outcome.booking,
        "assignment_note": outcome.assignment_note,
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let scheduling = SchedulingService::new(&state);

    let booking = scheduling
        .get_booking(booking_id, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn auto_assign(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let scheduling = SchedulingService::new(&state);

    let booking = scheduling
        .auto_assign(booking_id, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn manual_assign(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ManualAssignRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can assign staff directly".to_string(),
        ));
    }

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .manual_assign(booking_id, request.staff_id, Actor::Admin, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn staff_respond(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<StaffResponseRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_staff() {
        return Err(AppError::Auth(
            "Only staff can respond to assignments".to_string(),
        ));
    }
    let actor = resolve_actor(&state, &user, token).await?;

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .staff_respond(
            booking_id,
            request.accept,
            request.reason,
            actor,
            Utc::now(),
            token,
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn check_in(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = resolve_actor(&state, &user, token).await?;

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .check_in(booking_id, actor, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn check_out(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = resolve_actor(&state, &user, token).await?;

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .check_out(booking_id, actor, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn confirm_completion(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = resolve_actor(&state, &user, token).await?;

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .confirm_completion(booking_id, actor, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = resolve_actor(&state, &user, token).await?;

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .cancel_booking(booking_id, request.reason, actor, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn force_complete(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ForceCompleteRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can force-complete bookings".to_string(),
        ));
    }

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .force_complete(booking_id, request.note, Actor::Admin, Utc::now(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn reschedule_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = resolve_actor(&state, &user, token).await?;

    let scheduling = SchedulingService::new(&state);
    let booking = scheduling
        .reschedule_booking(
            booking_id,
            request.scheduled_date,
            request.scheduled_time,
            actor,
            Utc::now(),
            token,
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let scheduling = SchedulingService::new(&state);

    let slots = scheduling
        .get_available_slots(query.date, query.service_id, query.staff_id, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "date": query.date,
        "available_slots": slots,
        "total_slots": slots.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots_for_range(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotsRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let span = (query.end_date - query.start_date).num_days();
    if span >= MAX_RANGE_DAYS {
        return Err(AppError::BadRequest(format!(
            "Range is limited to {} days",
            MAX_RANGE_DAYS
        )));
    }

    let scheduling = SchedulingService::new(&state);
    let control = ScanControl::new();
    let by_date = scheduling
        .get_available_slots_for_range(
            query.start_date,
            query.end_date,
            query.service_id,
            query.staff_id,
            &control,
            token,
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "start_date": query.start_date,
        "end_date": query.end_date,
        "days": by_date,
    })))
}

#[axum::debug_handler]
pub async fn get_next_available_slot(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<NextSlotQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let scheduling = SchedulingService::new(&state);

    let (date, slot) = scheduling
        .get_next_available_slot(query.from, query.service_id, query.staff_id, token)
        .await
        .map_err(|e| match e {
            BookingError::NotFound => {
                AppError::NotFound("No availability within the next 30 days".to_string())
            }
            other => map_booking_error(other),
        })?;

    Ok(Json(json!({
        "date": date,
        "slot": slot,
    })))
}

// ==============================================================================
// MAINTENANCE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn expire_assignments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can run maintenance tasks".to_string(),
        ));
    }

    let scheduling = SchedulingService::new(&state);
    let swept = scheduling
        .expire_stale_assignments(Utc::now(), token)
        .await
        .map_err(map_booking_error)?;
    let locks_cleaned = scheduling
        .cleanup_expired_locks()
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "expired_assignments": swept,
        "locks_cleaned": locks_cleaned,
    })))
}
