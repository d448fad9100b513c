use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{MatchQuery, StaffError};
use crate::services::{MatchingService, StaffService};

fn map_staff_error(e: StaffError) -> AppError {
    match e {
        StaffError::NotFound => AppError::NotFound("Staff member not found".to_string()),
        StaffError::ValidationError(msg) => AppError::BadRequest(msg),
        StaffError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_staff(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let staff_service = StaffService::new(&state);

    let staff = staff_service.list_staff(token).await.map_err(map_staff_error)?;

    Ok(Json(json!({
        "staff": staff,
        "total": staff.len()
    })))
}

#[axum::debug_handler]
pub async fn get_staff(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let staff_service = StaffService::new(&state);

    let staff = staff_service
        .get_staff(staff_id, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn find_matching_staff(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<MatchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let matching_service = MatchingService::new(&state);

    let candidates = matching_service
        .find_candidates(&query, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({
        "candidates": candidates,
        "total": candidates.len(),
        "date": query.date
    })))
}
