use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::router::booking_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestUser};

fn test_config(mock_server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: mock_server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
    }
}

fn create_test_app(config: AppConfig) -> Router {
    booking_routes(Arc::new(config))
}

fn booking_row(id: Uuid, status: &str, staff_id: Option<Uuid>) -> serde_json::Value {
    json!({
        "id": id,
        "booking_number": "BK20250616-0001",
        "customer_id": Uuid::from_u128(200),
        "service_id": Uuid::from_u128(5),
        "package_id": null,
        "staff_id": staff_id,
        "status": status,
        "scheduled_date": "2025-06-16",
        "scheduled_time": "10:00:00",
        "estimated_duration_minutes": 60,
        "address_latitude": 40.7128,
        "address_longitude": -74.0060,
        "total_amount": 120.0,
        "final_amount": null,
        "staff_response_deadline": null,
        "staff_accepted_at": null,
        "staff_declined_at": null,
        "declined_reason": null,
        "started_at": null,
        "completed_at": null,
        "cancelled_at": null,
        "cancellation_reason": null,
        "admin_notes": null,
        "created_at": "2025-06-10T12:00:00Z",
        "updated_at": "2025-06-10T12:00:00Z"
    })
}

fn staff_row(id: Uuid) -> serde_json::Value {
    let service_id = Uuid::from_u128(5);
    json!({
        "id": id,
        "user_id": Uuid::new_v4(),
        "full_name": "Test Staff",
        "account_status": "active",
        "is_available": true,
        "current_latitude": null,
        "current_longitude": null,
        "service_radius_km": 25.0,
        "average_rating": 4.5,
        "total_completed_jobs": 12,
        "staff_skills": [{
            "id": Uuid::new_v4(),
            "staff_id": id,
            "service_id": service_id,
            "is_active": true
        }],
        "work_schedules": [{
            "id": Uuid::new_v4(),
            "staff_id": id,
            "day_of_week": 1,
            "start_time": "08:00:00",
            "end_time": "18:00:00",
            "is_active": true
        }],
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
}

async fn mount_lock_table(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201))
        .mount(mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

fn admin_token(config: &AppConfig) -> String {
    let admin = TestUser::admin("admin@example.com");
    JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24))
}

#[tokio::test]
async fn auto_assign_commits_best_candidate() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);
    let staff_id = Uuid::from_u128(7);

    mount_lock_table(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "pending", None)])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([staff_row(staff_id)])))
        .mount(&mock_server)
        .await;

    // No existing commitments, whether scanned day-wide or per staff member.
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("scheduled_date", "eq.2025-06-16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("staff_id", format!("eq.{}", staff_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "auto_assigned", Some(staff_id))])),
        )
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/auto-assign", booking_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["status"], "auto_assigned");
    assert_eq!(json_response["staff_id"], staff_id.to_string());
}

#[tokio::test]
async fn auto_assign_without_candidates_returns_404() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);

    mount_lock_table(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "pending", None)])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/auto-assign", booking_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn auto_assign_of_assigned_booking_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);
    let staff_id = Uuid::from_u128(7);

    mount_lock_table(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "auto_assigned", Some(staff_id))])),
        )
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/auto-assign", booking_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn held_booking_lock_turns_into_busy() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);

    // Every insert conflicts and the existing lock has not expired yet.
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "expires_at": (Utc::now() + Duration::seconds(25)).to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/auto-assign", booking_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn contended_staff_slot_yields_no_available_staff() {
    // The booking lock is free but the only candidate's slot lock is held by
    // a concurrent assignment, so this caller must lose cleanly.
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);
    let staff_id = Uuid::from_u128(7);

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "expires_at": (Utc::now() + Duration::seconds(25)).to_rfc3339()
        }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "pending", None)])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([staff_row(staff_id)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("scheduled_date", "eq.2025-06-16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/auto-assign", booking_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn auto_assign_locks_the_staff_day_not_the_start_time() {
    // A 10:00 booking must take the day-wide staff key; a key carrying the
    // start time would let a 10:30 assignment slip past the conflict
    // re-check with a different key.
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);
    let staff_id = Uuid::from_u128(7);

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .and(body_partial_json(json!({
            "lock_key": format!("staff_{}_2025-06-16", staff_id)
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "pending", None)])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([staff_row(staff_id)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("scheduled_date", "eq.2025-06-16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bookings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "auto_assigned", Some(staff_id))])),
        )
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/auto-assign", booking_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn manual_assign_takes_the_booking_lock() {
    // Manual and auto assignment write the same column; both must serialize
    // on the per-booking key or a concurrent auto-assign silently loses.
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);
    let staff_id = Uuid::from_u128(7);

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .and(body_partial_json(json!({
            "lock_key": format!("booking_{}", booking_id)
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "pending", None)])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([staff_row(staff_id)])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("staff_id", format!("eq.{}", staff_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "confirmed", Some(staff_id))])),
        )
        .mount(&mock_server)
        .await;

    let body = json!({ "staff_id": staff_id });
    let request = Request::builder()
        .method("POST")
        .uri(&format!("/{}/assign", booking_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["status"], "confirmed");
}

#[tokio::test]
async fn slots_for_open_day_follow_business_hours() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "day_of_week": 1,
            "open_time": "08:00:00",
            "close_time": "18:00:00",
            "is_closed": false,
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([staff_row(Uuid::from_u128(7))])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/slots?date=2025-06-16")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // 08:00-18:00 with 60-minute windows on a 30-minute step.
    assert_eq!(json_response["total_slots"], 19);
    assert_eq!(
        json_response["available_slots"][0]["start_time"],
        "08:00:00"
    );
    assert_eq!(
        json_response["available_slots"][18]["start_time"],
        "17:00:00"
    );
}

#[tokio::test]
async fn slots_on_closed_day_are_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "day_of_week": 0,
            "open_time": "00:00:00",
            "close_time": "00:00:00",
            "is_closed": true,
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/slots?date=2025-06-15")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn slots_are_rejected_when_no_window_fits_the_day() {
    // Open for 45 minutes with the default 60-minute service: the generator
    // yields nothing and the day is reported as unschedulable, not empty.
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "day_of_week": 1,
            "open_time": "09:00:00",
            "close_time": "09:45:00",
            "is_closed": false,
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/slots?date=2025-06-16")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sweeper_reverts_expired_assignments() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());
    let token = admin_token(&config);

    let booking_id = Uuid::from_u128(100);
    let staff_id = Uuid::from_u128(7);

    let mut stale = booking_row(booking_id, "auto_assigned", Some(staff_id));
    stale["staff_response_deadline"] =
        json!((Utc::now() - Duration::hours(1)).to_rfc3339());

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("status", "eq.auto_assigned"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stale])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", booking_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([booking_row(booking_id, "pending", None)])),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/maintenance/expire-assignments")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["expired_assignments"], 1);
}

#[tokio::test]
async fn customers_cannot_book_for_someone_else() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());

    let customer = TestUser::customer("customer@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    let body = json!({
        "customer_id": Uuid::new_v4(),
        "service_id": Uuid::from_u128(5),
        "scheduled_date": "2030-06-16",
        "scheduled_time": "10:00:00",
        "address_latitude": 40.7128,
        "address_longitude": -74.0060
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bookings_in_the_past_are_rejected() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());

    let customer = TestUser::customer("customer@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    let body = json!({
        "customer_id": customer.id,
        "service_id": Uuid::from_u128(5),
        "scheduled_date": "2020-06-16",
        "scheduled_time": "10:00:00",
        "address_latitude": 40.7128,
        "address_longitude": -74.0060
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn maintenance_requires_admin() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.clone());

    let customer = TestUser::customer("customer@example.com");
    let token = JwtTestUtils::create_test_token(&customer, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("POST")
        .uri("/maintenance/expire-assignments")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
