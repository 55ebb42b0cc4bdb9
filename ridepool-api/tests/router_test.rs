use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ridepool_api::state::{AppState, AuthConfig};
use ridepool_api::app;
use ridepool_reservation::{MemoryStore, ReservationPolicy, ReservationService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(ReservationService::new(store, ReservationPolicy::default()));
    let (sse_tx, _) = tokio::sync::broadcast::channel(16);

    app(AppState {
        service,
        sse_tx,
        auth: AuthConfig {
            secret: "test-secret".to_string(),
            expiration: 3600,
        },
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn request(app: &Router, req: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(req).await.unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// POST /auth/guest and pull out the bearer token.
async fn login(app: &Router, display_name: &str) -> String {
    let response = request(
        app,
        json_request(
            "POST",
            "/auth/guest",
            None,
            json!({ "display_name": display_name }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

async fn post_ride(app: &Router, token: &str, capacity: i32) -> Value {
    let response = request(
        app,
        json_request(
            "POST",
            "/v1/rides",
            Some(token),
            json!({
                "origin": { "address": "Central Station, Rotterdam", "lat": 51.92, "lng": 4.48 },
                "destination": { "address": "Schiphol Airport", "lat": 52.31, "lng": 4.76 },
                "departure_date": "2026-09-14",
                "departure_time": "07:30:00",
                "capacity": capacity,
                "price_amount": 1500,
                "vehicle_info": "Blue Toyota Corolla"
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn posting_a_ride_requires_a_token() {
    let app = test_app();
    let response = request(
        &app,
        json_request("POST", "/v1/rides", None, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn search_is_public_and_filtered() {
    let app = test_app();
    let driver = login(&app, "Driver Dan").await;
    post_ride(&app, &driver, 3).await;

    let response = request(&app, bare_request("GET", "/v1/rides?origin=rotterdam", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rides = body_json(response).await;
    assert_eq!(rides.as_array().unwrap().len(), 1);
    assert_eq!(rides[0]["remaining_seats"], 3);

    let response = request(&app, bare_request("GET", "/v1/rides?origin=utrecht", None)).await;
    let rides = body_json(response).await;
    assert!(rides.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn booking_flow_reports_real_availability() {
    let app = test_app();
    let driver = login(&app, "Driver Dan").await;
    let pax_a = login(&app, "Ada").await;
    let pax_b = login(&app, "Ben").await;

    let ride = post_ride(&app, &driver, 2).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    // Ada takes both seats.
    let response = request(
        &app,
        json_request(
            "POST",
            "/v1/bookings",
            Some(&pax_a),
            json!({ "ride_id": ride_id, "seats": 2, "passenger_phone": "+31612345678" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let booking = body_json(response).await;
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(booking["total_price_amount"], 3000);

    // The ride is now FULL.
    let response = request(&app, bare_request("GET", &format!("/v1/rides/{}", ride_id), None)).await;
    let detail = body_json(response).await;
    assert_eq!(detail["status"], "FULL");
    assert_eq!(detail["remaining_seats"], 0);

    // Ben is told how many seats actually remain.
    let response = request(
        &app,
        json_request(
            "POST",
            "/v1/bookings",
            Some(&pax_b),
            json!({ "ride_id": ride_id, "seats": 1 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error = body_json(response).await;
    assert_eq!(error["kind"], "INSUFFICIENT_SEATS");
    assert!(error["error"].as_str().unwrap().contains("0 seat(s) remain"));
}

#[tokio::test]
async fn cancellation_is_idempotent_over_http() {
    let app = test_app();
    let driver = login(&app, "Driver Dan").await;
    let pax = login(&app, "Ada").await;

    let ride = post_ride(&app, &driver, 2).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let response = request(
        &app,
        json_request(
            "POST",
            "/v1/bookings",
            Some(&pax),
            json!({ "ride_id": ride_id, "seats": 1 }),
        ),
    )
    .await;
    let booking = body_json(response).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let cancel_uri = format!("/v1/bookings/{}/cancel", booking_id);
    let response = request(&app, bare_request("POST", &cancel_uri, Some(&pax))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "CANCELLED");

    // Replayed cancellation is success, not a second decrement.
    let response = request(&app, bare_request("POST", &cancel_uri, Some(&pax))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ALREADY_RELEASED");

    let response = request(&app, bare_request("GET", &format!("/v1/rides/{}", ride_id), None)).await;
    assert_eq!(body_json(response).await["remaining_seats"], 2);
}

#[tokio::test]
async fn strangers_cannot_release_bookings() {
    let app = test_app();
    let driver = login(&app, "Driver Dan").await;
    let pax = login(&app, "Ada").await;
    let stranger = login(&app, "Mallory").await;

    let ride = post_ride(&app, &driver, 2).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();
    let response = request(
        &app,
        json_request(
            "POST",
            "/v1/bookings",
            Some(&pax),
            json!({ "ride_id": ride_id, "seats": 1 }),
        ),
    )
    .await;
    let booking = body_json(response).await;
    let booking_id = booking["id"].as_str().unwrap();

    let response = request(
        &app,
        bare_request(
            "POST",
            &format!("/v1/bookings/{}/reject", booking_id),
            Some(&stranger),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_booking_is_404() {
    let app = test_app();
    let pax = login(&app, "Ada").await;
    let response = request(
        &app,
        bare_request(
            "POST",
            &format!("/v1/bookings/{}/cancel", uuid::Uuid::new_v4()),
            Some(&pax),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["kind"], "BOOKING_NOT_FOUND");
}

#[tokio::test]
async fn delete_is_blocked_while_seats_are_committed() {
    let app = test_app();
    let driver = login(&app, "Driver Dan").await;
    let pax = login(&app, "Ada").await;

    let ride = post_ride(&app, &driver, 2).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();
    request(
        &app,
        json_request(
            "POST",
            "/v1/bookings",
            Some(&pax),
            json!({ "ride_id": ride_id, "seats": 1 }),
        ),
    )
    .await;

    let response = request(
        &app,
        bare_request("DELETE", &format!("/v1/rides/{}", ride_id), Some(&driver)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["kind"], "CONFIRMED_BOOKINGS_EXIST");
}

#[tokio::test]
async fn reconcile_is_driver_only_and_clean_on_a_healthy_ride() {
    let app = test_app();
    let driver = login(&app, "Driver Dan").await;
    let pax = login(&app, "Ada").await;

    let ride = post_ride(&app, &driver, 3).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();
    request(
        &app,
        json_request(
            "POST",
            "/v1/bookings",
            Some(&pax),
            json!({ "ride_id": ride_id, "seats": 2 }),
        ),
    )
    .await;

    let reconcile_uri = format!("/v1/rides/{}/reconcile", ride_id);
    let response = request(&app, bare_request("POST", &reconcile_uri, Some(&pax))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(&app, bare_request("POST", &reconcile_uri, Some(&driver))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["corrected"], false);
    assert_eq!(report["seats_computed"], 2);
}

#[tokio::test]
async fn passenger_dashboard_lists_own_bookings() {
    let app = test_app();
    let driver = login(&app, "Driver Dan").await;
    let pax = login(&app, "Ada").await;

    let ride = post_ride(&app, &driver, 3).await;
    let ride_id = ride["id"].as_str().unwrap().to_string();
    request(
        &app,
        json_request(
            "POST",
            "/v1/bookings",
            Some(&pax),
            json!({ "ride_id": ride_id, "seats": 1 }),
        ),
    )
    .await;

    let response = request(&app, bare_request("GET", "/v1/me/bookings", Some(&pax))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bookings = body_json(response).await;
    assert_eq!(bookings.as_array().unwrap().len(), 1);
    assert_eq!(bookings[0]["passenger_name"], "Ada");

    let response = request(&app, bare_request("GET", "/v1/me/rides", Some(&driver))).await;
    let rides = body_json(response).await;
    assert_eq!(rides.as_array().unwrap().len(), 1);
    assert_eq!(rides[0]["confirmed_seats"], 1);
}
