use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use ridepool_core::identity::Actor;
use ridepool_reservation::{Booking, ReleaseOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::user_auth_middleware;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub ride_id: Uuid,
    pub seats: i32,
    pub passenger_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: String,
    pub passenger_name: String,
    pub driver_id: String,
    pub seats_booked: i32,
    pub total_price_amount: i32,
    pub price_currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            ride_id: booking.ride_id,
            passenger_id: booking.passenger_id,
            passenger_name: booking.passenger_name,
            driver_id: booking.driver_id,
            seats_booked: booking.seats_booked,
            total_price_amount: booking.total_price_amount,
            price_currency: booking.price_currency,
            status: booking.status.to_string(),
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub booking_id: Uuid,
    pub status: String,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(reserve))
        .route("/v1/bookings/{id}/cancel", post(release_booking))
        .route("/v1/bookings/{id}/reject", post(release_booking))
        .route("/v1/bookings/{id}/accept", post(accept_booking))
        .route("/v1/me/bookings", get(my_bookings))
        .route_layer(middleware::from_fn_with_state(state, user_auth_middleware))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings
async fn reserve(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let booking = state
        .service
        .reserve(req.ride_id, req.seats, &actor, req.passenger_phone)
        .await?;

    state.publish_availability(req.ride_id).await;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// POST /v1/bookings/{id}/cancel and /v1/bookings/{id}/reject
///
/// Both are the same release under the hood: the service picks CANCELLED
/// or REJECTED from who the caller is, and a repeat call is answered with
/// ALREADY_RELEASED instead of a second decrement.
async fn release_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let outcome = state.service.release(booking_id, &actor).await?;

    let status = match outcome {
        ReleaseOutcome::Released(booking) => {
            state.publish_availability(booking.ride_id).await;
            booking.status.to_string()
        }
        ReleaseOutcome::AlreadyReleased { .. } => "ALREADY_RELEASED".to_string(),
    };

    Ok(Json(ReleaseResponse { booking_id, status }))
}

/// POST /v1/bookings/{id}/accept
async fn accept_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.service.accept(booking_id, &actor).await?;
    state.publish_availability(booking.ride_id).await;
    Ok(Json(booking.into()))
}

/// GET /v1/me/bookings
async fn my_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.service.bookings_by_passenger(&actor).await?;
    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}
