use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ridepool_reservation::ReservationError;
use serde_json::json;

/// HTTP boundary for the reservation error taxonomy.
///
/// Validation errors surface verbatim so the caller can act on them
/// ("only N seats remain"); store/internal failures are logged and return
/// an opaque 500.
#[derive(Debug)]
pub enum ApiError {
    Reservation(ReservationError),
    Internal(anyhow::Error),
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        Self::Reservation(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Reservation(err) => err,
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                return internal_error();
            }
        };

        let (status, kind) = match &err {
            ReservationError::InvalidSeatCount { .. } => (StatusCode::BAD_REQUEST, "INVALID_SEAT_COUNT"),
            ReservationError::InvalidTransition { .. } => (StatusCode::BAD_REQUEST, "INVALID_TRANSITION"),
            ReservationError::Ride(_) => (StatusCode::BAD_REQUEST, "INVALID_RIDE"),
            ReservationError::NotAuthorized(_) => (StatusCode::FORBIDDEN, "NOT_AUTHORIZED"),
            ReservationError::RideNotFound(_) => (StatusCode::NOT_FOUND, "RIDE_NOT_FOUND"),
            ReservationError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "BOOKING_NOT_FOUND"),
            ReservationError::InsufficientSeats { .. } => (StatusCode::CONFLICT, "INSUFFICIENT_SEATS"),
            ReservationError::RideNotBookable { .. } => (StatusCode::CONFLICT, "RIDE_NOT_BOOKABLE"),
            ReservationError::ConfirmedBookingsExist { .. } => {
                (StatusCode::CONFLICT, "CONFIRMED_BOOKINGS_EXIST")
            }
            ReservationError::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            ReservationError::Store(e) => {
                tracing::error!("Store error: {}", e);
                return internal_error();
            }
        };

        let body = Json(json!({
            "error": err.to_string(),
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

fn internal_error() -> Response {
    let body = Json(json!({
        "error": "Internal Server Error",
        "kind": "INTERNAL",
    }));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
