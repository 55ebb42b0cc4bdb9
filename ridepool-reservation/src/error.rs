use ridepool_rides::RideError;
use uuid::Uuid;

use crate::store::StoreError;

/// The full error taxonomy of the reservation service.
///
/// Validation errors are terminal for the call and surfaced verbatim;
/// `Conflict` is the only retryable kind and is only returned once the
/// internal retry budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Seat count must be between 1 and {max}, got {requested}")]
    InvalidSeatCount { requested: i32, max: i32 },

    #[error("Only {available} seat(s) remain, requested {requested}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("Ride is not open for booking (status: {status})")]
    RideNotBookable { status: ridepool_rides::RideStatus },

    #[error("Ride not found: {0}")]
    RideNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Ride still has {count} confirmed booking(s)")]
    ConfirmedBookingsExist { count: usize },

    #[error("Commit conflicted with concurrent updates, please try again")]
    Conflict,

    #[error(transparent)]
    Ride(#[from] RideError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReservationError {
    /// Transient errors that the caller may retry as a whole user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReservationError::Conflict)
    }
}
