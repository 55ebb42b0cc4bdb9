use chrono::{DateTime, Utc};
use ridepool_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ReservationError;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Rejected)
    }

    /// The legal transitions, and nothing else:
    /// PENDING → CONFIRMED (driver accept), PENDING → REJECTED (driver
    /// reject), CONFIRMED → CANCELLED (passenger), CONFIRMED → REJECTED
    /// (driver, pre-trip).
    pub fn can_transition(&self, to: BookingStatus) -> bool {
        matches!(
            (self, to),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Rejected)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Rejected)
        )
    }

    pub fn ensure_transition(&self, to: BookingStatus) -> Result<(), ReservationError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(ReservationError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REJECTED" => Ok(BookingStatus::Rejected),
            other => Err(format!("Unknown booking status: {}", other)),
        }
    }
}

/// A passenger's claim on seats of a ride.
///
/// `seats_booked` is immutable after creation; the only field the service
/// ever rewrites is `status` (plus `updated_at`). Passenger and driver
/// identity are denormalized onto the record for dashboard queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_phone: Option<Masked<String>>,
    pub driver_id: String,
    pub seats_booked: i32,
    pub total_price_amount: i32,
    pub price_currency: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ride_id: Uuid,
        passenger_id: &str,
        passenger_name: &str,
        passenger_phone: Option<String>,
        driver_id: &str,
        seats_booked: i32,
        total_price_amount: i32,
        price_currency: &str,
        status: BookingStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ride_id,
            passenger_id: passenger_id.to_string(),
            passenger_name: passenger_name.to_string(),
            passenger_phone: passenger_phone.map(Masked),
            driver_id: driver_id.to_string(),
            seats_booked,
            total_price_amount,
            price_currency: price_currency.to_string(),
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert!(BookingStatus::Pending.can_transition(BookingStatus::Confirmed));
        assert!(BookingStatus::Pending.can_transition(BookingStatus::Rejected));
        assert!(BookingStatus::Confirmed.can_transition(BookingStatus::Cancelled));
        assert!(BookingStatus::Confirmed.can_transition(BookingStatus::Rejected));
    }

    #[test]
    fn terminal_states_are_dead_ends() {
        for from in [BookingStatus::Cancelled, BookingStatus::Rejected] {
            for to in [
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
                BookingStatus::Rejected,
            ] {
                assert!(!from.can_transition(to), "{:?} -> {:?} must be illegal", from, to);
            }
        }
    }

    #[test]
    fn pending_cannot_be_cancelled_directly() {
        let err = BookingStatus::Pending
            .ensure_transition(BookingStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, ReservationError::InvalidTransition { .. }));
    }

    #[test]
    fn status_text_roundtrips() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
    }
}
