use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ridepool_shared::geo::{Location, RouteSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Ride status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Active,
    Full,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "ACTIVE",
            RideStatus::Full => "FULL",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(RideStatus::Active),
            "FULL" => Ok(RideStatus::Full),
            "COMPLETED" => Ok(RideStatus::Completed),
            "CANCELLED" => Ok(RideStatus::Cancelled),
            other => Err(RideError::UnknownStatus(other.to_string())),
        }
    }
}

/// A driver's posted trip offer.
///
/// `confirmed_seats` is a cached sum over this ride's CONFIRMED bookings and
/// `version` is the optimistic-concurrency stamp: every committed write of
/// the record increments it, and stale writers are rejected by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: String,
    pub driver_name: String,
    pub origin: Location,
    pub destination: Location,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub capacity: i32,
    pub confirmed_seats: i32,
    pub price_amount: i32,
    pub price_currency: String,
    pub vehicle_info: Option<String>,
    pub route_summary: Option<RouteSummary>,
    pub status: RideStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a driver supplies when posting a ride.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRide {
    pub origin: Location,
    pub destination: Location,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub capacity: i32,
    pub price_amount: i32,
    #[serde(default = "default_currency")]
    pub price_currency: String,
    pub vehicle_info: Option<String>,
    pub route_summary: Option<RouteSummary>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Driver-editable fields. Capacity and seat counts are deliberately absent:
/// capacity is fixed at creation and seat counts only move through the
/// reservation service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RideUpdate {
    pub origin: Option<Location>,
    pub destination: Option<Location>,
    pub departure_date: Option<NaiveDate>,
    pub departure_time: Option<NaiveTime>,
    pub price_amount: Option<i32>,
    pub vehicle_info: Option<String>,
    pub route_summary: Option<RouteSummary>,
}

impl Ride {
    pub fn new(driver_id: &str, driver_name: &str, form: NewRide) -> Result<Self, RideError> {
        if form.capacity <= 0 {
            return Err(RideError::InvalidCapacity(form.capacity));
        }
        if form.price_amount < 0 {
            return Err(RideError::InvalidPrice(form.price_amount));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            driver_id: driver_id.to_string(),
            driver_name: driver_name.to_string(),
            origin: form.origin,
            destination: form.destination,
            departure_date: form.departure_date,
            departure_time: form.departure_time,
            capacity: form.capacity,
            confirmed_seats: 0,
            price_amount: form.price_amount,
            price_currency: form.price_currency,
            vehicle_info: form.vehicle_info,
            route_summary: form.route_summary,
            status: RideStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn remaining_seats(&self) -> i32 {
        self.capacity - self.confirmed_seats
    }

    pub fn is_bookable(&self) -> bool {
        self.status == RideStatus::Active
    }

    /// Set the confirmed-seat count and keep `status` in step with it:
    /// FULL exactly when capacity is exhausted, ACTIVE otherwise. Terminal
    /// statuses are never touched, only the count.
    pub fn set_confirmed_seats(&mut self, seats: i32, now: DateTime<Utc>) {
        self.confirmed_seats = seats;
        if !self.status.is_terminal() {
            self.status = if self.confirmed_seats >= self.capacity {
                RideStatus::Full
            } else {
                RideStatus::Active
            };
        }
        self.updated_at = now;
    }

    /// Apply driver edits to schedule/price/display fields.
    pub fn apply_update(&mut self, update: RideUpdate, now: DateTime<Utc>) -> Result<(), RideError> {
        if let Some(price) = update.price_amount {
            if price < 0 {
                return Err(RideError::InvalidPrice(price));
            }
            self.price_amount = price;
        }
        if let Some(origin) = update.origin {
            self.origin = origin;
        }
        if let Some(destination) = update.destination {
            self.destination = destination;
        }
        if let Some(date) = update.departure_date {
            self.departure_date = date;
        }
        if let Some(time) = update.departure_time {
            self.departure_time = time;
        }
        if let Some(vehicle) = update.vehicle_info {
            self.vehicle_info = Some(vehicle);
        }
        if let Some(route) = update.route_summary {
            self.route_summary = Some(route);
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RideError {
    #[error("Ride capacity must be a positive seat count, got {0}")]
    InvalidCapacity(i32),

    #[error("Price must not be negative, got {0}")]
    InvalidPrice(i32),

    #[error("Unknown ride status: {0}")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_form() -> NewRide {
        NewRide {
            origin: Location {
                address: "Harbor Square".to_string(),
                lat: 51.92,
                lng: 4.48,
            },
            destination: Location {
                address: "Airport Plaza".to_string(),
                lat: 52.31,
                lng: 4.76,
            },
            departure_date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            departure_time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            capacity: 4,
            price_amount: 1250,
            price_currency: "USD".to_string(),
            vehicle_info: Some("Blue Toyota Corolla".to_string()),
            route_summary: None,
        }
    }

    #[test]
    fn new_ride_starts_active_and_empty() {
        let ride = Ride::new("driver-1", "Sam", sample_form()).unwrap();
        assert_eq!(ride.status, RideStatus::Active);
        assert_eq!(ride.confirmed_seats, 0);
        assert_eq!(ride.remaining_seats(), 4);
        assert_eq!(ride.version, 0);
    }

    #[test]
    fn capacity_must_be_positive() {
        let mut form = sample_form();
        form.capacity = 0;
        assert!(matches!(
            Ride::new("driver-1", "Sam", form),
            Err(RideError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn seat_count_flips_full_and_back() {
        let mut ride = Ride::new("driver-1", "Sam", sample_form()).unwrap();
        let now = Utc::now();

        ride.set_confirmed_seats(4, now);
        assert_eq!(ride.status, RideStatus::Full);
        assert_eq!(ride.remaining_seats(), 0);

        ride.set_confirmed_seats(3, now);
        assert_eq!(ride.status, RideStatus::Active);
        assert_eq!(ride.remaining_seats(), 1);
    }

    #[test]
    fn terminal_status_survives_seat_updates() {
        let mut ride = Ride::new("driver-1", "Sam", sample_form()).unwrap();
        ride.status = RideStatus::Cancelled;

        ride.set_confirmed_seats(4, Utc::now());
        assert_eq!(ride.status, RideStatus::Cancelled);
        assert_eq!(ride.confirmed_seats, 4);
    }

    #[test]
    fn update_rejects_negative_price() {
        let mut ride = Ride::new("driver-1", "Sam", sample_form()).unwrap();
        let update = RideUpdate {
            price_amount: Some(-5),
            ..Default::default()
        };
        assert!(matches!(
            ride.apply_update(update, Utc::now()),
            Err(RideError::InvalidPrice(-5))
        ));
    }

    #[test]
    fn status_text_roundtrips() {
        for status in [
            RideStatus::Active,
            RideStatus::Full,
            RideStatus::Completed,
            RideStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RideStatus>().unwrap(), status);
        }
        assert!("BOARDING".parse::<RideStatus>().is_err());
    }
}
