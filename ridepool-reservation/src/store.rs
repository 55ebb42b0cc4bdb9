use async_trait::async_trait;
use ridepool_rides::{Ride, RideFilter};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The guarded write lost against a concurrent commit (stale ride
    /// version, unexpected booking status, or a record deleted underneath
    /// the caller). The caller should re-read and retry.
    #[error("Write conflicted with a concurrent commit")]
    VersionConflict,

    #[error("Storage backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Persistence port of the reservation service.
///
/// Version discipline: callers pass records carrying the `version` they
/// read. A conditional write checks that the stored version still matches,
/// persists the new field values with `version + 1`, and fails with
/// `VersionConflict` otherwise. `commit_booking` and `commit_booking_update`
/// apply their booking write and ride write as ONE atomic unit; a partial
/// commit must never be observable.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), StoreError>;

    async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>, StoreError>;

    /// Conditional write of a ride record (version CAS).
    async fn update_ride(&self, ride: &Ride) -> Result<(), StoreError>;

    /// Hard delete of a ride and its bookings.
    async fn delete_ride(&self, ride_id: Uuid) -> Result<(), StoreError>;

    async fn rides_by_driver(&self, driver_id: &str) -> Result<Vec<Ride>, StoreError>;

    /// Active-ride candidates matching the filter, newest first.
    async fn search_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, StoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn bookings_by_passenger(&self, passenger_id: &str) -> Result<Vec<Booking>, StoreError>;

    async fn bookings_by_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// Ledger sum: seats over this ride's CONFIRMED bookings.
    async fn confirmed_seat_total(&self, ride_id: Uuid) -> Result<i32, StoreError>;

    /// Insert a new booking and conditionally rewrite its ride in one
    /// atomic unit.
    async fn commit_booking(&self, ride: &Ride, booking: &Booking) -> Result<(), StoreError>;

    /// Rewrite a booking whose stored status still equals `expected`,
    /// optionally rewriting its ride (version CAS) in the same atomic unit.
    /// An unexpected stored status is a `VersionConflict`, which is what
    /// keeps terminal bookings terminal under racing callers.
    async fn commit_booking_update(
        &self,
        ride: Option<&Ride>,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<(), StoreError>;
}
