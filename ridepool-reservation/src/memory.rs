use async_trait::async_trait;
use ridepool_rides::{Ride, RideFilter};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::store::{ReservationStore, StoreError};

#[derive(Default)]
struct Tables {
    rides: HashMap<Uuid, Ride>,
    bookings: HashMap<Uuid, Booking>,
}

/// In-memory implementation of the reservation store.
///
/// One mutex over both tables makes every commit trivially atomic, and the
/// version checks give it the same conflict behavior as the Postgres store,
/// so service tests exercise the real retry paths. Backs unit/integration
/// tests and local development without a database.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cas_ride(tables: &mut Tables, ride: &Ride) -> Result<(), StoreError> {
    match tables.rides.get(&ride.id) {
        Some(current) if current.version == ride.version => {
            let mut next = ride.clone();
            next.version += 1;
            tables.rides.insert(ride.id, next);
            Ok(())
        }
        // Stale version, or the ride vanished under the caller.
        _ => Err(StoreError::VersionConflict),
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        tables.rides.insert(ride.id, ride.clone());
        Ok(())
    }

    async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables.rides.get(&ride_id).cloned())
    }

    async fn update_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        cas_ride(&mut tables, ride)
    }

    async fn delete_ride(&self, ride_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        tables.rides.remove(&ride_id);
        tables.bookings.retain(|_, b| b.ride_id != ride_id);
        Ok(())
    }

    async fn rides_by_driver(&self, driver_id: &str) -> Result<Vec<Ride>, StoreError> {
        let tables = self.inner.lock().await;
        let mut rides: Vec<Ride> = tables
            .rides
            .values()
            .filter(|r| r.driver_id == driver_id)
            .cloned()
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rides)
    }

    async fn search_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, StoreError> {
        let tables = self.inner.lock().await;
        let mut rides: Vec<Ride> = tables
            .rides
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rides)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables.bookings.get(&booking_id).cloned())
    }

    async fn bookings_by_passenger(&self, passenger_id: &str) -> Result<Vec<Booking>, StoreError> {
        let tables = self.inner.lock().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.passenger_id == passenger_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn bookings_by_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let tables = self.inner.lock().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn confirmed_seat_total(&self, ride_id: Uuid) -> Result<i32, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.ride_id == ride_id && b.status == BookingStatus::Confirmed)
            .map(|b| b.seats_booked)
            .sum())
    }

    async fn commit_booking(&self, ride: &Ride, booking: &Booking) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;
        cas_ride(&mut tables, ride)?;
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn commit_booking_update(
        &self,
        ride: Option<&Ride>,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.lock().await;

        match tables.bookings.get(&booking.id) {
            Some(current) if current.status == expected => {}
            _ => return Err(StoreError::VersionConflict),
        }
        if let Some(ride) = ride {
            cas_ride(&mut tables, ride)?;
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }
}
