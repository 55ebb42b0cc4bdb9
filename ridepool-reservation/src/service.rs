use chrono::Utc;
use ridepool_core::identity::Actor;
use ridepool_rides::{NewRide, Ride, RideFilter, RideStatus, RideUpdate};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::error::ReservationError;
use crate::store::{ReservationStore, StoreError};

const RETRY_BACKOFF_MS: u64 = 20;

/// Tunable rules, loaded from configuration.
#[derive(Debug, Clone)]
pub struct ReservationPolicy {
    /// Per-booking seat ceiling, independent of ride capacity.
    pub max_seats_per_booking: i32,
    /// Bounded CAS attempts per operation before surfacing `Conflict`.
    pub commit_retries: u32,
    /// When set, `reserve` creates PENDING bookings that hold no seats
    /// until the driver accepts them.
    pub require_driver_approval: bool,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            max_seats_per_booking: 8,
            commit_retries: 3,
            require_driver_approval: false,
        }
    }
}

/// Outcome of `release`. Releasing an already-terminal booking is success
/// from the caller's point of view, so it is not an error kind.
#[derive(Debug)]
pub enum ReleaseOutcome {
    Released(Booking),
    AlreadyReleased { status: BookingStatus },
}

/// What `reconcile` found and, if anything, corrected.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub ride_id: Uuid,
    pub seats_recorded: i32,
    pub seats_computed: i32,
    pub status_before: RideStatus,
    pub status_after: RideStatus,
    pub corrected: bool,
}

/// The sole mutator of seat counts.
///
/// Every operation that moves `(confirmed_seats, status)` together with a
/// booking row is committed as one conditional write keyed by the ride's
/// version stamp; stale commits are retried against a fresh read, never
/// patched up in place.
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    policy: ReservationPolicy,
}

impl ReservationService {
    pub fn new(store: Arc<dyn ReservationStore>, policy: ReservationPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Ride lifecycle
    // ------------------------------------------------------------------

    pub async fn create_ride(&self, driver: &Actor, form: NewRide) -> Result<Ride, ReservationError> {
        let ride = Ride::new(&driver.user_id, &driver.display_name, form)?;
        self.store.insert_ride(&ride).await?;
        info!(ride_id = %ride.id, driver = %ride.driver_id, capacity = ride.capacity, "Ride posted");
        Ok(ride)
    }

    pub async fn get_ride(&self, ride_id: Uuid) -> Result<Ride, ReservationError> {
        self.store
            .get_ride(ride_id)
            .await?
            .ok_or(ReservationError::RideNotFound(ride_id))
    }

    pub async fn search_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, ReservationError> {
        Ok(self.store.search_rides(filter).await?)
    }

    pub async fn rides_by_driver(&self, driver: &Actor) -> Result<Vec<Ride>, ReservationError> {
        Ok(self.store.rides_by_driver(&driver.user_id).await?)
    }

    pub async fn update_ride(
        &self,
        ride_id: Uuid,
        driver: &Actor,
        update: RideUpdate,
    ) -> Result<Ride, ReservationError> {
        for attempt in 0..self.policy.commit_retries {
            let mut ride = self.get_ride(ride_id).await?;
            if !driver.owns(&ride.driver_id) {
                return Err(ReservationError::NotAuthorized(
                    "only the ride's driver may edit it".to_string(),
                ));
            }
            ride.apply_update(update.clone(), Utc::now())?;

            match self.store.update_ride(&ride).await {
                Ok(()) => return Ok(ride),
                Err(StoreError::VersionConflict) => self.backoff(attempt, ride_id).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReservationError::Conflict)
    }

    pub async fn complete_ride(&self, ride_id: Uuid, driver: &Actor) -> Result<Ride, ReservationError> {
        self.terminate_ride(ride_id, driver, RideStatus::Completed).await
    }

    pub async fn cancel_ride(&self, ride_id: Uuid, driver: &Actor) -> Result<Ride, ReservationError> {
        self.terminate_ride(ride_id, driver, RideStatus::Cancelled).await
    }

    async fn terminate_ride(
        &self,
        ride_id: Uuid,
        driver: &Actor,
        target: RideStatus,
    ) -> Result<Ride, ReservationError> {
        for attempt in 0..self.policy.commit_retries {
            let mut ride = self.get_ride(ride_id).await?;
            if !driver.owns(&ride.driver_id) {
                return Err(ReservationError::NotAuthorized(
                    "only the ride's driver may close it".to_string(),
                ));
            }
            if ride.status.is_terminal() {
                return Err(ReservationError::InvalidTransition {
                    from: ride.status.to_string(),
                    to: target.to_string(),
                });
            }
            ride.status = target;
            ride.updated_at = Utc::now();

            match self.store.update_ride(&ride).await {
                Ok(()) => {
                    info!(ride_id = %ride.id, status = %target, "Ride closed");
                    return Ok(ride);
                }
                Err(StoreError::VersionConflict) => self.backoff(attempt, ride_id).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReservationError::Conflict)
    }

    /// Hard delete. Refused while confirmed bookings remain, matching the
    /// driver-dashboard rule; pending bookings go down with the ride since
    /// they never held seats.
    pub async fn delete_ride(&self, ride_id: Uuid, driver: &Actor) -> Result<(), ReservationError> {
        let ride = self.get_ride(ride_id).await?;
        if !driver.owns(&ride.driver_id) {
            return Err(ReservationError::NotAuthorized(
                "only the ride's driver may delete it".to_string(),
            ));
        }

        let confirmed = self
            .store
            .bookings_by_ride(ride_id)
            .await?
            .into_iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .count();
        if confirmed > 0 {
            return Err(ReservationError::ConfirmedBookingsExist { count: confirmed });
        }

        self.store.delete_ride(ride_id).await?;
        info!(ride_id = %ride_id, "Ride deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reservations
    // ------------------------------------------------------------------

    pub async fn reserve(
        &self,
        ride_id: Uuid,
        requested_seats: i32,
        passenger: &Actor,
        passenger_phone: Option<String>,
    ) -> Result<Booking, ReservationError> {
        if requested_seats <= 0 || requested_seats > self.policy.max_seats_per_booking {
            return Err(ReservationError::InvalidSeatCount {
                requested: requested_seats,
                max: self.policy.max_seats_per_booking,
            });
        }

        for attempt in 0..self.policy.commit_retries {
            let mut ride = self.get_ride(ride_id).await?;

            if ride.status.is_terminal() {
                return Err(ReservationError::RideNotBookable { status: ride.status });
            }
            if passenger.owns(&ride.driver_id) {
                return Err(ReservationError::NotAuthorized(
                    "drivers cannot book seats on their own ride".to_string(),
                ));
            }
            // Evaluated against the state we are about to CAS on, so a
            // successful commit proves this held at commit time.
            let available = ride.remaining_seats();
            if requested_seats > available {
                return Err(ReservationError::InsufficientSeats {
                    requested: requested_seats,
                    available,
                });
            }

            let status = if self.policy.require_driver_approval {
                BookingStatus::Pending
            } else {
                BookingStatus::Confirmed
            };
            let booking = Booking::new(
                ride.id,
                &passenger.user_id,
                &passenger.display_name,
                passenger_phone.clone(),
                &ride.driver_id,
                requested_seats,
                ride.price_amount * requested_seats,
                &ride.price_currency,
                status,
            );

            if status == BookingStatus::Confirmed {
                let seats = ride.confirmed_seats + requested_seats;
                ride.set_confirmed_seats(seats, Utc::now());
            }

            match self.store.commit_booking(&ride, &booking).await {
                Ok(()) => {
                    info!(
                        booking_id = %booking.id,
                        ride_id = %ride.id,
                        seats = requested_seats,
                        status = %booking.status,
                        "Reservation committed"
                    );
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict) => self.backoff(attempt, ride_id).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReservationError::Conflict)
    }

    /// Driver approval of a PENDING booking: the seats are consumed here,
    /// with the same capacity guard as `reserve`.
    pub async fn accept(&self, booking_id: Uuid, driver: &Actor) -> Result<Booking, ReservationError> {
        for attempt in 0..self.policy.commit_retries {
            let booking = self
                .store
                .get_booking(booking_id)
                .await?
                .ok_or(ReservationError::BookingNotFound(booking_id))?;
            let mut ride = self.get_ride(booking.ride_id).await?;

            if !driver.owns(&ride.driver_id) {
                return Err(ReservationError::NotAuthorized(
                    "only the ride's driver may accept a booking".to_string(),
                ));
            }
            booking.status.ensure_transition(BookingStatus::Confirmed)?;
            if ride.status.is_terminal() {
                return Err(ReservationError::RideNotBookable { status: ride.status });
            }
            let available = ride.remaining_seats();
            if booking.seats_booked > available {
                return Err(ReservationError::InsufficientSeats {
                    requested: booking.seats_booked,
                    available,
                });
            }

            let expected = booking.status;
            let mut accepted = booking.clone();
            accepted.status = BookingStatus::Confirmed;
            accepted.updated_at = Utc::now();

            let seats = ride.confirmed_seats + booking.seats_booked;
            ride.set_confirmed_seats(seats, Utc::now());

            match self
                .store
                .commit_booking_update(Some(&ride), &accepted, expected)
                .await
            {
                Ok(()) => {
                    info!(booking_id = %booking_id, ride_id = %ride.id, "Booking accepted");
                    return Ok(accepted);
                }
                Err(StoreError::VersionConflict) => self.backoff(attempt, booking.ride_id).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReservationError::Conflict)
    }

    /// Passenger cancellation or driver rejection.
    ///
    /// Idempotent: a booking that is already terminal reports
    /// `AlreadyReleased` and the seat counter is left alone, which guards
    /// against double-decrements from retried network calls.
    pub async fn release(
        &self,
        booking_id: Uuid,
        actor: &Actor,
    ) -> Result<ReleaseOutcome, ReservationError> {
        for attempt in 0..self.policy.commit_retries {
            let booking = self
                .store
                .get_booking(booking_id)
                .await?
                .ok_or(ReservationError::BookingNotFound(booking_id))?;

            if booking.status.is_terminal() {
                return Ok(ReleaseOutcome::AlreadyReleased {
                    status: booking.status,
                });
            }

            let mut ride = self.get_ride(booking.ride_id).await?;
            let target = if actor.owns(&booking.passenger_id) {
                BookingStatus::Cancelled
            } else if actor.owns(&ride.driver_id) {
                BookingStatus::Rejected
            } else {
                return Err(ReservationError::NotAuthorized(
                    "only the booking's passenger or the ride's driver may release it".to_string(),
                ));
            };
            booking.status.ensure_transition(target)?;

            let expected = booking.status;
            let mut released = booking.clone();
            released.status = target;
            released.updated_at = Utc::now();

            // Seats were only ever consumed by a CONFIRMED booking.
            let ride_arg = if expected == BookingStatus::Confirmed {
                let seats = ride.confirmed_seats - booking.seats_booked;
                ride.set_confirmed_seats(seats, Utc::now());
                Some(&ride)
            } else {
                None
            };

            match self
                .store
                .commit_booking_update(ride_arg, &released, expected)
                .await
            {
                Ok(()) => {
                    info!(
                        booking_id = %booking_id,
                        ride_id = %booking.ride_id,
                        status = %target,
                        "Booking released"
                    );
                    return Ok(ReleaseOutcome::Released(released));
                }
                Err(StoreError::VersionConflict) => self.backoff(attempt, booking.ride_id).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReservationError::Conflict)
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Recompute the cached seat counter from the booking ledger and repair
    /// the ride record if it drifted. A clean ride is a no-op report.
    pub async fn reconcile(&self, ride_id: Uuid) -> Result<RepairReport, ReservationError> {
        for attempt in 0..self.policy.commit_retries {
            let ride = self.get_ride(ride_id).await?;
            let computed = self.store.confirmed_seat_total(ride_id).await?;

            let mut repaired = ride.clone();
            repaired.set_confirmed_seats(computed, Utc::now());

            if repaired.confirmed_seats == ride.confirmed_seats && repaired.status == ride.status {
                return Ok(RepairReport {
                    ride_id,
                    seats_recorded: ride.confirmed_seats,
                    seats_computed: computed,
                    status_before: ride.status,
                    status_after: ride.status,
                    corrected: false,
                });
            }

            match self.store.update_ride(&repaired).await {
                Ok(()) => {
                    warn!(
                        ride_id = %ride_id,
                        recorded = ride.confirmed_seats,
                        computed,
                        "Repaired drifted seat counter"
                    );
                    return Ok(RepairReport {
                        ride_id,
                        seats_recorded: ride.confirmed_seats,
                        seats_computed: computed,
                        status_before: ride.status,
                        status_after: repaired.status,
                        corrected: true,
                    });
                }
                Err(StoreError::VersionConflict) => self.backoff(attempt, ride_id).await,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ReservationError::Conflict)
    }

    // ------------------------------------------------------------------
    // Dashboards
    // ------------------------------------------------------------------

    pub async fn bookings_by_passenger(&self, passenger: &Actor) -> Result<Vec<Booking>, ReservationError> {
        Ok(self.store.bookings_by_passenger(&passenger.user_id).await?)
    }

    /// The driver-side booking list for one ride.
    pub async fn bookings_by_ride(
        &self,
        ride_id: Uuid,
        driver: &Actor,
    ) -> Result<Vec<Booking>, ReservationError> {
        let ride = self.get_ride(ride_id).await?;
        if !driver.owns(&ride.driver_id) {
            return Err(ReservationError::NotAuthorized(
                "only the ride's driver may list its bookings".to_string(),
            ));
        }
        Ok(self.store.bookings_by_ride(ride_id).await?)
    }

    async fn backoff(&self, attempt: u32, ride_id: Uuid) {
        debug!(ride_id = %ride_id, attempt, "Commit conflicted, retrying");
        tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * (attempt as u64 + 1))).await;
    }
}
