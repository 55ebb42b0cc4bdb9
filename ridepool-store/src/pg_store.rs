use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ridepool_reservation::{Booking, BookingStatus, ReservationStore, StoreError};
use ridepool_rides::{Ride, RideFilter, RideStatus};
use ridepool_shared::geo::{Location, RouteSummary};
use ridepool_shared::pii::Masked;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Postgres implementation of the reservation store.
///
/// All queries are bound at runtime, and every write that the service
/// guards with a version is a conditional `UPDATE … WHERE id = $n AND
/// version = $m`: zero affected rows means the caller lost the race and
/// gets `VersionConflict`. Booking+ride pairs commit inside one
/// transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend<E>(e: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend(Box::new(e))
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct RideRow {
    id: Uuid,
    driver_id: String,
    driver_name: String,
    origin_address: String,
    origin_lat: f64,
    origin_lng: f64,
    destination_address: String,
    destination_lat: f64,
    destination_lng: f64,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    capacity: i32,
    confirmed_seats: i32,
    price_amount: i32,
    price_currency: String,
    vehicle_info: Option<String>,
    route_distance: Option<String>,
    route_duration: Option<String>,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RideRow> for Ride {
    type Error = StoreError;

    fn try_from(row: RideRow) -> Result<Self, Self::Error> {
        let status: RideStatus = row.status.parse().map_err(backend)?;
        let route_summary = match (row.route_distance, row.route_duration) {
            (Some(distance), Some(duration)) => Some(RouteSummary { distance, duration }),
            _ => None,
        };
        Ok(Ride {
            id: row.id,
            driver_id: row.driver_id,
            driver_name: row.driver_name,
            origin: Location {
                address: row.origin_address,
                lat: row.origin_lat,
                lng: row.origin_lng,
            },
            destination: Location {
                address: row.destination_address,
                lat: row.destination_lat,
                lng: row.destination_lng,
            },
            departure_date: row.departure_date,
            departure_time: row.departure_time,
            capacity: row.capacity,
            confirmed_seats: row.confirmed_seats,
            price_amount: row.price_amount,
            price_currency: row.price_currency,
            vehicle_info: row.vehicle_info,
            route_summary,
            status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ride_id: Uuid,
    passenger_id: String,
    passenger_name: String,
    passenger_phone: Option<String>,
    driver_id: String,
    seats_booked: i32,
    total_price_amount: i32,
    price_currency: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row
            .status
            .parse()
            .map_err(|e: String| StoreError::Backend(e.into()))?;
        Ok(Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            passenger_name: row.passenger_name,
            passenger_phone: row.passenger_phone.map(Masked),
            driver_id: row.driver_id,
            seats_booked: row.seats_booked,
            total_price_amount: row.total_price_amount,
            price_currency: row.price_currency,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_RIDE: &str = "SELECT id, driver_id, driver_name, origin_address, origin_lat, origin_lng, \
     destination_address, destination_lat, destination_lng, departure_date, departure_time, \
     capacity, confirmed_seats, price_amount, price_currency, vehicle_info, route_distance, \
     route_duration, status, version, created_at, updated_at FROM rides";

const SELECT_BOOKING: &str = "SELECT id, ride_id, passenger_id, passenger_name, passenger_phone, driver_id, \
     seats_booked, total_price_amount, price_currency, status, created_at, updated_at FROM bookings";

/// Conditional rewrite of a ride row. The version predicate is the CAS.
async fn cas_ride(conn: &mut PgConnection, ride: &Ride) -> Result<(), StoreError> {
    let (route_distance, route_duration) = route_columns(ride);
    let result = sqlx::query(
        r#"
        UPDATE rides SET
            origin_address = $1, origin_lat = $2, origin_lng = $3,
            destination_address = $4, destination_lat = $5, destination_lng = $6,
            departure_date = $7, departure_time = $8,
            confirmed_seats = $9, price_amount = $10, vehicle_info = $11,
            route_distance = $12, route_duration = $13,
            status = $14, updated_at = $15, version = version + 1
        WHERE id = $16 AND version = $17
        "#,
    )
    .bind(&ride.origin.address)
    .bind(ride.origin.lat)
    .bind(ride.origin.lng)
    .bind(&ride.destination.address)
    .bind(ride.destination.lat)
    .bind(ride.destination.lng)
    .bind(ride.departure_date)
    .bind(ride.departure_time)
    .bind(ride.confirmed_seats)
    .bind(ride.price_amount)
    .bind(&ride.vehicle_info)
    .bind(route_distance)
    .bind(route_duration)
    .bind(ride.status.as_str())
    .bind(ride.updated_at)
    .bind(ride.id)
    .bind(ride.version)
    .execute(&mut *conn)
    .await
    .map_err(backend)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }
    Ok(())
}

async fn insert_booking(conn: &mut PgConnection, booking: &Booking) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO bookings (id, ride_id, passenger_id, passenger_name, passenger_phone,
            driver_id, seats_booked, total_price_amount, price_currency, status,
            created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(booking.id)
    .bind(booking.ride_id)
    .bind(&booking.passenger_id)
    .bind(&booking.passenger_name)
    .bind(booking.passenger_phone.as_ref().map(|p| p.0.clone()))
    .bind(&booking.driver_id)
    .bind(booking.seats_booked)
    .bind(booking.total_price_amount)
    .bind(&booking.price_currency)
    .bind(booking.status.as_str())
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(backend)?;
    Ok(())
}

fn route_columns(ride: &Ride) -> (Option<&str>, Option<&str>) {
    match &ride.route_summary {
        Some(route) => (Some(route.distance.as_str()), Some(route.duration.as_str())),
        None => (None, None),
    }
}

#[async_trait]
impl ReservationStore for PgStore {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        let (route_distance, route_duration) = route_columns(ride);
        sqlx::query(
            r#"
            INSERT INTO rides (id, driver_id, driver_name, origin_address, origin_lat, origin_lng,
                destination_address, destination_lat, destination_lng, departure_date, departure_time,
                capacity, confirmed_seats, price_amount, price_currency, vehicle_info,
                route_distance, route_duration, status, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(ride.id)
        .bind(&ride.driver_id)
        .bind(&ride.driver_name)
        .bind(&ride.origin.address)
        .bind(ride.origin.lat)
        .bind(ride.origin.lng)
        .bind(&ride.destination.address)
        .bind(ride.destination.lat)
        .bind(ride.destination.lng)
        .bind(ride.departure_date)
        .bind(ride.departure_time)
        .bind(ride.capacity)
        .bind(ride.confirmed_seats)
        .bind(ride.price_amount)
        .bind(&ride.price_currency)
        .bind(&ride.vehicle_info)
        .bind(route_distance)
        .bind(route_duration)
        .bind(ride.status.as_str())
        .bind(ride.version)
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_ride(&self, ride_id: Uuid) -> Result<Option<Ride>, StoreError> {
        let row = sqlx::query_as::<_, RideRow>(&format!("{} WHERE id = $1", SELECT_RIDE))
            .bind(ride_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(Ride::try_from).transpose()
    }

    async fn update_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        cas_ride(&mut conn, ride).await
    }

    async fn delete_ride(&self, ride_id: Uuid) -> Result<(), StoreError> {
        // Bookings go with the ride (ON DELETE CASCADE).
        sqlx::query("DELETE FROM rides WHERE id = $1")
            .bind(ride_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn rides_by_driver(&self, driver_id: &str) -> Result<Vec<Ride>, StoreError> {
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            "{} WHERE driver_id = $1 ORDER BY created_at DESC",
            SELECT_RIDE
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(Ride::try_from).collect()
    }

    async fn search_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, StoreError> {
        // The database narrows on status and date; price, seat and location
        // matching happens in process via the same predicate the memory
        // store uses.
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            "{} WHERE status = 'ACTIVE' AND ($1::date IS NULL OR departure_date = $1) \
             ORDER BY created_at DESC",
            SELECT_RIDE
        ))
        .bind(filter.date)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut rides = Vec::with_capacity(rows.len());
        for row in rows {
            let ride = Ride::try_from(row)?;
            if filter.matches(&ride) {
                rides.push(ride);
            }
        }
        Ok(rides)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE id = $1", SELECT_BOOKING))
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(Booking::try_from).transpose()
    }

    async fn bookings_by_passenger(&self, passenger_id: &str) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE passenger_id = $1 ORDER BY created_at DESC",
            SELECT_BOOKING
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn bookings_by_ride(&self, ride_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE ride_id = $1 ORDER BY created_at DESC",
            SELECT_BOOKING
        ))
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn confirmed_seat_total(&self, ride_id: Uuid) -> Result<i32, StoreError> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(seats_booked) FROM bookings WHERE ride_id = $1 AND status = 'CONFIRMED'",
        )
        .bind(ride_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(total.unwrap_or(0) as i32)
    }

    async fn commit_booking(&self, ride: &Ride, booking: &Booking) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        cas_ride(&mut tx, ride).await?;
        insert_booking(&mut tx, booking).await?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn commit_booking_update(
        &self,
        ride: Option<&Ride>,
        booking: &Booking,
        expected: BookingStatus,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(booking.status.as_str())
        .bind(booking.updated_at)
        .bind(booking.id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict);
        }

        if let Some(ride) = ride {
            cas_ride(&mut tx, ride).await?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}
