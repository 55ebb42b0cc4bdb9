use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures_util::{Stream, StreamExt};
use ridepool_core::identity::Actor;
use ridepool_reservation::RepairReport;
use ridepool_rides::{NewRide, Ride, RideFilter, RideUpdate};
use ridepool_shared::geo::{Location, RouteSummary};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::user_auth_middleware;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub id: Uuid,
    pub driver_id: String,
    pub driver_name: String,
    pub origin: Location,
    pub destination: Location,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub capacity: i32,
    pub confirmed_seats: i32,
    pub remaining_seats: i32,
    pub price_amount: i32,
    pub price_currency: String,
    pub vehicle_info: Option<String>,
    pub route_summary: Option<RouteSummary>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Ride> for RideResponse {
    fn from(ride: Ride) -> Self {
        let remaining_seats = ride.remaining_seats();
        Self {
            id: ride.id,
            driver_id: ride.driver_id,
            driver_name: ride.driver_name,
            origin: ride.origin,
            destination: ride.destination,
            departure_date: ride.departure_date,
            departure_time: ride.departure_time,
            capacity: ride.capacity,
            confirmed_seats: ride.confirmed_seats,
            remaining_seats,
            price_amount: ride.price_amount,
            price_currency: ride.price_currency,
            vehicle_info: ride.vehicle_info,
            route_summary: ride.route_summary,
            status: ride.status.to_string(),
            created_at: ride.created_at,
            updated_at: ride.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub date: Option<NaiveDate>,
    pub seats: Option<i32>,
    pub max_price: Option<i32>,
    pub origin: Option<String>,
    pub destination: Option<String>,
}

impl From<SearchQuery> for RideFilter {
    fn from(q: SearchQuery) -> Self {
        RideFilter {
            date: q.date,
            seats: q.seats.unwrap_or(1),
            max_price: q.max_price,
            origin: q.origin,
            destination: q.destination,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/v1/rides", get(search_rides))
        .route("/v1/rides/{id}", get(get_ride));

    let protected = Router::new()
        .route("/v1/rides", post(create_ride))
        .route("/v1/rides/{id}", patch(update_ride))
        .route("/v1/rides/{id}", delete(delete_ride))
        .route("/v1/rides/{id}/complete", post(complete_ride))
        .route("/v1/rides/{id}/cancel", post(cancel_ride))
        .route("/v1/rides/{id}/reconcile", post(reconcile_ride))
        .route("/v1/rides/{id}/bookings", get(ride_bookings))
        .route("/v1/rides/{id}/stream", get(stream_availability))
        .route("/v1/me/rides", get(my_rides))
        .route_layer(middleware::from_fn_with_state(state, user_auth_middleware));

    public.merge(protected)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/rides
async fn create_ride(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(form): Json<NewRide>,
) -> Result<(StatusCode, Json<RideResponse>), ApiError> {
    let ride = state.service.create_ride(&actor, form).await?;
    Ok((StatusCode::CREATED, Json(ride.into())))
}

/// GET /v1/rides/{id}
async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride = state.service.get_ride(ride_id).await?;
    Ok(Json(ride.into()))
}

/// GET /v1/rides?date=&seats=&max_price=&origin=&destination=
async fn search_rides(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let filter: RideFilter = query.into();
    let rides = state.service.search_rides(&filter).await?;
    Ok(Json(rides.into_iter().map(RideResponse::from).collect()))
}

/// GET /v1/me/rides
async fn my_rides(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<RideResponse>>, ApiError> {
    let rides = state.service.rides_by_driver(&actor).await?;
    Ok(Json(rides.into_iter().map(RideResponse::from).collect()))
}

/// PATCH /v1/rides/{id}
async fn update_ride(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(ride_id): Path<Uuid>,
    Json(update): Json<RideUpdate>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride = state.service.update_ride(ride_id, &actor, update).await?;
    Ok(Json(ride.into()))
}

/// DELETE /v1/rides/{id}
async fn delete_ride(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(ride_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_ride(ride_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/rides/{id}/complete
async fn complete_ride(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride = state.service.complete_ride(ride_id, &actor).await?;
    Ok(Json(ride.into()))
}

/// POST /v1/rides/{id}/cancel
async fn cancel_ride(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride = state.service.cancel_ride(ride_id, &actor).await?;
    state.publish_availability(ride_id).await;
    Ok(Json(ride.into()))
}

/// POST /v1/rides/{id}/reconcile
///
/// Driver-triggered repair pass; also safe to call from a cron.
async fn reconcile_ride(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RepairReport>, ApiError> {
    let ride = state.service.get_ride(ride_id).await?;
    if !actor.owns(&ride.driver_id) {
        return Err(ridepool_reservation::ReservationError::NotAuthorized(
            "only the ride's driver may trigger reconciliation".to_string(),
        )
        .into());
    }

    let report = state.service.reconcile(ride_id).await?;
    if report.corrected {
        state.publish_availability(ride_id).await;
    }
    Ok(Json(report))
}

/// GET /v1/rides/{id}/bookings
async fn ride_bookings(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<crate::bookings::BookingResponse>>, ApiError> {
    let bookings = state.service.bookings_by_ride(ride_id, &actor).await?;
    Ok(Json(
        bookings
            .into_iter()
            .map(crate::bookings::BookingResponse::from)
            .collect(),
    ))
}

/// GET /v1/rides/{id}/stream
///
/// SSE feed of this ride's seat availability, emitted after every
/// committed seat change.
async fn stream_availability(
    State(state): State<AppState>,
    Extension(_actor): Extension<Actor>,
    Path(ride_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.ride_id == ride_id => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok::<_, Infallible>(
                    Event::default().event("seat_availability").data(data),
                ))
            }
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
