use chrono::Utc;
use ridepool_reservation::ReservationService;
use ridepool_shared::events::SeatAvailabilityEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReservationService>,
    pub sse_tx: broadcast::Sender<SeatAvailabilityEvent>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Fan out the ride's post-commit availability to SSE subscribers.
    /// Losing the send (no subscribers) is fine.
    pub async fn publish_availability(&self, ride_id: Uuid) {
        if let Ok(ride) = self.service.get_ride(ride_id).await {
            let event = SeatAvailabilityEvent {
                ride_id,
                remaining_seats: ride.remaining_seats(),
                ride_status: ride.status.to_string(),
                at: Utc::now().timestamp(),
            };
            let _ = self.sse_tx.send(event);
        }
    }
}
