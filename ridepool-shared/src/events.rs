use uuid::Uuid;

/// Published whenever a committed reservation operation changes a ride's
/// seat availability. Carried over the in-process broadcast channel that
/// feeds the per-ride SSE stream.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatAvailabilityEvent {
    pub ride_id: Uuid,
    pub remaining_seats: i32,
    pub ride_status: String,
    pub at: i64,
}
