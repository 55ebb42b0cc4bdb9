pub mod booking;
pub mod error;
pub mod memory;
pub mod service;
pub mod store;

pub use booking::{Booking, BookingStatus};
pub use error::ReservationError;
pub use memory::MemoryStore;
pub use service::{
    ReleaseOutcome, RepairReport, ReservationPolicy, ReservationService,
};
pub use store::{ReservationStore, StoreError};
