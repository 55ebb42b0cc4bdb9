pub mod ride;
pub mod search;

pub use ride::{NewRide, Ride, RideError, RideStatus, RideUpdate};
pub use search::RideFilter;
