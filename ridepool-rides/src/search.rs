use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ride::Ride;

/// Passenger search criteria.
///
/// The store narrows on status and date; everything else is matched in
/// process against the fetched candidates, so `matches` must be cheap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideFilter {
    pub date: Option<NaiveDate>,
    pub seats: i32,
    pub max_price: Option<i32>,
    pub origin: Option<String>,
    pub destination: Option<String>,
}

impl Default for RideFilter {
    fn default() -> Self {
        Self {
            date: None,
            seats: 1,
            max_price: None,
            origin: None,
            destination: None,
        }
    }
}

impl RideFilter {
    pub fn matches(&self, ride: &Ride) -> bool {
        if !ride.is_bookable() {
            return false;
        }
        if ride.remaining_seats() < self.seats {
            return false;
        }
        if let Some(date) = self.date {
            if ride.departure_date != date {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if ride.price_amount > max_price {
                return false;
            }
        }
        if let Some(origin) = &self.origin {
            if !contains_ignore_case(&ride.origin.address, origin) {
                return false;
            }
        }
        if let Some(destination) = &self.destination {
            if !contains_ignore_case(&ride.destination.address, destination) {
                return false;
            }
        }
        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ride::{NewRide, RideStatus};
    use chrono::{NaiveTime, Utc};
    use ridepool_shared::geo::Location;

    fn ride_between(origin: &str, destination: &str) -> Ride {
        Ride::new(
            "driver-1",
            "Sam",
            NewRide {
                origin: Location {
                    address: origin.to_string(),
                    lat: 0.0,
                    lng: 0.0,
                },
                destination: Location {
                    address: destination.to_string(),
                    lat: 1.0,
                    lng: 1.0,
                },
                departure_date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
                departure_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                capacity: 3,
                price_amount: 900,
                price_currency: "USD".to_string(),
                vehicle_info: None,
                route_summary: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn default_filter_accepts_any_active_ride() {
        let ride = ride_between("Dockside", "Old Town");
        assert!(RideFilter::default().matches(&ride));
    }

    #[test]
    fn location_match_is_substring_and_case_insensitive() {
        let ride = ride_between("Central Station, Rotterdam", "Schiphol Airport");

        let filter = RideFilter {
            origin: Some("rotterdam".to_string()),
            destination: Some("schiphol".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&ride));

        let filter = RideFilter {
            origin: Some("Utrecht".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&ride));
    }

    #[test]
    fn seat_and_price_limits_apply() {
        let ride = ride_between("A", "B");

        let wants_too_many = RideFilter {
            seats: 4,
            ..Default::default()
        };
        assert!(!wants_too_many.matches(&ride));

        let too_expensive = RideFilter {
            max_price: Some(500),
            ..Default::default()
        };
        assert!(!too_expensive.matches(&ride));

        let affordable = RideFilter {
            max_price: Some(900),
            ..Default::default()
        };
        assert!(affordable.matches(&ride));
    }

    #[test]
    fn non_active_rides_never_match() {
        let mut ride = ride_between("A", "B");
        ride.status = RideStatus::Cancelled;
        assert!(!RideFilter::default().matches(&ride));

        let mut full = ride_between("A", "B");
        full.set_confirmed_seats(3, Utc::now());
        assert_eq!(full.status, RideStatus::Full);
        assert!(!RideFilter::default().matches(&full));
    }

    #[test]
    fn date_filter_is_exact() {
        let ride = ride_between("A", "B");

        let same_day = RideFilter {
            date: NaiveDate::from_ymd_opt(2026, 9, 14),
            ..Default::default()
        };
        assert!(same_day.matches(&ride));

        let other_day = RideFilter {
            date: NaiveDate::from_ymd_opt(2026, 9, 15),
            ..Default::default()
        };
        assert!(!other_day.matches(&ride));
    }
}
