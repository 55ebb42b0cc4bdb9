use serde::{Deserialize, Serialize};

/// A geocoded place as delivered by the mapping provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// Precomputed route figures for display (distance/duration as the
/// directions provider renders them, e.g. "42 km" / "38 mins").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteSummary {
    pub distance: String,
    pub duration: String,
}
