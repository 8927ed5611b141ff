//! Building (location) model.
//!
//! # Invariants
//! - `address` is never blank.
//! - A location is geolocated only when both `latitude` and `longitude` are
//!   set; a half-set pair is treated as not geolocated.

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a location.
pub type LocationId = Uuid;

/// One location row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub address: String,
    /// Degrees north, in `[-90, 90]`.
    pub latitude: Option<f64>,
    /// Degrees east, in `[-180, 180]`.
    pub longitude: Option<f64>,
}

impl Location {
    /// Creates a location without coordinates.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address: address.into(),
            latitude: None,
            longitude: None,
        }
    }

    /// Returns this location with both coordinates set.
    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Returns the coordinate pair when the location is geolocated.
    pub fn geo_point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }
}
