//! Geospatial locator.
//!
//! # Responsibility
//! - Geodesic distance between two points on the WGS-84 ellipsoid.
//! - Radius and bounding-box filters over candidate locations.
//! - Conservative pre-filter boxes that let storage narrow radius candidates.
//!
//! # Invariants
//! - Locations without both coordinates never match, and are never an error.
//! - Radius and box comparisons are inclusive on the boundary.
//! - Boxes are not normalized: an inverted box (`south_west` north or east of
//!   `north_east`) simply matches nothing. Antimeridian and pole wraparound
//!   are not handled.
//! - All functions here are pure and CPU-only.

use crate::model::location::Location;
use serde::{Deserialize, Serialize};

/// WGS-84 semi-major axis in kilometres.
const WGS84_A_KM: f64 = 6378.137;
/// WGS-84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// Mean earth radius used by the spherical fallback.
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0088;

const VINCENTY_MAX_ITERATIONS: usize = 200;
const VINCENTY_TOLERANCE: f64 = 1e-12;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and inside their degree ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Geodesic distance to `other` in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        geodesic_distance_km(*self, *other)
    }
}

/// Axis-aligned latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north_east: GeoPoint,
    pub south_west: GeoPoint,
}

impl BoundingBox {
    /// Builds a box from its north-east and south-west corners, as given.
    pub fn from_corners(ne_lat: f64, ne_lon: f64, sw_lat: f64, sw_lon: f64) -> Self {
        Self {
            north_east: GeoPoint::new(ne_lat, ne_lon),
            south_west: GeoPoint::new(sw_lat, sw_lon),
        }
    }

    /// Inclusive containment on both axes.
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.south_west.latitude <= point.latitude
            && point.latitude <= self.north_east.latitude
            && self.south_west.longitude <= point.longitude
            && point.longitude <= self.north_east.longitude
    }

    /// True when the corners are swapped on either axis.
    pub fn is_inverted(&self) -> bool {
        self.south_west.latitude > self.north_east.latitude
            || self.south_west.longitude > self.north_east.longitude
    }

    /// Returns a box guaranteed to contain every point within `radius_km`
    /// of `center`, or `None` when no single box can (the circle reaches a
    /// pole or crosses the antimeridian).
    ///
    /// The box over-covers on purpose; callers still apply the exact
    /// distance check.
    pub fn around(center: GeoPoint, radius_km: f64) -> Option<Self> {
        if !center.is_valid() || !radius_km.is_finite() || radius_km < 0.0 {
            return None;
        }

        // Smallest meridional radius of curvature on the ellipsoid; dividing
        // by it over-estimates the angular reach along any direction.
        let min_curvature_km = WGS84_A_KM * (1.0 - WGS84_F).powi(2);
        let angular = radius_km / min_curvature_km * 1.01;
        if angular >= std::f64::consts::FRAC_PI_2 {
            return None;
        }

        let lat_delta = angular.to_degrees() + 1e-6;
        let north = center.latitude + lat_delta;
        let south = center.latitude - lat_delta;
        if north >= 90.0 || south <= -90.0 {
            return None;
        }

        let cos_lat = center.latitude.to_radians().cos();
        let ratio = angular.sin() / cos_lat;
        if ratio >= 1.0 {
            return None;
        }
        let lon_delta = ratio.asin().to_degrees() * 1.05 + 1e-6;
        let east = center.longitude + lon_delta;
        let west = center.longitude - lon_delta;
        if east > 180.0 || west < -180.0 {
            return None;
        }

        Some(Self::from_corners(north, east, south, west))
    }
}

/// One radius-search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusMatch {
    pub location: Location,
    pub distance_km: f64,
}

/// Keeps geolocated candidates whose distance from `center` is at most
/// `radius_km`, nearest first.
pub fn within_radius(
    candidates: impl IntoIterator<Item = Location>,
    center: GeoPoint,
    radius_km: f64,
) -> Vec<RadiusMatch> {
    let mut matches = candidates
        .into_iter()
        .filter_map(|location| {
            let point = location.geo_point()?;
            let distance_km = center.distance_km(&point);
            (distance_km <= radius_km).then_some(RadiusMatch {
                location,
                distance_km,
            })
        })
        .collect::<Vec<_>>();
    matches.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.location.id.cmp(&b.location.id))
    });
    matches
}

/// Keeps geolocated candidates that fall inside `bbox`, preserving input
/// order.
pub fn within_bounding_box(
    candidates: impl IntoIterator<Item = Location>,
    bbox: &BoundingBox,
) -> Vec<Location> {
    candidates
        .into_iter()
        .filter(|location| {
            location
                .geo_point()
                .is_some_and(|point| bbox.contains(point))
        })
        .collect()
}

/// Geodesic distance in kilometres.
///
/// Uses Vincenty's inverse formula on WGS-84 and falls back to the spherical
/// haversine distance for the nearly antipodal pairs where Vincenty does not
/// converge.
pub fn geodesic_distance_km(from: GeoPoint, to: GeoPoint) -> f64 {
    if from == to {
        return 0.0;
    }
    vincenty_km(from, to).unwrap_or_else(|| haversine_km(from, to))
}

/// Great-circle distance on a sphere of mean earth radius.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (to.longitude - from.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_MEAN_RADIUS_KM * h.sqrt().min(1.0).asin()
}

fn vincenty_km(from: GeoPoint, to: GeoPoint) -> Option<f64> {
    let a = WGS84_A_KM;
    let f = WGS84_F;
    let b = a * (1.0 - f);

    let l = (to.longitude - from.longitude).to_radians();
    let u1 = ((1.0 - f) * from.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * to.latitude.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return None;
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial lines have cos^2(alpha) = 0.
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));

        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if lambda.abs() > std::f64::consts::PI {
            return None;
        }
        if (lambda - previous).abs() < VINCENTY_TOLERANCE {
            let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));
            return Some(b * big_a * (sigma - delta_sigma));
        }
    }
    None
}
