use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AttendanceError;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    #[schema(example = 13.1373)]
    pub latitude: f64,
    #[schema(example = 77.5680)]
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Builds a coordinate from optional request fields, rejecting missing,
    /// non-finite or out-of-range components.
    pub fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Self, AttendanceError> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).validated(),
            _ => Err(AttendanceError::InvalidInput(
                "Location coordinates are required".into(),
            )),
        }
    }

    pub fn validated(self) -> Result<Self, AttendanceError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(AttendanceError::InvalidInput(
                "Location coordinates are required".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AttendanceError::InvalidInput(
                "latitude must be within [-90, 90]".into(),
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AttendanceError::InvalidInput(
                "longitude must be within [-180, 180]".into(),
            ));
        }
        Ok(self)
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Great-circle distance in meters (haversine).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // rounding can push `a` a hair outside [0, 1] near antipodes
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Moves `meters` due north from `origin`. Used to build test fixtures at an
/// exact distance from an office.
#[cfg(test)]
pub(crate) fn offset_north(origin: Coordinate, meters: f64) -> Coordinate {
    let d_lat = (meters / EARTH_RADIUS_METERS).to_degrees();
    Coordinate::new(origin.latitude + d_lat, origin.longitude)
}
