use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::Coordinate;

/// Id of the location seeded at startup and used as the client fallback.
pub const DEFAULT_LOCATION_ID: &str = "default-office";

/// Radius applied when a location is created without one.
pub const DEFAULT_RADIUS_METERS: i64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfficeLocation {
    #[schema(example = "default-office")]
    pub id: String,
    #[schema(example = "Presidency University, Bangalore")]
    pub name: String,
    #[schema(example = 13.1373)]
    pub latitude: f64,
    #[schema(example = 77.5680)]
    pub longitude: f64,
    /// Geofence radius in meters.
    #[serde(rename = "radius")]
    #[sqlx(rename = "radius")]
    #[schema(example = 150)]
    pub radius_meters: i64,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl OfficeLocation {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn contains(&self, distance_meters: f64) -> bool {
        distance_meters <= self.radius_meters as f64
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewLocation {
    #[schema(example = "Main Block")]
    pub name: Option<String>,
    #[schema(example = 13.1373)]
    pub latitude: Option<f64>,
    #[schema(example = 77.5680)]
    pub longitude: Option<f64>,
    #[schema(example = 150)]
    pub radius: Option<i64>,
}

/// Partial update; omitted fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LocationPatch {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<i64>,
}

impl LocationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.radius.is_none()
    }
}
