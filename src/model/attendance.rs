use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = Option<String>)]
    pub check_in_time: Option<DateTime<Utc>>,
    #[schema(example = "2026-01-01T17:00:00Z", format = "date-time", value_type = Option<String>)]
    pub check_out_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub status: AttendanceStatus,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Worked hours for a complete record; zero while still checked in.
    pub fn worked_hours(&self) -> f64 {
        match (self.check_in_time, self.check_out_time) {
            (Some(i), Some(o)) => hours_between(i, o),
            _ => 0.0,
        }
    }
}

/// Elapsed hours between two instants, unrounded.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// Rounds to 2 decimal places, the precision reported for hour totals.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    #[schema(example = 7.5)]
    pub total_hours: f64,
    #[schema(example = 2)]
    pub days_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_hours(2.0), 2.0);
        assert_eq!(round_hours(1.23456), 1.23);
        assert_eq!(round_hours(1.005_001), 1.01);
    }

    #[test]
    fn hours_use_millisecond_precision() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::minutes(90) + chrono::Duration::milliseconds(500);
        assert!((hours_between(a, b) - 1.500_138_9).abs() < 1e-6);
        assert_eq!(round_hours(hours_between(a, b)), 1.5);
    }
}
