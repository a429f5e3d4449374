use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::geo::Coordinate;
use crate::model::attendance::AttendanceRecord;
use crate::state::AppState;
use crate::state_machine::DayStatus;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CoordinatePayload {
    #[schema(example = 13.1373)]
    pub latitude: Option<f64>,
    #[schema(example = 77.5680)]
    pub longitude: Option<f64>,
}

impl CoordinatePayload {
    /// `None` when either component is missing; range checks happen in the
    /// state machine.
    fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.latitude?, self.longitude?))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    /// Inclusive start (YYYY-MM-DD); only applied together with endDate
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    /// Inclusive end (YYYY-MM-DD)
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    /// Defaults to the caller; other users require faculty or admin
    pub user_id: Option<String>,
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub end_date: Option<NaiveDate>,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/checkin",
    request_body = CoordinatePayload,
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully",
            "checkInTime": "2026-01-01T09:00:00Z",
            "location": "Presidency University, Bangalore",
            "distance": 42
        })),
        (status = 400, description = "Already checked in, invalid coordinates or outside the geofence", body = Object, example = json!({
            "error": "You are not within the office location radius",
            "distance": 160,
            "allowedRadius": 150
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only students can check in"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<CoordinatePayload>,
) -> Result<HttpResponse, AttendanceError> {
    let outcome = state
        .attendance
        .check_in(&auth.principal(), payload.coordinate())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked in successfully",
        "checkInTime": outcome.check_in_time,
        "location": outcome.location_name,
        "distance": outcome.distance_meters.round() as i64,
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CoordinatePayload,
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "checkOutTime": "2026-01-01T17:00:00Z",
            "totalHours": 8.0
        })),
        (status = 400, description = "No check-in record found for today", body = Object, example = json!({
            "error": "No check-in record found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only students can check out"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<CoordinatePayload>,
) -> Result<HttpResponse, AttendanceError> {
    let receipt = state
        .attendance
        .check_out(&auth.principal(), payload.coordinate())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "checkOutTime": receipt.check_out_time,
        "totalHours": receipt.total_hours,
    })))
}

/// Today's attendance status for the caller
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Today's status", body = DayStatus),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn status(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AttendanceError> {
    let status = state.attendance.status(&auth.principal()).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// The caller's attendance records, newest first
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(DateRange),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecord]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<DateRange>,
) -> Result<HttpResponse, AttendanceError> {
    let records = state
        .attendance
        .history(&auth.principal(), query.start_date, query.end_date)
        .await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Total worked hours and attended days over a date range
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Summary", body = Object, example = json!({
            "userId": "0f7c…",
            "startDate": "2026-01-01",
            "endDate": "2026-01-31",
            "totalHours": 152.25,
            "daysCount": 20
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Summary of another user requested by a student")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let query = query.into_inner();
    let (user_id, summary) = state
        .attendance
        .summary(
            &auth.principal(),
            query.user_id.as_deref(),
            query.start_date,
            query.end_date,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "userId": user_id,
        "startDate": query.start_date,
        "endDate": query.end_date,
        "totalHours": summary.total_hours,
        "daysCount": summary.days_count,
    })))
}
