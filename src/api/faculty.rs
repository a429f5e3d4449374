use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::model::user::RosterEntry;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct FacultyStatusQuery {
    /// Day to report (YYYY-MM-DD), today when omitted
    #[param(value_type = Option<String>, example = "2026-01-01")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FacultyStatusRow {
    #[serde(flatten)]
    pub entry: RosterEntry,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
}

/// Attendance status of every user for one day (faculty only)
#[utoipa::path(
    get,
    path = "/api/faculty/attendance/status",
    params(FacultyStatusQuery),
    responses(
        (status = 200, description = "One row per user, ordered by username", body = [FacultyStatusRow]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Faculty only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Faculty"
)]
pub async fn attendance_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<FacultyStatusQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let (date, roster) = state
        .attendance
        .faculty_status(&auth.principal(), query.date)
        .await?;

    let rows: Vec<FacultyStatusRow> = roster
        .into_iter()
        .map(|entry| FacultyStatusRow { entry, date })
        .collect();
    Ok(HttpResponse::Ok().json(rows))
}
