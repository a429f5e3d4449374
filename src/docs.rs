use crate::api::attendance::CoordinatePayload;
use crate::api::faculty::FacultyStatusRow;
use crate::api::location::RankedLocation;
use crate::auth::handlers::{LoginResponse, LoginUser};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
use crate::model::location::{LocationPatch, NewLocation, OfficeLocation};
use crate::model::user::RosterEntry;
use crate::models::LoginReqDto;
use crate::state_machine::DayStatus;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Attendance API",
        version = "1.0.0",
        description = r#"
## Geofenced attendance

Students check in and out of the day only when their device reports a position
inside the radius of the nearest registered office location.

### 🔹 Key Features
- **Attendance**
  - One check-in and one check-out per user per day
  - Daily status, history and worked-hour summaries
- **Office locations**
  - Admin managed geofences, nearest-location lookup
- **Faculty view**
  - Every user's status for a given day

### 🔐 Security
All endpoints except login and the default office use **JWT Bearer authentication**.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::status,
        crate::api::attendance::list_attendance,
        crate::api::attendance::summary,

        crate::api::faculty::attendance_status,

        crate::api::location::office,
        crate::api::location::list_locations,
        crate::api::location::create_location,
        crate::api::location::update_location,
        crate::api::location::delete_location,
        crate::api::location::nearest_locations
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            LoginUser,
            CoordinatePayload,
            DayStatus,
            AttendanceRecord,
            AttendanceStatus,
            AttendanceSummary,
            RosterEntry,
            FacultyStatusRow,
            OfficeLocation,
            NewLocation,
            LocationPatch,
            RankedLocation
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication APIs"),
        (name = "Attendance", description = "Check-in, check-out and attendance history APIs"),
        (name = "Faculty", description = "Faculty attendance overview APIs"),
        (name = "Location", description = "Office location (geofence) APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
