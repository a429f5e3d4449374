use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Every failure the attendance core can report, mapped onto HTTP responses.
#[derive(Debug, Display)]
pub enum AttendanceError {
    #[display(fmt = "{}", _0)]
    InvalidInput(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(&'static str),

    #[display(fmt = "Forbidden: insufficient permissions")]
    Forbidden,

    #[display(fmt = "Already checked in today")]
    AlreadyCheckedIn,

    #[display(fmt = "No check-in record found for today")]
    NoOpenCheckIn,

    #[display(fmt = "You are not within the office location radius")]
    OutsideGeofence {
        distance_meters: f64,
        allowed_radius: i64,
    },

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "No office locations configured")]
    NoLocationsConfigured,

    #[display(fmt = "Storage failure: {}", _0)]
    Storage(sqlx::Error),
}

impl std::error::Error for AttendanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttendanceError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AttendanceError {
    fn from(e: sqlx::Error) -> Self {
        AttendanceError::Storage(e)
    }
}

impl AttendanceError {
    /// True for transient storage failures a caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            AttendanceError::Storage(e) => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
                sqlx::Error::Database(db_err) => {
                    // SQLITE_BUSY / SQLITE_LOCKED, including extended codes
                    matches!(
                        db_err.code().as_deref().and_then(|c| c.parse::<i32>().ok()),
                        Some(code) if matches!(code & 0xff, 5 | 6)
                    )
                }
                _ => false,
            },
            _ => false,
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::InvalidInput(_)
            | AttendanceError::AlreadyCheckedIn
            | AttendanceError::NoOpenCheckIn
            | AttendanceError::OutsideGeofence { .. } => StatusCode::BAD_REQUEST,
            AttendanceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AttendanceError::Forbidden => StatusCode::FORBIDDEN,
            AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::NoLocationsConfigured | AttendanceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AttendanceError::OutsideGeofence {
                distance_meters,
                allowed_radius,
            } => json!({
                "error": self.to_string(),
                "distance": distance_meters.round() as i64,
                "allowedRadius": allowed_radius,
            }),
            AttendanceError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                if self.is_retryable() {
                    json!({ "error": "Internal Server Error", "retryable": true })
                } else {
                    json!({ "error": "Internal Server Error" })
                }
            }
            _ => json!({ "error": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: AttendanceError) -> (StatusCode, serde_json::Value) {
        let resp = err.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn geofence_rejection_carries_distance_and_radius() {
        let (status, body) = body_of(AttendanceError::OutsideGeofence {
            distance_meters: 160.4,
            allowed_radius: 150,
        })
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["distance"], 160);
        assert_eq!(body["allowedRadius"], 150);
        assert_eq!(body["error"], "You are not within the office location radius");
    }

    #[actix_web::test]
    async fn storage_failures_do_not_leak_detail() {
        let (status, body) =
            body_of(AttendanceError::Storage(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal Server Error" }));

        let (_, body) = body_of(AttendanceError::Storage(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(body["retryable"], true);
    }

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(AttendanceError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AttendanceError::AlreadyCheckedIn.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AttendanceError::NoOpenCheckIn.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AttendanceError::NotFound("Location").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AttendanceError::NoLocationsConfigured.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AttendanceError::NotFound("Location").to_string(), "Location not found");
    }
}
