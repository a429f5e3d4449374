use crate::{error::AttendanceError, model::role::Role, state_machine::Principal};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Caller identity placed in the request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = AttendanceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or(AttendanceError::Unauthorized("Access token required")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AttendanceError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AttendanceError::Forbidden)
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id.clone(),
            role: self.role,
        }
    }
}
