use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    /// Username or email
    #[schema(example = "student001")]
    pub username: String,
    #[schema(example = "Student@123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub jti: String,
}
