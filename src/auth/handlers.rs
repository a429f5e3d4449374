use crate::{
    auth::{jwt::generate_access_token, password::verify_password},
    config::Config,
    model::user::User,
    models::LoginReqDto,
};
use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct LoginUser {
    id: String,
    username: String,
    email: String,
    role: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    token: String,
    user: LoginUser,
}

/// Login with username or email
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<SqlitePool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest()
            .json(json!({ "error": "Username and password are required" }));
    }

    debug!("Fetching user from database");

    // 2️⃣ Fetch user
    let db_user = match sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password, role
        FROM users
        WHERE username = ? OR email = ?
        "#,
    )
    .bind(user.username.trim())
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = %user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().json(json!({ "error": "Invalid credentials" }));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().json(json!({ "error": "Login failed" }));
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({ "error": "Invalid credentials" }));
    }

    // 4️⃣ Generate access token
    let token = match generate_access_token(
        &db_user.id,
        &db_user.username,
        &db_user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    ) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "Failed to sign access token");
            return HttpResponse::InternalServerError().json(json!({ "error": "Login failed" }));
        }
    };

    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse {
        token,
        user: LoginUser {
            id: db_user.id,
            username: db_user.username,
            email: db_user.email,
            role: db_user.role,
        },
    })
}
