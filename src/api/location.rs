use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::geo::Coordinate;
use crate::model::location::{LocationPatch, NewLocation, OfficeLocation};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

const DEFAULT_NEAREST_LIMIT: usize = 5;

#[derive(Debug, Deserialize, IntoParams)]
pub struct NearestQuery {
    /// Latitude of the query point
    pub lat: Option<f64>,
    /// Longitude of the query point
    pub lng: Option<f64>,
    /// Maximum number of locations (default 5)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RankedLocation {
    #[serde(flatten)]
    pub location: OfficeLocation,
    /// Distance from the query point in whole meters
    #[schema(example = 87)]
    pub distance: i64,
}

/// Default office coordinates, used by clients without a device fix
#[utoipa::path(
    get,
    path = "/api/office",
    responses(
        (status = 200, description = "Default office", body = OfficeLocation),
        (status = 500, description = "Failed to load office")
    ),
    tag = "Location"
)]
pub async fn office(state: web::Data<AppState>) -> Result<HttpResponse, AttendanceError> {
    let office = state.registry.default_location().await.map_err(|e| match e {
        // the seed row is a startup invariant; its absence is a server fault
        AttendanceError::NotFound(_) => AttendanceError::NoLocationsConfigured,
        other => other,
    })?;
    Ok(HttpResponse::Ok().json(office))
}

/// List office locations, newest first
#[utoipa::path(
    get,
    path = "/api/locations",
    responses(
        (status = 200, description = "Office locations", body = [OfficeLocation]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Location"
)]
pub async fn list_locations(
    _auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AttendanceError> {
    Ok(HttpResponse::Ok().json(state.registry.list().await?))
}

/// Create an office location (admin only)
#[utoipa::path(
    post,
    path = "/api/locations",
    request_body = NewLocation,
    responses(
        (status = 201, description = "Location created", body = OfficeLocation),
        (status = 400, description = "name, latitude, longitude are required"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Location"
)]
pub async fn create_location(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewLocation>,
) -> Result<HttpResponse, AttendanceError> {
    auth.require_admin()?;
    let location = state.registry.create(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(location))
}

/// Update an office location; omitted fields are left unchanged (admin only)
#[utoipa::path(
    put,
    path = "/api/locations/{id}",
    params(("id" = String, Path, description = "Location id")),
    request_body = LocationPatch,
    responses(
        (status = 200, description = "Location updated", body = Object, example = json!({
            "message": "Location updated"
        })),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Location not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Location"
)]
pub async fn update_location(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<LocationPatch>,
) -> Result<HttpResponse, AttendanceError> {
    auth.require_admin()?;
    let location = state
        .registry
        .update(&path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Location updated",
        "location": location,
    })))
}

/// Delete an office location (admin only)
#[utoipa::path(
    delete,
    path = "/api/locations/{id}",
    params(("id" = String, Path, description = "Location id")),
    responses(
        (status = 200, description = "Location deleted", body = Object, example = json!({
            "message": "Location deleted"
        })),
        (status = 400, description = "The default office cannot be deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Location not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Location"
)]
pub async fn delete_location(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AttendanceError> {
    auth.require_admin()?;
    state.registry.delete(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Location deleted" })))
}

/// Locations ordered by distance from a point
#[utoipa::path(
    get,
    path = "/api/locations/nearest",
    params(NearestQuery),
    responses(
        (status = 200, description = "Closest locations first", body = [RankedLocation]),
        (status = 400, description = "lat and lng are required numeric query params"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Location"
)]
pub async fn nearest_locations(
    _auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<NearestQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let at = Coordinate::from_parts(query.lat, query.lng).map_err(|_| {
        AttendanceError::InvalidInput("lat and lng are required numeric query params".into())
    })?;
    let limit = query.limit.unwrap_or(DEFAULT_NEAREST_LIMIT);

    let ranked: Vec<RankedLocation> = state
        .registry
        .ranked(at, limit)
        .await?
        .into_iter()
        .map(|(location, distance)| RankedLocation {
            location,
            distance: distance.round() as i64,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ranked))
}
