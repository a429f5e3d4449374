use crate::{
    api::{attendance, faculty, location},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AttendanceError,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limits shared by every worker.
#[derive(Clone)]
pub struct RateLimits {
    login: LimiterConfig,
    protected: LimiterConfig,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<LimiterConfig> {
    let requests_per_min = requests_per_min.max(1);
    GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min} requests per minute"))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: &RateLimits) {
    let prefix = config.api_prefix.trim_end_matches('/');

    // Extractor failures use the same {error} body as everything else
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        AttendanceError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        AttendanceError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _| {
        AttendanceError::InvalidInput(err.to_string()).into()
    }));

    // Public routes, registered ahead of the protected scope so they match first
    cfg.service(
        web::resource(format!("{prefix}/auth/login"))
            .wrap(Governor::new(&limits.login))
            .route(web::post().to(handlers::login)),
    )
    .service(web::resource(format!("{prefix}/office")).route(web::get().to(location::office)));

    // Protected routes
    cfg.service(
        web::scope(prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(Governor::new(&limits.protected))
            .service(web::resource("/checkin").route(web::post().to(attendance::check_in)))
            .service(web::resource("/checkout").route(web::post().to(attendance::check_out)))
            .service(web::resource("/status").route(web::get().to(attendance::status)))
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    // /attendance/summary
                    .service(web::resource("/summary").route(web::get().to(attendance::summary))),
            )
            .service(
                web::resource("/faculty/attendance/status")
                    .route(web::get().to(faculty::attendance_status)),
            )
            .service(
                web::scope("/locations")
                    // /locations
                    .service(
                        web::resource("")
                            .route(web::get().to(location::list_locations))
                            .route(web::post().to(location::create_location)),
                    )
                    // /locations/nearest must precede /locations/{id}
                    .service(
                        web::resource("/nearest").route(web::get().to(location::nearest_locations)),
                    )
                    // /locations/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(location::update_location))
                            .route(web::delete().to(location::delete_location)),
                    ),
            ),
    );
}
