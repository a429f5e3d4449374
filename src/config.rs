use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    // Pool
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,

    // Default office, seeded at startup and served to clients as the fallback fix
    pub office_name: String,
    pub office_lat: f64,
    pub office_lng: f64,
    pub office_radius: i64,

    /// Offset of the attendance day boundary from UTC.
    pub attendance_utc_offset_minutes: i32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "127.0.0.1:3000"),
            database_url: var_or("DATABASE_URL", "sqlite://attendance.db"),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: parse_or("ACCESS_TOKEN_TTL", "86400")?, // default 24h

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", "60")?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: var_or("API_PREFIX", "/api"),
            log_dir: var_or("LOG_DIR", "logs"),

            db_max_connections: parse_or("DB_MAX_CONNECTIONS", "5")?,
            db_acquire_timeout_secs: parse_or("DB_ACQUIRE_TIMEOUT_SECS", "5")?,

            office_name: var_or("OFFICE_NAME", "Presidency University, Bangalore"),
            office_lat: parse_or("OFFICE_LAT", "13.1373")?,
            office_lng: parse_or("OFFICE_LNG", "77.5680")?,
            office_radius: parse_or("OFFICE_RADIUS", "150")?,

            attendance_utc_offset_minutes: parse_or("ATTENDANCE_UTC_OFFSET_MINUTES", "0")?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            rate_login_per_min: 1000,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            log_dir: "logs".into(),
            db_max_connections: 1,
            db_acquire_timeout_secs: 5,
            office_name: "Presidency University, Bangalore".into(),
            office_lat: 13.1373,
            office_lng: 77.5680,
            office_radius: 150,
            attendance_utc_offset_minutes: 0,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = var_or(key, default);
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_uses_default_and_reports_bad_values() {
        let port: u32 = parse_or("CAMPUS_ATTENDANCE_UNSET_VAR", "42").unwrap();
        assert_eq!(port, 42);

        let err = parse_or::<u32>("CAMPUS_ATTENDANCE_UNSET_VAR", "forty").unwrap_err();
        assert!(err.to_string().contains("CAMPUS_ATTENDANCE_UNSET_VAR"));
    }
}
