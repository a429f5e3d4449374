use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::Config;
use crate::model::location::DEFAULT_LOCATION_ID;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT UNIQUE NOT NULL,
        email TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'student',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // UNIQUE(user_id, date) is the once-per-day check-in guard
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        check_in_time TEXT,
        check_out_time TEXT,
        latitude REAL,
        longitude REAL,
        location_name TEXT,
        status TEXT NOT NULL DEFAULT 'present',
        date TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (user_id, date),
        FOREIGN KEY (user_id) REFERENCES users (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS office_locations (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        radius INTEGER NOT NULL DEFAULT 100,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];

pub async fn init_db(config: &Config) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid DATABASE_URL {}", config.database_url))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool).await?;
    ensure_default_location(&pool, config, Utc::now()).await?;

    Ok(pool)
}

pub async fn create_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create schema")?;
    }
    Ok(())
}

/// Inserts the configured default office unless a row with its id exists.
pub async fn ensure_default_location(
    pool: &SqlitePool,
    config: &Config,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let inserted = sqlx::query(
        r#"
        INSERT OR IGNORE INTO office_locations (id, name, latitude, longitude, radius, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(DEFAULT_LOCATION_ID)
    .bind(&config.office_name)
    .bind(config.office_lat)
    .bind(config.office_lng)
    .bind(config.office_radius)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to seed default office location")?
    .rows_affected();

    if inserted > 0 {
        tracing::info!(name = %config.office_name, "Default office location created");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::role::Role;

    /// Single-connection in-memory database with the schema applied.
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        create_schema(&pool).await.expect("schema");
        pool
    }

    pub async fn insert_user(pool: &SqlitePool, id: &str, username: &str, role: Role) {
        sqlx::query(
            "INSERT INTO users (id, username, email, password, role) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(username)
        .bind(format!("{}@example.com", username.to_lowercase()))
        .bind("not-a-hash")
        .bind(role.as_ref())
        .execute(pool)
        .await
        .expect("insert user");
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::memory_pool;
    use super::*;

    #[actix_web::test]
    async fn default_location_is_seeded_once() {
        let pool = memory_pool().await;
        let mut config = Config::for_tests();

        ensure_default_location(&pool, &config, Utc::now()).await.unwrap();
        config.office_name = "Renamed".into();
        ensure_default_location(&pool, &config, Utc::now()).await.unwrap();

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, name FROM office_locations")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            rows,
            vec![(
                DEFAULT_LOCATION_ID.to_string(),
                "Presidency University, Bangalore".to_string()
            )]
        );
    }
}
