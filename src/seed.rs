//! Demo data: a named alias of the default office, an optional admin and a
//! batch of student accounts. Every item is reported individually; existing
//! rows are skipped, never overwritten.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::role::Role;

pub const ALIAS_LOCATION_ID: &str = "presidency-university";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Created(String),
    Skipped(String),
    Failed { item: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub admin: Option<AdminAccount>,
    pub student_password: String,
    pub student_count: u32,
}

#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SeedConfig {
    /// The admin is seeded only when `SEED_ADMIN_USERNAME`, `SEED_ADMIN_EMAIL`
    /// and `SEED_ADMIN_PASSWORD` are all set.
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let admin = match (
            var("SEED_ADMIN_USERNAME"),
            var("SEED_ADMIN_EMAIL"),
            var("SEED_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(AdminAccount {
                username,
                email,
                password,
            }),
            _ => None,
        };

        let student_count = match var("SEED_STUDENT_COUNT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid SEED_STUDENT_COUNT value {raw:?}: {e}"))?,
            None => 100,
        };

        Ok(Self {
            admin,
            student_password: var("SEED_STUDENT_PASSWORD").unwrap_or_else(|| "Student@123".into()),
            student_count,
        })
    }
}

/// `student001`, `student002`, ...
pub fn student_username(index: u32) -> String {
    format!("student{index:03}")
}

pub async fn run(
    pool: &SqlitePool,
    config: &Config,
    seed: &SeedConfig,
    now: DateTime<Utc>,
) -> Vec<SeedOutcome> {
    let mut outcomes = Vec::new();

    let item = format!("location {ALIAS_LOCATION_ID}");
    outcomes.push(
        match sqlx::query(
            r#"
            INSERT OR IGNORE INTO office_locations (id, name, latitude, longitude, radius, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ALIAS_LOCATION_ID)
        .bind(&config.office_name)
        .bind(config.office_lat)
        .bind(config.office_lng)
        .bind(config.office_radius)
        .bind(now)
        .execute(pool)
        .await
        {
            Ok(r) if r.rows_affected() > 0 => SeedOutcome::Created(item),
            Ok(_) => SeedOutcome::Skipped(item),
            Err(e) => SeedOutcome::Failed {
                item,
                reason: e.to_string(),
            },
        },
    );

    if let Some(admin) = &seed.admin {
        let item = format!("admin {}", admin.username);
        outcomes.push(match hash_password(&admin.password) {
            Ok(hash) => {
                insert_account(pool, item, &admin.username, &admin.email, &hash, Role::Admin, now)
                    .await
            }
            Err(e) => SeedOutcome::Failed {
                item,
                reason: e.to_string(),
            },
        });
    }

    if seed.student_count > 0 {
        match hash_password(&seed.student_password) {
            Ok(hash) => {
                for i in 1..=seed.student_count {
                    let username = student_username(i);
                    let email = format!("{username}@example.com");
                    let item = format!("student {username}");
                    outcomes.push(
                        insert_account(pool, item, &username, &email, &hash, Role::Student, now)
                            .await,
                    );
                }
            }
            Err(e) => outcomes.push(SeedOutcome::Failed {
                item: "students".into(),
                reason: e.to_string(),
            }),
        }
    }

    outcomes
}

async fn insert_account(
    pool: &SqlitePool,
    item: String,
    username: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    now: DateTime<Utc>,
) -> SeedOutcome {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO users (id, username, email, password, role, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_ref())
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() > 0 => SeedOutcome::Created(item),
        Ok(_) => SeedOutcome::Skipped(item),
        Err(e) => SeedOutcome::Failed {
            item,
            reason: e.to_string(),
        },
    }
}

/// Logs a one-line summary plus every failure; returns the failure count.
pub fn report(outcomes: &[SeedOutcome]) -> usize {
    let mut created = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for outcome in outcomes {
        match outcome {
            SeedOutcome::Created(_) => created += 1,
            SeedOutcome::Skipped(_) => skipped += 1,
            SeedOutcome::Failed { item, reason } => {
                failed += 1;
                warn!(%item, %reason, "Seed item failed");
            }
        }
    }
    info!(created, skipped, failed, "Seed completed");
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    fn seed_config(students: u32, with_admin: bool) -> SeedConfig {
        SeedConfig {
            admin: with_admin.then(|| AdminAccount {
                username: "root".into(),
                email: "root@example.com".into(),
                password: "Admin@123".into(),
            }),
            student_password: "Student@123".into(),
            student_count: students,
        }
    }

    #[test]
    fn student_usernames_are_zero_padded() {
        assert_eq!(student_username(1), "student001");
        assert_eq!(student_username(42), "student042");
        assert_eq!(student_username(100), "student100");
    }

    #[actix_web::test]
    async fn seeding_twice_skips_everything_the_second_time() {
        let pool = memory_pool().await;
        let config = Config::for_tests();
        let seed = seed_config(3, true);

        let first = run(&pool, &config, &seed, Utc::now()).await;
        assert_eq!(
            first,
            vec![
                SeedOutcome::Created("location presidency-university".into()),
                SeedOutcome::Created("admin root".into()),
                SeedOutcome::Created("student student001".into()),
                SeedOutcome::Created("student student002".into()),
                SeedOutcome::Created("student student003".into()),
            ]
        );
        assert_eq!(report(&first), 0);

        let second = run(&pool, &config, &seed, Utc::now()).await;
        assert_eq!(second.len(), 5);
        assert!(second.iter().all(|o| matches!(o, SeedOutcome::Skipped(_))));

        let (students,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'student'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(students, 3);
    }

    #[actix_web::test]
    async fn admin_is_optional() {
        let pool = memory_pool().await;
        let outcomes = run(&pool, &Config::for_tests(), &seed_config(0, false), Utc::now()).await;
        assert_eq!(
            outcomes,
            vec![SeedOutcome::Created("location presidency-university".into())]
        );
    }

    #[actix_web::test]
    async fn storage_failures_are_reported_per_item() {
        let pool = memory_pool().await;
        sqlx::query("DROP TABLE attendance").execute(&pool).await.unwrap();
        sqlx::query("DROP TABLE users").execute(&pool).await.unwrap();

        let outcomes = run(&pool, &Config::for_tests(), &seed_config(2, false), Utc::now()).await;
        assert!(matches!(outcomes[0], SeedOutcome::Created(_)));
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[1..]
            .iter()
            .all(|o| matches!(o, SeedOutcome::Failed { .. })));
        assert_eq!(report(&outcomes), 2);
    }
}
