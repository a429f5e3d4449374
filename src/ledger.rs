use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AttendanceError;
use crate::geo::Coordinate;
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceSummary, hours_between, round_hours,
};
use crate::model::user::RosterEntry;

/// Result of closing the day's open record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckOutReceipt {
    pub check_out_time: DateTime<Utc>,
    /// Elapsed hours, rounded to 2 decimal places.
    pub total_hours: f64,
}

#[async_trait]
pub trait AttendanceLedger: Send + Sync {
    async fn get_today(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError>;

    /// Newest date first, newest check-in first within a date. The range only
    /// applies when both bounds are given.
    async fn get_range(
        &self,
        user_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError>;

    async fn record_check_in(
        &self,
        user_id: &str,
        date: NaiveDate,
        at: Coordinate,
        location_name: &str,
        time: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError>;

    async fn record_check_out(
        &self,
        user_id: &str,
        date: NaiveDate,
        time: DateTime<Utc>,
    ) -> Result<CheckOutReceipt, AttendanceError>;

    async fn summarize(
        &self,
        user_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let records = self.get_range(user_id, start, end).await?;
        let total: f64 = records.iter().map(AttendanceRecord::worked_hours).sum();
        Ok(AttendanceSummary {
            total_hours: round_hours(total),
            days_count: records.len() as i64,
        })
    }

    /// Every user with their attendance for `date`, ordered by username
    /// case-insensitively.
    async fn roster(&self, date: NaiveDate) -> Result<Vec<RosterEntry>, AttendanceError>;
}

const RECORD_COLUMNS: &str = "id, user_id, date, check_in_time, check_out_time, latitude, longitude, location_name, status, created_at";

pub struct SqliteAttendanceLedger {
    pool: SqlitePool,
}

impl SqliteAttendanceLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RosterRow {
    user_id: String,
    username: String,
    email: String,
    role: String,
    check_in_time: Option<DateTime<Utc>>,
    check_out_time: Option<DateTime<Utc>>,
}

impl From<RosterRow> for RosterEntry {
    fn from(row: RosterRow) -> Self {
        RosterEntry {
            user_id: row.user_id,
            username: row.username,
            email: row.email,
            role: row.role,
            checked_in: row.check_in_time.is_some(),
            checked_out: row.check_out_time.is_some(),
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
        }
    }
}

#[async_trait]
impl AttendanceLedger for SqliteAttendanceLedger {
    async fn get_today(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance WHERE user_id = ? AND date = ?"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_range(
        &self,
        user_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let records = match (start, end) {
            (Some(start), Some(end)) => {
                sqlx::query_as::<_, AttendanceRecord>(&format!(
                    r#"
                    SELECT {RECORD_COLUMNS} FROM attendance
                    WHERE user_id = ? AND date BETWEEN ? AND ?
                    ORDER BY date DESC, check_in_time DESC
                    "#
                ))
                .bind(user_id)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            _ => {
                sqlx::query_as::<_, AttendanceRecord>(&format!(
                    r#"
                    SELECT {RECORD_COLUMNS} FROM attendance
                    WHERE user_id = ?
                    ORDER BY date DESC, check_in_time DESC
                    "#
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(records)
    }

    async fn record_check_in(
        &self,
        user_id: &str,
        date: NaiveDate,
        at: Coordinate,
        location_name: &str,
        time: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            date,
            check_in_time: Some(time),
            check_out_time: None,
            latitude: Some(at.latitude),
            longitude: Some(at.longitude),
            location_name: Some(location_name.to_string()),
            status: AttendanceStatus::Present,
            created_at: time,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (id, user_id, check_in_time, latitude, longitude, location_name, status, date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.check_in_time)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.location_name)
        .bind(record.status)
        .bind(record.date)
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            // Duplicate check-in for same day
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!(user_id, %date, "Duplicate check-in rejected by storage");
                Err(AttendanceError::AlreadyCheckedIn)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record_check_out(
        &self,
        user_id: &str,
        date: NaiveDate,
        time: DateTime<Utc>,
    ) -> Result<CheckOutReceipt, AttendanceError> {
        let open: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, check_in_time FROM attendance
            WHERE user_id = ? AND date = ?
            AND check_in_time IS NOT NULL
            AND check_out_time IS NULL
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, check_in_time)) = open else {
            return Err(AttendanceError::NoOpenCheckIn);
        };

        // a clock step backwards must not produce a negative shift
        let check_out_time = time.max(check_in_time);

        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out_time = ?
            WHERE id = ?
            AND check_out_time IS NULL
            "#,
        )
        .bind(check_out_time)
        .bind(&id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // closed by a concurrent check-out
            return Err(AttendanceError::NoOpenCheckIn);
        }

        Ok(CheckOutReceipt {
            check_out_time,
            total_hours: round_hours(hours_between(check_in_time, check_out_time)),
        })
    }

    async fn roster(&self, date: NaiveDate) -> Result<Vec<RosterEntry>, AttendanceError> {
        let rows = sqlx::query_as::<_, RosterRow>(
            r#"
            SELECT u.id AS user_id, u.username, u.email, u.role,
                   a.check_in_time, a.check_out_time
            FROM users u
            LEFT JOIN attendance a ON a.user_id = u.id AND a.date = ?
            ORDER BY u.username COLLATE NOCASE ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RosterEntry::from).collect())
    }
}
