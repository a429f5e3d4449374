//! Per-user, per-day attendance transitions.
//!
//! `NotCheckedIn -> CheckedIn -> CheckedOut`. `CheckedOut` is terminal for the
//! day; there is no way back and no second check-in.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::clock::Clock;
use crate::error::AttendanceError;
use crate::geo::Coordinate;
use crate::ledger::{AttendanceLedger, CheckOutReceipt};
use crate::model::attendance::{AttendanceRecord, AttendanceSummary};
use crate::model::role::Role;
use crate::model::user::RosterEntry;
use crate::registry::LocationRegistry;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    fn require(&self, role: Role) -> Result<(), AttendanceError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AttendanceError::Forbidden)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

impl DayState {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            Some(r) if r.check_out_time.is_some() => DayState::CheckedOut,
            Some(r) if r.check_in_time.is_some() => DayState::CheckedIn,
            _ => DayState::NotCheckedIn,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckInOutcome {
    pub check_in_time: DateTime<Utc>,
    pub location_name: String,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayStatus {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub checked_in: bool,
    pub checked_out: bool,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub check_in_time: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(rename = "location")]
    pub location_name: Option<String>,
}

pub struct AttendanceStateMachine {
    registry: Arc<dyn LocationRegistry>,
    ledger: Arc<dyn AttendanceLedger>,
    clock: Arc<dyn Clock>,
}

impl AttendanceStateMachine {
    pub fn new(
        registry: Arc<dyn LocationRegistry>,
        ledger: Arc<dyn AttendanceLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            ledger,
            clock,
        }
    }

    #[instrument(name = "check_in", skip(self, principal, coordinate), fields(user_id = %principal.user_id))]
    pub async fn check_in(
        &self,
        principal: &Principal,
        coordinate: Option<Coordinate>,
    ) -> Result<CheckInOutcome, AttendanceError> {
        principal.require(Role::Student)?;
        let at = coordinate
            .ok_or_else(|| AttendanceError::InvalidInput("Location coordinates are required".into()))?
            .validated()?;

        let now = self.clock.now();
        let today = self.clock.today();

        if let Some(existing) = self.ledger.get_today(&principal.user_id, today).await? {
            if existing.check_in_time.is_some() {
                return Err(AttendanceError::AlreadyCheckedIn);
            }
        }

        let (office, distance) = self.registry.nearest(at).await?;
        if !office.contains(distance) {
            tracing::info!(
                office = %office.name,
                distance = distance.round(),
                allowed = office.radius_meters,
                "Check-in outside geofence"
            );
            return Err(AttendanceError::OutsideGeofence {
                distance_meters: distance,
                allowed_radius: office.radius_meters,
            });
        }

        // a concurrent duplicate surfaces here as AlreadyCheckedIn
        let record = self
            .ledger
            .record_check_in(&principal.user_id, today, at, &office.name, now)
            .await?;

        tracing::info!(office = %office.name, distance = distance.round(), "Checked in");
        Ok(CheckInOutcome {
            check_in_time: record.check_in_time.unwrap_or(now),
            location_name: office.name,
            distance_meters: distance,
        })
    }

    /// The geofence is not re-checked here; only an open check-in is required.
    #[instrument(name = "check_out", skip(self, principal, coordinate), fields(user_id = %principal.user_id))]
    pub async fn check_out(
        &self,
        principal: &Principal,
        coordinate: Option<Coordinate>,
    ) -> Result<CheckOutReceipt, AttendanceError> {
        principal.require(Role::Student)?;
        coordinate
            .ok_or_else(|| AttendanceError::InvalidInput("Location coordinates are required".into()))?
            .validated()?;

        let today = self.clock.today();
        let record = self.ledger.get_today(&principal.user_id, today).await?;
        if DayState::of(record.as_ref()) != DayState::CheckedIn {
            return Err(AttendanceError::NoOpenCheckIn);
        }

        let receipt = self
            .ledger
            .record_check_out(&principal.user_id, today, self.clock.now())
            .await?;

        tracing::info!(total_hours = receipt.total_hours, "Checked out");
        Ok(receipt)
    }

    pub async fn status(&self, principal: &Principal) -> Result<DayStatus, AttendanceError> {
        let today = self.clock.today();
        let record = self.ledger.get_today(&principal.user_id, today).await?;

        Ok(match record {
            Some(r) => DayStatus {
                date: today,
                checked_in: r.check_in_time.is_some(),
                checked_out: r.check_out_time.is_some(),
                check_in_time: r.check_in_time,
                check_out_time: r.check_out_time,
                location_name: r.location_name,
            },
            None => DayStatus {
                date: today,
                checked_in: false,
                checked_out: false,
                check_in_time: None,
                check_out_time: None,
                location_name: None,
            },
        })
    }

    /// Roster for `date` (today when absent). Faculty only.
    pub async fn faculty_status(
        &self,
        principal: &Principal,
        date: Option<NaiveDate>,
    ) -> Result<(NaiveDate, Vec<RosterEntry>), AttendanceError> {
        principal.require(Role::Faculty)?;
        let date = date.unwrap_or_else(|| self.clock.today());
        Ok((date, self.ledger.roster(date).await?))
    }

    /// The caller's own records.
    pub async fn history(
        &self,
        principal: &Principal,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        self.ledger.get_range(&principal.user_id, start, end).await
    }

    /// Summary for the caller, or for `user_id` when the caller is faculty or
    /// admin.
    pub async fn summary(
        &self,
        principal: &Principal,
        user_id: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(String, AttendanceSummary), AttendanceError> {
        let target = match user_id {
            Some(other) if other != principal.user_id => {
                if !matches!(principal.role, Role::Faculty | Role::Admin) {
                    return Err(AttendanceError::Forbidden);
                }
                other.to_string()
            }
            _ => principal.user_id.clone(),
        };
        let summary = self.ledger.summarize(&target, start, end).await?;
        Ok((target, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::db::test_support::{insert_user, memory_pool};
    use crate::geo::offset_north;
    use crate::ledger::SqliteAttendanceLedger;
    use crate::model::location::NewLocation;
    use crate::registry::SqliteLocationRegistry;

    const CAMPUS: Coordinate = Coordinate {
        latitude: 13.1373,
        longitude: 77.5680,
    };

    struct Harness {
        machine: Arc<AttendanceStateMachine>,
        clock: Arc<FixedClock>,
        pool: sqlx::SqlitePool,
    }

    async fn harness(with_office: bool) -> Harness {
        let pool = memory_pool().await;
        insert_user(&pool, "s1", "student1", Role::Student).await;
        insert_user(&pool, "s2", "student2", Role::Student).await;
        insert_user(&pool, "f1", "prof", Role::Faculty).await;

        let clock = Arc::new(FixedClock::at("2026-03-10T09:00:00Z"));
        let registry = Arc::new(SqliteLocationRegistry::new(pool.clone(), clock.clone()));
        if with_office {
            registry
                .create(NewLocation {
                    name: Some("Presidency University".into()),
                    latitude: Some(CAMPUS.latitude),
                    longitude: Some(CAMPUS.longitude),
                    radius: Some(150),
                })
                .await
                .unwrap();
        }
        let ledger = Arc::new(SqliteAttendanceLedger::new(pool.clone()));
        let machine = Arc::new(AttendanceStateMachine::new(registry, ledger, clock.clone()));
        Harness {
            machine,
            clock,
            pool,
        }
    }

    fn student(id: &str) -> Principal {
        Principal {
            user_id: id.into(),
            role: Role::Student,
        }
    }

    #[actix_web::test]
    async fn check_in_inside_radius_succeeds() {
        let h = harness(true).await;
        let outcome = h
            .machine
            .check_in(&student("s1"), Some(offset_north(CAMPUS, 140.0)))
            .await
            .unwrap();

        assert_eq!(outcome.location_name, "Presidency University");
        assert!((outcome.distance_meters - 140.0).abs() < 0.5);
        assert_eq!(outcome.check_in_time, h.clock.now());
    }

    #[actix_web::test]
    async fn check_in_outside_radius_reports_distance() {
        let h = harness(true).await;
        let err = h
            .machine
            .check_in(&student("s1"), Some(offset_north(CAMPUS, 160.0)))
            .await
            .unwrap_err();

        match err {
            AttendanceError::OutsideGeofence {
                distance_meters,
                allowed_radius,
            } => {
                assert_eq!(distance_meters.round(), 160.0);
                assert_eq!(allowed_radius, 150);
            }
            other => panic!("unexpected {other:?}"),
        }
        let status = h.machine.status(&student("s1")).await.unwrap();
        assert!(!status.checked_in);
    }

    #[actix_web::test]
    async fn second_check_in_is_rejected_regardless_of_position() {
        let h = harness(true).await;
        h.machine
            .check_in(&student("s1"), Some(CAMPUS))
            .await
            .unwrap();

        for position in [CAMPUS, offset_north(CAMPUS, 5_000.0)] {
            let err = h
                .machine
                .check_in(&student("s1"), Some(position))
                .await
                .unwrap_err();
            assert!(matches!(err, AttendanceError::AlreadyCheckedIn));
        }
    }

    #[actix_web::test]
    async fn only_students_check_in_or_out() {
        let h = harness(true).await;
        let faculty = Principal {
            user_id: "f1".into(),
            role: Role::Faculty,
        };
        assert!(matches!(
            h.machine.check_in(&faculty, Some(CAMPUS)).await,
            Err(AttendanceError::Forbidden)
        ));
        assert!(matches!(
            h.machine.check_out(&faculty, Some(CAMPUS)).await,
            Err(AttendanceError::Forbidden)
        ));
    }

    #[actix_web::test]
    async fn missing_coordinate_is_invalid_input() {
        let h = harness(true).await;
        assert!(matches!(
            h.machine.check_in(&student("s1"), None).await,
            Err(AttendanceError::InvalidInput(_))
        ));
        assert!(matches!(
            h.machine
                .check_in(&student("s1"), Some(Coordinate::new(f64::NAN, 1.0)))
                .await,
            Err(AttendanceError::InvalidInput(_))
        ));
        assert!(matches!(
            h.machine.check_out(&student("s1"), None).await,
            Err(AttendanceError::InvalidInput(_))
        ));
    }

    #[actix_web::test]
    async fn empty_registry_is_fatal_for_check_in() {
        let h = harness(false).await;
        assert!(matches!(
            h.machine.check_in(&student("s1"), Some(CAMPUS)).await,
            Err(AttendanceError::NoLocationsConfigured)
        ));
    }

    #[actix_web::test]
    async fn check_out_requires_prior_check_in() {
        let h = harness(true).await;
        assert!(matches!(
            h.machine.check_out(&student("s1"), Some(CAMPUS)).await,
            Err(AttendanceError::NoOpenCheckIn)
        ));
    }

    #[actix_web::test]
    async fn check_out_reports_rounded_hours_and_skips_geofence() {
        let h = harness(true).await;
        h.machine
            .check_in(&student("s1"), Some(CAMPUS))
            .await
            .unwrap();
        h.clock.advance(chrono::Duration::milliseconds(3 * 3_600_000 + 1_234_567));

        // far away on purpose: check-out does not re-validate the geofence
        let receipt = h
            .machine
            .check_out(&student("s1"), Some(offset_north(CAMPUS, 10_000.0)))
            .await
            .unwrap();
        assert_eq!(receipt.total_hours, 3.34);
        assert_eq!(receipt.check_out_time, h.clock.now());

        let status = h.machine.status(&student("s1")).await.unwrap();
        assert!(status.checked_in && status.checked_out);
        assert_eq!(status.location_name.as_deref(), Some("Presidency University"));

        // terminal for the day
        assert!(matches!(
            h.machine.check_out(&student("s1"), Some(CAMPUS)).await,
            Err(AttendanceError::NoOpenCheckIn)
        ));
        assert!(matches!(
            h.machine.check_in(&student("s1"), Some(CAMPUS)).await,
            Err(AttendanceError::AlreadyCheckedIn)
        ));
    }

    #[actix_web::test]
    async fn a_new_day_starts_not_checked_in() {
        let h = harness(true).await;
        h.machine
            .check_in(&student("s1"), Some(CAMPUS))
            .await
            .unwrap();
        h.clock.set("2026-03-11T08:30:00Z");

        let status = h.machine.status(&student("s1")).await.unwrap();
        assert_eq!(status.date, NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        assert!(!status.checked_in && !status.checked_out);
        h.machine
            .check_in(&student("s1"), Some(CAMPUS))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn concurrent_duplicate_check_ins_persist_one_record() {
        let h = harness(true).await;
        let attempts = (0..8).map(|_| {
            let machine = h.machine.clone();
            async move { machine.check_in(&student("s1"), Some(CAMPUS)).await }
        });
        let results = futures::future::join_all(attempts).await;

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let dup = results
            .iter()
            .filter(|r| matches!(r, Err(AttendanceError::AlreadyCheckedIn)))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(dup, 7);

        let (rows,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM attendance WHERE user_id = 's1'")
                .fetch_one(&h.pool)
                .await
                .unwrap();
        assert_eq!(rows, 1);
    }

    #[actix_web::test]
    async fn faculty_status_lists_everyone() {
        let h = harness(true).await;
        let faculty = Principal {
            user_id: "f1".into(),
            role: Role::Faculty,
        };

        let (date, roster) = h.machine.faculty_status(&faculty, None).await.unwrap();
        assert_eq!(date, h.clock.today());
        assert_eq!(roster.len(), 3);
        assert!(roster.iter().all(|r| !r.checked_in && !r.checked_out));

        assert!(matches!(
            h.machine.faculty_status(&student("s1"), None).await,
            Err(AttendanceError::Forbidden)
        ));
    }

    #[actix_web::test]
    async fn summary_of_other_users_needs_faculty_or_admin() {
        let h = harness(true).await;
        assert!(matches!(
            h.machine.summary(&student("s1"), Some("s2"), None, None).await,
            Err(AttendanceError::Forbidden)
        ));

        let (target, _) = h
            .machine
            .summary(&student("s1"), Some("s1"), None, None)
            .await
            .unwrap();
        assert_eq!(target, "s1");

        let admin = Principal {
            user_id: "a1".into(),
            role: Role::Admin,
        };
        let (target, summary) = h
            .machine
            .summary(&admin, Some("s2"), None, None)
            .await
            .unwrap();
        assert_eq!(target, "s2");
        assert_eq!(summary.days_count, 0);
    }
}
