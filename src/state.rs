use std::sync::Arc;

use sqlx::SqlitePool;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::ledger::SqliteAttendanceLedger;
use crate::registry::{LocationRegistry, SqliteLocationRegistry};
use crate::state_machine::AttendanceStateMachine;

/// Shared services handed to every handler through `web::Data`.
pub struct AppState {
    pub attendance: AttendanceStateMachine,
    pub registry: Arc<dyn LocationRegistry>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::with_offset_minutes(
            config.attendance_utc_offset_minutes,
        ));
        Self::with_clock(pool, clock)
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        let registry: Arc<dyn LocationRegistry> =
            Arc::new(SqliteLocationRegistry::new(pool.clone(), clock.clone()));
        let ledger = Arc::new(SqliteAttendanceLedger::new(pool));

        Self {
            attendance: AttendanceStateMachine::new(registry.clone(), ledger, clock),
            registry,
        }
    }
}
