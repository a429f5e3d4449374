//! Companion check-in agent.
//!
//! The server decides every check-in; the agent only decides when to ask.
//! Automatic attempts run on a fixed interval inside an [`AgentSession`] and
//! never surface errors. Manual actions ([`AttendanceAgent::check_in_now`],
//! [`AttendanceAgent::check_out_now`]) return them.

pub mod http;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use derive_more::Display;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::geo::Coordinate;
use crate::model::location::OfficeLocation;

/// Period between automatic attempts.
pub const AUTO_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Worst reported accuracy an automatic attempt will act on.
pub const MAX_AUTO_ACCURACY_METERS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LocationError {
    #[display(fmt = "location permission denied")]
    Denied,
    #[display(fmt = "location request timed out")]
    Timeout,
    #[display(fmt = "location unavailable")]
    Unavailable,
}

#[derive(Debug, Display)]
pub enum AgentError {
    #[display(fmt = "{} ({})", message, status)]
    Rejected { status: u16, message: String },
    #[display(fmt = "request failed: {}", _0)]
    Transport(reqwest::Error),
}

impl std::error::Error for AgentError {}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::Transport(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixSource {
    Device,
    /// The default office stood in for a missing device fix.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub coordinate: Coordinate,
    pub accuracy_meters: f64,
    pub source: FixSource,
}

impl Fix {
    pub fn accurate_enough(&self) -> bool {
        self.accuracy_meters <= MAX_AUTO_ACCURACY_METERS
    }
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Current device position and its reported accuracy in meters.
    async fn current(&self) -> Result<(Coordinate, f64), LocationError>;
}

/// A position that never changes, or none at all.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation(pub Option<(Coordinate, f64)>);

#[async_trait]
impl LocationSource for StaticLocation {
    async fn current(&self) -> Result<(Coordinate, f64), LocationError> {
        self.0.ok_or(LocationError::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub checked_in: bool,
    pub checked_out: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInReply {
    pub message: String,
    pub location: String,
    pub distance: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutReply {
    pub message: String,
    pub total_hours: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearestView {
    pub name: String,
    pub radius: i64,
    pub distance: i64,
}

/// The attendance endpoints the agent talks to.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn office(&self) -> Result<OfficeLocation, AgentError>;
    async fn status(&self) -> Result<StatusView, AgentError>;
    async fn check_in(&self, at: Coordinate) -> Result<CheckInReply, AgentError>;
    async fn check_out(&self, at: Coordinate) -> Result<CheckOutReply, AgentError>;
    async fn nearest(&self, at: Coordinate) -> Result<Option<NearestView>, AgentError>;
}

/// Remembers the day an automatic check-in was last attempted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DailyAttempts {
    check_in: Option<NaiveDate>,
}

impl DailyAttempts {
    pub fn check_in_attempted(&self, today: NaiveDate) -> bool {
        self.check_in == Some(today)
    }

    pub fn mark_check_in(&mut self, today: NaiveDate) {
        self.check_in = Some(today);
    }
}

/// What one automatic round did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoOutcome {
    CheckedIn,
    CheckedOut,
    /// Automatic check-in was already attempted today.
    Suppressed,
    InaccurateFix,
    /// Nothing to do for the current state and position.
    Idle,
    /// A request failed; swallowed.
    Failed,
}

pub struct AttendanceAgent {
    api: Arc<dyn AttendanceApi>,
    location: Arc<dyn LocationSource>,
    clock: Arc<dyn Clock>,
    attempts: Mutex<DailyAttempts>,
}

impl AttendanceAgent {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        location: Arc<dyn LocationSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            location,
            clock,
            attempts: Mutex::new(DailyAttempts::default()),
        }
    }

    /// Device fix, or the default office with its radius as accuracy.
    pub async fn fix(&self) -> Result<Fix, AgentError> {
        match self.location.current().await {
            Ok((coordinate, accuracy_meters)) => Ok(Fix {
                coordinate,
                accuracy_meters,
                source: FixSource::Device,
            }),
            Err(e) => {
                debug!(error = %e, "No device fix, using default office");
                let office = self.api.office().await?;
                Ok(Fix {
                    coordinate: office.center(),
                    accuracy_meters: office.radius_meters as f64,
                    source: FixSource::Fallback,
                })
            }
        }
    }

    pub async fn check_in_now(&self) -> Result<CheckInReply, AgentError> {
        let fix = self.fix().await?;
        self.api.check_in(fix.coordinate).await
    }

    pub async fn check_out_now(&self) -> Result<CheckOutReply, AgentError> {
        let fix = self.fix().await?;
        self.api.check_out(fix.coordinate).await
    }

    /// One automatic round: check in at most once a day, check out once the
    /// device has left the nearest office's radius.
    pub async fn run_once(&self) -> AutoOutcome {
        match self.try_run_once().await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "Automatic attempt failed");
                AutoOutcome::Failed
            }
        }
    }

    async fn try_run_once(&self) -> Result<AutoOutcome, AgentError> {
        let today = self.clock.today();
        let status = self.api.status().await?;

        if !status.checked_in {
            if self.attempted(today) {
                return Ok(AutoOutcome::Suppressed);
            }
            let fix = self.fix().await?;
            if !fix.accurate_enough() {
                return Ok(AutoOutcome::InaccurateFix);
            }
            self.mark_attempted(today);
            let reply = self.api.check_in(fix.coordinate).await?;
            info!(location = %reply.location, distance = reply.distance, "{}", reply.message);
            return Ok(AutoOutcome::CheckedIn);
        }

        // checked in by hand or on an earlier round
        self.mark_attempted(today);
        if status.checked_out {
            return Ok(AutoOutcome::Idle);
        }

        let fix = self.fix().await?;
        if fix.source == FixSource::Fallback {
            return Ok(AutoOutcome::Idle);
        }
        if !fix.accurate_enough() {
            return Ok(AutoOutcome::InaccurateFix);
        }
        match self.api.nearest(fix.coordinate).await? {
            Some(office) if office.distance > office.radius => {
                let reply = self.api.check_out(fix.coordinate).await?;
                info!(office = %office.name, total_hours = reply.total_hours, "{}", reply.message);
                Ok(AutoOutcome::CheckedOut)
            }
            _ => Ok(AutoOutcome::Idle),
        }
    }

    fn attempted(&self, today: NaiveDate) -> bool {
        self.attempts
            .lock()
            .map(|a| a.check_in_attempted(today))
            .unwrap_or(true)
    }

    fn mark_attempted(&self, today: NaiveDate) {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.mark_check_in(today);
        }
    }
}

/// Background task running [`AttendanceAgent::run_once`] on an interval.
/// Stopped explicitly or when dropped.
pub struct AgentSession {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl AgentSession {
    /// The first round runs immediately.
    pub fn start(agent: Arc<AttendanceAgent>, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = agent.run_once().await;
                        debug!(?outcome, "Automatic round finished");
                    }
                }
            }
            debug!("Agent session stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the schedule and waits for an in-flight round to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
