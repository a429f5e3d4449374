//! Companion agent: `attendance-agent [watch|checkin|checkout]`.
//!
//! Reads `AGENT_BASE_URL` (default `http://127.0.0.1:3000/api`) and
//! `AGENT_TOKEN`. `AGENT_LAT`/`AGENT_LNG`/`AGENT_ACCURACY` describe the device
//! position; without them the default office is used.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use dotenvy::dotenv;
use tracing::{info, warn};

use campus_attendance::agent::http::HttpAttendanceApi;
use campus_attendance::agent::{AUTO_INTERVAL, AgentSession, AttendanceAgent, StaticLocation};
use campus_attendance::clock::SystemClock;
use campus_attendance::geo::Coordinate;

/// `None` when unset; a set but unparsable value is an error.
fn parse_var<T>(key: &str, raw: Option<&str>) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}")),
        None => Ok(None),
    }
}

fn read<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    parse_var(key, env::var(key).ok().as_deref())
}

fn device_position() -> anyhow::Result<Option<(Coordinate, f64)>> {

    match (read::<f64>("AGENT_LAT")?, read::<f64>("AGENT_LNG")?) {
        (Some(lat), Some(lng)) => {
            let at = Coordinate::new(lat, lng)
                .validated()
                .map_err(|e| anyhow!("Invalid device position: {e}"))?;
            Ok(Some((at, read("AGENT_ACCURACY")?.unwrap_or(0.0))))
        }
        (None, None) => Ok(None),
        _ => bail!("AGENT_LAT and AGENT_LNG must be set together"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let base_url = env::var("AGENT_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000/api".into());
    let token = env::var("AGENT_TOKEN").context("AGENT_TOKEN must be set")?;
    let offset_minutes: i32 = read("ATTENDANCE_UTC_OFFSET_MINUTES")?.unwrap_or(0);

    let agent = Arc::new(AttendanceAgent::new(
        Arc::new(HttpAttendanceApi::new(base_url, token)),
        Arc::new(StaticLocation(device_position()?)),
        Arc::new(SystemClock::with_offset_minutes(offset_minutes)),
    ));

    match env::args().nth(1).as_deref().unwrap_or("watch") {
        "checkin" => {
            let reply = agent.check_in_now().await?;
            info!(location = %reply.location, distance = reply.distance, "{}", reply.message);
        }
        "checkout" => {
            let reply = agent.check_out_now().await?;
            info!(total_hours = reply.total_hours, "{}", reply.message);
        }
        "watch" => {
            let session = AgentSession::start(agent, AUTO_INTERVAL);
            info!("Watching; Ctrl+C to stop");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            session.stop().await;
            info!("Stopped");
        }
        other => bail!("unknown command {other:?}, expected watch, checkin or checkout"),
    }

    Ok(())
}
