//! systemd adapter behind the `ServiceSupervisor` capability.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::process::Command;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

impl UnitAction {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitAction::Start => "start",
            UnitAction::Stop => "stop",
            UnitAction::Restart => "restart",
            UnitAction::Enable => "enable",
            UnitAction::Disable => "disable",
        }
    }
}

/// Runtime state of one unit as reported by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub unit: String,
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
    pub main_pid: Option<u32>,
    pub restarts: Option<u32>,
    /// Last transition into the active state.
    pub active_since: Option<DateTime<Utc>>,
}

impl UnitStatus {
    pub fn is_running(&self) -> bool {
        self.active_state == "active" && self.sub_state == "running"
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == "loaded"
    }

    /// Parse `systemctl show` key=value output.
    pub fn parse_show(unit: &str, text: &str) -> Self {
        let mut st = UnitStatus {
            unit: unit.to_string(),
            load_state: "unknown".into(),
            active_state: "unknown".into(),
            sub_state: "unknown".into(),
            main_pid: None,
            restarts: None,
            active_since: None,
        };
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key {
                "LoadState" => st.load_state = value.into(),
                "ActiveState" => st.active_state = value.into(),
                "SubState" => st.sub_state = value.into(),
                "MainPID" => st.main_pid = value.parse().ok().filter(|&pid| pid != 0),
                "NRestarts" => st.restarts = value.parse().ok(),
                "ActiveEnterTimestamp" => st.active_since = parse_timestamp(value),
                _ => {}
            }
        }
        st
    }
}

/// Accepts systemd's default `Thu 2025-10-09 08:53:20 UTC` form (what
/// `status()` requests, with `TZ=UTC`) and the `@1760000000` form printed by
/// `--timestamp=unix` on systemd 251+. Empty values (never activated) → None.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Some(secs) = value.strip_prefix('@') {
        let secs: i64 = secs.parse().ok()?;
        if secs == 0 {
            return None;
        }
        return Utc.timestamp_opt(secs, 0).single();
    }
    let mut fields = value.split_whitespace().skip_while(|f| !f.contains('-'));
    let date = fields.next()?;
    let time = fields.next()?;
    if !matches!(fields.next(), Some("UTC") | Some("GMT") | None) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

pub trait ServiceSupervisor {
    fn control(&self, unit: &str, action: UnitAction) -> Result<()>;
    fn status(&self, unit: &str) -> Result<UnitStatus>;
    fn daemon_reload(&self) -> Result<()>;
}

/// Talks to systemd through `systemctl`.
pub struct Systemctl;

const SHOW_PROPERTIES: &str =
    "LoadState,ActiveState,SubState,MainPID,NRestarts,ActiveEnterTimestamp";

impl Systemctl {
    fn run(&self, unit: &str, action: &str, args: &[&str]) -> Result<String> {
        tracing::debug!(?args, "systemctl");
        // Fixed locale and zone so `show` timestamps parse the same everywhere.
        let output = Command::new("systemctl")
            .args(args)
            .env("TZ", "UTC")
            .env("LC_ALL", "C")
            .output()
            .context("failed to run systemctl")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GatewayError::SupervisorError {
                unit: unit.to_string(),
                action: action.to_string(),
                message: if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                },
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ServiceSupervisor for Systemctl {
    fn control(&self, unit: &str, action: UnitAction) -> Result<()> {
        self.run(unit, action.as_str(), &[action.as_str(), unit])?;
        Ok(())
    }

    fn status(&self, unit: &str) -> Result<UnitStatus> {
        let props = format!("--property={}", SHOW_PROPERTIES);
        let text = self.run(unit, "show", &["show", unit, &props])?;
        Ok(UnitStatus::parse_show(unit, &text))
    }

    fn daemon_reload(&self) -> Result<()> {
        self.run("", "daemon-reload", &["daemon-reload"])?;
        Ok(())
    }
}
