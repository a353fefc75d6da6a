use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Off,
    On,
    Break,
}

impl Default for SessionMode {
    fn default() -> Self {
        SessionMode::Off
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::Off => "off",
            SessionMode::On => "on",
            SessionMode::Break => "break",
        };
        f.write_str(name)
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(SessionMode::Off),
            "on" => Ok(SessionMode::On),
            "break" => Ok(SessionMode::Break),
            other => Err(format!("unknown mode '{other}' (on|off|break)")),
        }
    }
}

/// A running break. `anchor` is monotonic and drives the countdown;
/// `started_at` is for display.
#[derive(Debug, Clone)]
pub struct BreakSchedule {
    pub started_at: DateTime<Utc>,
    pub anchor: Instant,
    pub duration: Duration,
}

impl BreakSchedule {
    pub fn starting_now(duration: Duration) -> Self {
        Self {
            started_at: Utc::now(),
            anchor: Instant::now(),
            duration,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration
            .saturating_sub(now.saturating_duration_since(self.anchor))
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.duration)
            .ok()
            .and_then(|duration| self.started_at.checked_add_signed(duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// What the monitor loop needs to know about the session. Published on a
/// watch channel so the loop never touches the session lock.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub mode: SessionMode,
    pub session_id: Option<String>,
    pub task: String,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub mode: SessionMode,
    pub task: String,
    /// Fresh for every entry into ON.
    pub session_id: Option<String>,
    pub break_schedule: Option<BreakSchedule>,
    /// Bumped on every transition; a break timer only acts if it still matches.
    pub generation: u64,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new(task: String) -> Self {
        Self {
            mode: SessionMode::Off,
            task,
            session_id: None,
            break_schedule: None,
            generation: 0,
            last_error: None,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            mode: self.mode,
            session_id: self.session_id.clone(),
            task: self.task.clone(),
        }
    }

    pub fn enter_on(&mut self) {
        if self.mode != SessionMode::On {
            self.session_id = Some(Uuid::new_v4().to_string());
        }
        self.mode = SessionMode::On;
        self.break_schedule = None;
        self.last_error = None;
        self.generation += 1;
    }

    pub fn enter_off(&mut self) {
        self.mode = SessionMode::Off;
        self.break_schedule = None;
        self.generation += 1;
    }

    pub fn enter_break(&mut self, schedule: BreakSchedule) {
        self.mode = SessionMode::Break;
        self.break_schedule = Some(schedule);
        self.generation += 1;
    }
}
