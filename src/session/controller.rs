use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    analysis::prompts::DEFAULT_TASK,
    blocking::BlockingGate,
    blocklist::Blocklist,
    error::DeepWorkError,
    monitor::{MonitorController, SharedStatus, VerdictRecord},
};

use super::{
    confirmation::ConfirmationGate,
    state::{BreakSchedule, SessionMode, SessionState, SessionView},
};

pub const DEFAULT_BREAK_MINUTES: f64 = 5.0;

/// A requested mode change, as sent by the web UI or the console.
#[derive(Debug, Clone, Deserialize)]
pub struct ModeRequest {
    pub mode: SessionMode,
    #[serde(default)]
    pub confirmation: Option<String>,
    #[serde(default)]
    pub minutes: Option<f64>,
    #[serde(default)]
    pub task: Option<String>,
}

impl ModeRequest {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            confirmation: None,
            minutes: None,
            task: None,
        }
    }

    pub fn with_confirmation(mut self, phrase: impl Into<String>) -> Self {
        self.confirmation = Some(phrase.into());
        self
    }

    pub fn with_minutes(mut self, minutes: f64) -> Self {
        self.minutes = Some(minutes);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub task: String,
    pub session_id: Option<String>,
    pub break_remaining_ms: Option<u64>,
    pub break_ends_at: Option<DateTime<Utc>>,
    pub last_verdict: Option<VerdictRecord>,
    pub frames_batched: usize,
    /// Only while ON.
    pub next_encouragement_ms: Option<u64>,
    pub last_error: Option<String>,
    pub monitor_error: Option<String>,
}

struct Core {
    state: SessionState,
    gate: BlockingGate,
    monitor: MonitorController,
    break_timer: Option<JoinHandle<()>>,
}

impl Core {
    fn cancel_break_timer(&mut self) {
        if let Some(handle) = self.break_timer.take() {
            handle.abort();
        }
    }
}

struct Inner {
    core: Mutex<Core>,
    confirmation: ConfirmationGate,
    view_tx: watch::Sender<SessionView>,
    monitor_status: SharedStatus,
}

/// Owns the session mode. Every transition holds the session lock from
/// validation to the last side effect, so concurrent requests serialize.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        gate: BlockingGate,
        monitor: MonitorController,
        confirmation: ConfirmationGate,
        task: &str,
    ) -> Self {
        let state = SessionState::new(normalize_task(task));
        let (view_tx, _) = watch::channel(state.view());
        let monitor_status = monitor.status();

        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(Core {
                    state,
                    gate,
                    monitor,
                    break_timer: None,
                }),
                confirmation,
                view_tx,
                monitor_status,
            }),
        }
    }

    pub async fn set_mode(&self, request: ModeRequest) -> Result<SessionSnapshot, DeepWorkError> {
        let mut core = self.inner.core.lock().await;

        match request.mode {
            SessionMode::On => self.inner.activate(&mut core)?,
            SessionMode::Off => self.leave(&mut core, request.confirmation.as_deref(), None)?,
            SessionMode::Break => {
                let duration = break_duration(request.minutes)?;
                self.leave(&mut core, request.confirmation.as_deref(), Some(duration))?;
            }
        }

        if let Some(task) = request.task {
            core.state.task = normalize_task(&task);
            self.inner.publish(&core);
        }

        Ok(self.inner.snapshot_of(&core).await)
    }

    pub async fn set_task(&self, task: &str) -> SessionSnapshot {
        let mut core = self.inner.core.lock().await;
        core.state.task = normalize_task(task);
        self.inner.publish(&core);
        info!("Task set to {:?}", core.state.task);
        self.inner.snapshot_of(&core).await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let core = self.inner.core.lock().await;
        self.inner.snapshot_of(&core).await
    }

    pub async fn blocklist(&self) -> Blocklist {
        self.inner.core.lock().await.gate.blocklist().clone()
    }

    /// Cancels the break timer, stops monitoring and lifts the block.
    pub async fn shutdown(&self) {
        let mut core = self.inner.core.lock().await;
        core.cancel_break_timer();
        core.monitor.stop();
        if let Err(err) = core.gate.disable() {
            error!("Failed to lift block on shutdown: {err}");
        }
        if core.state.mode != SessionMode::Off {
            core.state.enter_off();
        }
        self.inner.publish(&core);
        info!("Session shut down");
    }

    /// OFF or BREAK. Needs the phrase unless the session is already OFF.
    fn leave(
        &self,
        core: &mut Core,
        confirmation: Option<&str>,
        break_for: Option<Duration>,
    ) -> Result<(), DeepWorkError> {
        let from = core.state.mode;
        if from == SessionMode::Off && break_for.is_none() {
            return Ok(());
        }
        if from != SessionMode::Off {
            self.inner.confirmation.verify(confirmation)?;
        }

        if from == SessionMode::On {
            core.gate.disable()?;
            core.monitor.stop();
        }
        core.cancel_break_timer();

        match break_for {
            Some(duration) => {
                core.state.enter_break(BreakSchedule::starting_now(duration));
                core.break_timer = Some(spawn_break_timer(
                    Arc::downgrade(&self.inner),
                    core.state.generation,
                    duration,
                ));
                info!("Break started for {:?}", duration);
            }
            None => {
                core.state.enter_off();
                info!("Session OFF");
            }
        }

        self.inner.publish(core);
        Ok(())
    }
}

impl Inner {
    fn publish(&self, core: &Core) {
        self.view_tx.send_replace(core.state.view());
    }

    /// Enables the block, then switches to ON. On failure nothing changes.
    fn activate(&self, core: &mut Core) -> Result<(), DeepWorkError> {
        core.gate.enable()?;
        core.cancel_break_timer();
        core.state.enter_on();
        self.publish(core);
        core.monitor.start(self.view_tx.subscribe());
        info!("Session ON ({})", core.state.session_id.as_deref().unwrap_or("-"));
        Ok(())
    }

    async fn finish_break(&self, generation: u64) {
        let mut core = self.core.lock().await;
        if core.state.generation != generation || core.state.mode != SessionMode::Break {
            info!("Break timer superseded by a manual change");
            return;
        }

        // this task is the timer; drop the handle rather than abort ourselves
        core.break_timer = None;

        if let Err(err) = self.activate(&mut core) {
            error!("Could not re-enable blocking after break: {err}");
            core.state.enter_off();
            core.state.last_error = Some(err.to_string());
            self.publish(&core);
        } else {
            info!("Break over, blocking re-enabled");
        }
    }

    async fn snapshot_of(&self, core: &Core) -> SessionSnapshot {
        let status = self.monitor_status.lock().await;
        let now = Instant::now();
        let state = &core.state;

        SessionSnapshot {
            mode: state.mode,
            task: state.task.clone(),
            session_id: state.session_id.clone(),
            break_remaining_ms: state
                .break_schedule
                .as_ref()
                .map(|schedule| millis(schedule.remaining(now))),
            break_ends_at: state.break_schedule.as_ref().map(BreakSchedule::ends_at),
            last_verdict: status.last_verdict.clone(),
            frames_batched: status.frames_batched,
            next_encouragement_ms: (state.mode == SessionMode::On)
                .then(|| millis(status.until_encouragement(now))),
            last_error: state.last_error.clone(),
            monitor_error: status.last_error.clone(),
        }
    }
}

fn spawn_break_timer(inner: Weak<Inner>, generation: u64, duration: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        if let Some(inner) = inner.upgrade() {
            inner.finish_break(generation).await;
        }
    })
}

fn break_duration(minutes: Option<f64>) -> Result<Duration, DeepWorkError> {
    let minutes = minutes.unwrap_or(DEFAULT_BREAK_MINUTES);
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(DeepWorkError::InvalidBreakDuration(minutes));
    }
    Duration::try_from_secs_f64(minutes * 60.0)
        .map_err(|_| DeepWorkError::InvalidBreakDuration(minutes))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn normalize_task(task: &str) -> String {
    let task = task.trim();
    if task.is_empty() {
        DEFAULT_TASK.to_string()
    } else {
        task.to_string()
    }
}
