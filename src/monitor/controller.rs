use log::info;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::session::SessionView;

use super::{
    loop_worker::{monitor_loop, LoopContext},
    status::{MonitorStatus, SharedStatus},
    MonitorDeps, MonitorSettings,
};

struct Running {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Starts and stops the monitor loop task.
pub struct MonitorController {
    deps: MonitorDeps,
    settings: MonitorSettings,
    status: SharedStatus,
    running: Option<Running>,
}

impl MonitorController {
    pub fn new(deps: MonitorDeps, settings: MonitorSettings) -> Self {
        let status = MonitorStatus::shared(settings.encouragement_interval);
        Self {
            deps,
            settings,
            status,
            running: None,
        }
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|running| !running.handle.is_finished())
            .unwrap_or(false)
    }

    /// No-op while a loop is already running.
    pub fn start(&mut self, view_rx: watch::Receiver<SessionView>) {
        if self.is_running() {
            return;
        }

        let cancel_token = CancellationToken::new();
        let ctx = LoopContext {
            deps: self.deps.clone(),
            settings: self.settings.clone(),
            status: self.status.clone(),
        };

        let handle = tokio::spawn(monitor_loop(ctx, view_rx, cancel_token.clone()));
        info!(
            "Monitor started (every {:?}, {} frame(s) per analysis)",
            self.settings.capture_interval, self.settings.batch_size
        );

        self.running = Some(Running {
            handle,
            cancel_token,
        });
    }

    /// Signals the loop to stop without waiting for it. A tick already in
    /// flight may finish; it re-checks the mode before speaking.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel_token.cancel();
            info!("Monitor stop requested");
        }
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel_token.cancel();
            running.handle.abort();
        }
    }
}
