use std::time::Duration;

use log::{info, warn};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{blocklist::Blocklist, error::DeepWorkError};

use super::{hosts::HostsFile, processes::ProcessKiller};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

struct Sweep {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Turns the OS-level block (hosts entries plus the process sweep) on and off.
pub struct BlockingGate {
    hosts: HostsFile,
    blocklist: Blocklist,
    sweep_interval: Duration,
    sweep: Option<Sweep>,
}

impl BlockingGate {
    pub fn new(hosts: HostsFile, blocklist: Blocklist, sweep_interval: Duration) -> Self {
        Self {
            hosts,
            blocklist,
            sweep_interval,
            sweep: None,
        }
    }

    pub fn blocklist(&self) -> &Blocklist {
        &self.blocklist
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweep.is_some()
    }

    /// Idempotent. A hosts write failure aborts before the sweep starts.
    /// Must be called from within a tokio runtime.
    pub fn enable(&mut self) -> Result<(), DeepWorkError> {
        self.hosts.block(&self.blocklist.websites)?;

        if self.sweep.is_none() {
            let killer = ProcessKiller::new(&self.blocklist.processes);
            if killer.has_targets() {
                self.sweep = Some(spawn_sweep(killer, self.sweep_interval));
                info!(
                    "Process sweep started for {} name(s)",
                    self.blocklist.processes.len()
                );
            }
        }

        Ok(())
    }

    /// Restores the hosts file, then stops the sweep. On failure the block
    /// stays fully in place.
    pub fn disable(&mut self) -> Result<(), DeepWorkError> {
        self.hosts.unblock()?;
        self.stop_sweep();
        Ok(())
    }

    /// Clears marked lines left behind by an earlier run that did not shut down cleanly.
    pub fn recover(&self) {
        match self.hosts.unblock() {
            Ok(true) => warn!("Removed stale block entries from {}", self.hosts.path().display()),
            Ok(false) => {}
            Err(err) => warn!("Could not check hosts file for stale entries: {err}"),
        }
    }

    fn stop_sweep(&mut self) {
        if let Some(sweep) = self.sweep.take() {
            sweep.cancel_token.cancel();
            sweep.handle.abort();
            info!("Process sweep stopped");
        }
    }
}

impl Drop for BlockingGate {
    fn drop(&mut self) {
        self.stop_sweep();
    }
}

fn spawn_sweep(mut killer: ProcessKiller, interval: Duration) -> Sweep {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    killer = match tokio::task::spawn_blocking(move || {
                        killer.sweep();
                        killer
                    })
                    .await
                    {
                        Ok(killer) => killer,
                        Err(err) => {
                            warn!("process sweep worker failed: {err}");
                            break;
                        }
                    };
                }
                _ = token.cancelled() => break,
            }
        }
    });

    Sweep {
        handle,
        cancel_token,
    }
}
