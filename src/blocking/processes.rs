use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

// The sweep runs every second; keep it quiet unless something was killed.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Terminates running processes whose executable name is on the blocklist.
pub struct ProcessKiller {
    system: System,
    targets: Vec<String>,
    own_pid: u32,
    sweep_count: u64,
}

impl ProcessKiller {
    pub fn new(names: &[String]) -> Self {
        Self {
            system: System::new(),
            targets: names.iter().map(|name| normalize(name)).collect(),
            own_pid: std::process::id(),
            sweep_count: 0,
        }
    }

    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }

    /// One pass over the process table. Returns how many kill signals were sent.
    pub fn sweep(&mut self) -> usize {
        self.sweep_count += 1;
        if self.targets.is_empty() {
            return 0;
        }

        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());

        let mut killed = 0;
        for (pid, process) in self.system.processes() {
            if pid.as_u32() == self.own_pid {
                continue;
            }

            let name = process.name().to_string_lossy();
            if !matches_target(&name, &self.targets) {
                continue;
            }

            if process.kill() {
                log_info!("[sweep] terminated {} (pid {})", name, pid.as_u32());
                killed += 1;
            } else {
                log_warn!("[sweep] could not terminate {} (pid {})", name, pid.as_u32());
            }
        }

        if self.sweep_count % 60 == 1 {
            log_debug!(
                "[sweep] pass #{}: {} process(es) scanned",
                self.sweep_count,
                self.system.processes().len()
            );
        }

        killed
    }
}

fn normalize(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

/// `targets` must already be normalized.
pub fn matches_target(process_name: &str, targets: &[String]) -> bool {
    let name = normalize(process_name);
    !name.is_empty() && targets.iter().any(|target| *target == name)
}
