use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    thread,
};

use log::{debug, info, warn};

use crate::error::DeepWorkError;

pub const DEFAULT_MARKER: &str = "# BLOCKED_BY_DEEPWORK";
pub const DEFAULT_REDIRECT_IP: &str = "127.0.0.1";

/// Appended to the marker of the first entry when a line ending had to be
/// inserted before the block, so removal can take it back out.
const EOL_ADDED_TAG: &str = "+eol";

#[cfg(target_os = "windows")]
pub const DEFAULT_HOSTS_PATH: &str = r"C:\Windows\System32\drivers\etc\hosts";
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_HOSTS_PATH: &str = "/etc/hosts";

/// Editor for the OS hosts file. Every line it writes carries `marker`, and
/// only marked lines are ever removed.
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
    redirect_ip: String,
    marker: String,
    flush_dns: bool,
}

impl HostsFile {
    pub fn new(path: PathBuf, redirect_ip: impl Into<String>) -> Self {
        Self {
            path,
            redirect_ip: redirect_ip.into(),
            marker: DEFAULT_MARKER.to_string(),
            flush_dns: true,
        }
    }

    pub fn with_dns_flush(mut self, enabled: bool) -> Self {
        self.flush_dns = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes block entries for `sites`, replacing any earlier ones.
    /// Returns whether the file changed.
    pub fn block(&self, sites: &[String]) -> Result<bool, DeepWorkError> {
        let current = self.read()?;
        let updated = apply_block(&current, sites, &self.redirect_ip, &self.marker);
        if updated == current {
            debug!("hosts file already blocks {} site(s)", sites.len());
            return Ok(false);
        }

        self.write(&updated)?;
        info!("Blocked {} site(s) in {}", sites.len(), self.path.display());
        self.flush();
        Ok(true)
    }

    /// Removes every marked line. Returns whether anything was removed.
    pub fn unblock(&self) -> Result<bool, DeepWorkError> {
        let current = self.read()?;
        if !current.contains(&self.marker) {
            return Ok(false);
        }

        let restored = strip_block(&current, &self.marker);
        self.write(&restored)?;
        info!("Removed blocked sites from {}", self.path.display());
        self.flush();
        Ok(true)
    }

    fn read(&self) -> Result<String, DeepWorkError> {
        fs::read_to_string(&self.path)
            .map_err(|err| DeepWorkError::from_hosts_io(self.path.clone(), err))
    }

    fn write(&self, contents: &str) -> Result<(), DeepWorkError> {
        fs::write(&self.path, contents)
            .map_err(|err| DeepWorkError::from_hosts_io(self.path.clone(), err))
    }

    fn flush(&self) {
        if !self.flush_dns {
            return;
        }

        let spawned = thread::Builder::new()
            .name("dns-flush".into())
            .spawn(flush_dns_cache);
        if let Err(err) = spawned {
            warn!("Failed to spawn DNS flush thread: {err}");
        }
    }
}

/// Returns `content` with marked lines replaced by one entry per site.
pub fn apply_block(content: &str, sites: &[String], redirect_ip: &str, marker: &str) -> String {
    let mut out = strip_block(content, marker);
    if sites.is_empty() {
        return out;
    }

    let eol = if out.contains("\r\n") { "\r\n" } else { "\n" };
    let needs_eol = !out.is_empty() && !out.ends_with('\n');
    if needs_eol {
        out.push_str(eol);
    }

    for (index, site) in sites.iter().enumerate() {
        let tag = if index == 0 && needs_eol {
            format!("{marker} {EOL_ADDED_TAG}")
        } else {
            marker.to_string()
        };
        out.push_str(&format!("{redirect_ip}\t{site}\t\t{tag}{eol}"));
    }

    out
}

/// Drops every line containing `marker`, undoing the line ending that
/// [`apply_block`] may have inserted.
pub fn strip_block(content: &str, marker: &str) -> String {
    let tagged = format!("{marker} {EOL_ADDED_TAG}");
    let mut eol_added = false;
    let mut out = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        if line.contains(marker) {
            if line.trim_end().ends_with(&tagged) {
                eol_added = true;
            }
            continue;
        }
        out.push_str(line);
    }

    if eol_added {
        if out.ends_with("\r\n") {
            out.truncate(out.len() - 2);
        } else if out.ends_with('\n') {
            out.truncate(out.len() - 1);
        }
    }

    out
}

fn flush_dns_cache() {
    let commands: &[&[&str]] = if cfg!(target_os = "windows") {
        &[&["ipconfig", "/flushdns"]]
    } else if cfg!(target_os = "macos") {
        &[&["dscacheutil", "-flushcache"], &["killall", "-HUP", "mDNSResponder"]]
    } else {
        &[&["resolvectl", "flush-caches"]]
    };

    for command in commands {
        let (program, args) = (command[0], &command[1..]);
        match Command::new(program).args(args).output() {
            Ok(output) if output.status.success() => debug!("DNS cache flushed via {program}"),
            Ok(output) => warn!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(err) => warn!("Could not run {program} to flush DNS cache: {err}"),
        }
    }
}
