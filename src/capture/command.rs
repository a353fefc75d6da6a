use std::{io, path::PathBuf, process::Stdio};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::{
    io::AsyncReadExt,
    process::{Child, Command},
};
use uuid::Uuid;

// Set to false to silence per-capture logging.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

use super::{
    compose::{stack_vertically, Part},
    Frame, FrameSource,
};

/// Replaced with the path the command must write its PNG to.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Replaced with the 1-based monitor number.
pub const MONITOR_PLACEHOLDER: &str = "{monitor}";

#[cfg(target_os = "macos")]
pub const DEFAULT_SCREEN_COMMAND: &str = "screencapture -x -D {monitor} -t png {output}";
#[cfg(target_os = "windows")]
pub const DEFAULT_SCREEN_COMMAND: &str =
    "ffmpeg -loglevel error -y -f gdigrab -i desktop -frames:v 1 {output}";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DEFAULT_SCREEN_COMMAND: &str = "import -window root {output}";

#[cfg(target_os = "macos")]
pub const DEFAULT_WEBCAM_COMMAND: &str = "imagesnap -q {output}";
#[cfg(target_os = "windows")]
pub const DEFAULT_WEBCAM_COMMAND: &str = "";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DEFAULT_WEBCAM_COMMAND: &str =
    "ffmpeg -loglevel error -y -f v4l2 -i /dev/video0 -frames:v 1 {output}";

/// Captures monitors and webcam by running external tools that write a PNG.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    screen_command: String,
    monitors: usize,
    webcam_command: Option<String>,
    webcam_scale: f32,
    scratch_dir: PathBuf,
}

impl CommandCapture {
    pub fn new(
        screen_command: String,
        monitors: usize,
        webcam_command: Option<String>,
        webcam_scale: f32,
    ) -> Self {
        Self {
            screen_command,
            monitors: monitors.max(1),
            webcam_command: webcam_command.filter(|cmd| !cmd.trim().is_empty()),
            webcam_scale,
            scratch_dir: std::env::temp_dir(),
        }
    }

    #[cfg(test)]
    fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }

    async fn grab(&self, label: &str, template: &str) -> Result<Vec<u8>> {
        let slug = label.to_ascii_lowercase().replace(' ', "-");
        let output = self
            .scratch_dir
            .join(format!("deepwork-{slug}-{}.png", Uuid::new_v4()));
        run_capture_command(template, output)
            .await
            .with_context(|| format!("{label} capture failed"))
    }
}

#[async_trait]
impl FrameSource for CommandCapture {
    async fn capture(&self) -> Result<Frame> {
        let captured_at = Utc::now();
        let mut parts = Vec::with_capacity(self.monitors + 1);

        for monitor in 1..=self.monitors {
            let label = format!("Monitor {monitor}");
            let template = self
                .screen_command
                .replace(MONITOR_PLACEHOLDER, &monitor.to_string());
            parts.push(Part {
                png: self.grab(&label, &template).await?,
                label,
                scale: 1.0,
            });
        }

        if let Some(webcam) = &self.webcam_command {
            match self.grab("Webcam", webcam).await {
                Ok(png) => parts.push(Part {
                    label: "Webcam".into(),
                    png,
                    scale: self.webcam_scale,
                }),
                Err(err) => log_warn!("webcam capture skipped: {err:#}"),
            }
        }

        let labels = parts.iter().map(|part| part.label.clone()).collect();
        let png = tokio::task::spawn_blocking(move || stack_vertically(&parts))
            .await
            .context("compose worker join failed")??;
        log_debug!("composed frame: {} bytes", png.len());

        Ok(Frame {
            png,
            captured_at,
            labels,
        })
    }
}

/// A running capture command. Until it has been waited on, dropping it kills
/// the command's whole process group; the output file is always removed.
struct CaptureJob {
    child: Child,
    output: PathBuf,
    reaped: bool,
}

impl Drop for CaptureJob {
    fn drop(&mut self) {
        if !self.reaped {
            if let Some(pid) = self.child.id() {
                log_warn!("capture command (pid {pid}) abandoned, killing it");
                kill_tree(pid);
            }
        }
        if let Err(err) = std::fs::remove_file(&self.output) {
            if err.kind() != io::ErrorKind::NotFound {
                log_warn!("failed to remove {}: {err}", self.output.display());
            }
        }
    }
}

async fn run_capture_command(template: &str, output: PathBuf) -> Result<Vec<u8>> {
    if !template.contains(OUTPUT_PLACEHOLDER) {
        bail!("capture command must contain {OUTPUT_PLACEHOLDER}: {template}");
    }
    let command_line = template.replace(
        OUTPUT_PLACEHOLDER,
        &format!("\"{}\"", output.display()),
    );

    let child = shell(&command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn `{command_line}`"))?;
    let mut job = CaptureJob {
        child,
        output,
        reaped: false,
    };

    let mut stderr_pipe = job.child.stderr.take();
    let read_stderr = async {
        let mut text = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut text).await;
        }
        text
    };
    let (status, stderr) = tokio::join!(job.child.wait(), read_stderr);
    let status = status.with_context(|| format!("failed to wait for `{command_line}`"))?;
    job.reaped = true;

    if !status.success() {
        bail!("`{command_line}` exited with {status}: {}", stderr.trim());
    }

    let bytes = tokio::fs::read(&job.output)
        .await
        .with_context(|| format!("capture command wrote no file at {}", job.output.display()))?;
    if bytes.is_empty() {
        bail!("capture command produced an empty image");
    }
    Ok(bytes)
}

#[cfg(target_os = "windows")]
fn shell(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command_line]);
    cmd
}

/// Runs in a fresh process group so a timeout can take down the whole pipeline.
#[cfg(not(target_os = "windows"))]
fn shell(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command_line]).process_group(0);
    cmd
}

#[cfg(unix)]
fn kill_tree(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid targets the group the
    // child leads.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        log_debug!(
            "kill of process group {pgid} failed: {}",
            io::Error::last_os_error()
        );
    }
}

#[cfg(windows)]
fn kill_tree(pid: u32) {
    let result = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .output();
    if let Err(err) = result {
        log_debug!("taskkill for pid {pid} failed: {err}");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{fs, path::Path, time::Duration};

    use super::*;
    use crate::capture::compose::{solid_png, SEPARATOR_HEIGHT};

    /// Writes a fixture PNG and returns a command that copies it to `{output}`.
    fn copy_command(dir: &Path, name: &str, png: Vec<u8>) -> String {
        let source = dir.join(name);
        fs::write(&source, png).unwrap();
        format!("cp \"{}\" {OUTPUT_PLACEHOLDER}", source.display())
    }

    #[tokio::test]
    async fn composes_every_monitor_and_webcam() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("screen1.png"), solid_png(120, 60, 200)).unwrap();
        fs::write(dir.path().join("screen2.png"), solid_png(80, 40, 120)).unwrap();
        let screens = format!(
            "cp \"{}/screen{MONITOR_PLACEHOLDER}.png\" {OUTPUT_PLACEHOLDER}",
            dir.path().display()
        );
        let webcam = copy_command(dir.path(), "webcam.png", solid_png(20, 10, 20));

        let frame = CommandCapture::new(screens, 2, Some(webcam), 2.0)
            .capture()
            .await
            .unwrap();

        assert_eq!(frame.labels, vec!["Monitor 1", "Monitor 2", "Webcam"]);
        let img = image::load_from_memory(&frame.png).unwrap();
        assert_eq!(img.width(), 120);
        assert_eq!(img.height(), 60 + 40 + 20 + 3 * SEPARATOR_HEIGHT);
    }

    #[tokio::test]
    async fn failing_webcam_still_yields_screen_frame() {
        let dir = tempfile::tempdir().unwrap();
        let screen = copy_command(dir.path(), "screen.png", solid_png(50, 50, 90));

        let frame = CommandCapture::new(screen, 1, Some("false {output}".into()), 3.0)
            .capture()
            .await
            .unwrap();

        assert_eq!(frame.labels, vec!["Monitor 1"]);
    }

    #[tokio::test]
    async fn failing_monitor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let first = copy_command(dir.path(), "screen1.png", solid_png(50, 50, 90));
        // monitor 2 has no fixture, so cp fails
        let template = first.replace("screen1", "screen{monitor}");

        let err = CommandCapture::new(template, 2, None, 1.0)
            .capture()
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Monitor 2 capture failed"));
    }

    #[tokio::test]
    async fn command_without_placeholder_is_rejected() {
        let capture = CommandCapture::new("true".into(), 1, None, 1.0);
        let err = capture.capture().await.unwrap_err();
        assert!(format!("{err:#}").contains(OUTPUT_PLACEHOLDER));
    }

    #[tokio::test]
    async fn abandoned_capture_kills_the_command_and_cleans_up() {
        let fixtures = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let marker = fixtures.path().join("finished");
        let screen = copy_command(fixtures.path(), "screen.png", solid_png(10, 10, 1));
        let slow = format!("sleep 1; touch \"{}\"; {screen}", marker.display());
        let capture =
            CommandCapture::new(slow, 1, None, 1.0).with_scratch_dir(scratch.path().to_path_buf());

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_millis(100), capture.capture()).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(900));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "command kept running after being dropped");
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn finished_capture_leaves_no_scratch_files() {
        let fixtures = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let screen = copy_command(fixtures.path(), "screen.png", solid_png(10, 10, 1));

        CommandCapture::new(screen, 1, None, 1.0)
            .with_scratch_dir(scratch.path().to_path_buf())
            .capture()
            .await
            .unwrap();

        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
