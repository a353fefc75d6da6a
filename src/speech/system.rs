use anyhow::{bail, Context, Result};
use tokio::process::Command;

/// Speaks through the operating system's own speech engine.
#[derive(Debug, Clone, Default)]
pub struct SystemVoice;

impl SystemVoice {
    pub async fn speak(&self, text: &str) -> Result<()> {
        let mut command = speech_command(text);
        let output = command
            .output()
            .await
            .context("failed to launch system speech command")?;

        if !output.status.success() {
            bail!(
                "system speech exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn speech_command(text: &str) -> Command {
    let mut cmd = Command::new("say");
    cmd.arg(text);
    cmd
}

#[cfg(target_os = "windows")]
fn speech_command(text: &str) -> Command {
    let escaped = text.replace('\'', "''");
    let script = format!(
        "Add-Type -AssemblyName System.Speech; \
         (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{escaped}')"
    );
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-Command", &script]);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn speech_command(text: &str) -> Command {
    let mut cmd = Command::new("espeak");
    cmd.arg(text);
    cmd
}
