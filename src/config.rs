use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use clap::Parser;

use crate::{
    analysis::{
        client::{DEFAULT_MAX_TOKENS, DEFAULT_OLLAMA_BASE_URL, DEFAULT_OPENAI_BASE_URL},
        prompts::DEFAULT_TASK,
        VisionSettings,
    },
    blocking::hosts::{DEFAULT_HOSTS_PATH, DEFAULT_REDIRECT_IP},
    capture::command::{DEFAULT_SCREEN_COMMAND, DEFAULT_WEBCAM_COMMAND, MONITOR_PLACEHOLDER},
    monitor::MonitorSettings,
    session::confirmation::DEFAULT_CONFIRMATION_PHRASE,
    speech::{elevenlabs::DEFAULT_VOICE_ID, SpeechSettings, TtsBackend, VoiceSelection},
};

/// Every flag can also come from the environment (or a `.env` file).
#[derive(Debug, Clone, Parser)]
#[command(name = "deepwork")]
#[command(about = "Blocks distractions and watches your screen during deep work sessions")]
#[command(version)]
pub struct Config {
    /// Address of the control web UI
    #[arg(long, env = "DEEPWORK_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Vision model; Ollama-style names run locally
    #[arg(long, env = "SCREENSHOT_MODEL", default_value = "gemma3:4b")]
    pub model: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_BASE_URL)]
    pub ollama_base_url: String,

    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// OpenAI image detail level (low, high, auto)
    #[arg(long, env = "IMAGE_DETAIL", default_value = "auto")]
    pub image_detail: String,

    #[arg(long, env = "CAPTURE_INTERVAL_SECONDS", default_value_t = 5.0)]
    pub capture_interval_secs: f64,

    #[arg(long, env = "CAPTURE_TIMEOUT_SECONDS", default_value_t = 30.0)]
    pub capture_timeout_secs: f64,

    #[arg(long, env = "CAPTURES_BEFORE_ANALYSIS", default_value_t = 3)]
    pub captures_before_analysis: usize,

    /// Minimum productive streak before encouragement is spoken
    #[arg(long, env = "GOOD_JOB_INTERVAL_MINUTES", default_value_t = 15.0)]
    pub good_job_interval_minutes: f64,

    /// Shell command writing a PNG screenshot of monitor `{monitor}` to `{output}`
    #[arg(long, env = "SCREEN_CAPTURE_COMMAND", default_value = DEFAULT_SCREEN_COMMAND)]
    pub screen_command: String,

    /// Number of monitors to capture, stacked as "Monitor 1..n"
    #[arg(long, env = "MONITOR_COUNT", default_value_t = 1)]
    pub monitors: usize,

    /// Shell command writing a webcam PNG to `{output}`; empty disables the webcam
    #[arg(long, env = "WEBCAM_CAPTURE_COMMAND", default_value = DEFAULT_WEBCAM_COMMAND)]
    pub webcam_command: String,

    #[arg(long, env = "WEBCAM_SCALE", default_value_t = 3.0)]
    pub webcam_scale: f32,

    /// system or elevenlabs
    #[arg(long, env = "TTS_BACKEND", default_value = "system")]
    pub tts_backend: TtsBackend,

    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub elevenlabs_api_key: Option<String>,

    #[arg(long, env = "ELEVENLABS_VOICE_ID", default_value = DEFAULT_VOICE_ID)]
    pub elevenlabs_voice_id: String,

    /// off, female, male or all
    #[arg(long, env = "ELEVENLABS_RANDOM_VOICE", default_value = "off")]
    pub elevenlabs_random_voice: VoiceSelection,

    /// Phrase required to turn protection off or take a break
    #[arg(
        long,
        env = "DEEPWORK_CONFIRMATION_PHRASE",
        default_value = DEFAULT_CONFIRMATION_PHRASE,
        hide_env_values = true
    )]
    pub confirmation_phrase: String,

    #[arg(long, env = "HOSTS_PATH", default_value = DEFAULT_HOSTS_PATH)]
    pub hosts_path: PathBuf,

    #[arg(long, env = "REDIRECT_IP", default_value = DEFAULT_REDIRECT_IP)]
    pub redirect_ip: String,

    /// JSON file with `websites` and `processes` lists
    #[arg(long, env = "BLOCKLIST_PATH")]
    pub blocklist: Option<PathBuf>,

    /// Skip flushing the DNS cache after hosts changes
    #[arg(long, env = "NO_DNS_FLUSH")]
    pub no_dns_flush: bool,

    #[arg(long, env = "SWEEP_INTERVAL_MS", default_value_t = 1000)]
    pub sweep_interval_ms: u64,

    /// Archive frames and analyses under this directory
    #[arg(long, env = "RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// What you intend to work on
    #[arg(long, env = "DEEPWORK_TASK", default_value = DEFAULT_TASK)]
    pub task: String,

    /// Start with protection ON instead of OFF
    #[arg(long, env = "DEEPWORK_START_ON")]
    pub start_on: bool,

    /// Read commands from stdin
    #[arg(long)]
    pub console: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        seconds(self.capture_interval_secs, "capture interval")?;
        seconds(self.capture_timeout_secs, "capture timeout")?;
        seconds(self.good_job_interval_minutes * 60.0, "encouragement interval")?;
        if self.captures_before_analysis == 0 {
            bail!("captures before analysis must be at least 1");
        }
        if self.monitors == 0 {
            bail!("monitor count must be at least 1");
        }
        if self.monitors > 1 && !self.screen_command.contains(MONITOR_PLACEHOLDER) {
            bail!(
                "screen command must contain {MONITOR_PLACEHOLDER} to capture {} monitors",
                self.monitors
            );
        }
        if self.sweep_interval_ms == 0 {
            bail!("sweep interval must be at least 1 ms");
        }
        if !self.webcam_scale.is_finite() || self.webcam_scale <= 0.0 {
            bail!("webcam scale must be positive (got {})", self.webcam_scale);
        }
        Ok(())
    }

    pub fn vision_settings(&self) -> VisionSettings {
        VisionSettings {
            model: self.model.clone(),
            openai_api_key: self
                .openai_api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            openai_base_url: self.openai_base_url.clone(),
            ollama_base_url: self.ollama_base_url.clone(),
            max_tokens: self.max_tokens,
            detail: self.image_detail.clone(),
        }
    }

    pub fn speech_settings(&self) -> SpeechSettings {
        SpeechSettings {
            backend: self.tts_backend,
            elevenlabs_api_key: self.elevenlabs_api_key.clone(),
            elevenlabs_voice_id: self.elevenlabs_voice_id.clone(),
            voice_selection: self.elevenlabs_random_voice,
        }
    }

    pub fn monitor_settings(&self) -> Result<MonitorSettings> {
        Ok(MonitorSettings {
            capture_interval: seconds(self.capture_interval_secs, "capture interval")?,
            capture_timeout: seconds(self.capture_timeout_secs, "capture timeout")?,
            batch_size: self.captures_before_analysis,
            encouragement_interval: seconds(
                self.good_job_interval_minutes * 60.0,
                "encouragement interval",
            )?,
        })
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn webcam_command(&self) -> Option<String> {
        let command = self.webcam_command.trim();
        (!command.is_empty()).then(|| command.to_string())
    }
}

fn seconds(value: f64, what: &str) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{what} must be a positive number (got {value})");
    }
    Ok(Duration::try_from_secs_f64(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["deepwork"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--bind",
            "0.0.0.0:8080",
            "--captures-before-analysis",
            "5",
            "--tts-backend",
            "elevenlabs",
            "--elevenlabs-random-voice",
            "male",
            "--webcam-command",
            "",
            "--console",
        ]);

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.captures_before_analysis, 5);
        assert_eq!(config.tts_backend, TtsBackend::ElevenLabs);
        assert_eq!(config.elevenlabs_random_voice, VoiceSelection::RandomMale);
        assert!(config.webcam_command().is_none());
        assert!(config.console);
    }

    #[test]
    fn monitor_settings_convert_units() {
        let config = parse(&[
            "--capture-interval-secs",
            "2.5",
            "--good-job-interval-minutes",
            "0.5",
        ]);
        let settings = config.monitor_settings().unwrap();
        assert_eq!(settings.capture_interval, Duration::from_millis(2500));
        assert_eq!(settings.encouragement_interval, Duration::from_secs(30));
    }

    #[test]
    fn rejects_nonsense_values() {
        assert!(parse(&["--capture-interval-secs", "0"]).validate().is_err());
        assert!(parse(&["--captures-before-analysis", "0"]).validate().is_err());
        assert!(parse(&["--webcam-scale=-1"]).validate().is_err());
        assert!(Config::try_parse_from(["deepwork", "--tts-backend", "robot"]).is_err());
        assert!(parse(&["--monitors", "0"]).validate().is_err());
    }

    #[test]
    fn several_monitors_need_the_monitor_placeholder() {
        let single = parse(&["--screen-command", "grab {output}", "--monitors", "2"]);
        assert!(single.validate().is_err());

        let per_monitor = parse(&[
            "--screen-command",
            "grab --display {monitor} {output}",
            "--monitors",
            "2",
        ]);
        assert!(per_monitor.validate().is_ok());
        assert_eq!(per_monitor.monitors, 2);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = parse(&["--openai-api-key", "  "]);
        assert!(config.vision_settings().openai_api_key.is_none());
    }
}
