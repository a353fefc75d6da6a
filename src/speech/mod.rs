pub mod elevenlabs;
pub mod engine;
pub mod policy;
pub mod system;

use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};

use elevenlabs::ElevenLabsClient;
use engine::AudioPlayerHandle;
use system::SystemVoice;

pub use elevenlabs::VoiceSelection;
pub use policy::{EncouragementPolicy, Utterance};

/// Says things out loud. Resolves once the utterance has finished.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsBackend {
    System,
    ElevenLabs,
}

impl FromStr for TtsBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "system" | "pyttsx3" | "local" => Ok(TtsBackend::System),
            "elevenlabs" => Ok(TtsBackend::ElevenLabs),
            other => Err(format!("unknown TTS backend '{other}' (system|elevenlabs)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub backend: TtsBackend,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: String,
    pub voice_selection: VoiceSelection,
}

/// The configured TTS backend, falling back to the system voice whenever
/// ElevenLabs is unavailable.
pub struct SpeechService {
    cloud: Option<ElevenLabsClient>,
    player: AudioPlayerHandle,
    system: SystemVoice,
}

impl SpeechService {
    pub fn new(settings: &SpeechSettings) -> Result<Self> {
        let cloud = match (settings.backend, settings.elevenlabs_api_key.clone()) {
            (TtsBackend::ElevenLabs, Some(key)) if !key.trim().is_empty() => {
                Some(ElevenLabsClient::new(
                    key,
                    settings.elevenlabs_voice_id.clone(),
                    settings.voice_selection,
                )?)
            }
            (TtsBackend::ElevenLabs, _) => {
                warn!("ELEVENLABS_API_KEY not set, falling back to system voice");
                None
            }
            (TtsBackend::System, _) => None,
        };

        Ok(Self {
            cloud,
            player: AudioPlayerHandle::new(),
            system: SystemVoice,
        })
    }

    pub fn backend(&self) -> TtsBackend {
        if self.cloud.is_some() {
            TtsBackend::ElevenLabs
        } else {
            TtsBackend::System
        }
    }

    async fn speak_cloud(&self, client: &ElevenLabsClient, text: &str) -> Result<()> {
        let audio = client.synthesize(text).await?;
        self.player.play(audio).await
    }
}

#[async_trait]
impl Speaker for SpeechService {
    async fn speak(&self, text: &str) -> Result<()> {
        info!("[tts] {text}");

        if let Some(client) = &self.cloud {
            match self.speak_cloud(client, text).await {
                Ok(()) => return Ok(()),
                Err(err) => warn!("ElevenLabs TTS failed, using system voice: {err:#}"),
            }
        }

        self.system.speak(text).await
    }
}
