use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde_json::json;

const API_BASE: &str = "https://api.elevenlabs.io/v1";
const MODEL_ID: &str = "eleven_multilingual_v2";
const OUTPUT_FORMAT: &str = "mp3_44100_128";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";

const FEMALE_VOICES: &[&str] = &[
    "EXAVITQu4vr4xnSDxMaL",
    "XB0fDUnXU5powFXDhCwa",
    "cgSgspJ2msm6clMCkdW9",
    "21m00Tcm4TlvDq8ikWAM",
    "AZnzlk1XvdvUeBnXmlld",
];

const MALE_VOICES: &[&str] = &[
    "pNInz6obpgDQGcFmaJgB",
    "onwK4e9ZLuTAKqWW03F9",
    "ErXwobaYiN019PkySvjV",
    "TxGEqnHWrfWFTfGW9XjX",
    "VR6AewLTigWG4xSOukaG",
];

/// How the voice is chosen for each utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSelection {
    Fixed,
    RandomFemale,
    RandomMale,
    RandomAny,
}

impl FromStr for VoiceSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "off" => Ok(VoiceSelection::Fixed),
            "female" => Ok(VoiceSelection::RandomFemale),
            "male" => Ok(VoiceSelection::RandomMale),
            "all" => Ok(VoiceSelection::RandomAny),
            other => Err(format!("unknown voice selection '{other}' (off|female|male|all)")),
        }
    }
}

pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    voice_id: String,
    selection: VoiceSelection,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, voice_id: String, selection: VoiceSelection) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            voice_id,
            selection,
        })
    }

    pub fn pick_voice(&self) -> &str {
        pick_voice(self.selection, &self.voice_id)
    }

    /// Synthesizes `text` and returns MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{API_BASE}/text-to-speech/{}?output_format={OUTPUT_FORMAT}",
            self.pick_voice()
        );
        let body = json!({
            "text": text,
            "model_id": MODEL_ID,
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("ElevenLabs request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("ElevenLabs API error {}: {}", status, error_text));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

fn pick_voice(selection: VoiceSelection, fixed: &str) -> &str {
    let mut rng = rand::thread_rng();
    let pool: Vec<&'static str> = match selection {
        VoiceSelection::Fixed => return fixed,
        VoiceSelection::RandomFemale => FEMALE_VOICES.to_vec(),
        VoiceSelection::RandomMale => MALE_VOICES.to_vec(),
        VoiceSelection::RandomAny => FEMALE_VOICES.iter().chain(MALE_VOICES).copied().collect(),
    };
    pool.choose(&mut rng).copied().unwrap_or(fixed)
}
