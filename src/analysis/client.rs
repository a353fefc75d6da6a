use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

const LOCAL_MODEL_PREFIXES: &[&str] = &["gemma", "llama", "mistral", "phi", "qwen"];

/// A model that can look at a batch of PNG images and answer a prompt.
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    async fn describe(&self, prompt: &str, images: &[Vec<u8>]) -> Result<String>;
}

/// Ollama-style names (`gemma3:4b`) and known open-weight families run locally.
pub fn is_local_model(model: &str) -> bool {
    model.contains(':') || LOCAL_MODEL_PREFIXES.iter().any(|p| model.starts_with(p))
}

#[derive(Debug, Clone)]
pub struct VisionSettings {
    pub model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub ollama_base_url: String,
    pub max_tokens: u32,
    pub detail: String,
}

/// OpenAI Responses API for hosted models, OpenAI-compatible chat
/// completions (Ollama) for local ones.
pub struct OpenAiVision {
    client: Client,
    settings: VisionSettings,
}

impl OpenAiVision {
    pub fn new(settings: VisionSettings) -> Result<Self> {
        if !is_local_model(&settings.model) && settings.openai_api_key.is_none() {
            return Err(anyhow!(
                "OPENAI_API_KEY is required for model {}; set it or use a local model such as gemma3:4b",
                settings.model
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, settings })
    }

    pub fn is_local(&self) -> bool {
        is_local_model(&self.settings.model)
    }
}

#[async_trait]
impl VisionModel for OpenAiVision {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn describe(&self, prompt: &str, images: &[Vec<u8>]) -> Result<String> {
        let local = self.is_local();
        let (url, body) = if local {
            (
                format!("{}/chat/completions", self.settings.ollama_base_url.trim_end_matches('/')),
                chat_completions_body(&self.settings, prompt, images),
            )
        } else {
            (
                format!("{}/responses", self.settings.openai_base_url.trim_end_matches('/')),
                responses_body(&self.settings, prompt, images),
            )
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.settings.openai_api_key.as_deref().filter(|_| !local) {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("vision API error {}: {}", status, error_text));
        }

        let raw = response.json::<Value>().await?;
        if local {
            extract_chat_text(&raw)
        } else {
            extract_responses_text(&raw)
        }
    }
}

fn data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

pub fn chat_completions_body(settings: &VisionSettings, prompt: &str, images: &[Vec<u8>]) -> Value {
    let mut content = vec![json!({ "type": "text", "text": prompt })];
    content.extend(images.iter().map(|png| {
        json!({
            "type": "image_url",
            "image_url": { "url": data_url(png) },
        })
    }));

    json!({
        "model": settings.model,
        "messages": [{ "role": "user", "content": content }],
        "max_completion_tokens": settings.max_tokens,
    })
}

pub fn responses_body(settings: &VisionSettings, prompt: &str, images: &[Vec<u8>]) -> Value {
    let mut content = vec![json!({ "type": "input_text", "text": prompt })];
    content.extend(images.iter().map(|png| {
        json!({
            "type": "input_image",
            "image_url": data_url(png),
            "detail": settings.detail,
        })
    }));

    json!({
        "model": settings.model,
        "input": [{ "role": "user", "content": content }],
        "max_output_tokens": settings.max_tokens,
    })
}

pub fn extract_chat_text(raw: &Value) -> Result<String> {
    raw["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("No message content in chat completion response"))
}

pub fn extract_responses_text(raw: &Value) -> Result<String> {
    if let Some(text) = raw["output_text"].as_str() {
        return Ok(text.to_string());
    }

    let text: String = raw["output"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item["content"].as_array())
        .flatten()
        .filter(|part| part["type"] == "output_text")
        .filter_map(|part| part["text"].as_str())
        .collect();

    if text.is_empty() {
        return Err(anyhow!("No output text in Responses API reply"));
    }
    Ok(text)
}
