//! Engines backed by OpenAI-compatible inference servers.

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::engine::{
    Engine, EngineError, Generation, SpeechOutput, SpeechSynthesizer, TextGenerator,
};
use crate::config::schema::{SpeechSynthesizerConfig, TextGeneratorConfig};

/// Error bodies are truncated before they reach logs and job records.
const MAX_ERROR_BODY_LENGTH: usize = 200;

static RE_THINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((idx, _)) => format!("{}... (truncated)", &body[..idx]),
        None => body.to_string(),
    }
}

/// Client slot shared by both HTTP engines. `Some` means loaded.
struct ClientSlot {
    name: String,
    timeout: Duration,
    client: RwLock<Option<Client>>,
}

impl ClientSlot {
    fn new(name: &str, timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            timeout: Duration::from_secs(timeout_secs),
            client: RwLock::new(None),
        }
    }

    fn get(&self) -> Result<Client, EngineError> {
        let guard = match self.client.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .clone()
            .ok_or_else(|| EngineError::NotLoaded(self.name.clone()))
    }

    fn is_loaded(&self) -> bool {
        self.get().is_ok()
    }

    fn load(&self) -> Result<(), EngineError> {
        let mut guard = match self.client.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_some() {
            return Ok(());
        }

        info!("Loading model: {}", self.name);
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| EngineError::Transport {
                engine: self.name.clone(),
                reason: e.to_string(),
            })?;
        *guard = Some(client);
        info!("Model loaded: {}", self.name);
        Ok(())
    }

    fn unload(&self) {
        let mut guard = match self.client.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            info!("Model unloaded: {}", self.name);
        }
    }

    fn transport(&self, err: reqwest::Error) -> EngineError {
        EngineError::Transport {
            engine: self.name.clone(),
            reason: err.to_string(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> EngineError {
        EngineError::InvalidResponse {
            engine: self.name.clone(),
            reason: reason.into(),
        }
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, EngineError> {
        let client = self.get()?;
        let response = client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Transport {
                engine: self.name.clone(),
                reason: format!("HTTP {}: {}", status, truncate_body(&body)),
            });
        }
        Ok(response)
    }
}

fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

// ─── Text generation ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnswerEnvelope {
    answer: String,
}

/// Drops reasoning blocks, then unwraps a `{"answer": ...}` envelope if the
/// model produced one.
pub fn extract_answer(content: &str) -> String {
    let visible = RE_THINK.replace_all(content, "");
    let trimmed = visible.trim();
    match serde_json::from_str::<AnswerEnvelope>(trimmed) {
        Ok(envelope) => envelope.answer.trim().to_string(),
        Err(_) => trimmed.to_string(),
    }
}

pub struct HttpTextGenerator {
    config: TextGeneratorConfig,
    slot: ClientSlot,
}

impl HttpTextGenerator {
    pub fn new(config: TextGeneratorConfig) -> Self {
        let slot = ClientSlot::new(&config.name, config.timeout_secs);
        Self { config, slot }
    }
}

#[async_trait]
impl Engine for HttpTextGenerator {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_loaded(&self) -> bool {
        self.slot.is_loaded()
    }

    async fn load(&self) -> Result<(), EngineError> {
        self.slot.load()
    }

    async fn unload(&self) {
        self.slot.unload()
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> Result<Generation, EngineError> {
        let request = ChatRequest {
            model: self.config.upstream_model(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_input,
                },
            ],
        };

        let url = endpoint_url(&self.config.endpoint, "/v1/chat/completions");
        debug!("POST {} ({} chars of input)", url, user_input.len());
        let response: ChatResponse = self
            .slot
            .post_json(&url, &request)
            .await?
            .json()
            .await
            .map_err(|e| self.slot.invalid(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.slot.invalid("no choices in completion"))?;

        let answer = extract_answer(&content);
        if answer.is_empty() {
            return Err(self.slot.invalid("empty answer"));
        }
        Ok(Generation { answer })
    }
}

// ─── Speech synthesis ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

/// Playback length of a PCM WAV file, from its `fmt ` byte rate and the
/// size of its `data` chunk.
pub fn wav_duration(bytes: &[u8]) -> Result<f64, String> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err("not a RIFF/WAVE file".to_string());
    }

    let read_u32 = |at: usize| -> Option<u32> {
        bytes
            .get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    };

    let mut byte_rate: Option<u32> = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = read_u32(offset + 4).ok_or("truncated chunk header")? as usize;
        let body = offset + 8;

        match id {
            b"fmt " => {
                byte_rate = Some(read_u32(body + 8).ok_or("truncated fmt chunk")?);
            }
            b"data" => {
                let rate = byte_rate.ok_or("data chunk before fmt chunk")?;
                if rate == 0 {
                    return Err("zero byte rate".to_string());
                }
                // Streamed WAVs often carry a placeholder size.
                let available = bytes.len() - body;
                let data_len = if size == 0 || size > available {
                    available
                } else {
                    size
                };
                return Ok(data_len as f64 / rate as f64);
            }
            _ => {}
        }

        offset = body.saturating_add(size).saturating_add(size % 2);
    }

    Err("no data chunk".to_string())
}

pub struct HttpSpeechSynthesizer {
    config: SpeechSynthesizerConfig,
    slot: ClientSlot,
    output_dir: PathBuf,
}

impl HttpSpeechSynthesizer {
    /// Audio is written to the system temp directory until uploaded.
    pub fn new(config: SpeechSynthesizerConfig) -> Self {
        Self::with_output_dir(config, std::env::temp_dir())
    }

    pub fn with_output_dir(config: SpeechSynthesizerConfig, output_dir: impl AsRef<Path>) -> Self {
        let slot = ClientSlot::new(&config.name, config.timeout_secs);
        Self {
            config,
            slot,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Engine for HttpSpeechSynthesizer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_loaded(&self) -> bool {
        self.slot.is_loaded()
    }

    async fn load(&self) -> Result<(), EngineError> {
        self.slot.load()
    }

    async fn unload(&self) {
        self.slot.unload()
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SpeechOutput, EngineError> {
        let request = SpeechRequest {
            model: self.config.upstream_model(),
            input: text,
            voice: &self.config.voice,
            response_format: "wav",
        };

        let url = endpoint_url(&self.config.endpoint, "/v1/audio/speech");
        debug!("POST {} ({} chars of text)", url, text.len());
        let audio = self
            .slot
            .post_json(&url, &request)
            .await?
            .bytes()
            .await
            .map_err(|e| self.slot.transport(e))?;

        let duration_seconds = wav_duration(&audio).map_err(|reason| self.slot.invalid(reason))?;

        let artifact = self
            .output_dir
            .join(format!("tts_output_{}.wav", uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&artifact, &audio).await {
            warn!("Failed to write {}: {}", artifact.display(), e);
            return Err(EngineError::Io(e));
        }

        Ok(SpeechOutput {
            artifact,
            duration_seconds,
        })
    }
}
