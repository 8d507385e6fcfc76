use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub prompts: PromptsConfig,
    pub engines: EnginesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared bearer token. `NARRATOR_AUTH_TOKEN` takes precedence.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Falls back to the platform data directory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_audio_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_audio_directory() -> PathBuf {
    PathBuf::from("./audio")
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8000/audio".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_audio_directory(),
            public_base_url: default_public_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    pub system_prompt: String,
    #[serde(default)]
    pub event_prompts: BTreeMap<String, EventPrompt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPrompt {
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginesConfig {
    #[serde(default)]
    pub text_generators: Vec<TextGeneratorConfig>,
    #[serde(default)]
    pub speech_synthesizers: Vec<SpeechSynthesizerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGeneratorConfig {
    /// Identity reported on jobs and used by switch requests.
    pub name: String,
    /// Base URL of an OpenAI-compatible server.
    pub endpoint: String,
    /// Model id sent upstream. Defaults to `name`.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub default: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSynthesizerConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_voice() -> String {
    "default".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl TextGeneratorConfig {
    pub fn upstream_model(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.name)
    }
}

impl SpeechSynthesizerConfig {
    pub fn upstream_model(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.name)
    }
}

/// Index of the engine flagged `default`, or the first one.
pub fn default_index<T>(engines: &[T], is_default: impl Fn(&T) -> bool) -> Option<usize> {
    engines
        .iter()
        .position(is_default)
        .or_else(|| (!engines.is_empty()).then_some(0))
}
