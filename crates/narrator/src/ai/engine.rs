//! Contracts for the text-generation and speech-synthesis engines.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model '{0}' must be loaded before generating")]
    NotLoaded(String),

    #[error("Request to '{engine}' failed: {reason}")]
    Transport { engine: String, reason: String },

    #[error("Invalid response from '{engine}': {reason}")]
    InvalidResponse { engine: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load/unload lifecycle shared by every engine.
///
/// Engines are shared behind `Arc`, so lifecycle calls take `&self`.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Stable identity, reported on jobs and used to select the engine.
    fn name(&self) -> &str;

    fn is_loaded(&self) -> bool;

    /// Idempotent.
    async fn load(&self) -> Result<(), EngineError>;

    /// Idempotent, and a no-op when never loaded.
    async fn unload(&self);
}

/// Text produced by a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub answer: String,
}

#[async_trait]
pub trait TextGenerator: Engine {
    async fn generate(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> Result<Generation, EngineError>;
}

/// A synthesized audio file on local disk, handed to the object sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOutput {
    pub artifact: PathBuf,
    pub duration_seconds: f64,
}

#[async_trait]
pub trait SpeechSynthesizer: Engine {
    async fn synthesize(&self, text: &str) -> Result<SpeechOutput, EngineError>;
}
