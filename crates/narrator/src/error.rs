use std::path::PathBuf;
use thiserror::Error;

use crate::ai::EngineError;
use crate::prompts::PromptError;
use crate::worker::job::JobError;

#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl NarratorError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<PromptError> for NarratorError {
    fn from(err: PromptError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<EngineError> for NarratorError {
    fn from(err: EngineError) -> Self {
        Self::EngineUnavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for NarratorError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("No config file found (set NARRATOR_CONFIG or create {0})")]
    NotFound(PathBuf),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact has no file name: {0}")]
    InvalidArtifact(PathBuf),

    #[error("No free file name for '{0}'")]
    FileExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, NarratorError>;
