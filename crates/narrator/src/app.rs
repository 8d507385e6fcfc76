//! Explicit wiring of the pipeline's shared state.

use std::sync::Arc;

use log::info;

use crate::ai::{
    EngineSlot, HotSwapGuard, HttpSpeechSynthesizer, HttpTextGenerator, ModelRegistry,
    SpeechSynthesizer, TextGenerator,
};
use crate::broadcast::{StatusBroadcaster, TrackedJobs};
use crate::config::schema::{default_index, Config};
use crate::db::{default_database_path, Database};
use crate::error::{ConfigError, Result};
use crate::pipeline::{EventService, Pipeline};
use crate::prompts::PromptResolver;
use crate::storage::{FileSystemSink, JobStore, ObjectSink, SqliteJobStore};
use crate::worker::processor::{Processor, ProcessorHandle};
use crate::worker::queue::JobQueue;

/// Engines of both kinds with the index of each kind's default.
pub struct EngineSet {
    pub text_generators: Vec<Arc<dyn TextGenerator>>,
    pub default_text_generator: usize,
    pub speech_synthesizers: Vec<Arc<dyn SpeechSynthesizer>>,
    pub default_speech_synthesizer: usize,
}

impl EngineSet {
    /// HTTP engines for every configured endpoint.
    pub fn from_config(config: &Config) -> Self {
        let engines = &config.engines;
        Self {
            text_generators: engines
                .text_generators
                .iter()
                .map(|c| Arc::new(HttpTextGenerator::new(c.clone())) as Arc<dyn TextGenerator>)
                .collect(),
            default_text_generator: default_index(&engines.text_generators, |c| c.default)
                .unwrap_or(0),
            speech_synthesizers: engines
                .speech_synthesizers
                .iter()
                .map(|c| {
                    Arc::new(HttpSpeechSynthesizer::new(c.clone())) as Arc<dyn SpeechSynthesizer>
                })
                .collect(),
            default_speech_synthesizer: default_index(&engines.speech_synthesizers, |c| c.default)
                .unwrap_or(0),
        }
    }
}

/// Everything the processor and the request handlers share.
///
/// Built once at startup and handed out by reference; there is no global.
pub struct Narrator {
    events: Arc<EventService>,
    models: Arc<ModelRegistry>,
    pipeline: Arc<Pipeline>,
    queue: Arc<JobQueue>,
}

impl Narrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        sink: Arc<dyn ObjectSink>,
        prompts: PromptResolver,
        engines: EngineSet,
    ) -> Result<Self> {
        let queue = Arc::new(JobQueue::new());
        let status = StatusBroadcaster::new();
        let tracked = Arc::new(TrackedJobs::new());
        let prompts = Arc::new(prompts);

        let models = Arc::new(ModelRegistry::new(
            EngineSlot::new(
                "text generator",
                engines.text_generators,
                engines.default_text_generator,
            )?,
            EngineSlot::new(
                "speech synthesizer",
                engines.speech_synthesizers,
                engines.default_speech_synthesizer,
            )?,
            HotSwapGuard::new(Arc::clone(&queue)),
        ));

        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&models),
            Arc::clone(&prompts),
            Arc::clone(&store),
            sink,
            status.clone(),
            Arc::clone(&tracked),
        ));

        let events = Arc::new(EventService::new(
            store,
            prompts,
            Arc::clone(&queue),
            status,
            tracked,
        ));

        Ok(Self {
            events,
            models,
            pipeline,
            queue,
        })
    }

    /// Opens the database, builds the filesystem sink and the HTTP engines.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = match &config.database.path {
            Some(path) => path.clone(),
            None => default_database_path().ok_or_else(|| ConfigError::Validation {
                message: "database.path is not set and no data directory is available"
                    .to_string(),
            })?,
        };
        let db = Database::open(&db_path)?;
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(db));
        let sink: Arc<dyn ObjectSink> = Arc::new(FileSystemSink::new(
            &config.storage.directory,
            &config.storage.public_base_url,
        ));

        Self::new(
            store,
            sink,
            PromptResolver::from_config(&config.prompts),
            EngineSet::from_config(config),
        )
    }

    /// Loads the default engines and spawns the processor.
    pub async fn start(&self) -> Result<ProcessorHandle> {
        self.models.load_defaults().await?;
        info!(
            "Active models: text generator '{}', speech synthesizer '{}'",
            self.models.text_generators().current_name(),
            self.models.speech_synthesizers().current_name()
        );
        Ok(Processor::new(Arc::clone(&self.queue), Arc::clone(&self.pipeline)).spawn())
    }

    pub fn events(&self) -> &Arc<EventService> {
        &self.events
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }
}
