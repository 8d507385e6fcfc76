//! Named engines, the currently active one per kind, and safe hot-swapping.

use std::sync::{Arc, RwLock};

use log::{error, info, warn};

use super::engine::{Engine, SpeechSynthesizer, TextGenerator};
use crate::error::{NarratorError, Result};
use crate::worker::queue::{Admission, JobQueue};

/// Gate consulted before the active engine changes.
///
/// `acquire` takes the queue's admission lock, the same one producers hold
/// while enqueueing, and only succeeds when nothing is queued or in flight.
/// While the returned permit lives no job can be enqueued, so the swap lands
/// on a job boundary.
#[derive(Clone)]
pub struct HotSwapGuard {
    queue: Arc<JobQueue>,
}

impl HotSwapGuard {
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }

    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub async fn acquire(&self) -> Result<Admission<'_>> {
        let admission = self.queue.admit().await;
        if !self.queue.is_empty() {
            return Err(NarratorError::EngineUnavailable(format!(
                "cannot switch models while {} job(s) are queued",
                self.queue.len()
            )));
        }
        if let Some(job_id) = self.queue.in_flight() {
            return Err(NarratorError::EngineUnavailable(format!(
                "cannot switch models while job {} is processing",
                job_id
            )));
        }
        Ok(admission)
    }
}

/// Engines of one kind in registration order, plus which one is current.
pub struct EngineSlot<E: Engine + ?Sized> {
    kind: &'static str,
    engines: Vec<Arc<E>>,
    current: RwLock<usize>,
}

impl<E: Engine + ?Sized> EngineSlot<E> {
    /// `default_index` selects the initial current engine.
    pub fn new(kind: &'static str, engines: Vec<Arc<E>>, default_index: usize) -> Result<Self> {
        if engines.is_empty() {
            return Err(NarratorError::Validation(format!("no {} configured", kind)));
        }
        if default_index >= engines.len() {
            return Err(NarratorError::Validation(format!(
                "default {} index {} out of range",
                kind, default_index
            )));
        }
        Ok(Self {
            kind,
            engines,
            current: RwLock::new(default_index),
        })
    }

    fn current_index(&self) -> usize {
        match self.current.read() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_current(&self, index: usize) {
        match self.current.write() {
            Ok(mut g) => *g = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Snapshot of the active engine. Later switches do not affect it.
    pub fn current(&self) -> Arc<E> {
        Arc::clone(&self.engines[self.current_index()])
    }

    pub fn current_name(&self) -> String {
        self.current().name().to_string()
    }

    /// Engine names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.engines.iter().position(|e| e.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<E>> {
        self.position(name).map(|i| Arc::clone(&self.engines[i]))
    }

    /// Loads the current engine.
    pub async fn load_current(&self) -> Result<()> {
        let engine = self.current();
        engine.load().await.map_err(|e| {
            NarratorError::EngineUnavailable(format!(
                "failed to load {} '{}': {}",
                self.kind,
                engine.name(),
                e
            ))
        })
    }

    /// Makes `name` the current engine.
    ///
    /// Unknown names fail before the guard is consulted. The old engine is
    /// unloaded before the new one loads; if the new one fails to load the
    /// old one is reloaded and stays current.
    pub async fn switch(&self, name: &str, guard: &HotSwapGuard) -> Result<String> {
        let target = self
            .position(name)
            .ok_or_else(|| NarratorError::not_found(self.kind, name))?;

        let _permit = match guard.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!("Refusing to switch {} to '{}': {}", self.kind, name, e);
                return Err(e);
            }
        };

        let previous_index = self.current_index();
        let next = Arc::clone(&self.engines[target]);

        if previous_index == target {
            if !next.is_loaded() {
                next.load().await?;
            }
            return Ok(next.name().to_string());
        }

        let previous = Arc::clone(&self.engines[previous_index]);
        info!(
            "Switching {} from '{}' to '{}'",
            self.kind,
            previous.name(),
            next.name()
        );

        previous.unload().await;
        if let Err(e) = next.load().await {
            error!("Failed to load {} '{}': {}", self.kind, next.name(), e);
            next.unload().await;
            if let Err(reload) = previous.load().await {
                error!(
                    "Failed to reload previous {} '{}': {}",
                    self.kind,
                    previous.name(),
                    reload
                );
            }
            return Err(NarratorError::EngineUnavailable(format!(
                "failed to load {} '{}': {}",
                self.kind, name, e
            )));
        }

        self.set_current(target);
        info!("Active {} is now '{}'", self.kind, next.name());
        Ok(next.name().to_string())
    }
}

/// Text generators, speech synthesizers and the guard protecting swaps.
pub struct ModelRegistry {
    text_generators: EngineSlot<dyn TextGenerator>,
    speech_synthesizers: EngineSlot<dyn SpeechSynthesizer>,
    guard: HotSwapGuard,
}

impl ModelRegistry {
    pub fn new(
        text_generators: EngineSlot<dyn TextGenerator>,
        speech_synthesizers: EngineSlot<dyn SpeechSynthesizer>,
        guard: HotSwapGuard,
    ) -> Self {
        Self {
            text_generators,
            speech_synthesizers,
            guard,
        }
    }

    /// Loads the default engine of each kind.
    pub async fn load_defaults(&self) -> Result<()> {
        self.text_generators.load_current().await?;
        self.speech_synthesizers.load_current().await?;
        Ok(())
    }

    pub fn guard(&self) -> &HotSwapGuard {
        &self.guard
    }

    pub fn text_generators(&self) -> &EngineSlot<dyn TextGenerator> {
        &self.text_generators
    }

    pub fn speech_synthesizers(&self) -> &EngineSlot<dyn SpeechSynthesizer> {
        &self.speech_synthesizers
    }

    pub fn text_generator(&self) -> Arc<dyn TextGenerator> {
        self.text_generators.current()
    }

    pub fn speech_synthesizer(&self) -> Arc<dyn SpeechSynthesizer> {
        self.speech_synthesizers.current()
    }

    pub async fn switch_text_generator(&self, name: &str) -> Result<String> {
        self.text_generators.switch(name, &self.guard).await
    }

    pub async fn switch_speech_synthesizer(&self, name: &str) -> Result<String> {
        self.speech_synthesizers.switch(name, &self.guard).await
    }

    /// Unloads every engine. Used on shutdown.
    pub async fn unload_all(&self) {
        for engine in &self.text_generators.engines {
            engine.unload().await;
        }
        for engine in &self.speech_synthesizers.engines {
            engine.unload().await;
        }
    }
}
