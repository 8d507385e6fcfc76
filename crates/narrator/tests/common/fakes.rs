//! In-process stand-ins for the engines, the job store and the object sink.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use narrator::ai::{
    Engine, EngineError, Generation, SpeechOutput, SpeechSynthesizer, TextGenerator,
};
use narrator::db::DatabaseError;
use narrator::{GameEvent, JobFilter, JobRecord, JobStore, NarratorError, ObjectSink, StorageError};

type Reply = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

// ─── Engines ────────────────────────────────────────────────────────────────

/// Load state and call accounting shared by both fake engines.
struct Lifecycle {
    name: String,
    loaded: AtomicBool,
    loads: AtomicUsize,
    unloads: AtomicUsize,
    fail_load: AtomicBool,
}

impl Lifecycle {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            loaded: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            fail_load: AtomicBool::new(false),
        }
    }

    fn load(&self) -> Result<(), EngineError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(EngineError::Transport {
                engine: self.name.clone(),
                reason: "connection refused".to_string(),
            });
        }
        if !self.loaded.swap(true, Ordering::SeqCst) {
            self.loads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn unload(&self) {
        if self.loaded.swap(false, Ordering::SeqCst) {
            self.unloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ensure_loaded(&self) -> Result<(), EngineError> {
        if self.loaded.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::NotLoaded(self.name.clone()))
        }
    }
}

/// Text generator whose answers come from a closure over the user input.
pub struct FakeGenerator {
    lifecycle: Lifecycle,
    reply: Mutex<Reply>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    inputs: Mutex<Vec<String>>,
    open: watch::Sender<bool>,
}

impl FakeGenerator {
    /// Answers `"echo: <input>"`.
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(name),
            reply: Mutex::new(Box::new(|input| Ok(format!("echo: {}", input)))),
            delay: Duration::from_millis(5),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            open: watch::Sender::new(true),
        })
    }

    /// Makes later generations wait inside the engine until `release`.
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub fn set_reply<F>(&self, reply: F)
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        *self.reply.lock().unwrap() = Box::new(reply);
    }

    pub fn fail_loading(&self, fail: bool) {
        self.lifecycle.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.lifecycle.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.lifecycle.unloads.load(Ordering::SeqCst)
    }

    /// Most generations that were ever running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Engine for FakeGenerator {
    fn name(&self) -> &str {
        &self.lifecycle.name
    }

    fn is_loaded(&self) -> bool {
        self.lifecycle.loaded.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Result<(), EngineError> {
        self.lifecycle.load()
    }

    async fn unload(&self) {
        self.lifecycle.unload()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(
        &self,
        _system_prompt: &str,
        user_input: &str,
    ) -> Result<Generation, EngineError> {
        self.lifecycle.ensure_loaded()?;
        self.inputs.lock().unwrap().push(user_input.to_string());

        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let result = {
            let reply = self.reply.lock().unwrap();
            (**reply)(user_input)
        };
        result
            .map(|answer| Generation { answer })
            .map_err(|reason| EngineError::InvalidResponse {
                engine: self.lifecycle.name.clone(),
                reason,
            })
    }
}

/// Speech synthesizer that writes a small placeholder file per call.
pub struct FakeSynthesizer {
    lifecycle: Lifecycle,
    output_dir: PathBuf,
    duration_seconds: Mutex<f64>,
    fail_with: Mutex<Option<String>>,
    texts: Mutex<Vec<String>>,
    artifacts: Mutex<Vec<PathBuf>>,
}

impl FakeSynthesizer {
    pub fn new(name: &str, output_dir: &Path) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(name),
            output_dir: output_dir.to_path_buf(),
            duration_seconds: Mutex::new(1.5),
            fail_with: Mutex::new(None),
            texts: Mutex::new(Vec::new()),
            artifacts: Mutex::new(Vec::new()),
        })
    }

    pub fn set_duration(&self, seconds: f64) {
        *self.duration_seconds.lock().unwrap() = seconds;
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        *self.fail_with.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn loads(&self) -> usize {
        self.lifecycle.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.lifecycle.unloads.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    /// Paths of every file this synthesizer wrote.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.artifacts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Engine for FakeSynthesizer {
    fn name(&self) -> &str {
        &self.lifecycle.name
    }

    fn is_loaded(&self) -> bool {
        self.lifecycle.loaded.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Result<(), EngineError> {
        self.lifecycle.load()
    }

    async fn unload(&self) {
        self.lifecycle.unload()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SpeechOutput, EngineError> {
        self.lifecycle.ensure_loaded()?;
        self.texts.lock().unwrap().push(text.to_string());

        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(EngineError::InvalidResponse {
                engine: self.lifecycle.name.clone(),
                reason,
            });
        }

        let artifact = self
            .output_dir
            .join(format!("tts_output_{}.wav", uuid::Uuid::new_v4()));
        tokio::fs::write(&artifact, b"RIFF").await?;
        self.artifacts.lock().unwrap().push(artifact.clone());
        Ok(SpeechOutput {
            artifact,
            duration_seconds: *self.duration_seconds.lock().unwrap(),
        })
    }
}

// ─── Store ──────────────────────────────────────────────────────────────────

/// Which store call produced a persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Insert,
    Update,
}

/// In-memory `JobStore` that keeps every snapshot it was handed.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<HashMap<String, GameEvent>>,
    jobs: Mutex<HashMap<String, JobRecord>>,
    log: Mutex<Vec<(StoreOp, JobRecord)>>,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_event(&self, event: GameEvent) {
        self.events.lock().unwrap().insert(event.id.clone(), event);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.lock().unwrap().get(job_id).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Every snapshot written for `job_id`, in write order.
    pub fn writes_for(&self, job_id: &str) -> Vec<(StoreOp, JobRecord)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, job)| job.id == job_id)
            .cloned()
            .collect()
    }
}

impl JobStore for MemoryStore {
    fn insert(&self, job: &JobRecord) -> narrator::Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(NarratorError::Validation(format!("duplicate job {}", job.id)));
        }
        jobs.insert(job.id.clone(), job.clone());
        self.log.lock().unwrap().push((StoreOp::Insert, job.clone()));
        Ok(())
    }

    fn update_by_id(&self, job: &JobRecord) -> narrator::Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(DatabaseError::LockPoisoned.into());
        }
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                self.log.lock().unwrap().push((StoreOp::Update, job.clone()));
                Ok(())
            }
            None => Err(NarratorError::not_found("job", &job.id)),
        }
    }

    fn fetch_event_by_id(&self, event_id: &str) -> narrator::Result<Option<GameEvent>> {
        Ok(self.events.lock().unwrap().get(event_id).cloned())
    }

    fn find_job(&self, job_id: &str) -> narrator::Result<Option<JobRecord>> {
        Ok(self.stored(job_id))
    }

    fn query_jobs(&self, filter: &JobFilter) -> narrator::Result<(Vec<JobRecord>, u64)> {
        let mut matching: Vec<JobRecord> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| {
                filter
                    .status
                    .as_deref()
                    .map_or(true, |s| job.status.as_str() == s)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.unwrap_or(100) as usize;
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

// ─── Sink ───────────────────────────────────────────────────────────────────

/// `ObjectSink` that records uploads and answers with a fixed URL.
pub struct RecordingSink {
    url: Mutex<String>,
    uploads: Mutex<Vec<PathBuf>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: Mutex::new(url.to_string()),
            uploads: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }
}

impl ObjectSink for RecordingSink {
    fn upload(&self, artifact: &Path) -> Result<String, StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFile {
                path: artifact.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "bucket unavailable"),
            });
        }
        self.uploads.lock().unwrap().push(artifact.to_path_buf());
        Ok(self.url.lock().unwrap().clone())
    }
}
