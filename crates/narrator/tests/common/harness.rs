//! A `Narrator` wired to fakes, plus helpers for observing it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use narrator::ai::{SpeechSynthesizer, TextGenerator};
use narrator::{
    EngineSet, EventService, GameEvent, JobRecord, JobStore, Narrator, ObjectSink,
    ProcessorHandle, PromptResolver, StatusSubscription,
};

use super::fakes::{FakeGenerator, FakeSynthesizer, MemoryStore, RecordingSink};

const WAIT: Duration = Duration::from_secs(5);

/// Isolated pipeline over two fake generators (`llm-a` default, `llm-b`),
/// two fake synthesizers (`tts-a` default, `tts-b`), an in-memory store and
/// a sink answering `https://x/y.wav`.
pub struct TestHarness {
    temp_dir: TempDir,
    pub narrator: Narrator,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub generators: Vec<Arc<FakeGenerator>>,
    pub synthesizers: Vec<Arc<FakeSynthesizer>>,
    processor: Option<ProcessorHandle>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = MemoryStore::new();
        let sink = RecordingSink::new("https://x/y.wav");

        let generators = vec![FakeGenerator::new("llm-a"), FakeGenerator::new("llm-b")];
        let synthesizers = vec![
            FakeSynthesizer::new("tts-a", temp_dir.path()),
            FakeSynthesizer::new("tts-b", temp_dir.path()),
        ];

        let mut templates = HashMap::new();
        templates.insert("Echo".to_string(), "{text}".to_string());
        templates.insert(
            "ChampionKill".to_string(),
            "{KillerName} just took down {VictimName}!".to_string(),
        );
        let prompts = PromptResolver::new("You are an excited esports caster.", templates);

        let engines = EngineSet {
            text_generators: generators
                .iter()
                .map(|g| Arc::clone(g) as Arc<dyn TextGenerator>)
                .collect(),
            default_text_generator: 0,
            speech_synthesizers: synthesizers
                .iter()
                .map(|s| Arc::clone(s) as Arc<dyn SpeechSynthesizer>)
                .collect(),
            default_speech_synthesizer: 0,
        };

        let narrator = Narrator::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::clone(&sink) as Arc<dyn ObjectSink>,
            prompts,
            engines,
        )
        .expect("Failed to build narrator");

        Self {
            temp_dir,
            narrator,
            store,
            sink,
            generators,
            synthesizers,
            processor: None,
        }
    }

    pub fn events(&self) -> &Arc<EventService> {
        self.narrator.events()
    }

    /// Records an `Echo` event whose prompt resolves to `text`.
    pub fn seed_event(&self, id: &str, text: &str) {
        self.seed_raw_event(id, "Echo", serde_json::json!({ "text": text }));
    }

    pub fn seed_raw_event(&self, id: &str, event_name: &str, data: serde_json::Value) {
        self.store.add_event(GameEvent {
            id: id.to_string(),
            game_session_id: "session-1".to_string(),
            external_event_id: 1,
            event_name: event_name.to_string(),
            event_data: data,
            created_at: Utc::now(),
        });
    }

    /// Seeds one `Echo` event per text and enqueues them as one batch.
    pub async fn enqueue(&self, texts: &[&str]) -> Vec<String> {
        let ids: Vec<String> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let id = format!("evt-{}-{}", i, uuid::Uuid::new_v4());
                self.seed_event(&id, text);
                id
            })
            .collect();
        self.events()
            .add_events(&ids)
            .await
            .expect("Failed to enqueue events")
    }

    /// Loads default engines and starts the processor.
    pub async fn start(&mut self) {
        let handle = self.narrator.start().await.expect("Failed to start narrator");
        self.processor = Some(handle);
    }

    /// Waits until nothing is queued or in flight.
    pub async fn wait_idle(&self) {
        tokio::time::timeout(WAIT, async {
            while !self.events().is_idle() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Pipeline did not become idle in time");
    }

    pub async fn stop(&mut self) {
        if let Some(handle) = self.processor.take() {
            handle.shutdown(WAIT).await;
        }
    }
}

/// Next snapshot on `sub`, failing the test after a few seconds.
pub async fn next_snapshot(sub: &StatusSubscription) -> JobRecord {
    tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("Timed out waiting for a status snapshot")
}

/// Every snapshot up to and including the `count`-th terminal one.
pub async fn collect_until_terminal(sub: &StatusSubscription, count: usize) -> Vec<JobRecord> {
    let mut seen = Vec::new();
    let mut terminal = 0;
    while terminal < count {
        let snapshot = next_snapshot(sub).await;
        if snapshot.is_finished() {
            terminal += 1;
        }
        seen.push(snapshot);
    }
    seen
}
