use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use tracing::{info_span, Instrument};

use crate::ai::ModelRegistry;
use crate::broadcast::{StatusBroadcaster, TrackedJobs};
use crate::prompts::PromptResolver;
use crate::storage::{JobStore, ObjectSink};
use crate::worker::job::JobRecord;

use super::error::{StageError, StageOutcome};

/// Drives one dequeued job from `Pending` to a terminal state.
///
/// Every transition is persisted, then published, then reflected in the
/// tracked-job registry. Persistence failures are logged and never change the
/// job's outcome.
pub struct Pipeline {
    models: Arc<ModelRegistry>,
    prompts: Arc<PromptResolver>,
    store: Arc<dyn JobStore>,
    sink: Arc<dyn ObjectSink>,
    status: StatusBroadcaster,
    tracked: Arc<TrackedJobs>,
}

impl Pipeline {
    pub fn new(
        models: Arc<ModelRegistry>,
        prompts: Arc<PromptResolver>,
        store: Arc<dyn JobStore>,
        sink: Arc<dyn ObjectSink>,
        status: StatusBroadcaster,
        tracked: Arc<TrackedJobs>,
    ) -> Self {
        Self {
            models,
            prompts,
            store,
            sink,
            status,
            tracked,
        }
    }

    /// Runs the job to completion and returns its terminal snapshot.
    pub async fn run(&self, job: JobRecord) -> JobRecord {
        let span = info_span!("job", job_id = %job.id, event_id = %job.event_id);
        self.run_job(job).instrument(span).await
    }

    async fn run_job(&self, mut job: JobRecord) -> JobRecord {
        if let Err(e) = job.start_processing() {
            // Only pending jobs are ever enqueued.
            error!("Dropping job {}: {}", job.id, e);
            self.tracked.remove(&job.id);
            return job;
        }
        info!("Processing job {}", job.id);

        job.touch();
        self.persist(&job).await;
        self.status.send(&job);
        self.tracked.refresh(&job);

        let started = Instant::now();
        let outcome = self.execute(&mut job).await;

        let transition = match outcome {
            Ok(()) => job.complete(),
            Err(e) => {
                warn!("Job {} failed during {}: {}", job.id, e.stage(), e);
                job.fail(e.to_string())
            }
        };
        if let Err(e) = transition {
            error!("Job {} could not reach a terminal state: {}", job.id, e);
        }

        self.finish(&mut job).await;
        info!(
            "Job {} {} in {:.2}s",
            job.id,
            job.status,
            started.elapsed().as_secs_f64()
        );
        job
    }

    async fn execute(&self, job: &mut JobRecord) -> StageOutcome<()> {
        let answer = self
            .generate(job)
            .instrument(info_span!("generation"))
            .await?;
        self.synthesize_and_upload(job, &answer)
            .instrument(info_span!("synthesis"))
            .await
    }

    async fn generate(&self, job: &mut JobRecord) -> StageOutcome<String> {
        let generator = self.models.text_generator();
        job.begin_generation(generator.name());

        let started = Instant::now();
        let generation = generator
            .generate(self.prompts.system_prompt(), &job.input_text)
            .await
            .map_err(|source| StageError::Generation {
                model: generator.name().to_string(),
                source,
            })?;

        job.finish_generation(generation.answer.clone())?;
        info!(
            "Generated {} chars with {} in {}ms",
            generation.answer.len(),
            generator.name(),
            started.elapsed().as_millis()
        );
        Ok(generation.answer)
    }

    async fn synthesize_and_upload(&self, job: &mut JobRecord, text: &str) -> StageOutcome<()> {
        let synthesizer = self.models.speech_synthesizer();
        job.begin_synthesis(synthesizer.name());

        let started = Instant::now();
        let speech = synthesizer
            .synthesize(text)
            .await
            .map_err(|source| StageError::Synthesis {
                model: synthesizer.name().to_string(),
                source,
            })?;
        info!(
            "Synthesized {:.2}s of audio with {} in {}ms",
            speech.duration_seconds,
            synthesizer.name(),
            started.elapsed().as_millis()
        );

        let audio_url = self
            .upload(speech.artifact)
            .instrument(info_span!("upload"))
            .await?;

        job.finish_synthesis(audio_url, speech.duration_seconds)?;
        Ok(())
    }

    async fn upload(&self, artifact: std::path::PathBuf) -> StageOutcome<String> {
        let sink = Arc::clone(&self.sink);
        let path = artifact.clone();
        let result = tokio::task::spawn_blocking(move || sink.upload(&path))
            .await
            .map_err(|e| StageError::Interrupted(e.to_string()))
            .and_then(|r| r.map_err(StageError::from));

        match result {
            Ok(url) => {
                info!("Uploaded audio to {}", url);
                Ok(url)
            }
            Err(e) => {
                discard_artifact(&artifact).await;
                Err(e)
            }
        }
    }

    /// Terminal step: persist, publish, then stop tracking.
    async fn finish(&self, job: &mut JobRecord) {
        job.touch();
        self.persist(job).await;
        self.status.send(job);
        self.tracked.remove(&job.id);
    }

    async fn persist(&self, job: &JobRecord) {
        let store = Arc::clone(&self.store);
        let snapshot = job.clone();
        match tokio::task::spawn_blocking(move || store.update_by_id(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to persist job {} ({}): {}", job.id, job.status, e),
            Err(e) => error!("Persist task for job {} did not finish: {}", job.id, e),
        }
    }
}

/// Removes a synthesized artifact the sink did not take.
async fn discard_artifact(artifact: &std::path::Path) {
    match tokio::fs::remove_file(artifact).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to discard artifact {}: {}", artifact.display(), e),
    }
}
