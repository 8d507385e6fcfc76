use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::pipeline::Pipeline;
use crate::worker::queue::JobQueue;

/// The single consumer of the job queue.
///
/// Jobs are handled strictly one at a time in dequeue order; the next job is
/// not dequeued until the previous one reached a terminal state.
pub struct Processor {
    queue: Arc<JobQueue>,
    pipeline: Arc<Pipeline>,
}

/// Running processor task. Dropping the handle also stops the processor
/// once its current job is done.
pub struct ProcessorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Processor {
    pub fn new(queue: Arc<JobQueue>, pipeline: Arc<Pipeline>) -> Self {
        Self { queue, pipeline }
    }

    pub fn spawn(self) -> ProcessorHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        info!("Processor started");
        ProcessorHandle { shutdown, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let (job, in_flight) = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = self.queue.pop() => next,
            };

            debug!("Picked up job {} ({} still queued)", job.id, self.queue.len());
            self.pipeline.run(job).await;
            drop(in_flight);

            if *shutdown.borrow() {
                break;
            }
        }
        debug!("Processor stopped");
    }
}

impl ProcessorHandle {
    /// Stops after the job in progress, if any, reaches a terminal state.
    /// Aborts the task if that takes longer than `grace`.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown.send(true);
        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => info!("Processor shut down"),
            Ok(Err(e)) => error!("Processor task failed: {}", e),
            Err(_) => {
                warn!(
                    "Processor did not stop within {:?}, aborting in-flight job",
                    grace
                );
                task.abort();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
