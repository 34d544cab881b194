//! Background generation executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, Semaphore};
use tracing::{error, info, Instrument};
use vhook_models::GenerationId;

use crate::logging::JobLogger;
use crate::pipeline::GenerationPipeline;

/// Runs generations as background tasks, at most
/// `max_concurrent_generations` at a time.
pub struct GenerationExecutor {
    pipeline: Arc<GenerationPipeline>,
    job_semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

/// Decrements the active count when a run ends, even by panic.
struct ActiveGuard {
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl GenerationExecutor {
    pub fn new(pipeline: Arc<GenerationPipeline>) -> Self {
        let max = pipeline.context().config.max_concurrent_generations.max(1);
        info!("Starting generation executor with {} max concurrent generations", max);

        Self {
            pipeline,
            job_semaphore: Arc::new(Semaphore::new(max)),
            active: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn pipeline(&self) -> &Arc<GenerationPipeline> {
        &self.pipeline
    }

    /// Generations submitted and not yet finished.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a generation in the background and return immediately.
    pub fn submit(&self, id: GenerationId) {
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            idle: Arc::clone(&self.idle),
        };

        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.job_semaphore);
        let span = JobLogger::new(&id, "generate").create_span();

        tokio::spawn(
            async move {
                let _guard = guard;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    error!("Executor closed before generation could start");
                    return;
                };
                if let Err(e) = pipeline.run(&id).await {
                    error!("Generation {} failed: {}", id, e);
                }
            }
            .instrument(span),
        );
    }

    /// Wait until every submitted generation has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
