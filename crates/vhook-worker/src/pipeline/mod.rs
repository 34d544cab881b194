//! Generation pipeline: clip fan-out, completion gate, assembly.

mod clip;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use vhook_media::MediaTool;
use vhook_models::{build_clip_prompt, Clip, ClipStatus, Generation, GenerationId, GenerationStatus};
use vhook_store::{ClipRepository, Database, GenerationRepository};
use vhook_video_client::{VideoClientConfig, VideoGenerator, WanClient};

use crate::assembler::{Assembler, AssemblyOutcome};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::images::load_source_image;
use crate::logging::JobLogger;
use crate::metrics;

pub use clip::ClipOutcome;

/// Everything a pipeline run needs.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub generations: GenerationRepository,
    pub clips: ClipRepository,
    /// `None` when no video credential is configured; clips are then
    /// rendered as local placeholders.
    pub video: Option<Arc<dyn VideoGenerator>>,
    pub media: Arc<dyn MediaTool>,
}

impl PipelineContext {
    pub fn new(
        config: WorkerConfig,
        db: Database,
        video: Option<Arc<dyn VideoGenerator>>,
        media: Arc<dyn MediaTool>,
    ) -> Self {
        Self {
            config,
            generations: GenerationRepository::new(db.clone()),
            clips: ClipRepository::new(db),
            video,
            media,
        }
    }

    /// Where the rendered clip for `clip` is written.
    pub fn clip_path(&self, clip: &Clip) -> PathBuf {
        self.config.clips_dir.join(format!("{}.mp4", clip.id))
    }
}

/// Video adapter for `config`, or `None` when no credential is set and
/// clips should be rendered as placeholders.
pub fn video_generator(config: VideoClientConfig) -> WorkerResult<Option<Arc<dyn VideoGenerator>>> {
    if !config.is_configured() {
        return Ok(None);
    }
    let client: Arc<dyn VideoGenerator> = Arc::new(WanClient::new(config)?);
    Ok(Some(client))
}

/// Runs one generation from pending clips to a terminal status.
pub struct GenerationPipeline {
    ctx: Arc<PipelineContext>,
    assembler: Assembler,
}

impl GenerationPipeline {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        let assembler = Assembler::new(Arc::clone(&ctx));
        Self { ctx, assembler }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    /// Run a pending generation to completion or failure.
    ///
    /// Refuses generations that are not `pending`. Any error after the
    /// start transition leaves the generation `failed`.
    pub async fn run(&self, id: &GenerationId) -> WorkerResult<GenerationStatus> {
        let logger = JobLogger::new(id, "generate");
        let generation = self.ctx.generations.require(id).await?;

        if !self
            .ctx
            .generations
            .transition(id, GenerationStatus::Pending, GenerationStatus::Generating)
            .await?
        {
            return Err(WorkerError::invalid_state(format!(
                "generation {} is {}, expected pending",
                id, generation.status
            )));
        }

        logger.log_start(&format!(
            "{} scenes for '{}'",
            generation.script.scenes.len(),
            generation.script.product_name
        ));
        let started = Instant::now();

        let result = self.execute(&generation, &logger).await;
        let status = match &result {
            Ok(status) => *status,
            Err(e) => {
                logger.log_error(&e.to_string());
                self.mark_failed(id, &logger).await;
                GenerationStatus::Failed
            }
        };

        metrics::record_generation(status);
        logger.log_completion(&format!(
            "status {} after {:.1}s",
            status,
            started.elapsed().as_secs_f64()
        ));
        result
    }

    async fn execute(&self, generation: &Generation, logger: &JobLogger) -> WorkerResult<GenerationStatus> {
        let id = &generation.id;
        let image = load_source_image(&self.ctx.config.uploads_dir, &generation.source_image).await?;

        let scenes = generation.script.ordered_scenes();
        let shared = generation.script.shared_context();
        let clips: Vec<Clip> = scenes
            .iter()
            .enumerate()
            .map(|(i, scene)| {
                let prompt = build_clip_prompt(&shared, i as u32 + 1, scenes.len(), &scene.prompt);
                Clip::for_scene(id, scene, prompt)
            })
            .collect();

        self.ctx.clips.create_batch(&clips).await?;
        fs::create_dir_all(&self.ctx.config.clips_dir).await?;

        let total = clips.len();
        let outcomes = clip::run_clip_batch(Arc::clone(&self.ctx), Arc::new(image), clips).await;
        let failed = outcomes
            .iter()
            .filter(|o| o.status != ClipStatus::Completed)
            .count();
        logger.log_progress(&format!("{} of {} clips completed", total - failed, total));

        self.gate(id, total, logger).await
    }

    /// Completion gate: assemble only when every clip completed.
    async fn gate(&self, id: &GenerationId, total: usize, logger: &JobLogger) -> WorkerResult<GenerationStatus> {
        let completed = self.ctx.clips.count_with_status(id, ClipStatus::Completed).await? as usize;

        if completed != total {
            logger.log_warning(&format!(
                "{} of {} clips failed, not assembling",
                total - completed,
                total
            ));
            self.ctx
                .generations
                .update_status(id, GenerationStatus::Failed)
                .await?;
            return Ok(GenerationStatus::Failed);
        }

        if !self
            .ctx
            .generations
            .transition(id, GenerationStatus::Generating, GenerationStatus::Assembling)
            .await?
        {
            return Err(WorkerError::invalid_state(format!(
                "generation {} left generating before assembly",
                id
            )));
        }

        match self.assembler.assemble(id).await? {
            AssemblyOutcome::Completed { .. } | AssemblyOutcome::AlreadyCompleted { .. } => {
                Ok(GenerationStatus::Completed)
            }
            AssemblyOutcome::InProgress => Ok(GenerationStatus::Assembling),
        }
    }

    /// Best effort; a generation that already completed is left alone.
    async fn mark_failed(&self, id: &GenerationId, logger: &JobLogger) {
        for from in [GenerationStatus::Generating, GenerationStatus::Assembling] {
            match self
                .ctx
                .generations
                .transition(id, from, GenerationStatus::Failed)
                .await
            {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    logger.log_warning(&format!("could not mark generation failed: {}", e));
                    return;
                }
            }
        }
    }
}
