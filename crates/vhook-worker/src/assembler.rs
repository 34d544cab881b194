//! Final video assembly.
//!
//! Concatenates the completed clips in sequence order, normalizes loudness,
//! applies the color grade and publishes the result. Concatenation failures
//! are fatal; the two finishing stages fall back to copying their input.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::fs;
use vhook_media::{copy_file, move_file, remove_files, write_concat_list, MediaResult};
use vhook_models::{ClipStatus, Generation, GenerationId, GenerationStatus};

use crate::error::{WorkerError, WorkerResult};
use crate::images::VIDEOS_ROUTE;
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::PipelineContext;

/// What an assembly call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyOutcome {
    /// This call produced the final video.
    Completed { final_video: String },
    /// The generation was already completed; nothing was done.
    AlreadyCompleted { final_video: String },
    /// Another call is assembling this generation right now.
    InProgress,
}

/// Assembles generations that passed the completion gate.
pub struct Assembler {
    ctx: Arc<PipelineContext>,
    in_flight: Arc<Mutex<HashSet<GenerationId>>>,
}

/// Removes its generation from the in-flight set on drop.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<GenerationId>>>,
    id: GenerationId,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<GenerationId>>>, id: &GenerationId) -> Option<Self> {
        let mut ids = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.insert(id.clone()).then(|| Self {
            set: Arc::clone(set),
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.id);
    }
}

/// Working files of one assembly, all inside the clips directory.
struct Intermediates {
    list: PathBuf,
    concat: PathBuf,
    normalized: PathBuf,
    graded: PathBuf,
}

impl Intermediates {
    fn new(clips_dir: &Path, id: &GenerationId) -> Self {
        Self {
            list: clips_dir.join(format!("{id}_concat.txt")),
            concat: clips_dir.join(format!("{id}_concat.mp4")),
            normalized: clips_dir.join(format!("{id}_normalized.mp4")),
            graded: clips_dir.join(format!("{id}_graded.mp4")),
        }
    }

    fn paths(&self) -> [&Path; 4] {
        [&self.list, &self.concat, &self.normalized, &self.graded]
    }
}

impl Assembler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Assemble a generation in `assembling`.
    ///
    /// Calling this on a completed generation is a no-op; any status other
    /// than `assembling` or `completed` is rejected without changes.
    pub async fn assemble(&self, id: &GenerationId) -> WorkerResult<AssemblyOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, id) else {
            return Ok(AssemblyOutcome::InProgress);
        };

        let logger = JobLogger::new(id, "assemble");
        let generation = self.ctx.generations.require(id).await?;
        match generation.status {
            GenerationStatus::Completed => {
                logger.log_progress("already completed, skipping");
                return Ok(AssemblyOutcome::AlreadyCompleted {
                    final_video: generation.final_video.unwrap_or_default(),
                });
            }
            GenerationStatus::Assembling => {}
            other => {
                return Err(WorkerError::invalid_state(format!(
                    "cannot assemble generation {} in status {}",
                    id, other
                )));
            }
        }

        logger.log_start(&format!("{} clips", generation.script.scenes.len()));
        let started = Instant::now();

        match self.assemble_generation(&generation, &logger).await {
            Ok(final_video) => {
                metrics::record_assembly(started.elapsed().as_secs_f64());
                logger.log_completion(&final_video);
                Ok(AssemblyOutcome::Completed { final_video })
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                if let Err(store_err) = self
                    .ctx
                    .generations
                    .transition(id, GenerationStatus::Assembling, GenerationStatus::Failed)
                    .await
                {
                    logger.log_warning(&format!("could not mark generation failed: {}", store_err));
                }
                Err(e)
            }
        }
    }

    async fn assemble_generation(&self, generation: &Generation, logger: &JobLogger) -> WorkerResult<String> {
        let id = &generation.id;
        let clips = self.ctx.clips.list_for_generation(id).await?;
        let expected = generation.script.scenes.len();

        let clip_paths = clips
            .iter()
            .filter(|c| c.status == ClipStatus::Completed)
            .map(|c| {
                c.local_path.as_ref().map(PathBuf::from).ok_or_else(|| {
                    WorkerError::assembly_failed(format!("clip {} has no local file", c.id))
                })
            })
            .collect::<WorkerResult<Vec<_>>>()?;
        if clip_paths.len() != expected {
            return Err(WorkerError::assembly_failed(format!(
                "expected {} completed clips, found {}",
                expected,
                clip_paths.len()
            )));
        }

        let config = &self.ctx.config;
        fs::create_dir_all(&config.clips_dir).await?;
        fs::create_dir_all(&config.output_dir).await?;

        let files = Intermediates::new(&config.clips_dir, id);
        let result = self.render(&clip_paths, &files, id, logger).await;

        let removed = remove_files(&files.paths()).await;
        logger.log_progress(&format!("removed {} intermediate files", removed));

        let final_video = result?;
        if !self.ctx.generations.complete(id, &final_video).await? {
            return Err(WorkerError::invalid_state(format!(
                "generation {} left assembling during assembly",
                id
            )));
        }

        let removed = remove_files(&clip_paths).await;
        logger.log_progress(&format!("removed {} of {} clip files", removed, clip_paths.len()));
        Ok(final_video)
    }

    /// Produce the published video and return its reference.
    async fn render(
        &self,
        clip_paths: &[PathBuf],
        files: &Intermediates,
        id: &GenerationId,
        logger: &JobLogger,
    ) -> WorkerResult<String> {
        let media = &self.ctx.media;

        write_concat_list(clip_paths, &files.list).await?;
        media
            .concat(&files.list, &files.concat)
            .await
            .map_err(|e| WorkerError::assembly_failed(format!("concat failed: {}", e)))?;
        logger.log_progress(&format!("concatenated {} clips", clip_paths.len()));

        let loudnorm = media.normalize_loudness(&files.concat, &files.normalized).await;
        finish_stage("loudnorm", loudnorm, &files.concat, &files.normalized, logger).await?;

        let grade = media.color_grade(&files.normalized, &files.graded).await;
        finish_stage("color_grade", grade, &files.normalized, &files.graded, logger).await?;

        let file_name = format!("{id}_final.mp4");
        move_file(&files.graded, self.ctx.config.output_dir.join(&file_name)).await?;
        Ok(format!("{VIDEOS_ROUTE}{file_name}"))
    }
}

/// Accept a finishing stage's output, or copy its input through on failure.
async fn finish_stage(
    stage: &'static str,
    result: MediaResult<()>,
    input: &Path,
    output: &Path,
    logger: &JobLogger,
) -> WorkerResult<()> {
    if let Err(e) = result {
        logger.log_warning(&format!("{} failed, using unprocessed audio/video: {}", stage, e));
        metrics::record_assembly_fallback(stage);
        copy_file(input, output).await?;
    }
    Ok(())
}
