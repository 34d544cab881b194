//! Clip worker pool.
//!
//! Every clip gets its own task; an admission semaphore keeps at most
//! `max_inflight_clips` of them talking to the generator at once. A failing
//! clip is marked failed and never cancels its siblings.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn, Instrument};
use vhook_media::write_file_atomic;
use vhook_models::{Clip, ClipId, ClipStatus, SourceImage};
use vhook_video_client::SubmitOutcome;

use super::PipelineContext;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::poller::JobPoller;

/// Terminal result of one clip task.
#[derive(Debug, Clone)]
pub struct ClipOutcome {
    pub clip_id: ClipId,
    pub sequence_index: u32,
    pub status: ClipStatus,
}

/// Drive every clip to `completed` or `failed` and wait for all of them.
pub(crate) async fn run_clip_batch(
    ctx: Arc<PipelineContext>,
    image: Arc<SourceImage>,
    clips: Vec<Clip>,
) -> Vec<ClipOutcome> {
    let gate = Arc::new(Semaphore::new(ctx.config.max_inflight_clips.max(1)));

    let mut keys = Vec::with_capacity(clips.len());
    let mut handles = Vec::with_capacity(clips.len());
    for clip in clips {
        keys.push((clip.id.clone(), clip.sequence_index));

        let span = info_span!(
            "clip",
            clip_id = %clip.id,
            sequence_index = clip.sequence_index
        );
        let ctx = Arc::clone(&ctx);
        let image = Arc::clone(&image);
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(
            async move { run_clip(&ctx, &gate, &image, &clip).await }.instrument(span),
        ));
    }

    let mut outcomes = Vec::with_capacity(keys.len());
    for (joined, (clip_id, sequence_index)) in join_all(handles).await.into_iter().zip(keys) {
        let status = match joined {
            Ok(status) => status,
            Err(e) => {
                error!(clip_id = %clip_id, "Clip task panicked: {}", e);
                mark_failed(&ctx, &clip_id).await;
                ClipStatus::Failed
            }
        };
        outcomes.push(ClipOutcome {
            clip_id,
            sequence_index,
            status,
        });
    }
    outcomes
}

async fn run_clip(ctx: &PipelineContext, gate: &Arc<Semaphore>, image: &SourceImage, clip: &Clip) -> ClipStatus {
    let _permit = match Arc::clone(gate).acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            mark_failed(ctx, &clip.id).await;
            return ClipStatus::Failed;
        }
    };

    let started = Instant::now();
    let placeholder = ctx.video.is_none();
    let status = match generate_clip(ctx, image, clip).await {
        Ok(()) => {
            info!("Clip completed in {:.1}s", started.elapsed().as_secs_f64());
            ClipStatus::Completed
        }
        Err(e) => {
            warn!("Clip failed: {}", e);
            mark_failed(ctx, &clip.id).await;
            ClipStatus::Failed
        }
    };

    metrics::record_clip(status, started.elapsed().as_secs_f64(), placeholder);
    status
}

async fn generate_clip(ctx: &PipelineContext, image: &SourceImage, clip: &Clip) -> WorkerResult<()> {
    ctx.clips.mark_generating(&clip.id).await?;
    let output = ctx.clip_path(clip);

    let remote_url = match &ctx.video {
        None => {
            let label = format!("Clip {}", clip.id.short());
            ctx.media
                .render_placeholder(&output, &label, ctx.config.clip_duration_secs)
                .await?;
            None
        }
        Some(video) => {
            let result_url = match video.submit(&clip.prompt, image).await? {
                SubmitOutcome::Ready { result_url } => result_url,
                SubmitOutcome::Queued { job_id } => {
                    ctx.clips.set_remote_job(&clip.id, &job_id).await?;
                    info!(job_id = %job_id, "Submitted clip job");
                    JobPoller::from_config(&ctx.config)
                        .run(video.as_ref(), &job_id)
                        .await?
                }
            };

            let bytes = video.download(&result_url).await?;
            if bytes.is_empty() {
                return Err(WorkerError::RemoteJobFailed(format!(
                    "empty download from {}",
                    result_url
                )));
            }
            write_file_atomic(&output, &bytes).await?;
            Some(result_url)
        }
    };

    ctx.clips
        .mark_completed(&clip.id, &output.to_string_lossy(), remote_url.as_deref())
        .await?;
    Ok(())
}

async fn mark_failed(ctx: &PipelineContext, id: &ClipId) {
    if let Err(e) = ctx.clips.mark_failed(id).await {
        warn!(clip_id = %id, "Could not mark clip failed: {}", e);
    }
}
