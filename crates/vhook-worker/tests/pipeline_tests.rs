//! End-to-end pipeline tests against in-memory fakes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;

use vhook_media::{MediaError, MediaResult, MediaTool};
use vhook_models::{
    ClipStatus, Generation, GenerationId, GenerationStatus, Scene, ShotScript, SourceImage, Tone,
};
use vhook_store::Database;
use vhook_video_client::{JobPoll, SubmitOutcome, VideoError, VideoGenerator, VideoResult};
use vhook_worker::images::{store_upload, upload_reference};
use vhook_worker::{
    AssemblyOutcome, GenerationExecutor, GenerationPipeline, PipelineContext, WorkerConfig,
    WorkerError,
};

/// Scenes whose prompt contains this never finish remotely.
const STUCK: &str = "STUCK";
/// Submission is rejected by the provider.
const REJECTED: &str = "REJECTED";
/// The remote task reports failure on its first poll.
const REMOTE_FAIL: &str = "REMOTE_FAIL";
/// The result URL cannot be fetched.
const BROKEN_DOWNLOAD: &str = "BROKEN_DOWNLOAD";
/// The result URL serves an empty body.
const EMPTY_DOWNLOAD: &str = "EMPTY_DOWNLOAD";
/// The clip task panics inside the generator.
const PANIC: &str = "PANIC";

#[derive(Default)]
struct FakeVideo {
    /// Return result URLs straight from submit instead of queueing.
    synchronous: bool,
    submit_delay: Duration,
    jobs: Mutex<HashMap<String, String>>,
    /// (start, end) of every clip's remote work
    spans: Mutex<Vec<(Instant, Instant)>>,
    starts: Mutex<HashMap<String, Instant>>,
}

impl FakeVideo {
    fn with_delay(delay: Duration) -> Self {
        Self {
            submit_delay: delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VideoGenerator for FakeVideo {
    async fn submit(&self, prompt: &str, _image: &SourceImage) -> VideoResult<SubmitOutcome> {
        let started = Instant::now();
        tokio::time::sleep(self.submit_delay).await;
        if prompt.contains(PANIC) {
            panic!("generator blew up");
        }
        if prompt.contains(REJECTED) {
            return Err(VideoError::Api {
                code: "InvalidParameter".to_string(),
                message: "prompt rejected".to_string(),
            });
        }

        let mut jobs = self.jobs.lock().unwrap();
        let job_id = format!("job-{}", jobs.len() + 1);
        jobs.insert(job_id.clone(), prompt.to_string());
        self.starts.lock().unwrap().insert(job_id.clone(), started);

        if self.synchronous {
            return Ok(SubmitOutcome::Ready {
                result_url: format!("https://cdn.test/{job_id}.mp4"),
            });
        }
        Ok(SubmitOutcome::Queued { job_id })
    }

    async fn poll(&self, job_id: &str) -> VideoResult<JobPoll> {
        let prompt = self.jobs.lock().unwrap().get(job_id).cloned().unwrap_or_default();
        if prompt.contains(STUCK) {
            return Ok(JobPoll::Pending);
        }
        if prompt.contains(REMOTE_FAIL) {
            return Ok(JobPoll::Failed {
                reason: "content moderation".to_string(),
            });
        }
        Ok(JobPoll::Succeeded {
            result_url: format!("https://cdn.test/{job_id}.mp4"),
        })
    }

    async fn download(&self, url: &str) -> VideoResult<Vec<u8>> {
        let job_id = url
            .trim_start_matches("https://cdn.test/")
            .trim_end_matches(".mp4")
            .to_string();
        if let Some(started) = self.starts.lock().unwrap().get(&job_id) {
            self.spans.lock().unwrap().push((*started, Instant::now()));
        }
        let prompt = self.jobs.lock().unwrap().get(&job_id).cloned().unwrap_or_default();
        if prompt.contains(BROKEN_DOWNLOAD) {
            return Err(VideoError::DownloadFailed(format!("{url} returned 404 Not Found")));
        }
        if prompt.contains(EMPTY_DOWNLOAD) {
            return Ok(Vec::new());
        }
        Ok(format!("video:{job_id};").into_bytes())
    }
}

#[derive(Default)]
struct FakeMedia {
    fail_concat: bool,
    fail_loudnorm: bool,
    placeholders: AtomicUsize,
    concat_calls: AtomicUsize,
    concat_lists: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaTool for FakeMedia {
    async fn render_placeholder(&self, output: &Path, label: &str, _duration_secs: f64) -> MediaResult<()> {
        self.placeholders.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(output, format!("placeholder:{label};")).await?;
        Ok(())
    }

    async fn concat(&self, list_file: &Path, output: &Path) -> MediaResult<()> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);
        let list = tokio::fs::read_to_string(list_file).await?;
        self.concat_lists.lock().unwrap().push(list.clone());
        if self.fail_concat {
            return Err(MediaError::ffmpeg_failed("concat exploded", None, Some(1)));
        }

        let mut joined = Vec::new();
        for line in list.lines() {
            let path = line
                .trim_start_matches("file '")
                .trim_end_matches('\'')
                .replace("'\\''", "'");
            joined.extend(tokio::fs::read(path).await?);
        }
        tokio::fs::write(output, joined).await?;
        Ok(())
    }

    async fn normalize_loudness(&self, input: &Path, output: &Path) -> MediaResult<()> {
        if self.fail_loudnorm {
            return Err(MediaError::ffmpeg_failed("loudnorm exploded", None, Some(1)));
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn color_grade(&self, input: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    ctx: Arc<PipelineContext>,
    pipeline: Arc<GenerationPipeline>,
    image_ref: String,
}

impl Harness {
    async fn new(
        video: Option<Arc<FakeVideo>>,
        media: Arc<FakeMedia>,
        configure: impl FnOnce(&mut WorkerConfig),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = WorkerConfig {
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: 3,
            clips_dir: dir.path().join("clips"),
            uploads_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("output"),
            ..WorkerConfig::default()
        };
        configure(&mut config);

        let stored = store_upload(&config.uploads_dir, "product.png", b"png-bytes")
            .await
            .unwrap();
        let db = Database::in_memory().await.unwrap();
        let video = video.map(|v| v as Arc<dyn VideoGenerator>);
        let ctx = Arc::new(PipelineContext::new(config, db, video, media));

        Self {
            _dir: dir,
            pipeline: Arc::new(GenerationPipeline::new(Arc::clone(&ctx))),
            ctx,
            image_ref: upload_reference(&stored),
        }
    }

    async fn create(&self, prompts: &[(u32, &str)]) -> GenerationId {
        let script = ShotScript {
            product_name: "Glow Serum".to_string(),
            master_description: "Amber bottle on a bathroom shelf".to_string(),
            scenes: prompts
                .iter()
                .map(|(id, prompt)| Scene::new(*id, "hook", *prompt))
                .collect(),
            tone: Tone::Ugc,
        };
        let generation = Generation::new(self.image_ref.clone(), script);
        self.ctx.generations.create(&generation).await.unwrap();
        generation.id
    }

    async fn generation(&self, id: &GenerationId) -> Generation {
        self.ctx.generations.require(id).await.unwrap()
    }

    fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

const THREE: &[(u32, &str)] = &[(1, "Open on the bottle"), (2, "Tired skin"), (3, "Glowing skin")];

#[tokio::test]
async fn test_all_clips_succeed_and_generation_completes() {
    let video = Arc::new(FakeVideo::default());
    let media = Arc::new(FakeMedia::default());
    let h = Harness::new(Some(Arc::clone(&video)), Arc::clone(&media), |_| {}).await;
    let id = h.create(THREE).await;

    let status = h.pipeline.run(&id).await.unwrap();
    assert_eq!(status, GenerationStatus::Completed);

    let generation = h.generation(&id).await;
    assert_eq!(generation.status, GenerationStatus::Completed);
    let expected = format!("/api/videos/{}_final.mp4", id);
    assert_eq!(generation.final_video.as_deref(), Some(expected.as_str()));

    let final_path = h.ctx.config.output_dir.join(format!("{}_final.mp4", id));
    let contents = std::fs::read_to_string(final_path).unwrap();
    assert_eq!(contents.matches("video:").count(), 3);

    let clips = h.ctx.clips.list_for_generation(&id).await.unwrap();
    assert_eq!(clips.len(), 3);
    for clip in &clips {
        assert_eq!(clip.status, ClipStatus::Completed);
        assert!(clip.remote_job_id.is_some());
        assert!(clip.remote_url.is_some());
    }

    // Clip files and intermediates are cleaned up after publishing.
    assert!(h.files_in(&h.ctx.config.clips_dir).is_empty());
    assert_eq!(media.concat_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stuck_clip_fails_generation_without_assembly() {
    let video = Arc::new(FakeVideo::default());
    let media = Arc::new(FakeMedia::default());
    let h = Harness::new(Some(video), Arc::clone(&media), |_| {}).await;
    let id = h
        .create(&[(1, "Open on the bottle"), (2, "STUCK shot"), (3, "Glowing skin")])
        .await;

    let status = h.pipeline.run(&id).await.unwrap();
    assert_eq!(status, GenerationStatus::Failed);

    let generation = h.generation(&id).await;
    assert_eq!(generation.status, GenerationStatus::Failed);
    assert!(generation.final_video.is_none());

    let clips = h.ctx.clips.list_for_generation(&id).await.unwrap();
    let statuses: Vec<ClipStatus> = clips.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![ClipStatus::Completed, ClipStatus::Failed, ClipStatus::Completed]
    );

    assert_eq!(media.concat_calls.load(Ordering::SeqCst), 0);
    // Completed clips stay on disk when nothing was assembled.
    assert_eq!(h.files_in(&h.ctx.config.clips_dir).len(), 2);
}

#[tokio::test]
async fn test_without_video_credential_clips_are_placeholders() {
    let media = Arc::new(FakeMedia::default());
    let h = Harness::new(None, Arc::clone(&media), |_| {}).await;
    let id = h.create(THREE).await;

    assert_eq!(h.pipeline.run(&id).await.unwrap(), GenerationStatus::Completed);
    assert_eq!(media.placeholders.load(Ordering::SeqCst), 3);

    let clips = h.ctx.clips.list_for_generation(&id).await.unwrap();
    assert!(clips.iter().all(|c| c.remote_job_id.is_none() && c.remote_url.is_none()));

    let final_path = h.ctx.config.output_dir.join(format!("{}_final.mp4", id));
    let contents = std::fs::read_to_string(final_path).unwrap();
    for clip in &clips {
        assert!(contents.contains(&format!("placeholder:Clip {};", clip.id.short())));
    }
}

#[tokio::test]
async fn test_synchronous_result_skips_polling() {
    let video = Arc::new(FakeVideo {
        synchronous: true,
        ..FakeVideo::default()
    });
    let h = Harness::new(Some(video), Arc::new(FakeMedia::default()), |_| {}).await;
    let id = h.create(THREE).await;

    assert_eq!(h.pipeline.run(&id).await.unwrap(), GenerationStatus::Completed);
    let clips = h.ctx.clips.list_for_generation(&id).await.unwrap();
    assert!(clips.iter().all(|c| c.remote_job_id.is_none() && c.remote_url.is_some()));
}

#[tokio::test]
async fn test_single_slot_serializes_clips() {
    let video = Arc::new(FakeVideo::with_delay(Duration::from_millis(30)));
    let h = Harness::new(Some(Arc::clone(&video)), Arc::new(FakeMedia::default()), |c| {
        c.max_inflight_clips = 1;
    })
    .await;
    let id = h.create(THREE).await;
    h.pipeline.run(&id).await.unwrap();

    let mut spans = video.spans.lock().unwrap().clone();
    assert_eq!(spans.len(), 3);
    spans.sort_by_key(|(start, _)| *start);
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "clip tasks overlapped with one slot");
    }
}

#[tokio::test]
async fn test_enough_slots_run_clips_concurrently() {
    let video = Arc::new(FakeVideo::with_delay(Duration::from_millis(50)));
    let h = Harness::new(Some(Arc::clone(&video)), Arc::new(FakeMedia::default()), |c| {
        c.max_inflight_clips = 3;
    })
    .await;
    let id = h.create(THREE).await;
    h.pipeline.run(&id).await.unwrap();

    let spans = video.spans.lock().unwrap().clone();
    assert_eq!(spans.len(), 3);
    let last_start = spans.iter().map(|(start, _)| *start).max().unwrap();
    let first_end = spans.iter().map(|(_, end)| *end).min().unwrap();
    assert!(last_start < first_end, "clip tasks did not overlap");
}

#[tokio::test]
async fn test_reassembling_completed_generation_is_noop() {
    let media = Arc::new(FakeMedia::default());
    let h = Harness::new(None, Arc::clone(&media), |_| {}).await;
    let id = h.create(THREE).await;
    h.pipeline.run(&id).await.unwrap();
    let before = h.generation(&id).await;

    let outcome = h.pipeline.assembler().assemble(&id).await.unwrap();
    assert_eq!(
        outcome,
        AssemblyOutcome::AlreadyCompleted {
            final_video: before.final_video.clone().unwrap()
        }
    );
    assert_eq!(media.concat_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generation(&id).await.final_video, before.final_video);
}

#[tokio::test]
async fn test_assembler_rejects_generation_not_assembling() {
    let media = Arc::new(FakeMedia::default());
    let h = Harness::new(None, Arc::clone(&media), |_| {}).await;
    let id = h.create(THREE).await;

    let err = h.pipeline.assembler().assemble(&id).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidState(_)));
    assert_eq!(h.generation(&id).await.status, GenerationStatus::Pending);
    assert_eq!(media.concat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concat_failure_is_fatal() {
    let media = Arc::new(FakeMedia {
        fail_concat: true,
        ..FakeMedia::default()
    });
    let h = Harness::new(None, media, |_| {}).await;
    let id = h.create(THREE).await;

    let err = h.pipeline.run(&id).await.unwrap_err();
    assert!(matches!(err, WorkerError::AssemblyFailed(_)));

    let generation = h.generation(&id).await;
    assert_eq!(generation.status, GenerationStatus::Failed);
    assert!(generation.final_video.is_none());
    // Clip files survive a failed assembly; intermediates do not.
    let left = h.files_in(&h.ctx.config.clips_dir);
    assert_eq!(left.len(), 3);
    assert!(left.iter().all(|p| !p.to_string_lossy().contains("_concat")));
}

#[tokio::test]
async fn test_loudness_failure_falls_back_to_copy() {
    let media = Arc::new(FakeMedia {
        fail_loudnorm: true,
        ..FakeMedia::default()
    });
    let h = Harness::new(None, media, |_| {}).await;
    let id = h.create(THREE).await;

    assert_eq!(h.pipeline.run(&id).await.unwrap(), GenerationStatus::Completed);
    let final_path = h.ctx.config.output_dir.join(format!("{}_final.mp4", id));
    let contents = std::fs::read_to_string(final_path).unwrap();
    assert_eq!(contents.matches("placeholder:").count(), 3);
}

#[tokio::test]
async fn test_concat_order_follows_sequence_index() {
    let media = Arc::new(FakeMedia::default());
    let h = Harness::new(None, Arc::clone(&media), |_| {}).await;
    let id = h
        .create(&[(3, "Call to action"), (1, "Hook"), (2, "Problem")])
        .await;
    h.pipeline.run(&id).await.unwrap();

    let clips = h.ctx.clips.list_for_generation(&id).await.unwrap();
    let order: Vec<u32> = clips.iter().map(|c| c.sequence_index).collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert!(clips[0].prompt.ends_with("Shot 1 of 3: Hook"));

    let list = media.concat_lists.lock().unwrap()[0].clone();
    let lines: Vec<&str> = list.lines().collect();
    assert_eq!(lines.len(), 3);
    for (line, clip) in lines.iter().zip(&clips) {
        assert!(line.contains(clip.id.as_str()));
    }
}

#[tokio::test]
async fn test_second_run_is_refused() {
    let h = Harness::new(None, Arc::new(FakeMedia::default()), |_| {}).await;
    let id = h.create(THREE).await;
    h.pipeline.run(&id).await.unwrap();

    let err = h.pipeline.run(&id).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidState(_)));
    assert_eq!(h.generation(&id).await.status, GenerationStatus::Completed);
}

#[tokio::test]
async fn test_missing_image_fails_generation() {
    let h = Harness::new(None, Arc::new(FakeMedia::default()), |_| {}).await;
    let script = ShotScript {
        product_name: "Lamp".to_string(),
        master_description: String::new(),
        scenes: vec![Scene::new(1, "hook", "Lamp on a desk")],
        tone: Tone::Ugc,
    };
    let generation = Generation::new("/api/files/missing.png", script);
    h.ctx.generations.create(&generation).await.unwrap();

    let err = h.pipeline.run(&generation.id).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidImage(_)));
    assert_eq!(h.generation(&generation.id).await.status, GenerationStatus::Failed);
}

#[tokio::test]
async fn test_executor_runs_in_background() {
    let h = Harness::new(None, Arc::new(FakeMedia::default()), |_| {}).await;
    let first = h.create(THREE).await;
    let second = h.create(THREE).await;

    let executor = GenerationExecutor::new(Arc::clone(&h.pipeline));
    executor.submit(first.clone());
    executor.submit(second.clone());
    executor.wait_idle().await;

    assert_eq!(executor.active(), 0);
    assert_eq!(h.generation(&first).await.status, GenerationStatus::Completed);
    assert_eq!(h.generation(&second).await.status, GenerationStatus::Completed);
}

/// Run a three-scene generation whose middle scene carries `marker` and
/// check that only that clip failed and nothing was assembled.
async fn assert_middle_clip_fails(marker: &str) {
    let video = Arc::new(FakeVideo::default());
    let media = Arc::new(FakeMedia::default());
    let h = Harness::new(Some(video), Arc::clone(&media), |_| {}).await;
    let middle = format!("{marker} shot");
    let id = h
        .create(&[(1, "Open on the bottle"), (2, middle.as_str()), (3, "Glowing skin")])
        .await;

    assert_eq!(h.pipeline.run(&id).await.unwrap(), GenerationStatus::Failed);

    let generation = h.generation(&id).await;
    assert_eq!(generation.status, GenerationStatus::Failed);
    assert!(generation.final_video.is_none());

    let statuses: Vec<ClipStatus> = h
        .ctx
        .clips
        .list_for_generation(&id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.status)
        .collect();
    assert_eq!(
        statuses,
        vec![ClipStatus::Completed, ClipStatus::Failed, ClipStatus::Completed],
        "{marker}"
    );
    assert_eq!(media.concat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_submission_fails_only_that_clip() {
    assert_middle_clip_fails(REJECTED).await;
}

#[tokio::test]
async fn test_remote_task_failure_fails_only_that_clip() {
    assert_middle_clip_fails(REMOTE_FAIL).await;
}

#[tokio::test]
async fn test_download_error_fails_only_that_clip() {
    assert_middle_clip_fails(BROKEN_DOWNLOAD).await;
}

#[tokio::test]
async fn test_empty_download_fails_only_that_clip() {
    assert_middle_clip_fails(EMPTY_DOWNLOAD).await;
}

#[tokio::test]
async fn test_panicking_clip_task_is_recorded_failed() {
    assert_middle_clip_fails(PANIC).await;
}
