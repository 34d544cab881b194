//! Application state.

use std::sync::Arc;

use tracing::warn;
use vhook_media::{FfmpegTool, MediaTool};
use vhook_store::{ClipRepository, Database, GenerationRepository};
use vhook_video_client::VideoClientConfig;
use vhook_worker::{
    video_generator, GeminiConfig, GeminiDirector, GenerationExecutor, GenerationPipeline,
    PipelineContext, ScriptProducer, WorkerConfig,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub db: Database,
    pub generations: GenerationRepository,
    pub clips: ClipRepository,
    /// `None` when no vision credential is configured
    pub director: Option<Arc<dyn ScriptProducer>>,
    pub executor: Arc<GenerationExecutor>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        db: Database,
        director: Option<Arc<dyn ScriptProducer>>,
        executor: Arc<GenerationExecutor>,
    ) -> Self {
        Self {
            generations: GenerationRepository::new(db.clone()),
            clips: ClipRepository::new(db.clone()),
            config,
            db,
            director,
            executor,
        }
    }

    /// Build the state and its adapters from environment variables.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::connect(&config.database_url).await?;

        let director: Option<Arc<dyn ScriptProducer>> = match GeminiDirector::new(GeminiConfig::from_env()) {
            Ok(director) => Some(Arc::new(director)),
            Err(e) => {
                warn!("Vision director unavailable: {}", e);
                None
            }
        };

        let video = video_generator(VideoClientConfig::from_env())?;
        if video.is_none() {
            warn!("WAN_API_KEY not set, clips will be rendered as placeholders");
        }

        let mut worker_config = WorkerConfig::from_env();
        worker_config.uploads_dir = config.uploads_dir.clone();
        worker_config.output_dir = config.output_dir.clone();
        let media: Arc<dyn MediaTool> = Arc::new(FfmpegTool::with_timeout(worker_config.ffmpeg_timeout_secs));

        let ctx = Arc::new(PipelineContext::new(worker_config, db.clone(), video, media));
        let executor = Arc::new(GenerationExecutor::new(Arc::new(GenerationPipeline::new(ctx))));

        Ok(Self::new(config, db, director, executor))
    }

    pub fn vision_configured(&self) -> bool {
        self.director.is_some()
    }

    pub fn video_configured(&self) -> bool {
        self.executor.pipeline().context().video.is_some()
    }
}
