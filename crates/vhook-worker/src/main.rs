//! Render one ad end to end from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use vhook_media::{check_ffmpeg, FfmpegTool, MediaTool};
use vhook_models::{Generation, GenerationStatus, SourceImage};
use vhook_store::Database;
use vhook_video_client::VideoClientConfig;
use vhook_worker::director::parse_script;
use vhook_worker::images::{store_upload, upload_reference};
use vhook_worker::{
    init_tracing, video_generator, GeminiConfig, GeminiDirector, GenerationExecutor,
    GenerationPipeline, PipelineContext, ScriptProducer, WorkerConfig,
};

#[derive(Debug, Parser)]
#[command(name = "vhook-render", about = "Generate a vertical video ad from a product image")]
struct Args {
    /// Product image
    #[arg(long)]
    image: PathBuf,

    /// Shot script JSON; skips the vision director when given
    #[arg(long)]
    script: Option<PathBuf>,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://vhook.db")]
    database_url: String,

    /// Overrides OUTPUT_DIR
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let mut config = WorkerConfig::from_env();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    info!("Worker config: {:?}", config);

    check_ffmpeg().context("FFmpeg is required to render clips")?;

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let image = SourceImage::from_named_bytes(bytes, &args.image);

    let script = match &args.script {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_script(&text)?
        }
        None => {
            let director = GeminiDirector::new(GeminiConfig::from_env())?;
            director.produce_script(&image).await?
        }
    };
    info!(
        scenes = script.scenes.len(),
        "Rendering '{}'", script.product_name
    );

    let file_name = args
        .image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image.jpg");
    let stored = store_upload(&config.uploads_dir, file_name, &image.bytes).await?;

    let db = Database::connect(&args.database_url).await?;
    let video = video_generator(VideoClientConfig::from_env())?;
    if video.is_none() {
        warn!("WAN_API_KEY not set, rendering placeholder clips");
    }
    let media: Arc<dyn MediaTool> = Arc::new(FfmpegTool::with_timeout(config.ffmpeg_timeout_secs));

    let ctx = Arc::new(PipelineContext::new(config, db, video, media));
    let generation = Generation::new(upload_reference(&stored), script);
    ctx.generations.create(&generation).await?;

    let executor = GenerationExecutor::new(Arc::new(GenerationPipeline::new(Arc::clone(&ctx))));
    executor.submit(generation.id.clone());
    executor.wait_idle().await;

    let finished = ctx.generations.require(&generation.id).await?;
    println!("generation {}: {}", finished.id, finished.status);
    if finished.status != GenerationStatus::Completed {
        bail!("generation {} ended {}", finished.id, finished.status);
    }

    if let Some(reference) = finished.final_video {
        let name = reference.rsplit('/').next().unwrap_or(&reference);
        println!("{}", ctx.config.output_dir.join(name).display());
    }
    Ok(())
}
