use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sfu_recorder::media::MediaWorker;
use sfu_recorder::nats::{self, NatsWorker};
use sfu_recorder::{
    create_router, default_media_codecs, AppState, CombinePipeline, Config, SystemRunner,
    SystemSpawner, WorkerPool,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sfu-recorder", version, about = "WebRTC recording orchestration")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/sfu-recorder")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the signaling server (default)
    Serve,
    /// Combine the finished recordings once and exit
    Combine,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::Combine => combine(cfg).await,
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let client = nats::connect(&cfg.media.nats_url, cfg.media.request_timeout()).await?;

    let workers: Vec<Arc<dyn MediaWorker>> = cfg
        .media
        .workers
        .iter()
        .map(|subject| -> Arc<dyn MediaWorker> {
            Arc::new(NatsWorker::new(client.clone(), subject.clone()))
        })
        .collect();
    let pool = WorkerPool::new(workers)?;
    info!("Media worker pool ready ({} workers)", pool.len());

    let router = pool
        .create_router(&default_media_codecs())
        .await
        .context("Failed to create media router")?;
    info!("Router {} created", router.id());

    let state = AppState::build(
        &cfg,
        router,
        Arc::new(SystemSpawner),
        Arc::new(SystemRunner),
    );
    let dispatcher = Arc::clone(&state.dispatcher);
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {} (recorder: {:?})", addr, cfg.recorder.process);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    dispatcher.shutdown().await;
    info!("Stopped");

    Ok(())
}

async fn combine(cfg: Config) -> Result<()> {
    let pipeline = CombinePipeline::new(cfg.combine, Arc::new(SystemRunner));
    let outcome = pipeline.combine().await?;

    info!("Combine {:?}: {:?}", outcome.status, outcome.output);

    Ok(())
}
