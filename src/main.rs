use anyhow::{Context, Result};
use clap::Parser;
use loqa_recorder::config::CaptureMode;
use loqa_recorder::{
    create_router, AppState, ArtifactSink, AudioBackend, AudioFile, CaptureHost, Config,
    CoordinatorHandle, FilePlaybackBackend, LocalCaptureHost, NatsCaptureHost, SessionCoordinator, WebhookSink,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Single-session audio recording coordinator
#[derive(Debug, Parser)]
#[command(name = "loqa-recorder", version, about)]
struct Args {
    /// Config file path (extension optional)
    #[arg(short, long, default_value = "config/loqa-recorder")]
    config: String,

    /// HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Webhook receiving finished recordings
    #[arg(long)]
    webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }
    if args.webhook_url.is_some() {
        cfg.sink.webhook_url = args.webhook_url;
    }

    info!("Loqa Recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let host = capture_host(&cfg).await?;

    match &cfg.sink.webhook_url {
        Some(url) => info!("Recordings will be delivered to {}", url),
        None => info!("No webhook configured; recordings will be discarded"),
    }
    let sink: Arc<dyn ArtifactSink> = Arc::new(WebhookSink::new(
        cfg.sink.webhook_url.clone(),
        cfg.sink.file_name.clone(),
    ));

    let (coordinator, coordinator_task) =
        SessionCoordinator::spawn(cfg.coordinator_config(), host, sink);

    let control = coordinator.clone();
    let app = create_router(AppState::new(coordinator));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(control))
        .await
        .context("HTTP server failed")?;

    // The coordinator was told to stop before the server drained; wait for
    // it to release any bound worker
    coordinator_task
        .await
        .context("Session coordinator task panicked")?;

    info!("Shut down cleanly");

    Ok(())
}

async fn capture_host(cfg: &Config) -> Result<Arc<dyn CaptureHost>> {
    let capture = &cfg.capture;

    match capture.mode {
        CaptureMode::Nats => {
            let host = NatsCaptureHost::connect(&capture.nats_url, capture.subject_prefix.clone())
                .await?;
            Ok(Arc::new(host))
        }
        CaptureMode::File => {
            let path = capture
                .file_path
                .as_ref()
                .context("capture.file_path is required in file mode")?;
            let audio = Arc::new(AudioFile::open(path)?);

            info!(
                "File capture source: {} ({:.1}s, {} Hz, {} ch)",
                audio.path, audio.duration_seconds, audio.sample_rate, audio.channels
            );

            let backend_config = capture.backend_config();
            let factory_config = backend_config.clone();
            let host = LocalCaptureHost::new("local", backend_config, move || {
                let backend = FilePlaybackBackend::new(Arc::clone(&audio), factory_config.clone());
                Ok(Box::new(backend) as Box<dyn AudioBackend>)
            });
            Ok(Arc::new(host))
        }
    }
}

/// Resolves on ctrl-c after telling the coordinator to stop, so open
/// subscriber sockets are closed and graceful shutdown can finish.
async fn shutdown_signal(coordinator: CoordinatorHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    coordinator.shutdown().await;
}
