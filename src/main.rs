use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use songsurf_server::config::{self, DEFAULT_BIND_ADDRESS, DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY};
use songsurf_server::server::{run_server, ServerConfig, ServerState};
use songsurf_server::library::ArtistPhotoStore;
use songsurf_server::{
    LibraryOrganizer, QueueService, QueueWorker, RequestsLoggingLevel, YtDlpDownloader,
};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory where yt-dlp writes in-flight downloads.
    #[clap(long, value_parser = parse_path, default_value = "temp")]
    pub temp_dir: PathBuf,

    /// Root of the organized music library.
    #[clap(long, value_parser = parse_path, default_value = "music")]
    pub music_dir: PathBuf,

    /// Where uploaded artist photos are kept.
    #[clap(long, value_parser = parse_path, default_value = "artist_photos")]
    pub artist_photos_dir: PathBuf,

    /// The address to bind to.
    #[clap(long, default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: String,

    /// The port to listen on.
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of queued downloads.
    #[clap(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// yt-dlp executable.
    #[clap(long)]
    pub ytdlp_path: Option<String>,

    /// Directory containing ffmpeg. Looked up on PATH when omitted.
    #[clap(long, value_parser = parse_path)]
    pub ffmpeg_location: Option<PathBuf>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            temp_dir: args.temp_dir.clone(),
            music_dir: args.music_dir.clone(),
            artist_photos_dir: args.artist_photos_dir.clone(),
            bind_address: args.bind_address.clone(),
            port: args.port,
            queue_capacity: args.queue_capacity,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            ytdlp_path: args.ytdlp_path.clone(),
            ffmpeg_location: args.ffmpeg_location.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  temp_dir: {:?}", app_config.temp_dir);
    info!("  music_dir: {:?}", app_config.music_dir);
    info!("  artist_photos_dir: {:?}", app_config.artist_photos_dir);
    info!("  listen: {}", app_config.listen_address());
    info!("  queue_capacity: {}", app_config.queue_capacity);

    for dir in [
        &app_config.temp_dir,
        &app_config.music_dir,
        &app_config.artist_photos_dir,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    let downloader = Arc::new(YtDlpDownloader::new(
        &app_config.downloader,
        app_config.temp_dir.clone(),
    ));
    let queue = Arc::new(QueueService::new(
        app_config.queue_capacity,
        app_config.temp_dir.clone(),
        downloader.clone(),
    ));
    let library = Arc::new(LibraryOrganizer::new(app_config.music_dir.clone()));
    let photos = Arc::new(ArtistPhotoStore::new(app_config.artist_photos_dir.clone()));

    let shutdown_token = CancellationToken::new();
    let worker = QueueWorker::new(queue.clone(), library.clone());
    let worker_handle = tokio::spawn(worker.run(shutdown_token.clone()));

    let state = ServerState::new(
        ServerConfig::from_app_config(&app_config),
        queue,
        library,
        photos,
        downloader,
    );

    info!("Ready to serve at {}!", app_config.listen_address());

    let result = tokio::select! {
        result = run_server(state, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    shutdown_token.cancel();
    // The worker only stops between jobs; a download in flight keeps the
    // process alive at most this long.
    if tokio::time::timeout(Duration::from_secs(5), worker_handle)
        .await
        .is_err()
    {
        info!("Worker still busy, exiting anyway");
    }
    result
}
