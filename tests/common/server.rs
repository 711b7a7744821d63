//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own temp, music and photo
//! directories, a running download worker and a fake yt-dlp.

use super::constants::*;
use super::fakes::FakeYtDlp;
use songsurf_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use songsurf_server::library::ArtistPhotoStore;
use songsurf_server::{LibraryOrganizer, QueueService, QueueWorker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated directories
///
/// When dropped, the server and the worker shut down and temp resources are
/// cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    #[allow(dead_code)]
    pub port: u16,

    /// The fake yt-dlp shared by the worker and the metadata endpoints
    #[allow(dead_code)]
    pub ytdlp: Arc<FakeYtDlp>,

    #[allow(dead_code)]
    pub temp_dir: PathBuf,

    #[allow(dead_code)]
    pub music_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp: TempDir,
    _music: TempDir,
    _photos: TempDir,
    shutdown: CancellationToken,
}

#[allow(dead_code)]
impl TestServer {
    /// Spawns a server whose downloads complete immediately
    pub async fn spawn() -> Self {
        Self::spawn_with(TEST_QUEUE_CAPACITY, false).await
    }

    /// Spawns a server whose downloads wait for `ytdlp.release()`
    pub async fn spawn_gated() -> Self {
        Self::spawn_with(TEST_QUEUE_CAPACITY, true).await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if temp directories cannot be created, the port cannot be
    /// bound, or the server does not become ready within the timeout.
    pub async fn spawn_with(queue_capacity: usize, gated: bool) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let music = TempDir::new().expect("Failed to create music dir");
        let photos = TempDir::new().expect("Failed to create photos dir");

        let ytdlp = Arc::new(FakeYtDlp::new(temp.path().to_path_buf(), gated));
        let queue = Arc::new(QueueService::new(
            queue_capacity,
            temp.path().to_path_buf(),
            ytdlp.clone(),
        ));
        let library = Arc::new(LibraryOrganizer::new(music.path().to_path_buf()));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            bind_address: "127.0.0.1".to_string(),
            port,
            frontend_dir_path: None,
        };
        let state = ServerState::new(
            config,
            queue.clone(),
            library.clone(),
            Arc::new(ArtistPhotoStore::new(photos.path().to_path_buf())),
            ytdlp.clone(),
        );
        let app = make_app(state);

        let shutdown = CancellationToken::new();

        tokio::spawn(QueueWorker::new(queue, library).run(shutdown.clone()));

        // Spawn server in background task with graceful shutdown
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            ytdlp,
            temp_dir: temp.path().to_path_buf(),
            music_dir: music.path().to_path_buf(),
            _temp: temp,
            _music: music,
            _photos: photos,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the /ping endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/ping", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Names of the regular files currently in the temp directory
    pub fn temp_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.temp_dir)
            .expect("Failed to read temp dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
