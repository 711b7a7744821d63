use anyhow::{Context, Result};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::{library_routes::library_routes, log_requests, state::*};
use crate::download_queue::{Job, PlaylistPosition, QueueError, TrackMetadata};
use crate::downloader::{is_playlist_url, PlaylistInfo, TrackInfo};

#[derive(Serialize)]
struct PingResponse {
    status: &'static str,
    message: &'static str,
    timestamp: String,
    uptime: String,
    hash: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct DownloadQueuedResponse {
    success: bool,
    message: String,
    queue_position: usize,
    queue_size: usize,
}

#[derive(Serialize)]
struct CleanupResponse {
    success: bool,
    deleted_files: Vec<String>,
}

#[derive(Serialize)]
struct TrackMetadataResponse {
    success: bool,
    metadata: TrackInfo,
}

#[derive(Serialize)]
struct PlaylistMetadataResponse {
    success: bool,
    #[serde(flatten)]
    playlist: PlaylistInfo,
}

#[derive(Serialize)]
struct PlaylistQueuedResponse {
    success: bool,
    message: String,
    added: usize,
    total: usize,
    queue_size: usize,
}

#[derive(Deserialize, Debug)]
struct DownloadBody {
    pub url: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
}

#[derive(Deserialize, Debug)]
struct UrlBody {
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PlaylistSongBody {
    pub url: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PlaylistMetadataBody {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub year: Option<String>,
    pub total_songs: Option<usize>,
    #[serde(default)]
    pub songs: Vec<PlaylistSongBody>,
}

#[derive(Deserialize, Debug)]
struct DownloadPlaylistBody {
    pub url: Option<String>,
    pub playlist_metadata: Option<PlaylistMetadataBody>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(super) fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn queue_error_response(err: QueueError) -> Response {
    let status = match err {
        QueueError::Validation(_) => StatusCode::BAD_REQUEST,
        QueueError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
    };
    error_response(status, err)
}

pub(super) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn ping(State(state): State<ServerState>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        message: "SongSurf server is running",
        timestamp: now_timestamp(),
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: now_timestamp(),
    })
}

async fn get_status(State(queue): State<GuardedQueueService>) -> Response {
    Json(queue.get_status()).into_response()
}

async fn post_download(
    State(queue): State<GuardedQueueService>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let metadata = TrackMetadata::from_fields(body.artist, body.album, body.title, body.year);
    let job = Job::new(body.url.unwrap_or_default(), metadata);
    match queue.submit(job) {
        Ok(position) => Json(DownloadQueuedResponse {
            success: true,
            message: "Added to queue".to_string(),
            queue_position: position,
            queue_size: queue.queue_size(),
        })
        .into_response(),
        Err(err) => {
            warn!("Rejected download request: {}", err);
            queue_error_response(err)
        }
    }
}

async fn post_cancel(State(queue): State<GuardedQueueService>) -> Response {
    if queue.cancel() {
        Json(MessageResponse {
            success: true,
            message: "Cancellation requested".to_string(),
        })
        .into_response()
    } else {
        error_response(StatusCode::BAD_REQUEST, "No download in progress")
    }
}

async fn post_cleanup(State(queue): State<GuardedQueueService>) -> Response {
    match queue.cleanup().await {
        Ok(deleted_files) => Json(CleanupResponse {
            success: true,
            deleted_files,
        })
        .into_response(),
        Err(err) => {
            error!("Cleanup failed: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}

async fn get_stats(State(library): State<GuardedLibrary>) -> Response {
    match tokio::task::spawn_blocking(move || library.stats()).await {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn get_library(State(library): State<GuardedLibrary>) -> Response {
    match tokio::task::spawn_blocking(move || library.library_structure()).await {
        Ok(structure) => Json(structure).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn post_extract_metadata(
    State(extractor): State<GuardedMetadataExtractor>,
    body: Result<Json<UrlBody>, JsonRejection>,
) -> Response {
    let url = match body {
        Ok(Json(body)) => non_blank(body.url),
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let Some(url) = url else {
        return error_response(StatusCode::BAD_REQUEST, "URL is required");
    };

    if is_playlist_url(&url) {
        match extractor.extract_playlist(&url).await {
            Ok(playlist) => {
                info!(
                    "Extracted {:?} '{}' with {} songs",
                    playlist.kind,
                    playlist.title,
                    playlist.total_songs
                );
                Json(PlaylistMetadataResponse {
                    success: true,
                    playlist,
                })
                .into_response()
            }
            Err(err) => {
                error!("Playlist extraction failed for {}: {}", url, err);
                error_response(StatusCode::BAD_GATEWAY, err)
            }
        }
    } else {
        match extractor.extract_track(&url).await {
            Ok(metadata) => Json(TrackMetadataResponse {
                success: true,
                metadata,
            })
            .into_response(),
            Err(err) => {
                error!("Metadata extraction failed for {}: {}", url, err);
                error_response(StatusCode::BAD_GATEWAY, err)
            }
        }
    }
}

async fn post_download_playlist(
    State(queue): State<GuardedQueueService>,
    body: Result<Json<DownloadPlaylistBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let (Some(_), Some(playlist)) = (non_blank(body.url), body.playlist_metadata) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "URL and playlist metadata are required",
        );
    };

    let total = playlist.total_songs.unwrap_or(playlist.songs.len());
    let playlist_title = playlist.title.clone().unwrap_or_default();
    let jobs: Vec<Job> = playlist
        .songs
        .into_iter()
        .enumerate()
        .map(|(index, song)| {
            let metadata = TrackMetadata::from_fields(
                non_blank(song.artist).or_else(|| playlist.artist.clone()),
                playlist.title.clone(),
                song.title,
                playlist.year.clone(),
            );
            Job::new(song.url.unwrap_or_default(), metadata).with_playlist(PlaylistPosition {
                playlist_title: playlist_title.clone(),
                song_index: index + 1,
                total_songs: total,
            })
        })
        .collect();

    let requested = jobs.len();
    let added = queue.submit_many(jobs);
    info!(
        "Queued {}/{} songs from playlist '{}'",
        added, requested, playlist_title
    );

    if added == 0 && requested > 0 && queue.queue_size() >= queue.capacity() {
        return queue_error_response(QueueError::QueueFull {
            capacity: queue.capacity(),
        });
    }

    Json(PlaylistQueuedResponse {
        success: true,
        message: format!("{} songs added to queue", added),
        added,
        total,
        queue_size: queue.queue_size(),
    })
    .into_response()
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .route("/library", get(get_library))
        .route("/extract-metadata", post(post_extract_metadata))
        .route("/download-playlist", post(post_download_playlist))
        .merge(library_routes())
        .with_state(state.clone());

    let queue_routes: Router = Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/download", post(post_download))
        .route("/cancel", post(post_cancel))
        .route("/cleanup", post(post_cleanup))
        .route("/stats", get(get_stats))
        .with_state(state.clone());

    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(ping)).with_state(state.clone()),
    };

    home_router
        .merge(queue_routes)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
}

/// Serves until `shutdown` is cancelled.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let address = state.config.listen_address();
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server error")
}
