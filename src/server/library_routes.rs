//! Library management routes.
//!
//! Provides endpoints for:
//! - Moving and renaming organized songs
//! - Applying featuring corrections
//! - Album covers and artist photos

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::server::{error_response, non_blank};
use super::state::{GuardedArtistPhotos, GuardedLibrary, ServerState};
use crate::library::{Correction, CorrectionResult, CoverImage, LibraryError, LibraryOrganizer};

/// Uploaded artist photos larger than this are rejected by the extractor.
const MAX_PHOTO_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct MoveSongBody {
    song_path: Option<String>,
    target_artist: Option<String>,
    target_album: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenameSongBody {
    song_path: Option<String>,
    new_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApplyCorrectionsBody {
    #[serde(default)]
    corrections: Vec<Correction>,
}

#[derive(Debug, Serialize)]
struct SongPathResponse {
    success: bool,
    new_path: String,
}

#[derive(Debug, Serialize)]
struct CorrectionsResponse {
    success: bool,
    results: Vec<CorrectionResult>,
    success_count: usize,
    total: usize,
}

#[derive(Debug, Serialize)]
struct PhotoUploadedResponse {
    success: bool,
    message: String,
    photo_url: String,
}

// =============================================================================
// Helpers
// =============================================================================

fn library_error_response(err: LibraryError) -> Response {
    let status = match err {
        LibraryError::InvalidPath(_)
        | LibraryError::UnsupportedFormat(_)
        | LibraryError::EmptyFile => StatusCode::BAD_REQUEST,
        LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
        LibraryError::AlreadyExists(_) => StatusCode::CONFLICT,
        LibraryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err)
}

fn image_response(data: Vec<u8>, mime_type: &str) -> Response {
    ([(header::CONTENT_TYPE, mime_type.to_string())], data).into_response()
}

type CoverLookup = Result<Result<Option<CoverImage>, LibraryError>, tokio::task::JoinError>;

fn cover_response(result: CoverLookup) -> Response {
    match result {
        Ok(Ok(Some(cover))) => image_response(cover.data, &cover.mime_type),
        Ok(Ok(None)) | Ok(Err(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Cover lookup failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Runs a blocking library edit and maps its result to a response.
async fn run_edit<F>(library: GuardedLibrary, edit: F) -> Response
where
    F: FnOnce(&LibraryOrganizer) -> Result<String, LibraryError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || edit(library.as_ref())).await {
        Ok(Ok(new_path)) => Json(SongPathResponse {
            success: true,
            new_path,
        })
        .into_response(),
        Ok(Err(err)) => {
            warn!("Library edit failed: {}", err);
            library_error_response(err)
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /move-song
async fn post_move_song(
    State(library): State<GuardedLibrary>,
    body: Result<Json<MoveSongBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let (Some(song_path), Some(artist), Some(album)) = (
        non_blank(body.song_path),
        non_blank(body.target_artist),
        non_blank(body.target_album),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing parameters");
    };

    info!("Moving {} to {}/{}", song_path, artist, album);
    run_edit(library, move |library| {
        library.move_song(&song_path, &artist, &album)
    })
    .await
}

/// POST /rename-song
async fn post_rename_song(
    State(library): State<GuardedLibrary>,
    body: Result<Json<RenameSongBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let (Some(song_path), Some(new_title)) = (non_blank(body.song_path), non_blank(body.new_title))
    else {
        return error_response(StatusCode::BAD_REQUEST, "Missing parameters");
    };

    info!("Renaming {} to '{}'", song_path, new_title);
    run_edit(library, move |library| library.rename_song(&song_path, &new_title)).await
}

/// POST /apply-corrections
async fn post_apply_corrections(
    State(library): State<GuardedLibrary>,
    body: Result<Json<ApplyCorrectionsBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if body.corrections.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No corrections to apply");
    }

    let total = body.corrections.len();
    info!("Applying {} correction(s)", total);
    let corrections = body.corrections;
    let results =
        match tokio::task::spawn_blocking(move || library.apply_corrections(&corrections)).await {
            Ok(results) => results,
            Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
        };

    let success_count = results.iter().filter(|r| r.success).count();
    info!("Corrections done: {}/{} succeeded", success_count, total);
    Json(CorrectionsResponse {
        success: true,
        results,
        success_count,
        total,
    })
    .into_response()
}

/// GET /album-cover/{artist}/{album}
async fn get_album_cover(
    State(library): State<GuardedLibrary>,
    Path((artist, album)): Path<(String, String)>,
) -> Response {
    cover_response(
        tokio::task::spawn_blocking(move || library.album_cover(&artist, &album)).await,
    )
}

/// GET /cover/{file_name}, where the name is `<Artist>_<Album>.jpg`
async fn get_cover(
    State(library): State<GuardedLibrary>,
    Path(file_name): Path<String>,
) -> Response {
    cover_response(tokio::task::spawn_blocking(move || library.cover_by_file_name(&file_name)).await)
}

/// GET /artist-photo/{artist}
async fn get_artist_photo(
    State(photos): State<GuardedArtistPhotos>,
    Path(artist): Path<String>,
) -> Response {
    match tokio::task::spawn_blocking(move || photos.load(&artist)).await {
        Ok(Ok(Some(photo))) => image_response(photo.data, &photo.mime_type),
        Ok(Ok(None)) | Ok(Err(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Artist photo lookup failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// POST /upload-artist-photo (multipart/form-data with `photo` and `artist_name`)
async fn post_upload_artist_photo(
    State(photos): State<GuardedArtistPhotos>,
    mut multipart: Multipart,
) -> Response {
    let mut artist_name: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return error_response(StatusCode::BAD_REQUEST, err.body_text()),
        };
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "photo" => {
                file_name = field.file_name().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => data = Some(bytes.to_vec()),
                    Err(err) => {
                        warn!("Failed to read uploaded photo: {}", err);
                        return error_response(StatusCode::BAD_REQUEST, "Failed to read file");
                    }
                }
            }
            "artist_name" => {
                if let Ok(text) = field.text().await {
                    artist_name = non_blank(Some(text));
                }
            }
            other => debug!("Ignoring upload field '{}'", other),
        }
    }

    let Some(data) = data else {
        return error_response(StatusCode::BAD_REQUEST, "No file provided");
    };
    let Some(artist_name) = artist_name else {
        return error_response(StatusCode::BAD_REQUEST, "Missing artist name");
    };
    let Some(file_name) = non_blank(file_name) else {
        return error_response(StatusCode::BAD_REQUEST, "Empty file name");
    };

    let artist = artist_name.clone();
    match tokio::task::spawn_blocking(move || photos.save(&artist, &file_name, &data)).await {
        Ok(Ok(_)) => Json(PhotoUploadedResponse {
            success: true,
            message: format!("Photo uploaded for {}", artist_name),
            photo_url: format!("/api/artist-photo/{}", artist_name),
        })
        .into_response(),
        Ok(Err(err)) => {
            warn!("Photo upload for {} rejected: {}", artist_name, err);
            library_error_response(err)
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the library management routes, nested under `/api`.
///
/// - POST /move-song - Move a song to another artist/album
/// - POST /rename-song - Rename a song and its title tag
/// - POST /apply-corrections - Apply featuring corrections in bulk
/// - GET /album-cover/{artist}/{album} - Embedded album cover
/// - GET /cover/{file_name} - Same, addressed as `<Artist>_<Album>.jpg`
/// - GET /artist-photo/{artist} - Uploaded artist photo
/// - POST /upload-artist-photo - Upload an artist photo
pub fn library_routes() -> Router<ServerState> {
    let upload_route = Router::new()
        .route("/upload-artist-photo", post(post_upload_artist_photo))
        .layer(DefaultBodyLimit::max(MAX_PHOTO_UPLOAD_BYTES));

    Router::new()
        .merge(upload_route)
        .route("/move-song", post(post_move_song))
        .route("/rename-song", post(post_rename_song))
        .route("/apply-corrections", post(post_apply_corrections))
        .route("/album-cover/{artist}/{album}", get(get_album_cover))
        .route("/cover/{file_name}", get(get_cover))
        .route("/artist-photo/{artist}", get(get_artist_photo))
}
