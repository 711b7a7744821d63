//! Audio download collaborators.
//!
//! The worker only sees the [`Downloader`] trait; the HTTP layer uses
//! [`MetadataExtractor`] for the metadata preview endpoints. Both are
//! implemented by [`YtDlpDownloader`].

mod progress;
mod ytdlp;

pub use progress::{DownloadProgress, Phase, ProgressTracker};
pub use ytdlp::{find_ffmpeg_dir, normalize_url, YtDlpDownloader};

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::download_queue::TrackMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// The converted MP3 inside the temp directory.
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Failed to launch yt-dlp: {0}")]
    Launch(String),

    #[error("yt-dlp failed: {0}")]
    ToolFailed(String),

    #[error("Downloaded file not found: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetches the audio for `url` into the temp directory. Runs to
    /// completion; there is no way to interrupt it.
    async fn download(
        &self,
        url: &str,
        metadata: &TrackMetadata,
    ) -> Result<DownloadedFile, DownloadError>;

    /// Latest progress of the current (or last) download.
    fn progress(&self) -> DownloadProgress;

    fn reset_progress(&self);
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to launch yt-dlp: {0}")]
    Launch(String),

    #[error("yt-dlp failed: {0}")]
    ToolFailed(String),

    #[error("Invalid yt-dlp output: {0}")]
    InvalidOutput(String),

    #[error("URL does not contain a playlist or album")]
    NotAPlaylist,
}

/// Track metadata as reported by the source, before any correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub thumbnail_url: String,
    /// Seconds.
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    Album,
    Playlist,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistSong {
    pub title: String,
    pub artist: String,
    pub url: String,
    pub id: Option<String>,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistInfo {
    #[serde(rename = "type")]
    pub kind: PlaylistKind,
    pub title: String,
    pub artist: String,
    pub year: String,
    pub songs: Vec<PlaylistSong>,
    pub total_songs: usize,
    /// Seconds.
    pub total_duration: u64,
}

#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract_track(&self, url: &str) -> Result<TrackInfo, ExtractError>;
    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo, ExtractError>;
}

/// Playlist and album pages are expanded into several jobs.
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("/playlist?list=") || url.contains("/browse/")
}
